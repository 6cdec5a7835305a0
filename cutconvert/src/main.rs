mod cli;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use cutconvert_core::{run_with_progress, Config, ProgressEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = cli::build_cli().get_matches();

    let input_path = matches
        .get_one::<PathBuf>("input")
        .expect("required argument");
    if !input_path.is_file() {
        return Err(anyhow!(
            "input manifest does not exist: {}",
            input_path.display()
        ));
    }
    let output_path = matches
        .get_one::<PathBuf>("output")
        .expect("required argument");

    let key = |name: &str| {
        matches
            .get_one::<String>(name)
            .expect("defaulted argument")
            .clone()
    };

    let config = Config::new(input_path, output_path)
        .with_context(|| {
            format!(
                "failed to create configuration for '{}'",
                input_path.display()
            )
        })?
        .input_key(key("input_key"))
        .target_key(key("target_key"))
        .reference_key(key("reference_key"))
        .embedding_key(key("embedding_key"));

    // The record count is unknown without pre-scanning the manifest, so the
    // progress display is a spinner with a running count.
    let progress = ProgressBar::new_spinner();
    progress.set_draw_target(ProgressDrawTarget::stderr());
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let progress_handle = progress.clone();
    let result = run_with_progress(config, move |event| match event {
        ProgressEvent::Start => {
            progress_handle.enable_steady_tick(Duration::from_millis(100));
            progress_handle.set_message("0 records");
        }
        ProgressEvent::Advance { records } => {
            progress_handle.set_message(format!("{records} records"));
        }
        ProgressEvent::Finish => {
            progress_handle.set_message(String::from("Completed"));
        }
    })
    .with_context(|| format!("failed to convert '{}'", input_path.display()));

    progress.finish_and_clear();

    result?;

    Ok(())
}
