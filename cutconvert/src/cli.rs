use std::path::PathBuf;

use clap::{value_parser, Arg, Command};
use cutconvert_core::{
    DEFAULT_EMBEDDING_KEY, DEFAULT_INPUT_KEY, DEFAULT_REFERENCE_KEY, DEFAULT_TARGET_KEY,
};

pub fn build_cli() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .about("Convert audio manifests into cut manifests")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("Path to the input manifest (.jsonl or .jsonl.gz)")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT")
                .help("Path of the output manifest; a trailing .gz selects gzip encoding")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("input_key")
                .short('i')
                .long("input_key")
                .value_name("KEY")
                .help("Record key holding the input audio path(s), mapped to the cut's recording")
                .default_value(DEFAULT_INPUT_KEY),
        )
        .arg(
            Arg::new("target_key")
                .short('t')
                .long("target_key")
                .value_name("KEY")
                .help("Record key holding the target audio path(s), mapped to 'target_recording'")
                .default_value(DEFAULT_TARGET_KEY),
        )
        .arg(
            Arg::new("reference_key")
                .short('r')
                .long("reference_key")
                .value_name("KEY")
                .help("Record key holding the reference audio path(s), mapped to 'reference_recording'")
                .default_value(DEFAULT_REFERENCE_KEY),
        )
        .arg(
            Arg::new("embedding_key")
                .short('e')
                .long("embedding_key")
                .value_name("KEY")
                .help("Record key holding the embedding array path, mapped to 'embedding_vector'")
                .default_value(DEFAULT_EMBEDDING_KEY),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_applies_default_record_keys() {
        let matches =
            build_cli().get_matches_from(["cutconvert", "manifest.jsonl", "cuts.jsonl.gz"]);
        assert_eq!(
            matches.get_one::<String>("input_key").map(String::as_str),
            Some("audio_filepath")
        );
        assert_eq!(
            matches.get_one::<String>("target_key").map(String::as_str),
            Some("target_filepath")
        );
        assert_eq!(
            matches
                .get_one::<String>("reference_key")
                .map(String::as_str),
            Some("reference_filepath")
        );
        assert_eq!(
            matches
                .get_one::<String>("embedding_key")
                .map(String::as_str),
            Some("embedding_filepath")
        );
    }

    #[test]
    fn cli_accepts_short_key_overrides() {
        let matches = build_cli().get_matches_from([
            "cutconvert",
            "-i",
            "mix_filepath",
            "-e",
            "speaker_embedding",
            "manifest.jsonl",
            "cuts.jsonl",
        ]);
        assert_eq!(
            matches.get_one::<String>("input_key").map(String::as_str),
            Some("mix_filepath")
        );
        assert_eq!(
            matches
                .get_one::<String>("embedding_key")
                .map(String::as_str),
            Some("speaker_embedding")
        );
    }

    #[test]
    fn cli_requires_both_manifest_paths() {
        assert!(build_cli()
            .try_get_matches_from(["cutconvert", "manifest.jsonl"])
            .is_err());
    }
}
