use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::error::Error;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

/// Generate a small WAV file for testing.
///
/// The fixtures are produced on the fly by emitting a PCM RIFF header
/// followed by procedurally generated sine-wave samples. This keeps the
/// repository free from committed binary assets while still exercising the
/// probing pipeline end-to-end.
fn write_test_tone<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let total_frames = ((sample_rate as u64 * duration_ms).max(1_000) + 999) / 1_000;
    let mut samples = Vec::with_capacity(total_frames as usize * channels as usize * 2);

    for n in 0..total_frames {
        let theta = (n as f32 / sample_rate as f32) * 2.0 * std::f32::consts::PI * 440.0;
        let sample = (theta.sin() * i16::MAX as f32) as i16;
        for _ in 0..channels {
            samples.extend_from_slice(&sample.to_le_bytes());
        }
    }

    let mut file = File::create(path)?;
    let data_len = samples.len() as u32;
    let chunk_size = 36u32 + data_len;
    let block_align = channels * 2;
    let byte_rate = sample_rate * u32::from(block_align);
    file.write_all(b"RIFF")?;
    file.write_all(&chunk_size.to_le_bytes())?;
    file.write_all(b"WAVE")?;
    file.write_all(b"fmt ")?;
    file.write_all(&16u32.to_le_bytes())?;
    file.write_all(&1u16.to_le_bytes())?;
    file.write_all(&channels.to_le_bytes())?;
    file.write_all(&sample_rate.to_le_bytes())?;
    file.write_all(&byte_rate.to_le_bytes())?;
    file.write_all(&block_align.to_le_bytes())?;
    file.write_all(&16u16.to_le_bytes())?;
    file.write_all(b"data")?;
    file.write_all(&data_len.to_le_bytes())?;
    file.write_all(&samples)?;
    Ok(())
}

#[test]
fn cli_converts_a_manifest() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    write_test_tone(dir.path().join("tone.wav"), 16_000, 1, 1_000)?;
    let manifest = dir.path().join("manifest.jsonl");
    let mut file = File::create(&manifest)?;
    writeln!(
        file,
        "{}",
        json!({"audio_filepath": "tone.wav", "duration": 0.5, "speaker": "A"})
    )?;
    drop(file);

    let output = dir.path().join("cuts.jsonl");
    let mut cmd = Command::cargo_bin("cutconvert")?;
    cmd.arg(&manifest).arg(&output);
    cmd.assert().success();

    let lines = fs::read_to_string(&output)?;
    let cut: Value = serde_json::from_str(lines.lines().next().expect("one output record"))?;
    assert_eq!(cut["duration"], json!(0.5));
    assert_eq!(cut["recording"]["sampling_rate"], json!(16_000));
    assert_eq!(cut["custom"]["speaker"], json!("A"));

    dir.close()?;
    Ok(())
}

#[test]
fn cli_honors_key_overrides() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    write_test_tone(dir.path().join("mix.wav"), 16_000, 2, 1_000)?;
    let manifest = dir.path().join("manifest.jsonl");
    let mut file = File::create(&manifest)?;
    writeln!(
        file,
        "{}",
        json!({"mix_filepath": "mix.wav", "duration": 0.5})
    )?;
    drop(file);

    let output = dir.path().join("cuts.jsonl");
    let mut cmd = Command::cargo_bin("cutconvert")?;
    cmd.args(["--input_key", "mix_filepath"])
        .arg(&manifest)
        .arg(&output);
    cmd.assert().success();

    let lines = fs::read_to_string(&output)?;
    let cut: Value = serde_json::from_str(lines.lines().next().expect("one output record"))?;
    assert_eq!(cut["channel"], json!([0, 1]));

    dir.close()?;
    Ok(())
}

#[test]
fn cli_reports_missing_input_manifest() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let output = dir.path().join("cuts.jsonl");

    let mut cmd = Command::cargo_bin("cutconvert")?;
    cmd.arg("missing.jsonl").arg(&output);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("input manifest does not exist"));

    dir.close()?;
    Ok(())
}

#[test]
fn cli_aborts_on_a_record_without_duration() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    write_test_tone(dir.path().join("tone.wav"), 16_000, 1, 1_000)?;
    let manifest = dir.path().join("manifest.jsonl");
    let mut file = File::create(&manifest)?;
    writeln!(file, "{}", json!({"audio_filepath": "tone.wav"}))?;
    drop(file);

    let mut cmd = Command::cargo_bin("cutconvert")?;
    cmd.arg(&manifest).arg(dir.path().join("cuts.jsonl"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("duration"));

    dir.close()?;
    Ok(())
}
