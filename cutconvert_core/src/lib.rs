use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::{Map, Value};
use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

pub mod audio;
pub mod cut;
pub mod manifest;
pub mod npy;

pub use audio::{AudioInfo, AudioPathSpec, AudioSource, Recording};
pub use cut::{Array, Channels, Cut, CutKind};
pub use manifest::{ManifestWriter, RecordReader};

/// Default record key holding the input audio path(s).
pub const DEFAULT_INPUT_KEY: &str = "audio_filepath";
/// Default record key holding the target audio path(s).
pub const DEFAULT_TARGET_KEY: &str = "target_filepath";
/// Default record key holding the reference audio path(s).
pub const DEFAULT_REFERENCE_KEY: &str = "reference_filepath";
/// Default record key holding the embedding array path.
pub const DEFAULT_EMBEDDING_KEY: &str = "embedding_filepath";

pub const INPUT_CHANNEL_SELECTOR: &str = "input_channel_selector";
pub const TARGET_CHANNEL_SELECTOR: &str = "target_channel_selector";
pub const REFERENCE_CHANNEL_SELECTOR: &str = "reference_channel_selector";

/// Custom-field keys on the emitted cut. The cut abstraction has no
/// first-class slots for auxiliary recordings or their selectors, so they
/// travel in the open-ended custom map under these names.
pub const TARGET_RECORDING: &str = "target_recording";
pub const REFERENCE_RECORDING: &str = "reference_recording";
pub const EMBEDDING_VECTOR: &str = "embedding_vector";
pub const TARGET_RECORDING_CHANNEL_SELECTOR: &str = "target_recording_channel_selector";
pub const REFERENCE_RECORDING_CHANNEL_SELECTOR: &str = "reference_recording_channel_selector";

/// Errors that can occur while converting a manifest.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Wrapper around errors produced by the Symphonia probing library.
    #[error(transparent)]
    Symphonia(#[from] SymphoniaError),

    /// Wrapper around IO errors encountered while reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON errors from parsing or serializing records.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error returned when a record lacks a required field.
    #[error("record is missing required field '{0}'")]
    MissingField(String),

    /// Error returned when a record contradicts the schema: mismatched
    /// sampling rates across a multi-file recording, a channel selector
    /// that does not fit the recording, or a field of the wrong JSON type.
    #[error("{0}")]
    SchemaViolation(String),

    /// Error returned when an embedding file is not a numpy array.
    #[error("only numpy embedding files are supported (got: {})", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Error returned when the container does not expose any default track.
    #[error("audio stream does not provide a default track: {}", .0.display())]
    MissingDefaultTrack(PathBuf),

    /// Error returned when the codec of the track cannot be handled.
    #[error("unsupported codec in '{}'", .0.display())]
    UnsupportedCodec(PathBuf),

    /// Error returned when the probed track lacks a sample rate.
    #[error("audio stream does not advertise a sample rate: {}", .0.display())]
    MissingSampleRate(PathBuf),

    /// Error returned when the probed track lacks a channel count.
    #[error("audio stream does not advertise a channel count: {}", .0.display())]
    MissingChannelCount(PathBuf),

    /// Error returned when the probed track lacks a total frame count.
    #[error("audio stream does not advertise a frame count: {}", .0.display())]
    MissingFrameCount(PathBuf),

    /// Error produced when a file name cannot be derived from a path.
    #[error("failed to derive a file name from '{}'", .0.display())]
    InvalidPath(PathBuf),

    /// Error produced when an npy header cannot be parsed.
    #[error("malformed npy header: {0}")]
    NpyHeader(String),
}

/// Configuration for one conversion run.
#[derive(Clone, Debug)]
pub struct Config {
    /// Canonicalized path of the source manifest.
    pub input_path: PathBuf,
    /// Destination path; a trailing `.gz` selects gzip encoding.
    pub output_path: PathBuf,
    /// Record key holding the input audio path(s).
    pub input_key: String,
    /// Record key holding the target audio path(s).
    pub target_key: String,
    /// Record key holding the reference audio path(s).
    pub reference_key: String,
    /// Record key holding the embedding array path.
    pub embedding_key: String,
}

impl Config {
    /// Construct a new [`Config`] with the default record keys,
    /// canonicalizing the input path.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<Self, ConvertError> {
        Ok(Self {
            input_path: fs::canonicalize(input)?,
            output_path: output.as_ref().to_path_buf(),
            input_key: DEFAULT_INPUT_KEY.to_owned(),
            target_key: DEFAULT_TARGET_KEY.to_owned(),
            reference_key: DEFAULT_REFERENCE_KEY.to_owned(),
            embedding_key: DEFAULT_EMBEDDING_KEY.to_owned(),
        })
    }

    pub fn input_key<S: Into<String>>(mut self, key: S) -> Self {
        self.input_key = key.into();
        self
    }

    pub fn target_key<S: Into<String>>(mut self, key: S) -> Self {
        self.target_key = key.into();
        self
    }

    pub fn reference_key<S: Into<String>>(mut self, key: S) -> Self {
        self.reference_key = key.into();
        self
    }

    pub fn embedding_key<S: Into<String>>(mut self, key: S) -> Self {
        self.embedding_key = key.into();
        self
    }
}

/// Progress notifications emitted while a conversion run advances.
#[derive(Clone, Copy, Debug)]
pub enum ProgressEvent {
    /// The input manifest has been opened. The number of records is not
    /// known up front, so reporting is count-based.
    Start,
    /// One more record has been written to the output.
    Advance { records: u64 },
    /// The output has been flushed and closed.
    Finish,
}

/// Perform the conversion using the supplied [`Config`].
pub fn run(config: Config) -> Result<(), ConvertError> {
    run_with_progress(config, |_| {})
}

/// Perform the conversion, reporting [`ProgressEvent`]s to the callback.
///
/// Records are processed one at a time in input order, and any malformed
/// record aborts the run. The output writer is finished on success; on an
/// error it is dropped, which still flushes buffered output, so an aborted
/// run leaves at most a truncated tail rather than an empty file.
pub fn run_with_progress<F>(config: Config, mut on_progress: F) -> Result<(), ConvertError>
where
    F: FnMut(ProgressEvent),
{
    let manifest_dir = config
        .input_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let reader = RecordReader::open(&config.input_path)?;
    let mut writer = ManifestWriter::create(&config.output_path)?;

    info!(
        "converting '{}' into '{}'",
        config.input_path.display(),
        config.output_path.display()
    );
    on_progress(ProgressEvent::Start);

    let mut records: u64 = 0;
    for record in reader {
        let cut = convert_record(record?, &config, &manifest_dir)?;
        debug!("converted cut '{}'", cut.id);
        writer.write(&cut)?;
        records += 1;
        on_progress(ProgressEvent::Advance { records });
    }

    writer.finish()?;
    on_progress(ProgressEvent::Finish);
    info!("wrote {} cuts to '{}'", records, config.output_path.display());

    Ok(())
}

/// Transform one source record into a [`Cut`].
///
/// Every field consumed here is removed from the record; whatever remains
/// afterwards is copied verbatim into the cut's custom map.
pub fn convert_record(
    mut record: Map<String, Value>,
    config: &Config,
    manifest_dir: &Path,
) -> Result<Cut, ConvertError> {
    let input = record
        .remove(&config.input_key)
        .ok_or_else(|| ConvertError::MissingField(config.input_key.clone()))?;
    let recording =
        create_recording(AudioPathSpec::from_value(&config.input_key, input)?, manifest_dir)?;

    let duration = take_f64(&mut record, "duration")?
        .ok_or_else(|| ConvertError::MissingField("duration".to_owned()))?;
    let offset = take_f64(&mut record, "offset")?.unwrap_or(0.0);

    let mut cut = recording.to_cut().truncate(offset, duration);

    if let Some(channels) = take_channel_selector(&mut record, INPUT_CHANNEL_SELECTOR)? {
        if cut.num_channels() == 1 {
            if channels.len() != 1 {
                return Err(ConvertError::SchemaViolation(format!(
                    "the input recording has a single channel, but {INPUT_CHANNEL_SELECTOR}={channels:?} was specified"
                )));
            }
        } else {
            cut = cut.with_channels(channels);
        }
    }

    attach_auxiliary_recording(
        &mut cut,
        &mut record,
        &config.target_key,
        TARGET_CHANNEL_SELECTOR,
        TARGET_RECORDING,
        TARGET_RECORDING_CHANNEL_SELECTOR,
        manifest_dir,
    )?;
    attach_auxiliary_recording(
        &mut cut,
        &mut record,
        &config.reference_key,
        REFERENCE_CHANNEL_SELECTOR,
        REFERENCE_RECORDING,
        REFERENCE_RECORDING_CHANNEL_SELECTOR,
        manifest_dir,
    )?;

    if let Some(value) = record.remove(&config.embedding_key) {
        let path = value.as_str().ok_or_else(|| {
            ConvertError::SchemaViolation(format!(
                "field '{}' must be a string path",
                config.embedding_key
            ))
        })?;
        let array = Array::from_npy(&manifest::resolve_audio_path(path, manifest_dir))?;
        cut.set_custom(EMBEDDING_VECTOR, serde_json::to_value(&array)?);
    }

    // Any field that is still left goes to the custom map.
    for (key, value) in record {
        cut.set_custom(key, value);
    }

    Ok(cut)
}

fn create_recording(spec: AudioPathSpec, manifest_dir: &Path) -> Result<Recording, ConvertError> {
    match spec {
        AudioPathSpec::Single(path) => {
            Recording::from_file(&manifest::resolve_audio_path(&path, manifest_dir))
        }
        AudioPathSpec::Multi(paths) => {
            let resolved: Vec<PathBuf> = paths
                .iter()
                .map(|path| manifest::resolve_audio_path(path, manifest_dir))
                .collect();
            Recording::from_files(&resolved)
        }
    }
}

/// Attach an optional auxiliary recording to the cut under `recording_field`.
///
/// The associated channel selector is consumed only when the recording key
/// itself is present; a selector without its recording is left in the record
/// and flows into the custom map verbatim.
fn attach_auxiliary_recording(
    cut: &mut Cut,
    record: &mut Map<String, Value>,
    key: &str,
    selector_key: &str,
    recording_field: &str,
    selector_field: &str,
    manifest_dir: &Path,
) -> Result<(), ConvertError> {
    let Some(value) = record.remove(key) else {
        return Ok(());
    };
    let recording = create_recording(AudioPathSpec::from_value(key, value)?, manifest_dir)?;

    if let Some(channels) = take_channel_selector(record, selector_key)? {
        if recording.num_channels() == 1 {
            if channels.len() != 1 {
                return Err(ConvertError::SchemaViolation(format!(
                    "the recording for '{key}' has a single channel, but {selector_key}={channels:?} was specified"
                )));
            }
        } else {
            cut.set_custom(selector_field, serde_json::to_value(&channels)?);
        }
    }

    cut.set_custom(recording_field, serde_json::to_value(&recording)?);
    Ok(())
}

fn take_f64(record: &mut Map<String, Value>, key: &str) -> Result<Option<f64>, ConvertError> {
    match record.remove(key) {
        None => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            ConvertError::SchemaViolation(format!("field '{key}' must be a number"))
        }),
    }
}

fn take_channel_selector(
    record: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<u16>>, ConvertError> {
    let Some(value) = record.remove(key) else {
        return Ok(None);
    };
    let items = value.as_array().ok_or_else(|| {
        ConvertError::SchemaViolation(format!("{key} must be a list of channel indices"))
    })?;
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|channel| u16::try_from(channel).ok())
                .ok_or_else(|| {
                    ConvertError::SchemaViolation(format!(
                        "{key} must contain non-negative channel indices (got: {item})"
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn take_f64_accepts_integers_and_floats() {
        let mut rec = record(json!({"duration": 3, "offset": 0.25}));
        assert_eq!(take_f64(&mut rec, "duration").unwrap(), Some(3.0));
        assert_eq!(take_f64(&mut rec, "offset").unwrap(), Some(0.25));
        assert_eq!(take_f64(&mut rec, "duration").unwrap(), None);
    }

    #[test]
    fn take_f64_rejects_non_numbers() {
        let mut rec = record(json!({"duration": "3.0"}));
        let err = take_f64(&mut rec, "duration").unwrap_err();
        assert!(matches!(err, ConvertError::SchemaViolation(_)));
    }

    #[test]
    fn take_channel_selector_parses_index_lists() {
        let mut rec = record(json!({"input_channel_selector": [0, 2]}));
        let channels = take_channel_selector(&mut rec, INPUT_CHANNEL_SELECTOR).unwrap();
        assert_eq!(channels, Some(vec![0, 2]));
        assert!(rec.is_empty());
    }

    #[test]
    fn take_channel_selector_rejects_negative_indices() {
        let mut rec = record(json!({"input_channel_selector": [0, -1]}));
        let err = take_channel_selector(&mut rec, INPUT_CHANNEL_SELECTOR).unwrap_err();
        assert!(matches!(err, ConvertError::SchemaViolation(_)));
    }
}
