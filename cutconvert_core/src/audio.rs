//! Audio probing and the recording data model.
//!
//! A [`Recording`] references one or more on-disk audio files treated as a
//! single multi-channel source. Only container metadata is read; sample data
//! never leaves the files.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

use crate::ConvertError;

const AUDIO_SOURCE_FILE: &str = "file";

/// Container metadata for one audio file.
#[derive(Clone, Copy, Debug)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: u64,
    pub duration: f64,
}

/// Probe an audio file for its sample rate, channel count and frame count.
pub fn probe(path: &Path) -> Result<AudioInfo, ConvertError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let reader = probed.format;

    let track = reader
        .default_track()
        .ok_or_else(|| ConvertError::MissingDefaultTrack(path.to_path_buf()))?;
    if track.codec_params.codec == CODEC_TYPE_NULL {
        return Err(ConvertError::UnsupportedCodec(path.to_path_buf()));
    }

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ConvertError::MissingSampleRate(path.to_path_buf()))?;
    let channels = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .ok_or_else(|| ConvertError::MissingChannelCount(path.to_path_buf()))?;
    let frames = track
        .codec_params
        .n_frames
        .ok_or_else(|| ConvertError::MissingFrameCount(path.to_path_buf()))?;

    Ok(AudioInfo {
        sample_rate,
        channels,
        frames,
        duration: frames as f64 / f64::from(sample_rate),
    })
}

/// The primary audio field of a record holds either a single path or an
/// ordered list of paths that together form one multi-channel recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioPathSpec {
    Single(String),
    Multi(Vec<String>),
}

impl AudioPathSpec {
    /// Interpret a record field as an audio path specification.
    pub fn from_value(key: &str, value: Value) -> Result<Self, ConvertError> {
        match value {
            Value::String(path) => Ok(Self::Single(path)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(path) => Ok(path),
                    other => Err(ConvertError::SchemaViolation(format!(
                        "field '{key}' must list string paths (got: {other})"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Multi),
            other => Err(ConvertError::SchemaViolation(format!(
                "field '{key}' must be a string or a list of strings (got: {other})"
            ))),
        }
    }
}

/// One file contributing a contiguous block of channels to a [`Recording`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct AudioSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub channels: Vec<u16>,
    pub source: String,
}

/// Reference to one or more audio files treated as a single multi-channel
/// source. Channel indices are assigned contiguously in file order with no
/// gaps or overlaps, and every constituent file shares one sampling rate.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Recording {
    pub id: String,
    pub sources: Vec<AudioSource>,
    pub sampling_rate: u32,
    pub num_samples: u64,
    pub duration: f64,
    pub channel_ids: Vec<u16>,
}

impl Recording {
    /// Build a recording from a single file's probed metadata.
    pub fn from_file(path: &Path) -> Result<Self, ConvertError> {
        let info = probe(path)?;
        let channel_ids: Vec<u16> = (0..info.channels).collect();
        Ok(Self {
            id: recording_id(path)?,
            sources: vec![AudioSource {
                kind: AUDIO_SOURCE_FILE.to_owned(),
                channels: channel_ids.clone(),
                source: path.to_string_lossy().into_owned(),
            }],
            sampling_rate: info.sample_rate,
            num_samples: info.frames,
            duration: info.duration,
            channel_ids,
        })
    }

    /// Build a multi-file recording, assigning each file a disjoint
    /// contiguous channel block in list order. All files must share one
    /// sampling rate. Sample count and duration follow the first listed
    /// file; the remaining files only contribute channels.
    pub fn from_files(paths: &[impl AsRef<Path>]) -> Result<Self, ConvertError> {
        let first = paths.first().ok_or_else(|| {
            ConvertError::SchemaViolation("an audio path list must name at least one file".into())
        })?;

        let mut sources = Vec::with_capacity(paths.len());
        let mut infos = Vec::with_capacity(paths.len());
        let mut next_channel: u16 = 0;
        for path in paths {
            let path = path.as_ref();
            let info = probe(path)?;
            sources.push(AudioSource {
                kind: AUDIO_SOURCE_FILE.to_owned(),
                channels: (next_channel..next_channel + info.channels).collect(),
                source: path.to_string_lossy().into_owned(),
            });
            next_channel += info.channels;
            infos.push(info);
        }

        if infos.iter().any(|info| info.sample_rate != infos[0].sample_rate) {
            let rates: Vec<u32> = infos.iter().map(|info| info.sample_rate).collect();
            return Err(ConvertError::SchemaViolation(format!(
                "mismatched sampling rates {rates:?} for individual audio files in a multi-file recording"
            )));
        }

        Ok(Self {
            id: recording_id(first.as_ref())?,
            sources,
            sampling_rate: infos[0].sample_rate,
            num_samples: infos[0].frames,
            duration: infos[0].duration,
            channel_ids: (0..next_channel).collect(),
        })
    }

    pub fn num_channels(&self) -> usize {
        self.channel_ids.len()
    }
}

fn recording_id(path: &Path) -> Result<String, ConvertError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .ok_or_else(|| ConvertError::InvalidPath(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_spec_accepts_a_single_path() {
        let spec = AudioPathSpec::from_value("audio_filepath", json!("a.wav")).unwrap();
        assert_eq!(spec, AudioPathSpec::Single("a.wav".to_owned()));
    }

    #[test]
    fn path_spec_accepts_a_list_of_paths() {
        let spec = AudioPathSpec::from_value("audio_filepath", json!(["a.wav", "b.wav"])).unwrap();
        assert_eq!(
            spec,
            AudioPathSpec::Multi(vec!["a.wav".to_owned(), "b.wav".to_owned()])
        );
    }

    #[test]
    fn path_spec_rejects_other_value_types() {
        let err = AudioPathSpec::from_value("audio_filepath", json!(42)).unwrap_err();
        assert!(matches!(err, crate::ConvertError::SchemaViolation(_)));

        let err = AudioPathSpec::from_value("audio_filepath", json!(["a.wav", 1])).unwrap_err();
        assert!(matches!(err, crate::ConvertError::SchemaViolation(_)));
    }

    #[test]
    fn recording_id_is_the_file_stem() {
        assert_eq!(
            recording_id(Path::new("/data/audio/mix_01.wav")).unwrap(),
            "mix_01"
        );
    }
}
