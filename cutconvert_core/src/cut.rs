//! The cut data model: a time-bounded, channel-selectable view over a
//! recording, plus the embedding array reference it may carry.

use std::path::Path;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audio::Recording;
use crate::{npy, ConvertError};

const NUMPY_FILES: &str = "numpy_files";
const NPY_EXTENSION: &str = "npy";

/// Discriminator emitted with every cut so downstream readers can dispatch
/// without inspecting the channel field.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CutKind {
    MonoCut,
    MultiCut,
}

impl CutKind {
    fn for_channels(count: usize) -> Self {
        if count == 1 {
            Self::MonoCut
        } else {
            Self::MultiCut
        }
    }
}

/// Ordered channel indices of a cut.
///
/// Serialized as a bare integer when the cut covers exactly one channel and
/// as a list otherwise, matching the mono/multi split of [`CutKind`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Channels(pub Vec<u16>);

impl Serialize for Channels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => serializer.serialize_u16(*single),
            many => many.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Channels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(u16),
            Many(Vec<u16>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(channel) => Self(vec![channel]),
            Repr::Many(channels) => Self(channels),
        })
    }
}

/// A bounded view over a [`Recording`]: `[start, start + duration)` on the
/// channels named in `channel`. Auxiliary recordings, the embedding array
/// reference and uninterpreted source fields travel in `custom`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Cut {
    pub id: String,
    pub start: f64,
    pub duration: f64,
    pub channel: Channels,
    #[serde(rename = "type")]
    pub kind: CutKind,
    pub recording: Recording,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom: Map<String, Value>,
}

impl Recording {
    /// View the whole recording as a cut covering all of its channels.
    pub fn to_cut(self) -> Cut {
        let channel = Channels(self.channel_ids.clone());
        Cut {
            id: self.id.clone(),
            start: 0.0,
            duration: self.duration,
            kind: CutKind::for_channels(channel.0.len()),
            channel,
            recording: self,
            custom: Map::new(),
        }
    }
}

impl Cut {
    /// Narrow the cut to `[offset, offset + duration)`.
    pub fn truncate(mut self, offset: f64, duration: f64) -> Cut {
        self.start = offset;
        self.duration = duration;
        self
    }

    /// Narrow the cut to the named channel subset.
    pub fn with_channels(mut self, channels: Vec<u16>) -> Cut {
        self.kind = CutKind::for_channels(channels.len());
        self.channel = Channels(channels);
        self
    }

    pub fn num_channels(&self) -> usize {
        self.channel.0.len()
    }

    pub fn set_custom<S: Into<String>>(&mut self, key: S, value: Value) {
        self.custom.insert(key.into(), value);
    }
}

/// Pointer to an externally stored fixed-shape numeric array. Only the
/// location and shape are recorded; the data itself stays on disk.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Array {
    pub storage_type: String,
    pub storage_path: String,
    pub storage_key: String,
    pub shape: Vec<usize>,
}

impl Array {
    /// Build an array reference from an `.npy` file, reading only its
    /// header to recover the shape.
    pub fn from_npy(path: &Path) -> Result<Self, ConvertError> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(NPY_EXTENSION) {
            return Err(ConvertError::UnsupportedFormat(path.to_path_buf()));
        }

        let shape = npy::read_shape(path)?;
        let storage_key = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| ConvertError::InvalidPath(path.to_path_buf()))?;
        let storage_path = path
            .parent()
            .map(|parent| parent.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            storage_type: NUMPY_FILES.to_owned(),
            storage_path,
            storage_key,
            shape,
        })
    }
}
