//! Line-delimited manifest I/O.
//!
//! Both ends of the conversion speak JSONL; a trailing `.gz` on either path
//! selects gzip framing for that side.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{Map, Value};

use crate::cut::Cut;
use crate::ConvertError;

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Resolve an audio path from a manifest record against the manifest's own
/// location. Absolute paths pass through untouched.
pub fn resolve_audio_path(path: &str, manifest_dir: &Path) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        manifest_dir.join(candidate)
    }
}

/// Iterator over the records of a line-delimited manifest.
///
/// Blank lines are skipped; every other line must hold one JSON object.
pub struct RecordReader {
    lines: Lines<Box<dyn BufRead>>,
}

impl RecordReader {
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if is_gzip(path) {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        Ok(Self {
            lines: reader.lines(),
        })
    }
}

impl Iterator for RecordReader {
    type Item = Result<Map<String, Value>, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Err(err) => return Some(Err(err.into())),
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(&line).map_err(ConvertError::from));
                }
            }
        }
    }
}

/// Writer appending one JSON line per cut.
pub struct ManifestWriter {
    out: Box<dyn Write>,
}

impl ManifestWriter {
    pub fn create(path: &Path) -> Result<Self, ConvertError> {
        let file = File::create(path)?;
        let out: Box<dyn Write> = if is_gzip(path) {
            Box::new(GzEncoder::new(BufWriter::new(file), Compression::default()))
        } else {
            Box::new(BufWriter::new(file))
        };
        Ok(Self { out })
    }

    pub fn write(&mut self, cut: &Cut) -> Result<(), ConvertError> {
        serde_json::to_writer(&mut self.out, cut)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    /// Flush buffered output. The gzip trailer is emitted when the encoder
    /// is dropped right after; flushing first surfaces write errors that
    /// would otherwise be swallowed in `Drop`.
    pub fn finish(mut self) -> Result<(), ConvertError> {
        self.out.flush()?;
        Ok(())
    }
}
