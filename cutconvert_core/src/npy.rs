//! Minimal reader for the npy header.
//!
//! The format is described in
//! [npy-format](https://numpy.org/doc/stable/reference/generated/numpy.lib.format.html):
//! a magic string, a one-byte version pair, a little-endian header length
//! and a Python-literal dict holding `descr`, `fortran_order` and `shape`.
//! Only the shape is needed here, so the data bytes are never touched.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::ConvertError;

const NPY_MAGIC_STRING: &[u8] = b"\x93NUMPY";

/// Read the shape of the array stored in an `.npy` file.
pub fn read_shape(path: &Path) -> Result<Vec<usize>, ConvertError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = read_header(&mut reader)?;
    parse_shape(&header)
}

fn read_header<R: Read>(reader: &mut R) -> Result<String, ConvertError> {
    let mut magic_string = vec![0u8; NPY_MAGIC_STRING.len()];
    reader.read_exact(&mut magic_string)?;
    if magic_string != NPY_MAGIC_STRING {
        return Err(ConvertError::NpyHeader("magic string mismatch".to_owned()));
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len_len = match version[0] {
        1 => 2,
        2 => 4,
        otherwise => {
            return Err(ConvertError::NpyHeader(format!(
                "unsupported version {otherwise}"
            )))
        }
    };

    let mut header_len = vec![0u8; header_len_len];
    reader.read_exact(&mut header_len)?;
    let header_len = header_len
        .iter()
        .rev()
        .fold(0_usize, |acc, &v| 256 * acc + v as usize);

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    Ok(String::from_utf8_lossy(&header).to_string())
}

// Focused parser for the header dict, a typical example being:
// {'descr': '<f8', 'fortran_order': False, 'shape': (3, 4), }
fn parse_shape(header: &str) -> Result<Vec<usize>, ConvertError> {
    let start = header
        .find("'shape'")
        .ok_or_else(|| ConvertError::NpyHeader("no shape entry".to_owned()))?;
    let rest = &header[start..];
    let open = rest
        .find('(')
        .ok_or_else(|| ConvertError::NpyHeader("shape tuple is not opened".to_owned()))?;
    let close = rest
        .find(')')
        .filter(|&close| close > open)
        .ok_or_else(|| ConvertError::NpyHeader("shape tuple is not closed".to_owned()))?;

    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .map_err(|_| ConvertError::NpyHeader(format!("invalid dimension '{dim}'")))
        })
        .collect()
}
