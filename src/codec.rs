//! Line-delimited wire format
//!
//! Every record is one JSON object encoding a [`Sample`], terminated by `\n`. There is no length
//! prefix and no version field; consumers buffer input and only decode complete lines.

use std::fmt;

use crate::Sample;

pub const LINE_TERMINATOR: u8 = b'\n';

#[derive(Debug)]
pub enum CodecError {
    /// The line was not valid UTF-8
    InvalidUtf8(std::str::Utf8Error),

    /// The line was not a valid sample record
    InvalidRecord(serde_json::Error),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidUtf8(err) => write!(f, "record is not valid UTF-8: {}", err),
            CodecError::InvalidRecord(err) => write!(f, "malformed sample record: {}", err),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::InvalidUtf8(err) => Some(err),
            CodecError::InvalidRecord(err) => Some(err),
        }
    }
}

/// Serialize a sample into one wire line, terminator included.
pub fn encode_line(sample: &Sample) -> Result<Vec<u8>, CodecError> {
    let mut line = serde_json::to_vec(sample).map_err(CodecError::InvalidRecord)?;
    line.push(LINE_TERMINATOR);
    Ok(line)
}

/// Decode one wire line. A trailing `\n` (and `\r`) is accepted but not required.
pub fn decode_line(line: &[u8]) -> Result<Sample, CodecError> {
    let text = std::str::from_utf8(line).map_err(CodecError::InvalidUtf8)?;
    let text = text.trim_end_matches(['\n', '\r']);
    serde_json::from_str(text).map_err(CodecError::InvalidRecord)
}
