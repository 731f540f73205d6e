//! The boundary to character-set conversion. The document core only ever
//! holds UTF-8; anything else goes through a `Transcoder` on load and save.

use std::fmt;

use thiserror::Error;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// UTF-8 written with a leading byte-order mark.
    Utf8Bom,
    /// Any other charset, by its label (e.g. "latin1"), handled by a transcoder.
    Other(String),
}

impl Encoding {
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Encoding::Utf8,
            "utf8bom" | "utf-8-bom" | "utf8-bom" => Encoding::Utf8Bom,
            _ => Encoding::Other(label.to_string()),
        }
    }

    pub fn is_utf8(&self) -> bool {
        matches!(self, Encoding::Utf8 | Encoding::Utf8Bom)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "utf-8"),
            Encoding::Utf8Bom => write!(f, "utf-8-bom"),
            Encoding::Other(label) => write!(f, "{label}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("no converter from {source_encoding} to {target_encoding}")]
    Unsupported {
        source_encoding: Encoding,
        target_encoding: Encoding,
    },
    #[error("conversion failed: {0}")]
    Failed(String),
}

/// A pure conversion `(bytes, source, target) -> bytes`.
pub trait Transcoder {
    fn convert(&self, bytes: &[u8], source: &Encoding, target: &Encoding) -> Result<Vec<u8>, EncodingError>;
}

/// Handles the UTF-8 family only; BOMs are dealt with by the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Transcoder;

impl Transcoder for Utf8Transcoder {
    fn convert(&self, bytes: &[u8], source: &Encoding, target: &Encoding) -> Result<Vec<u8>, EncodingError> {
        if source.is_utf8() && target.is_utf8() {
            Ok(bytes.to_vec())
        } else {
            Err(EncodingError::Unsupported {
                source_encoding: source.clone(),
                target_encoding: target.clone(),
            })
        }
    }
}
