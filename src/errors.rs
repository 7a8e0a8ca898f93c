use std::fmt;

use crate::chunked::ItemKind;

/// Errors of this crate.
#[derive(Debug)]
#[non_exhaustive]
pub enum PczipError {
    /// The item kind code read from a stream descriptor is not known
    UnknownItem(u16),
    /// The item kind is known but the codec version asked for is not
    UnsupportedItemVersion(ItemKind, u16),
    /// The compression mode code read from a stream descriptor is not known
    UnknownCompressionMode(u16),
    /// A codec was asked to be built from an empty item list
    NoItems,
    /// `compress_next` / `decompress_next` was called on a context that was
    /// never seeded in the current chunk
    UninitializedContext(usize),
    /// The context id is outside the supported range
    InvalidContext(usize),
    /// A decoded value fell outside its valid range, the stream is
    /// corrupted or was written with an incompatible configuration
    Corruption(&'static str),
    /// The stream advertises no chunk table, random access is not possible
    MissingChunkTable,
    BufferLenNotMultipleOfRecordSize {
        buffer_len: usize,
        record_size: usize,
    },
    IoError(std::io::Error),
}

impl From<std::io::Error> for PczipError {
    fn from(e: std::io::Error) -> Self {
        PczipError::IoError(e)
    }
}

impl fmt::Display for PczipError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PczipError::UnknownItem(code) => write!(f, "item kind code {} is not known", code),
            PczipError::UnsupportedItemVersion(kind, version) => write!(
                f,
                "version {} of the {:?} codec is not supported",
                version, kind
            ),
            PczipError::UnknownCompressionMode(mode) => {
                write!(f, "compression mode {} is not known", mode)
            }
            PczipError::NoItems => write!(f, "the item list is empty"),
            PczipError::UninitializedContext(context) => {
                write!(f, "context {} was not seeded in the current chunk", context)
            }
            PczipError::InvalidContext(context) => {
                write!(f, "context id {} is out of range", context)
            }
            PczipError::Corruption(detail) => write!(f, "corrupted stream: {}", detail),
            PczipError::MissingChunkTable => write!(f, "the stream has no chunk table"),
            PczipError::BufferLenNotMultipleOfRecordSize {
                buffer_len,
                record_size,
            } => write!(
                f,
                "the buffer len ({}) is not a multiple of the record size ({})",
                buffer_len, record_size
            ),
            PczipError::IoError(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for PczipError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PczipError::IoError(e) => Some(e),
            _ => None,
        }
    }
}
