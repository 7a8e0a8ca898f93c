//! Compression and decompression of point-cloud attribute records.
//!
//! Records are described by a list of [`CodecItem`]s (a kind plus a
//! codec version), compressed with context-adaptive arithmetic coding
//! into fixed-point-count chunks, and framed with a chunk table so any
//! chunk can be decoded independently.
//!
//! ```
//! use std::io::Cursor;
//!
//! use pczip::{
//!     compress_buffer, decompress_buffer, CodecHeaderBuilder, CodecItemRecordBuilder, ItemKind,
//! };
//!
//! # fn main() -> pczip::Result<()> {
//! let items = CodecItemRecordBuilder::new()
//!     .add_item(ItemKind::RgbNir)
//!     .build()?;
//! let header = CodecHeaderBuilder::from_items(items).build()?;
//!
//! // 3 records of 8 bytes each
//! let points: Vec<u8> = (0..24).collect();
//!
//! let mut compressed = Cursor::new(Vec::<u8>::new());
//! compress_buffer(&mut compressed, &points, header.clone())?;
//!
//! compressed.set_position(0);
//! let mut decompressed = vec![0u8; points.len()];
//! decompress_buffer(&mut compressed, &mut decompressed, header)?;
//! assert_eq!(decompressed, points);
//! # Ok(())
//! # }
//! ```

pub(crate) mod decoders;
pub(crate) mod encoders;
pub(crate) mod integer;
pub(crate) mod models;

pub mod chunked;
pub mod errors;
pub mod packers;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod point;
pub mod record;

pub use chunked::{
    compress_buffer, decompress_buffer, CodecHeader, CodecHeaderBuilder, CodecItem,
    CodecItemRecordBuilder, CompressionMode, ItemKind, PczipCompressor, PczipDecompressor,
    DEFAULT_CHUNK_SIZE,
};
pub use errors::PczipError;
#[cfg(feature = "parallel")]
pub use parallel::{par_compress_buffer, par_decompress_buffer};
pub use record::{
    record_compressor_from_items, record_decompressor_from_items, RecordCompressor,
    RecordDecompressor, NUM_CONTEXTS,
};

pub type Result<T> = std::result::Result<T, PczipError>;
