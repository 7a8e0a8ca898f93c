//! Record-level codecs.
//!
//! A record codec owns the entropy coder and a set of field codecs, one
//! per item of the stream descriptor. Field codecs keep their adaptive
//! state in per-context slots: a slot must be seeded (which transmits the
//! seed record through the coder as raw bits) before it can code
//! differences, and every slot is dropped again when the chunk rolls
//! over. Callers pick the context id per record from point metadata; the
//! codec only checks that the id is in range and that the slot is seeded.

use std::io::{Read, Write};

use crate::chunked::{CodecItem, CompressionMode, ItemKind};
use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::point::{bytes, rgbnir, wavepacket};
use crate::{PczipError, Result};

/// Number of independent prediction lineages per point kind.
pub const NUM_CONTEXTS: usize = 4;

pub(crate) fn check_context(context: usize) -> Result<()> {
    if context >= NUM_CONTEXTS {
        Err(PczipError::InvalidContext(context))
    } else {
        Ok(())
    }
}

pub trait FieldCompressor<W: Write> {
    fn size_of_field(&self) -> usize;

    /// Installs `buf` as the seed of `context` and transmits it raw
    /// through the coder.
    fn seed_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
        context: usize,
    ) -> Result<()>;

    fn compress_with(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        buf: &[u8],
        context: usize,
    ) -> Result<()>;
}

pub trait FieldDecompressor<R: Read> {
    fn size_of_field(&self) -> usize;

    /// Reads the seed of `context` back out of the coder into `buf`.
    fn seed_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
        context: usize,
    ) -> Result<()>;

    fn decompress_with(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        buf: &mut [u8],
        context: usize,
    ) -> Result<()>;
}

/// Object-safe interface the chunked layer drives compression through.
pub trait RecordCompressor<W> {
    fn set_fields_from(&mut self, items: &[CodecItem]) -> Result<()>;
    fn record_size(&self) -> usize;
    /// Whether this codec's chunks get their byte counts recorded in a
    /// chunk table.
    fn chunk_sizes(&self) -> bool;

    /// Seeds `context` with `input`, which is also the encoded output for
    /// that record.
    fn init_context(&mut self, input: &[u8], context: usize) -> Result<()>;
    fn compress_next(&mut self, input: &[u8], context: usize) -> Result<()>;
    /// Flushes the coder to a byte boundary, ending the current chunk.
    fn done(&mut self) -> Result<()>;
    /// Drops all adaptive state; `set_fields_from` must be called again
    /// before the next chunk.
    fn reset(&mut self);

    fn borrow_stream_mut(&mut self) -> &mut W;
    fn box_into_stream(self: Box<Self>) -> W;
}

/// Object-safe interface the chunked layer drives decompression through.
pub trait RecordDecompressor<R> {
    fn set_fields_from(&mut self, items: &[CodecItem]) -> Result<()>;
    fn record_size(&self) -> usize;
    fn chunk_sizes(&self) -> bool;

    fn init_context(&mut self, output: &mut [u8], context: usize) -> Result<()>;
    fn decompress_next(&mut self, output: &mut [u8], context: usize) -> Result<()>;
    fn reset(&mut self);

    fn borrow_stream_mut(&mut self) -> &mut R;
    fn box_into_stream(self: Box<Self>) -> R;
}

/***************************************************************************************************
                    Compressed (entropy coded) record codecs
***************************************************************************************************/

pub struct PointRecordCompressor<W: Write> {
    field_compressors: Vec<Box<dyn FieldCompressor<W> + Send>>,
    encoder: ArithmeticEncoder<W>,
    record_size: usize,
}

impl<W: Write> PointRecordCompressor<W> {
    pub fn new(dest: W) -> Self {
        Self {
            field_compressors: vec![],
            encoder: ArithmeticEncoder::new(dest),
            record_size: 0,
        }
    }

    pub fn add_field_compressor<T: FieldCompressor<W> + Send + 'static>(&mut self, field: T) {
        self.record_size += field.size_of_field();
        self.field_compressors.push(Box::new(field));
    }

    fn for_each_field<F>(&mut self, buf: &[u8], context: usize, mut f: F) -> Result<()>
    where
        F: FnMut(
            &mut Box<dyn FieldCompressor<W> + Send>,
            &mut ArithmeticEncoder<W>,
            &[u8],
            usize,
        ) -> Result<()>,
    {
        let mut field_start = 0;
        for field in &mut self.field_compressors {
            let field_end = field_start + field.size_of_field();
            f(field, &mut self.encoder, &buf[field_start..field_end], context)?;
            field_start = field_end;
        }
        Ok(())
    }
}

impl<W: Write> RecordCompressor<W> for PointRecordCompressor<W> {
    fn set_fields_from(&mut self, items: &[CodecItem]) -> Result<()> {
        for item in items {
            match (item.kind(), item.version()) {
                (ItemKind::Bytes(count), 1) | (ItemKind::Bytes(count), 2) => {
                    self.add_field_compressor(bytes::v1::BytesCompressor::new(count as usize));
                }
                (ItemKind::RgbNir, 1) => {
                    self.add_field_compressor(rgbnir::v1::RgbNirCompressor::new());
                }
                (ItemKind::RgbNir, 2) => {
                    self.add_field_compressor(rgbnir::v2::RgbNirCompressor::new());
                }
                (ItemKind::WavePacket, 1) | (ItemKind::WavePacket, 2) => {
                    self.add_field_compressor(wavepacket::v1::WavePacketCompressor::new());
                }
                (kind, version) => {
                    return Err(PczipError::UnsupportedItemVersion(kind, version));
                }
            }
        }
        Ok(())
    }

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn chunk_sizes(&self) -> bool {
        true
    }

    fn init_context(&mut self, input: &[u8], context: usize) -> Result<()> {
        check_context(context)?;
        self.for_each_field(input, context, |field, encoder, slice, ctx| {
            field.seed_with(encoder, slice, ctx)
        })
    }

    fn compress_next(&mut self, input: &[u8], context: usize) -> Result<()> {
        check_context(context)?;
        self.for_each_field(input, context, |field, encoder, slice, ctx| {
            field.compress_with(encoder, slice, ctx)
        })
    }

    fn done(&mut self) -> Result<()> {
        self.encoder.done()?;
        Ok(())
    }

    fn reset(&mut self) {
        self.encoder.reset();
        self.field_compressors.clear();
        self.record_size = 0;
    }

    fn borrow_stream_mut(&mut self) -> &mut W {
        self.encoder.dest_mut()
    }

    fn box_into_stream(self: Box<Self>) -> W {
        self.encoder.into_dest()
    }
}

pub struct PointRecordDecompressor<R: Read> {
    field_decompressors: Vec<Box<dyn FieldDecompressor<R> + Send>>,
    decoder: ArithmeticDecoder<R>,
    record_size: usize,
    chunk_started: bool,
}

impl<R: Read> PointRecordDecompressor<R> {
    pub fn new(source: R) -> Self {
        Self {
            field_decompressors: vec![],
            decoder: ArithmeticDecoder::new(source),
            record_size: 0,
            chunk_started: false,
        }
    }

    pub fn add_field_decompressor<T: FieldDecompressor<R> + Send + 'static>(&mut self, field: T) {
        self.record_size += field.size_of_field();
        self.field_decompressors.push(Box::new(field));
    }

    fn start_chunk_if_needed(&mut self) -> Result<()> {
        if !self.chunk_started {
            self.decoder.read_init_bytes()?;
            self.chunk_started = true;
        }
        Ok(())
    }
}

impl<R: Read> RecordDecompressor<R> for PointRecordDecompressor<R> {
    fn set_fields_from(&mut self, items: &[CodecItem]) -> Result<()> {
        for item in items {
            match (item.kind(), item.version()) {
                (ItemKind::Bytes(count), 1) | (ItemKind::Bytes(count), 2) => {
                    self.add_field_decompressor(bytes::v1::BytesDecompressor::new(count as usize));
                }
                (ItemKind::RgbNir, 1) => {
                    self.add_field_decompressor(rgbnir::v1::RgbNirDecompressor::new());
                }
                (ItemKind::RgbNir, 2) => {
                    self.add_field_decompressor(rgbnir::v2::RgbNirDecompressor::new());
                }
                (ItemKind::WavePacket, 1) | (ItemKind::WavePacket, 2) => {
                    self.add_field_decompressor(wavepacket::v1::WavePacketDecompressor::new());
                }
                (kind, version) => {
                    return Err(PczipError::UnsupportedItemVersion(kind, version));
                }
            }
        }
        Ok(())
    }

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn chunk_sizes(&self) -> bool {
        true
    }

    fn init_context(&mut self, output: &mut [u8], context: usize) -> Result<()> {
        check_context(context)?;
        self.start_chunk_if_needed()?;
        let mut field_start = 0;
        for field in &mut self.field_decompressors {
            let field_end = field_start + field.size_of_field();
            field.seed_with(&mut self.decoder, &mut output[field_start..field_end], context)?;
            field_start = field_end;
        }
        Ok(())
    }

    fn decompress_next(&mut self, output: &mut [u8], context: usize) -> Result<()> {
        check_context(context)?;
        self.start_chunk_if_needed()?;
        let mut field_start = 0;
        for field in &mut self.field_decompressors {
            let field_end = field_start + field.size_of_field();
            field.decompress_with(&mut self.decoder, &mut output[field_start..field_end], context)?;
            field_start = field_end;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.decoder.reset();
        self.field_decompressors.clear();
        self.record_size = 0;
        self.chunk_started = false;
    }

    fn borrow_stream_mut(&mut self) -> &mut R {
        self.decoder.source_mut()
    }

    fn box_into_stream(self: Box<Self>) -> R {
        self.decoder.into_source()
    }
}

/***************************************************************************************************
                    Raw (version 0) record codecs
***************************************************************************************************/

/// Version 0 codec: records are copied verbatim, no modelling, no chunk
/// framing. The context id is accepted but carries no state.
pub struct RawRecordCompressor<W: Write> {
    dest: W,
    record_size: usize,
}

impl<W: Write> RawRecordCompressor<W> {
    pub fn new(dest: W) -> Self {
        Self {
            dest,
            record_size: 0,
        }
    }
}

impl<W: Write> RecordCompressor<W> for RawRecordCompressor<W> {
    fn set_fields_from(&mut self, items: &[CodecItem]) -> Result<()> {
        for item in items {
            if item.version() != 0 {
                return Err(PczipError::UnsupportedItemVersion(
                    item.kind(),
                    item.version(),
                ));
            }
            self.record_size += usize::from(item.size());
        }
        Ok(())
    }

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn chunk_sizes(&self) -> bool {
        false
    }

    fn init_context(&mut self, input: &[u8], context: usize) -> Result<()> {
        self.compress_next(input, context)
    }

    fn compress_next(&mut self, input: &[u8], context: usize) -> Result<()> {
        check_context(context)?;
        self.dest.write_all(&input[..self.record_size])?;
        Ok(())
    }

    fn done(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {
        self.record_size = 0;
    }

    fn borrow_stream_mut(&mut self) -> &mut W {
        &mut self.dest
    }

    fn box_into_stream(self: Box<Self>) -> W {
        self.dest
    }
}

pub struct RawRecordDecompressor<R: Read> {
    source: R,
    record_size: usize,
}

impl<R: Read> RawRecordDecompressor<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            record_size: 0,
        }
    }
}

impl<R: Read> RecordDecompressor<R> for RawRecordDecompressor<R> {
    fn set_fields_from(&mut self, items: &[CodecItem]) -> Result<()> {
        for item in items {
            if item.version() != 0 {
                return Err(PczipError::UnsupportedItemVersion(
                    item.kind(),
                    item.version(),
                ));
            }
            self.record_size += usize::from(item.size());
        }
        Ok(())
    }

    fn record_size(&self) -> usize {
        self.record_size
    }

    fn chunk_sizes(&self) -> bool {
        false
    }

    fn init_context(&mut self, output: &mut [u8], context: usize) -> Result<()> {
        self.decompress_next(output, context)
    }

    fn decompress_next(&mut self, output: &mut [u8], context: usize) -> Result<()> {
        check_context(context)?;
        self.source.read_exact(&mut output[..self.record_size])?;
        Ok(())
    }

    fn reset(&mut self) {
        self.record_size = 0;
    }

    fn borrow_stream_mut(&mut self) -> &mut R {
        &mut self.source
    }

    fn box_into_stream(self: Box<Self>) -> R {
        self.source
    }
}

/***************************************************************************************************
                    (kind, version) -> codec dispatch
***************************************************************************************************/

pub(crate) fn mode_of(items: &[CodecItem]) -> Result<CompressionMode> {
    if items.is_empty() {
        return Err(PczipError::NoItems);
    }
    if items.iter().all(|item| item.version() == 0) {
        Ok(CompressionMode::Raw)
    } else if items.iter().all(|item| item.version() != 0) {
        Ok(CompressionMode::Chunked)
    } else {
        // raw and compressed items cannot share one coder stream
        let item = items.iter().find(|item| item.version() == 0).unwrap();
        Err(PczipError::UnsupportedItemVersion(item.kind(), 0))
    }
}

pub fn record_compressor_from_items<'a, W: Write + Send + 'a>(
    items: &[CodecItem],
    dest: W,
) -> Result<Box<dyn RecordCompressor<W> + Send + 'a>> {
    let mut compressor: Box<dyn RecordCompressor<W> + Send + 'a> = match mode_of(items)? {
        CompressionMode::Raw => Box::new(RawRecordCompressor::new(dest)),
        CompressionMode::Chunked => Box::new(PointRecordCompressor::new(dest)),
    };
    compressor.set_fields_from(items)?;
    Ok(compressor)
}

pub fn record_decompressor_from_items<'a, R: Read + Send + 'a>(
    items: &[CodecItem],
    source: R,
) -> Result<Box<dyn RecordDecompressor<R> + Send + 'a>> {
    let mut decompressor: Box<dyn RecordDecompressor<R> + Send + 'a> = match mode_of(items)? {
        CompressionMode::Raw => Box::new(RawRecordDecompressor::new(source)),
        CompressionMode::Chunked => Box::new(PointRecordDecompressor::new(source)),
    };
    decompressor.set_fields_from(items)?;
    Ok(decompressor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_compressor_flushes_coder_tail() {
        let mut compressor = PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()));
        compressor.done().unwrap();
        let data = Box::new(compressor).box_into_stream().into_inner();
        assert_eq!(&data, &[1u8, 0u8, 0u8, 0u8]);
    }

    #[test]
    fn mixed_versions_are_rejected() {
        let items = vec![
            CodecItem::new(ItemKind::RgbNir, 2).unwrap(),
            CodecItem::new(ItemKind::Bytes(4), 0).unwrap(),
        ];
        assert!(matches!(
            mode_of(&items),
            Err(PczipError::UnsupportedItemVersion(ItemKind::Bytes(4), 0))
        ));
    }

    #[test]
    fn no_items_is_an_init_error() {
        let result = record_compressor_from_items(&[], Cursor::new(Vec::<u8>::new()));
        assert!(matches!(result, Err(PczipError::NoItems)));
    }
}
