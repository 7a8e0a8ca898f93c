//! Chunked streams.
//!
//! A compressed stream is a sequence of fixed-point-count chunks, each an
//! independent entropy-coded bitstream: the coder is flushed to a byte
//! boundary and every adaptive model is dropped when a chunk closes, so
//! any chunk can be decoded knowing only where it starts. An i64 slot at
//! the front of the stream points at the chunk table appended at the end,
//! which records the compressed byte count of every chunk.
//!
//! The stream descriptor ([`CodecHeader`]) travels out of band: writer
//! and reader must agree on it (its `write_to`/`read_from` give it a
//! stable serialized form).

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::integer::IntegerCompressorBuilder;
use crate::record::{
    check_context, mode_of, record_compressor_from_items, record_decompressor_from_items,
    RecordCompressor, RecordDecompressor, NUM_CONTEXTS,
};
use crate::{PczipError, Result};

pub const DEFAULT_CHUNK_SIZE: u32 = 50_000;
const DEFAULT_ITEM_VERSION: u16 = 2;

// only one entropy coder is defined
const CODER_ARITHMETIC: u16 = 0;

/// The record kinds this crate can code.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// `n` opaque octets
    Bytes(u16),
    /// three 16-bit colors plus a 16-bit near-infrared channel
    RgbNir,
    /// waveform packet descriptor
    WavePacket,
}

impl ItemKind {
    fn code(&self) -> u16 {
        match self {
            ItemKind::Bytes(_) => 0,
            ItemKind::RgbNir => 1,
            ItemKind::WavePacket => 2,
        }
    }

    /// Byte width of one record of this kind.
    pub fn size(&self) -> u16 {
        match self {
            ItemKind::Bytes(count) => *count,
            ItemKind::RgbNir => crate::point::RgbNir::SIZE as u16,
            ItemKind::WavePacket => crate::point::WavePacket::SIZE as u16,
        }
    }

    fn from_code_and_size(code: u16, size: u16) -> Result<Self> {
        let kind = match code {
            0 => ItemKind::Bytes(size),
            1 => ItemKind::RgbNir,
            2 => ItemKind::WavePacket,
            _ => return Err(PczipError::UnknownItem(code)),
        };
        if kind.size() != size {
            return Err(PczipError::Corruption("item size does not match its kind"));
        }
        Ok(kind)
    }
}

/// One entry of the stream descriptor: a record kind plus the codec
/// version used for it. Version 0 is the raw passthrough codec.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CodecItem {
    kind: ItemKind,
    version: u16,
}

impl CodecItem {
    pub fn new(kind: ItemKind, version: u16) -> Result<Self> {
        if version > 2 {
            return Err(PczipError::UnsupportedItemVersion(kind, version));
        }
        if kind == ItemKind::Bytes(0) {
            return Err(PczipError::Corruption("a bytes item cannot be empty"));
        }
        Ok(Self { kind, version })
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn size(&self) -> u16 {
        self.kind.size()
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn read_from<R: Read>(src: &mut R) -> Result<Self> {
        let code = src.read_u16::<LittleEndian>()?;
        let size = src.read_u16::<LittleEndian>()?;
        let version = src.read_u16::<LittleEndian>()?;
        Self::new(ItemKind::from_code_and_size(code, size)?, version)
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.kind.code())?;
        dst.write_u16::<LittleEndian>(self.size())?;
        dst.write_u16::<LittleEndian>(self.version)
    }
}

/// Builds an item list with the default (latest) codec versions.
#[derive(Debug, Default)]
pub struct CodecItemRecordBuilder {
    kinds: Vec<ItemKind>,
}

impl CodecItemRecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, kind: ItemKind) -> &mut Self {
        self.kinds.push(kind);
        self
    }

    pub fn build(&self) -> Result<Vec<CodecItem>> {
        self.build_with_version(DEFAULT_ITEM_VERSION)
    }

    pub fn build_raw(&self) -> Result<Vec<CodecItem>> {
        self.build_with_version(0)
    }

    pub fn build_with_version(&self, version: u16) -> Result<Vec<CodecItem>> {
        self.kinds
            .iter()
            .map(|&kind| CodecItem::new(kind, version))
            .collect()
    }
}

/// How the records of a stream are stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMode {
    /// verbatim records, no entropy coding, no chunk framing
    Raw = 0,
    /// entropy coded, chunked, with a chunk table
    Chunked = 1,
}

impl CompressionMode {
    fn from_u16(mode: u16) -> Result<Self> {
        match mode {
            0 => Ok(CompressionMode::Raw),
            1 => Ok(CompressionMode::Chunked),
            _ => Err(PczipError::UnknownCompressionMode(mode)),
        }
    }
}

/// The stream descriptor: everything a reader must know to decode what a
/// writer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecHeader {
    mode: CompressionMode,
    coder: u16,
    chunk_size: u32,
    items: Vec<CodecItem>,
}

impl CodecHeader {
    /// Creates a descriptor with the default chunk size, deriving the
    /// compression mode from the item versions.
    pub fn from_items(items: Vec<CodecItem>) -> Result<Self> {
        let mode = mode_of(&items)?;
        Ok(Self {
            mode,
            coder: CODER_ARITHMETIC,
            chunk_size: DEFAULT_CHUNK_SIZE,
            items,
        })
    }

    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// Number of points per chunk.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn items(&self) -> &[CodecItem] {
        &self.items
    }

    /// Byte width of one full record.
    pub fn record_size(&self) -> usize {
        self.items.iter().map(|item| usize::from(item.size())).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.coder != CODER_ARITHMETIC {
            return Err(PczipError::Corruption("unknown entropy coder"));
        }
        if mode_of(&self.items)? != self.mode {
            return Err(PczipError::Corruption(
                "compression mode does not match the item versions",
            ));
        }
        if self.mode == CompressionMode::Chunked && self.chunk_size == 0 {
            return Err(PczipError::Corruption("chunk size cannot be 0"));
        }
        Ok(())
    }

    pub fn read_from<R: Read>(src: &mut R) -> Result<Self> {
        let mode = CompressionMode::from_u16(src.read_u16::<LittleEndian>()?)?;
        let coder = src.read_u16::<LittleEndian>()?;
        let chunk_size = src.read_u32::<LittleEndian>()?;
        let num_items = src.read_u16::<LittleEndian>()?;
        let mut items = Vec::with_capacity(usize::from(num_items));
        for _ in 0..num_items {
            items.push(CodecItem::read_from(src)?);
        }
        let header = Self {
            mode,
            coder,
            chunk_size,
            items,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn write_to<W: Write>(&self, dst: &mut W) -> std::io::Result<()> {
        dst.write_u16::<LittleEndian>(self.mode as u16)?;
        dst.write_u16::<LittleEndian>(self.coder)?;
        dst.write_u32::<LittleEndian>(self.chunk_size)?;
        dst.write_u16::<LittleEndian>(self.items.len() as u16)?;
        for item in &self.items {
            item.write_to(dst)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct CodecHeaderBuilder {
    items: Vec<CodecItem>,
    chunk_size: u32,
}

impl CodecHeaderBuilder {
    pub fn from_items(items: Vec<CodecItem>) -> Self {
        Self {
            items,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn build(self) -> Result<CodecHeader> {
        let mut header = CodecHeader::from_items(self.items)?;
        header.chunk_size = self.chunk_size;
        header.validate()?;
        Ok(header)
    }
}

/***************************************************************************************************
                    Chunk table
***************************************************************************************************/

/// Writes the chunk table at the stream's current position: a version
/// tag, the chunk count, then the byte counts entropy coded with the
/// previous count as prediction.
pub(crate) fn write_chunk_table<W: Write>(dest: &mut W, chunk_sizes: &[u64]) -> Result<()> {
    dest.write_u32::<LittleEndian>(0)?;
    dest.write_u32::<LittleEndian>(chunk_sizes.len() as u32)?;

    let mut encoder = ArithmeticEncoder::new(dest);
    let mut ic = IntegerCompressorBuilder::new()
        .bits(32)
        .contexts(2)
        .build_initialized();
    let mut predictor = 0i32;
    for &size in chunk_sizes {
        ic.compress(&mut encoder, predictor, size as i32, 1)?;
        predictor = size as i32;
    }
    encoder.done()?;
    Ok(())
}

/// Reads the chunk table found at `table_offset`, restoring the stream
/// position afterwards.
pub(crate) fn read_chunk_table<R: Read + Seek>(
    source: &mut R,
    table_offset: i64,
) -> Result<Vec<u64>> {
    if table_offset < 0 {
        return Err(PczipError::MissingChunkTable);
    }
    let position = source.seek(SeekFrom::Current(0))?;
    source.seek(SeekFrom::Start(table_offset as u64))?;

    let version = source.read_u32::<LittleEndian>()?;
    if version != 0 {
        return Err(PczipError::Corruption("unsupported chunk table version"));
    }
    let count = source.read_u32::<LittleEndian>()?;

    let mut decoder = ArithmeticDecoder::new(&mut *source);
    decoder.read_init_bytes()?;
    let mut ic = IntegerCompressorBuilder::new()
        .bits(32)
        .contexts(2)
        .build_initialized();
    let mut sizes = Vec::with_capacity(count as usize);
    let mut predictor = 0i32;
    for _ in 0..count {
        let size = ic.decompress(&mut decoder, predictor, 1)?;
        if size < 0 {
            return Err(PczipError::Corruption("negative chunk size in chunk table"));
        }
        sizes.push(size as u64);
        predictor = size;
    }

    source.seek(SeekFrom::Start(position))?;
    Ok(sizes)
}

/***************************************************************************************************
                    Compressor
***************************************************************************************************/

/// Compresses records into a chunked stream.
///
/// Records are pushed one at a time with a caller-chosen context id; the
/// compressor seeds each context on its first record of a chunk and
/// rolls chunks over transparently. [`done`] must be called to flush the
/// last chunk and write the chunk table.
///
/// [`done`]: PczipCompressor::done
pub struct PczipCompressor<'a, W: Write + Seek + Send + 'a> {
    header: CodecHeader,
    record_compressor: Box<dyn RecordCompressor<W> + Send + 'a>,
    first_point: bool,
    chunk_points_written: u32,
    chunk_sizes: Vec<u64>,
    last_chunk_pos: u64,
    table_offset_pos: u64,
    seeded: [bool; NUM_CONTEXTS],
}

impl<'a, W: Write + Seek + Send + 'a> PczipCompressor<'a, W> {
    pub fn new(dest: W, header: CodecHeader) -> Result<Self> {
        header.validate()?;
        let record_compressor = record_compressor_from_items(header.items(), dest)?;
        Ok(Self {
            header,
            record_compressor,
            first_point: true,
            chunk_points_written: 0,
            chunk_sizes: vec![],
            last_chunk_pos: 0,
            table_offset_pos: 0,
            seeded: [false; NUM_CONTEXTS],
        })
    }

    pub fn header(&self) -> &CodecHeader {
        &self.header
    }

    /// Compresses one record in context 0.
    pub fn compress_one(&mut self, input: &[u8]) -> Result<()> {
        self.compress_one_in_context(input, 0)
    }

    pub fn compress_one_in_context(&mut self, input: &[u8], context: usize) -> Result<()> {
        check_context(context)?;
        if self.first_point {
            self.reserve_table_offset()?;
        }
        if self.record_compressor.chunk_sizes()
            && self.chunk_points_written == self.header.chunk_size()
        {
            self.close_current_chunk()?;
        }
        if !self.seeded[context] {
            self.record_compressor.init_context(input, context)?;
            self.seeded[context] = true;
        } else {
            self.record_compressor.compress_next(input, context)?;
        }
        self.chunk_points_written += 1;
        Ok(())
    }

    /// Compresses all the records of `input`, in context 0.
    pub fn compress_many(&mut self, input: &[u8]) -> Result<()> {
        let record_size = self.record_compressor.record_size();
        if input.len() % record_size != 0 {
            return Err(PczipError::BufferLenNotMultipleOfRecordSize {
                buffer_len: input.len(),
                record_size,
            });
        }
        for record in input.chunks_exact(record_size) {
            self.compress_one(record)?;
        }
        Ok(())
    }

    /// Flushes the last chunk and writes the chunk table.
    pub fn done(&mut self) -> Result<()> {
        if !self.record_compressor.chunk_sizes() {
            self.record_compressor.done()?;
            return Ok(());
        }
        if self.first_point {
            // no record was ever pushed, emit only the table framing
            self.reserve_table_offset()?;
        } else {
            self.record_compressor.done()?;
            self.update_chunk_table()?;
        }
        let stream = self.record_compressor.borrow_stream_mut();
        let table_start = stream.seek(SeekFrom::Current(0))?;
        write_chunk_table(stream, &self.chunk_sizes)?;
        let end = stream.seek(SeekFrom::Current(0))?;
        stream.seek(SeekFrom::Start(self.table_offset_pos))?;
        stream.write_i64::<LittleEndian>(table_start as i64)?;
        stream.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.record_compressor.borrow_stream_mut()
    }

    pub fn into_inner(self) -> W {
        self.record_compressor.box_into_stream()
    }

    fn reserve_table_offset(&mut self) -> Result<()> {
        let chunked = self.record_compressor.chunk_sizes();
        let stream = self.record_compressor.borrow_stream_mut();
        if chunked {
            self.table_offset_pos = stream.seek(SeekFrom::Current(0))?;
            stream.write_i64::<LittleEndian>(-1)?;
        }
        self.last_chunk_pos = stream.seek(SeekFrom::Current(0))?;
        self.first_point = false;
        Ok(())
    }

    fn close_current_chunk(&mut self) -> Result<()> {
        self.record_compressor.done()?;
        self.record_compressor.reset();
        self.record_compressor.set_fields_from(self.header.items())?;
        self.seeded = [false; NUM_CONTEXTS];
        self.chunk_points_written = 0;
        self.update_chunk_table()
    }

    fn update_chunk_table(&mut self) -> Result<()> {
        let position = self
            .record_compressor
            .borrow_stream_mut()
            .seek(SeekFrom::Current(0))?;
        self.chunk_sizes.push(position - self.last_chunk_pos);
        self.last_chunk_pos = position;
        Ok(())
    }
}

/***************************************************************************************************
                    Decompressor
***************************************************************************************************/

/// Decompresses records from a chunked stream.
///
/// Callers must replay the same context-id sequence the writer used.
/// Chunk boundaries are crossed by seeking to the next chunk start from
/// the chunk table; [`seek`] positions onto any point.
///
/// [`seek`]: PczipDecompressor::seek
pub struct PczipDecompressor<'a, R: Read + Seek + Send + 'a> {
    header: CodecHeader,
    record_decompressor: Box<dyn RecordDecompressor<R> + Send + 'a>,
    chunk_points_read: u32,
    data_start: u64,
    table_offset: i64,
    chunk_table: Option<Vec<u64>>,
    current_chunk: usize,
    seeded: [bool; NUM_CONTEXTS],
}

impl<'a, R: Read + Seek + Send + 'a> PczipDecompressor<'a, R> {
    pub fn new(mut source: R, header: CodecHeader) -> Result<Self> {
        header.validate()?;
        let mut table_offset = -1i64;
        if header.mode() == CompressionMode::Chunked {
            table_offset = source.read_i64::<LittleEndian>()?;
        }
        let data_start = source.seek(SeekFrom::Current(0))?;
        let record_decompressor = record_decompressor_from_items(header.items(), source)?;
        Ok(Self {
            header,
            record_decompressor,
            chunk_points_read: 0,
            data_start,
            table_offset,
            chunk_table: None,
            current_chunk: 0,
            seeded: [false; NUM_CONTEXTS],
        })
    }

    pub fn header(&self) -> &CodecHeader {
        &self.header
    }

    /// Decompresses one record in context 0.
    pub fn decompress_one(&mut self, output: &mut [u8]) -> Result<()> {
        self.decompress_one_in_context(output, 0)
    }

    pub fn decompress_one_in_context(&mut self, output: &mut [u8], context: usize) -> Result<()> {
        check_context(context)?;
        let chunked = self.record_decompressor.chunk_sizes();
        if chunked && self.chunk_points_read == self.header.chunk_size() {
            self.advance_to_next_chunk()?;
        }
        if chunked && !self.seeded[context] {
            self.record_decompressor.init_context(output, context)?;
            self.seeded[context] = true;
        } else {
            self.record_decompressor.decompress_next(output, context)?;
        }
        self.chunk_points_read += 1;
        Ok(())
    }

    /// Decompresses records until `output` is full, in context 0.
    pub fn decompress_many(&mut self, output: &mut [u8]) -> Result<()> {
        let record_size = self.record_decompressor.record_size();
        if output.len() % record_size != 0 {
            return Err(PczipError::BufferLenNotMultipleOfRecordSize {
                buffer_len: output.len(),
                record_size,
            });
        }
        for record in output.chunks_exact_mut(record_size) {
            self.decompress_one(record)?;
        }
        Ok(())
    }

    /// Positions the decompressor so that the next record read is the one
    /// at `point_index`.
    ///
    /// The records skipped between the chunk start and `point_index` are
    /// replayed in context 0. Streams written with several contexts can
    /// only be seeked to a chunk start (any multiple of the chunk size);
    /// from there the caller replays the writer's context-id sequence.
    pub fn seek(&mut self, point_index: u64) -> Result<()> {
        let record_size = self.record_decompressor.record_size() as u64;
        if !self.record_decompressor.chunk_sizes() {
            let position = self.data_start + point_index * record_size;
            self.record_decompressor
                .borrow_stream_mut()
                .seek(SeekFrom::Start(position))?;
            return Ok(());
        }

        let chunk_of_point = (point_index / u64::from(self.header.chunk_size())) as usize;
        let delta = point_index % u64::from(self.header.chunk_size());

        self.load_chunk_table_if_needed()?;
        let start = match self.chunk_table.as_ref() {
            Some(table) if chunk_of_point < table.len() => {
                self.data_start + table[..chunk_of_point].iter().sum::<u64>()
            }
            Some(_) => return Err(PczipError::Corruption("seek past the last chunk")),
            None => return Err(PczipError::MissingChunkTable),
        };
        self.restart_at(start, chunk_of_point)?;

        let mut scratch = vec![0u8; record_size as usize];
        for _ in 0..delta {
            self.decompress_one(&mut scratch)?;
        }
        Ok(())
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.record_decompressor.borrow_stream_mut()
    }

    pub fn into_inner(self) -> R {
        self.record_decompressor.box_into_stream()
    }

    fn advance_to_next_chunk(&mut self) -> Result<()> {
        let next_chunk = self.current_chunk + 1;
        self.load_chunk_table_if_needed()?;
        let start = match self.chunk_table.as_ref() {
            Some(table) if next_chunk < table.len() => {
                self.data_start + table[..next_chunk].iter().sum::<u64>()
            }
            Some(_) => return Err(PczipError::Corruption("read past the last chunk")),
            None => return Err(PczipError::MissingChunkTable),
        };
        self.restart_at(start, next_chunk)
    }

    fn restart_at(&mut self, position: u64, chunk: usize) -> Result<()> {
        self.record_decompressor
            .borrow_stream_mut()
            .seek(SeekFrom::Start(position))?;
        self.record_decompressor.reset();
        self.record_decompressor.set_fields_from(self.header.items())?;
        self.seeded = [false; NUM_CONTEXTS];
        self.current_chunk = chunk;
        self.chunk_points_read = 0;
        Ok(())
    }

    fn load_chunk_table_if_needed(&mut self) -> Result<()> {
        if self.chunk_table.is_none() {
            let sizes = read_chunk_table(
                self.record_decompressor.borrow_stream_mut(),
                self.table_offset,
            )?;
            self.chunk_table = Some(sizes);
        }
        Ok(())
    }
}

/***************************************************************************************************
                    Buffer helpers
***************************************************************************************************/

/// Compresses all the records of `points` (context 0) into `dest`.
pub fn compress_buffer<W: Write + Seek + Send>(
    dest: &mut W,
    points: &[u8],
    header: CodecHeader,
) -> Result<()> {
    let mut compressor = PczipCompressor::new(dest, header)?;
    compressor.compress_many(points)?;
    compressor.done()?;
    Ok(())
}

/// Decompresses records (context 0) from `source` until `out` is full.
pub fn decompress_buffer<R: Read + Seek + Send>(
    source: &mut R,
    out: &mut [u8],
    header: CodecHeader,
) -> Result<()> {
    let mut decompressor = PczipDecompressor::new(source, header)?;
    decompressor.decompress_many(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rgbnir_header(chunk_size: u32) -> CodecHeader {
        let items = CodecItemRecordBuilder::new()
            .add_item(ItemKind::RgbNir)
            .build()
            .unwrap();
        CodecHeaderBuilder::from_items(items)
            .with_chunk_size(chunk_size)
            .build()
            .unwrap()
    }

    #[test]
    fn header_serialization_round_trips() {
        let items = CodecItemRecordBuilder::new()
            .add_item(ItemKind::RgbNir)
            .add_item(ItemKind::WavePacket)
            .add_item(ItemKind::Bytes(5))
            .build()
            .unwrap();
        let header = CodecHeaderBuilder::from_items(items)
            .with_chunk_size(1234)
            .build()
            .unwrap();

        let mut data = Cursor::new(Vec::<u8>::new());
        header.write_to(&mut data).unwrap();
        data.set_position(0);
        let read_back = CodecHeader::read_from(&mut data).unwrap();
        assert_eq!(read_back, header);
        assert_eq!(read_back.record_size(), 8 + 21 + 5);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let items = CodecItemRecordBuilder::new()
            .add_item(ItemKind::RgbNir)
            .build()
            .unwrap();
        let result = CodecHeaderBuilder::from_items(items)
            .with_chunk_size(0)
            .build();
        assert!(matches!(result, Err(PczipError::Corruption(_))));
    }

    #[test]
    fn chunk_table_round_trips() {
        let sizes = vec![1456u64, 1302, 1788, 42];
        let mut data = Cursor::new(Vec::<u8>::new());
        data.seek(SeekFrom::Start(0)).unwrap();
        write_chunk_table(&mut data, &sizes).unwrap();
        data.set_position(0);
        let read_back = read_chunk_table(&mut data, 0).unwrap();
        assert_eq!(read_back, sizes);
    }

    #[test]
    fn empty_stream_still_gets_a_table() {
        let header = rgbnir_header(10);
        let mut data = Cursor::new(Vec::<u8>::new());
        {
            let mut compressor = PczipCompressor::new(&mut data, header).unwrap();
            compressor.done().unwrap();
        }
        data.set_position(0);
        let table_offset = data.read_i64::<LittleEndian>().unwrap();
        assert_eq!(table_offset, 8);
        let table = read_chunk_table(&mut data, table_offset).unwrap();
        assert!(table.is_empty());
    }
}
