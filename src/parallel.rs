//! Multi-chunk compression and decompression with rayon.
//!
//! Chunks are independent bitstreams, so whole buffers can be coded one
//! chunk per task and stitched back together in order. The streams
//! produced here are byte-for-byte compatible with the sequential
//! [`PczipCompressor`]: same framing, same chunk table.
//!
//! [`PczipCompressor`]: crate::PczipCompressor

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;

use crate::chunked::{read_chunk_table, write_chunk_table, CodecHeader, CompressionMode};
use crate::record::{record_compressor_from_items, record_decompressor_from_items};
use crate::{PczipError, Result};

/// Compresses all the records of `points` (context 0), one chunk per
/// rayon task.
pub fn par_compress_buffer<W: Write + Seek + Send>(
    dest: &mut W,
    points: &[u8],
    header: &CodecHeader,
) -> Result<()> {
    header.validate()?;
    if header.mode() == CompressionMode::Raw {
        // raw records have no chunks to parallelize over
        return crate::compress_buffer(dest, points, header.clone());
    }
    let record_size = header.record_size();
    if points.len() % record_size != 0 {
        return Err(PczipError::BufferLenNotMultipleOfRecordSize {
            buffer_len: points.len(),
            record_size,
        });
    }

    let table_offset_pos = dest.seek(SeekFrom::Current(0))?;
    dest.write_i64::<LittleEndian>(-1)?;

    let chunk_byte_len = header.chunk_size() as usize * record_size;
    let compressed_chunks = points
        .par_chunks(chunk_byte_len)
        .map(|chunk| compress_one_chunk(chunk, record_size, header))
        .collect::<Result<Vec<_>>>()?;

    let mut chunk_sizes = Vec::with_capacity(compressed_chunks.len());
    for chunk in &compressed_chunks {
        chunk_sizes.push(chunk.len() as u64);
        dest.write_all(chunk)?;
    }

    let table_start = dest.seek(SeekFrom::Current(0))?;
    write_chunk_table(dest, &chunk_sizes)?;
    let end = dest.seek(SeekFrom::Current(0))?;
    dest.seek(SeekFrom::Start(table_offset_pos))?;
    dest.write_i64::<LittleEndian>(table_start as i64)?;
    dest.seek(SeekFrom::Start(end))?;
    Ok(())
}

fn compress_one_chunk(chunk: &[u8], record_size: usize, header: &CodecHeader) -> Result<Vec<u8>> {
    let mut compressor =
        record_compressor_from_items(header.items(), Cursor::new(Vec::<u8>::new()))?;
    let mut records = chunk.chunks_exact(record_size);
    if let Some(first) = records.next() {
        compressor.init_context(first, 0)?;
        for record in records {
            compressor.compress_next(record, 0)?;
        }
    }
    compressor.done()?;
    Ok(compressor.box_into_stream().into_inner())
}

/// Decompresses records (context 0) from `source` until `out` is full,
/// one chunk per rayon task.
pub fn par_decompress_buffer<R: Read + Seek + Send>(
    source: &mut R,
    out: &mut [u8],
    header: &CodecHeader,
) -> Result<()> {
    header.validate()?;
    if header.mode() == CompressionMode::Raw {
        return crate::decompress_buffer(source, out, header.clone());
    }
    let record_size = header.record_size();
    if out.len() % record_size != 0 {
        return Err(PczipError::BufferLenNotMultipleOfRecordSize {
            buffer_len: out.len(),
            record_size,
        });
    }
    let num_points = out.len() / record_size;
    let chunk_points = header.chunk_size() as usize;
    let needed_chunks = (num_points + chunk_points - 1) / chunk_points;

    let table_offset = source.read_i64::<LittleEndian>()?;
    let chunk_sizes = read_chunk_table(source, table_offset)?;
    if needed_chunks > chunk_sizes.len() {
        return Err(PczipError::Corruption(
            "chunk table does not cover the requested points",
        ));
    }

    let mut chunks_data = Vec::with_capacity(needed_chunks);
    for &size in &chunk_sizes[..needed_chunks] {
        let mut data = vec![0u8; size as usize];
        source.read_exact(&mut data)?;
        chunks_data.push(data);
    }

    out.par_chunks_mut(chunk_points * record_size)
        .zip(chunks_data.into_par_iter())
        .try_for_each(|(out_chunk, data)| {
            decompress_one_chunk(out_chunk, record_size, header, data)
        })
}

fn decompress_one_chunk(
    out_chunk: &mut [u8],
    record_size: usize,
    header: &CodecHeader,
    data: Vec<u8>,
) -> Result<()> {
    let mut decompressor = record_decompressor_from_items(header.items(), Cursor::new(data))?;
    let mut records = out_chunk.chunks_exact_mut(record_size);
    if let Some(first) = records.next() {
        decompressor.init_context(first, 0)?;
        for record in records {
            decompressor.decompress_next(record, 0)?;
        }
    }
    Ok(())
}
