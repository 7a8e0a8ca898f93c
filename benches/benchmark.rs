#[macro_use]
extern crate criterion;
extern crate pczip;

use criterion::Criterion;

use pczip::packers::Packable;
use pczip::point::{rgbnir, wavepacket, RgbNir, WavePacket};
use pczip::record::{PointRecordCompressor, RecordCompressor};
use pczip::{
    compress_buffer, decompress_buffer, CodecHeaderBuilder, CodecItemRecordBuilder, ItemKind,
};
use std::io::Cursor;

struct RawPointsData {
    point_size: usize,
    points_data: Vec<u8>,
}

impl RawPointsData {
    fn cycling_iterator(&self) -> std::iter::Cycle<std::slice::ChunksExact<u8>> {
        self.points_data.chunks_exact(self.point_size).cycle()
    }
}

fn next(state: &mut u32) -> u32 {
    *state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    *state
}

fn generate_rgbnir_data(count: usize) -> RawPointsData {
    let mut state = 0xACE1u32;
    let mut colors = RgbNir::default();
    let mut points_data = vec![0u8; count * RgbNir::SIZE];
    for record in points_data.chunks_exact_mut(RgbNir::SIZE) {
        colors.red = colors.red.wrapping_add((next(&mut state) % 7) as u16);
        colors.green = colors.green.wrapping_add((next(&mut state) % 7) as u16);
        colors.blue = colors.blue.wrapping_sub((next(&mut state) % 5) as u16);
        colors.nir = colors.nir.wrapping_add((next(&mut state) % 3) as u16);
        colors.pack_into(record);
    }
    RawPointsData {
        point_size: RgbNir::SIZE,
        points_data,
    }
}

fn generate_wavepacket_data(count: usize) -> RawPointsData {
    let mut state = 0xBEEFu32;
    let mut packet = WavePacket::default();
    packet.size = 256;
    let mut points_data = vec![0u8; count * WavePacket::SIZE];
    for record in points_data.chunks_exact_mut(WavePacket::SIZE) {
        if next(&mut state) % 2 == 0 {
            packet.offset = packet.offset.wrapping_add(packet.size);
        }
        packet.packet_index = (next(&mut state) % 4) as u8;
        packet.return_point[0] += 0.25;
        packet.pack_into(record);
    }
    RawPointsData {
        point_size: WavePacket::SIZE,
        points_data,
    }
}

fn rgbnir_v1_compression_benchmark(c: &mut Criterion) {
    let raw_points_data = generate_rgbnir_data(4096);

    let mut record_compressor = PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()));
    record_compressor.add_field_compressor(rgbnir::v1::RgbNirCompressor::new());
    record_compressor
        .init_context(&raw_points_data.points_data[..RgbNir::SIZE], 0)
        .unwrap();

    c.bench_function("rgbnir_v1_compression", move |b| {
        let mut raw_pts_iter = raw_points_data.cycling_iterator();
        b.iter(|| record_compressor.compress_next(raw_pts_iter.next().unwrap(), 0));
    });
}

fn rgbnir_v2_compression_benchmark(c: &mut Criterion) {
    let raw_points_data = generate_rgbnir_data(4096);

    let mut record_compressor = PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()));
    record_compressor.add_field_compressor(rgbnir::v2::RgbNirCompressor::new());
    record_compressor
        .init_context(&raw_points_data.points_data[..RgbNir::SIZE], 0)
        .unwrap();

    c.bench_function("rgbnir_v2_compression", move |b| {
        let mut raw_pts_iter = raw_points_data.cycling_iterator();
        b.iter(|| record_compressor.compress_next(raw_pts_iter.next().unwrap(), 0));
    });
}

fn wavepacket_compression_benchmark(c: &mut Criterion) {
    let raw_points_data = generate_wavepacket_data(4096);

    let mut record_compressor = PointRecordCompressor::new(Cursor::new(Vec::<u8>::new()));
    record_compressor.add_field_compressor(wavepacket::v1::WavePacketCompressor::new());
    record_compressor
        .init_context(&raw_points_data.points_data[..WavePacket::SIZE], 0)
        .unwrap();

    c.bench_function("wavepacket_compression", move |b| {
        let mut raw_pts_iter = raw_points_data.cycling_iterator();
        b.iter(|| record_compressor.compress_next(raw_pts_iter.next().unwrap(), 0));
    });
}

fn rgbnir_v2_decompression_benchmark(c: &mut Criterion) {
    let raw_points_data = generate_rgbnir_data(4096);

    let items = CodecItemRecordBuilder::new()
        .add_item(ItemKind::RgbNir)
        .build()
        .unwrap();
    let header = CodecHeaderBuilder::from_items(items).build().unwrap();
    let mut compressed = Cursor::new(Vec::<u8>::new());
    compress_buffer(&mut compressed, &raw_points_data.points_data, header.clone()).unwrap();
    let compressed = compressed.into_inner();

    let mut decompressed = vec![0u8; raw_points_data.points_data.len()];
    c.bench_function("rgbnir_v2_decompression", move |b| {
        b.iter(|| {
            decompress_buffer(
                &mut Cursor::new(&compressed[..]),
                &mut decompressed,
                header.clone(),
            )
        });
    });
}

criterion_group!(
    record_compression,
    rgbnir_v1_compression_benchmark,
    rgbnir_v2_compression_benchmark,
    wavepacket_compression_benchmark,
    rgbnir_v2_decompression_benchmark
);
criterion_main!(record_compression);
