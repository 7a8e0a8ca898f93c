use std::io::Cursor;

use pczip::packers::Packable;
use pczip::point::{RgbNir, WavePacket};
use pczip::{
    record_compressor_from_items, record_decompressor_from_items, CodecItem, ItemKind, PczipError,
};

fn next(state: &mut u32) -> u32 {
    *state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    *state
}

fn generate_rgbnir(count: usize) -> Vec<u8> {
    let mut state = 0xACE1u32;
    let mut colors = RgbNir {
        red: 12000,
        green: 13000,
        blue: 14000,
        nir: 20000,
    };
    let mut buffer = vec![0u8; count * RgbNir::SIZE];
    for record in buffer.chunks_exact_mut(RgbNir::SIZE) {
        // small drifts with the occasional jump, like a scan line
        colors.red = colors.red.wrapping_add((next(&mut state) % 7) as u16);
        colors.green = colors.green.wrapping_sub((next(&mut state) % 5) as u16);
        colors.blue = colors.blue.wrapping_add((next(&mut state) % 3) as u16);
        if next(&mut state) % 50 == 0 {
            colors.nir = next(&mut state) as u16;
        }
        colors.pack_into(record);
    }
    buffer
}

fn generate_wavepackets(count: usize) -> Vec<u8> {
    let mut state = 0xBEEFu32;
    let mut packet = WavePacket {
        packet_index: 1,
        offset: 4096,
        size: 256,
        return_point: [0.0, 0.0, 0.0],
    };
    let mut buffer = vec![0u8; count * WavePacket::SIZE];
    for record in buffer.chunks_exact_mut(WavePacket::SIZE) {
        match next(&mut state) % 4 {
            // contiguous packets, the common case
            0 | 1 => packet.offset = packet.offset.wrapping_add(packet.size),
            2 => {}
            _ => {
                packet.offset = next(&mut state);
                packet.size = 128 + next(&mut state) % 512;
            }
        }
        packet.packet_index = (next(&mut state) % 4) as u8;
        packet.return_point[0] += 0.5;
        packet.return_point[2] = (next(&mut state) % 16) as f32;
        packet.pack_into(record);
    }
    buffer
}

fn generate_bytes(count: usize, record_size: usize) -> Vec<u8> {
    let mut state = 0xC0FFEEu32;
    let mut buffer = vec![0u8; count * record_size];
    let mut last = vec![0u8; record_size];
    for record in buffer.chunks_exact_mut(record_size) {
        for (byte, last) in record.iter_mut().zip(last.iter_mut()) {
            if next(&mut state) % 3 == 0 {
                *last = last.wrapping_add((next(&mut state) % 5) as u8);
            }
            *byte = *last;
        }
    }
    buffer
}

fn record_level_round_trip(item: CodecItem, points: &[u8]) -> Vec<u8> {
    let record_size = usize::from(item.size());
    let items = [item];

    let mut compressor =
        record_compressor_from_items(&items, Cursor::new(Vec::<u8>::new())).unwrap();
    let mut records = points.chunks_exact(record_size);
    compressor.init_context(records.next().unwrap(), 0).unwrap();
    for record in records {
        compressor.compress_next(record, 0).unwrap();
    }
    compressor.done().unwrap();
    let compressed = compressor.box_into_stream().into_inner();

    let mut decompressor =
        record_decompressor_from_items(&items, Cursor::new(compressed.clone())).unwrap();
    let mut decompressed = vec![0u8; points.len()];
    let mut records = decompressed.chunks_exact_mut(record_size);
    decompressor
        .init_context(records.next().unwrap(), 0)
        .unwrap();
    for record in records {
        decompressor.decompress_next(record, 0).unwrap();
    }
    assert_eq!(&decompressed, points);
    compressed
}

#[test]
fn rgbnir_v1_round_trips() {
    let points = generate_rgbnir(500);
    record_level_round_trip(CodecItem::new(ItemKind::RgbNir, 1).unwrap(), &points);
}

#[test]
fn rgbnir_v2_round_trips() {
    let points = generate_rgbnir(500);
    record_level_round_trip(CodecItem::new(ItemKind::RgbNir, 2).unwrap(), &points);
}

#[test]
fn wavepacket_round_trips() {
    let points = generate_wavepackets(500);
    record_level_round_trip(CodecItem::new(ItemKind::WavePacket, 1).unwrap(), &points);
    record_level_round_trip(CodecItem::new(ItemKind::WavePacket, 2).unwrap(), &points);
}

#[test]
fn bytes_round_trips() {
    let points = generate_bytes(500, 7);
    record_level_round_trip(CodecItem::new(ItemKind::Bytes(7), 1).unwrap(), &points);
    record_level_round_trip(CodecItem::new(ItemKind::Bytes(7), 2).unwrap(), &points);
}

#[test]
fn composite_record_round_trips() {
    let colors = generate_rgbnir(200);
    let extra = generate_bytes(200, 4);
    let record_size = RgbNir::SIZE + 4;
    let mut points = vec![0u8; 200 * record_size];
    for (i, record) in points.chunks_exact_mut(record_size).enumerate() {
        record[..RgbNir::SIZE].copy_from_slice(&colors[i * RgbNir::SIZE..(i + 1) * RgbNir::SIZE]);
        record[RgbNir::SIZE..].copy_from_slice(&extra[i * 4..(i + 1) * 4]);
    }

    let items = [
        CodecItem::new(ItemKind::RgbNir, 2).unwrap(),
        CodecItem::new(ItemKind::Bytes(4), 2).unwrap(),
    ];
    let mut compressor =
        record_compressor_from_items(&items, Cursor::new(Vec::<u8>::new())).unwrap();
    let mut records = points.chunks_exact(record_size);
    compressor.init_context(records.next().unwrap(), 0).unwrap();
    for record in records {
        compressor.compress_next(record, 0).unwrap();
    }
    compressor.done().unwrap();
    let compressed = compressor.box_into_stream().into_inner();

    let mut decompressor =
        record_decompressor_from_items(&items, Cursor::new(compressed)).unwrap();
    let mut decompressed = vec![0u8; points.len()];
    let mut records = decompressed.chunks_exact_mut(record_size);
    decompressor
        .init_context(records.next().unwrap(), 0)
        .unwrap();
    for record in records {
        decompressor.decompress_next(record, 0).unwrap();
    }
    assert_eq!(decompressed, points);
}

#[test]
fn contexts_keep_independent_lineages() {
    // two populations with very different statistics, interleaved
    let smooth = generate_rgbnir(100);
    let mut state = 0xF00Du32;
    let mut noisy = vec![0u8; 100 * RgbNir::SIZE];
    for byte in noisy.iter_mut() {
        *byte = next(&mut state) as u8;
    }

    let items = [CodecItem::new(ItemKind::RgbNir, 2).unwrap()];
    let mut compressor =
        record_compressor_from_items(&items, Cursor::new(Vec::<u8>::new())).unwrap();
    let mut seeded = [false, false];
    for i in 0..100 {
        for (context, points) in [(0usize, &smooth), (1usize, &noisy)].iter() {
            let record = &points[i * RgbNir::SIZE..(i + 1) * RgbNir::SIZE];
            if !seeded[*context] {
                compressor.init_context(record, *context).unwrap();
                seeded[*context] = true;
            } else {
                compressor.compress_next(record, *context).unwrap();
            }
        }
    }
    compressor.done().unwrap();
    let compressed = compressor.box_into_stream().into_inner();

    let mut decompressor =
        record_decompressor_from_items(&items, Cursor::new(compressed)).unwrap();
    let mut decoded_smooth = vec![0u8; smooth.len()];
    let mut decoded_noisy = vec![0u8; noisy.len()];
    let mut seeded = [false, false];
    for i in 0..100 {
        for (context, points) in [(0usize, &mut decoded_smooth), (1usize, &mut decoded_noisy)]
            .iter_mut()
        {
            let record = &mut points[i * RgbNir::SIZE..(i + 1) * RgbNir::SIZE];
            if !seeded[*context] {
                decompressor.init_context(record, *context).unwrap();
                seeded[*context] = true;
            } else {
                decompressor.decompress_next(record, *context).unwrap();
            }
        }
    }
    assert_eq!(decoded_smooth, smooth);
    assert_eq!(decoded_noisy, noisy);
}

#[test]
fn unseeded_context_is_an_error() {
    let items = [CodecItem::new(ItemKind::RgbNir, 2).unwrap()];
    let mut compressor =
        record_compressor_from_items(&items, Cursor::new(Vec::<u8>::new())).unwrap();
    let record = [0u8; RgbNir::SIZE];
    compressor.init_context(&record, 0).unwrap();
    let result = compressor.compress_next(&record, 2);
    assert!(matches!(result, Err(PczipError::UninitializedContext(2))));
}

#[test]
fn out_of_range_context_is_an_error() {
    let items = [CodecItem::new(ItemKind::RgbNir, 2).unwrap()];
    let mut compressor =
        record_compressor_from_items(&items, Cursor::new(Vec::<u8>::new())).unwrap();
    let record = [0u8; RgbNir::SIZE];
    assert!(matches!(
        compressor.init_context(&record, 7),
        Err(PczipError::InvalidContext(7))
    ));
}

#[test]
fn identical_colors_cost_almost_nothing() {
    let mut constant = vec![0u8; 200 * RgbNir::SIZE];
    let seed = RgbNir {
        red: 100,
        green: 200,
        blue: 300,
        nir: 400,
    };
    for record in constant.chunks_exact_mut(RgbNir::SIZE) {
        seed.pack_into(record);
    }
    let mut changing = vec![0u8; 200 * RgbNir::SIZE];
    let mut state = 0x1234u32;
    for byte in changing.iter_mut() {
        *byte = next(&mut state) as u8;
    }

    let item = CodecItem::new(ItemKind::RgbNir, 2).unwrap();
    let constant_len = record_level_round_trip(item, &constant).len();
    let changing_len = record_level_round_trip(item, &changing).len();

    // one "nothing changed" symbol per record, against 8 modelled diffs
    assert!(constant_len * 4 < changing_len);
    // and far below the raw size
    assert!(constant_len < constant.len() / 4);
}

#[test]
fn waveform_scenario_decodes_exactly() {
    let seed = WavePacket {
        packet_index: 3,
        offset: 1024,
        size: 256,
        return_point: [0.0, 0.0, 0.0],
    };
    let second = WavePacket {
        packet_index: 3,
        offset: 1024,
        size: 300,
        return_point: [0.1, 0.0, 0.0],
    };
    let mut points = vec![0u8; 2 * WavePacket::SIZE];
    seed.pack_into(&mut points[..WavePacket::SIZE]);
    second.pack_into(&mut points[WavePacket::SIZE..]);

    let item = CodecItem::new(ItemKind::WavePacket, 1).unwrap();
    record_level_round_trip(item, &points);
}

#[test]
fn unchanged_offsets_cost_less_than_changed_sizes() {
    // same records except one stream varies the offset, the other the size
    let count = 64;
    let mut offset_constant = vec![0u8; count * WavePacket::SIZE];
    let mut size_constant = vec![0u8; count * WavePacket::SIZE];
    for (i, (a, b)) in offset_constant
        .chunks_exact_mut(WavePacket::SIZE)
        .zip(size_constant.chunks_exact_mut(WavePacket::SIZE))
        .enumerate()
    {
        WavePacket {
            packet_index: 3,
            offset: 1024,
            size: 256 + 44 * i as u32,
            return_point: [0.0, 0.0, 0.0],
        }
        .pack_into(a);
        WavePacket {
            packet_index: 3,
            offset: 1024 + 997 * i as u32,
            size: 256,
            return_point: [0.0, 0.0, 0.0],
        }
        .pack_into(b);
    }

    // same size sequence again, but now the offset drifts as well
    let mut both_changing = vec![0u8; count * WavePacket::SIZE];
    for (i, record) in both_changing.chunks_exact_mut(WavePacket::SIZE).enumerate() {
        WavePacket {
            packet_index: 3,
            offset: 1024 + 997 * i as u32,
            size: 256 + 44 * i as u32,
            return_point: [0.0, 0.0, 0.0],
        }
        .pack_into(record);
    }

    let item = CodecItem::new(ItemKind::WavePacket, 1).unwrap();
    let changing_sizes_len = record_level_round_trip(item, &offset_constant).len();
    let changing_offsets_len = record_level_round_trip(item, &size_constant).len();
    let both_changing_len = record_level_round_trip(item, &both_changing).len();

    // an unchanged offset is a single selector symbol; adding a changing
    // offset on top of the same changing sizes must cost extra bits
    assert!(changing_sizes_len < both_changing_len);
    // symmetrically, an unchanged size is cheaper than a changing one
    assert!(changing_offsets_len < both_changing_len);

    let both_constant: Vec<u8> = {
        let mut points = vec![0u8; count * WavePacket::SIZE];
        for record in points.chunks_exact_mut(WavePacket::SIZE) {
            WavePacket {
                packet_index: 3,
                offset: 1024,
                size: 256,
                return_point: [0.0, 0.0, 0.0],
            }
            .pack_into(record);
        }
        record_level_round_trip(item, &points)
    };
    assert!(both_constant.len() < changing_sizes_len);
    assert!(both_constant.len() < changing_offsets_len);
}
