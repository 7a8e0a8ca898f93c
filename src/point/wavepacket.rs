//! Codec for waveform packet records.
//!
//! Packet indexes repeat heavily within a flight line, so they go through
//! a plain adaptive model. Offsets either repeat, follow the previous
//! packet contiguously, or drift by a small delta; a selector symbol says
//! which, and the selector's own model plus the delta compressor's
//! sub-context both switch on a one bit "was the offset changing"
//! history. Sizes and the three return point axes are coded as deltas
//! against the previous record of the same context.

use crate::packers::Packable;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct WavePacket {
    pub packet_index: u8,
    pub offset: u32,
    pub size: u32,
    pub return_point: [f32; 3],
}

impl WavePacket {
    pub const SIZE: usize = 21;
}

impl Packable for WavePacket {
    fn unpack_from(input: &[u8]) -> Self {
        Self {
            packet_index: input[0],
            offset: u32::unpack_from(&input[1..5]),
            size: u32::unpack_from(&input[5..9]),
            return_point: [
                f32::unpack_from(&input[9..13]),
                f32::unpack_from(&input[13..17]),
                f32::unpack_from(&input[17..21]),
            ],
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        output[0] = self.packet_index;
        self.offset.pack_into(&mut output[1..5]);
        self.size.pack_into(&mut output[5..9]);
        self.return_point[0].pack_into(&mut output[9..13]);
        self.return_point[1].pack_into(&mut output[13..17]);
        self.return_point[2].pack_into(&mut output[17..21]);
    }
}

// offset selector symbols
const OFFSET_SAME: u32 = 0;
const OFFSET_CONTIGUOUS: u32 = 1;
const OFFSET_DELTA: u32 = 2;
const OFFSET_RAW: u32 = 3;

pub mod v1 {
    use std::io::{Read, Write};

    use super::{WavePacket, OFFSET_CONTIGUOUS, OFFSET_DELTA, OFFSET_RAW, OFFSET_SAME};
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::integer::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::models::SymbolModel;
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor, NUM_CONTEXTS};
    use crate::{PczipError, Result};

    struct WavePacketContext {
        last: WavePacket,
        last_offset_diff: i32,
        offset_changed: bool,
        size_changed: bool,
        packet_index_model: SymbolModel,
        // one selector model per offset history bit
        offset_selector_models: Vec<SymbolModel>,
        ic_offset: IntegerCompressor,
        ic_size: IntegerCompressor,
        ic_return_point: IntegerCompressor,
    }

    impl WavePacketContext {
        fn from_seed(seed: WavePacket) -> Self {
            Self {
                last: seed,
                last_offset_diff: 0,
                offset_changed: false,
                size_changed: false,
                packet_index_model: SymbolModel::new(256),
                offset_selector_models: (0..2).map(|_| SymbolModel::new(4)).collect(),
                ic_offset: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_size: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(2)
                    .build_initialized(),
                ic_return_point: IntegerCompressorBuilder::new()
                    .bits(32)
                    .contexts(3)
                    .build_initialized(),
            }
        }
    }

    pub struct WavePacketCompressor {
        contexts: [Option<WavePacketContext>; NUM_CONTEXTS],
    }

    impl WavePacketCompressor {
        pub fn new() -> Self {
            Self {
                contexts: Default::default(),
            }
        }
    }

    impl Default for WavePacketCompressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<W: Write> FieldCompressor<W> for WavePacketCompressor {
        fn size_of_field(&self) -> usize {
            WavePacket::SIZE
        }

        fn seed_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
            context: usize,
        ) -> Result<()> {
            for &byte in buf {
                encoder.write_byte(byte)?;
            }
            self.contexts[context] = Some(WavePacketContext::from_seed(WavePacket::unpack_from(
                buf,
            )));
            Ok(())
        }

        fn compress_with(
            &mut self,
            encoder: &mut ArithmeticEncoder<W>,
            buf: &[u8],
            context: usize,
        ) -> Result<()> {
            let ctx = self.contexts[context]
                .as_mut()
                .ok_or(PczipError::UninitializedContext(context))?;
            let current = WavePacket::unpack_from(buf);

            encoder.encode_symbol(
                &mut ctx.packet_index_model,
                u32::from(current.packet_index),
            )?;

            let history = ctx.offset_changed as usize;
            let offset_diff = i64::from(current.offset) - i64::from(ctx.last.offset);
            let selector = if offset_diff == 0 {
                OFFSET_SAME
            } else if current.offset == ctx.last.offset.wrapping_add(ctx.last.size) {
                OFFSET_CONTIGUOUS
            } else if offset_diff == i64::from(offset_diff as i32) {
                OFFSET_DELTA
            } else {
                OFFSET_RAW
            };
            encoder.encode_symbol(&mut ctx.offset_selector_models[history], selector)?;
            match selector {
                OFFSET_DELTA => {
                    ctx.ic_offset.compress(
                        encoder,
                        ctx.last_offset_diff,
                        offset_diff as i32,
                        history as u32,
                    )?;
                    ctx.last_offset_diff = offset_diff as i32;
                }
                OFFSET_RAW => {
                    encoder.write_int(current.offset)?;
                }
                _ => {}
            }
            ctx.offset_changed = current.offset != ctx.last.offset;

            let size_history = ctx.size_changed as u32;
            ctx.ic_size.compress(
                encoder,
                ctx.last.size as i32,
                current.size as i32,
                size_history,
            )?;
            ctx.size_changed = current.size != ctx.last.size;

            for axis in 0..3 {
                ctx.ic_return_point.compress(
                    encoder,
                    ctx.last.return_point[axis].to_bits() as i32,
                    current.return_point[axis].to_bits() as i32,
                    axis as u32,
                )?;
            }

            ctx.last = current;
            Ok(())
        }
    }

    pub struct WavePacketDecompressor {
        contexts: [Option<WavePacketContext>; NUM_CONTEXTS],
    }

    impl WavePacketDecompressor {
        pub fn new() -> Self {
            Self {
                contexts: Default::default(),
            }
        }
    }

    impl Default for WavePacketDecompressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<R: Read> FieldDecompressor<R> for WavePacketDecompressor {
        fn size_of_field(&self) -> usize {
            WavePacket::SIZE
        }

        fn seed_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
            context: usize,
        ) -> Result<()> {
            for byte in buf.iter_mut() {
                *byte = decoder.read_byte()?;
            }
            self.contexts[context] = Some(WavePacketContext::from_seed(WavePacket::unpack_from(
                buf,
            )));
            Ok(())
        }

        fn decompress_with(
            &mut self,
            decoder: &mut ArithmeticDecoder<R>,
            buf: &mut [u8],
            context: usize,
        ) -> Result<()> {
            let ctx = self.contexts[context]
                .as_mut()
                .ok_or(PczipError::UninitializedContext(context))?;

            let packet_index = decoder.decode_symbol(&mut ctx.packet_index_model)? as u8;

            let history = ctx.offset_changed as usize;
            let selector = decoder.decode_symbol(&mut ctx.offset_selector_models[history])?;
            let offset = match selector {
                OFFSET_SAME => ctx.last.offset,
                OFFSET_CONTIGUOUS => ctx.last.offset.wrapping_add(ctx.last.size),
                OFFSET_DELTA => {
                    let diff =
                        ctx.ic_offset
                            .decompress(decoder, ctx.last_offset_diff, history as u32)?;
                    ctx.last_offset_diff = diff;
                    (i64::from(ctx.last.offset) + i64::from(diff)) as u32
                }
                _ => decoder.read_int()?,
            };
            ctx.offset_changed = offset != ctx.last.offset;

            let size_history = ctx.size_changed as u32;
            let size =
                ctx.ic_size
                    .decompress(decoder, ctx.last.size as i32, size_history)? as u32;
            ctx.size_changed = size != ctx.last.size;

            let mut return_point = [0f32; 3];
            for axis in 0..3 {
                let bits = ctx.ic_return_point.decompress(
                    decoder,
                    ctx.last.return_point[axis].to_bits() as i32,
                    axis as u32,
                )?;
                return_point[axis] = f32::from_bits(bits as u32);
            }

            let current = WavePacket {
                packet_index,
                offset,
                size,
                return_point,
            };
            current.pack_into(buf);
            ctx.last = current;
            Ok(())
        }
    }
}

// the wavepacket protocol did not change between revisions
pub use v1 as v2;
