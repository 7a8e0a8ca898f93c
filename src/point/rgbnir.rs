//! Codec for color + near-infrared records.
//!
//! Both compressed revisions open with a single "bytes used" symbol, a
//! bitmask saying which of the 8 bytes of the record changed since the
//! previous record of the same context. Runs of identical colors, by far
//! the common case along a scan line, thus cost one heavily skewed symbol
//! per record. Only the changed bytes are coded, in the fixed order
//! R-low, R-high, G-low, G-high, B-low, B-high, NIR-low, NIR-high.

use crate::packers::Packable;
use crate::point::utils::{lower_byte, u16_from_bytes, upper_byte};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RgbNir {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub nir: u16,
}

impl RgbNir {
    pub const SIZE: usize = 8;

    fn bytes(&self) -> [u8; 8] {
        [
            lower_byte(self.red),
            upper_byte(self.red),
            lower_byte(self.green),
            upper_byte(self.green),
            lower_byte(self.blue),
            upper_byte(self.blue),
            lower_byte(self.nir),
            upper_byte(self.nir),
        ]
    }

    fn from_bytes(bytes: [u8; 8]) -> Self {
        Self {
            red: u16_from_bytes(bytes[0], bytes[1]),
            green: u16_from_bytes(bytes[2], bytes[3]),
            blue: u16_from_bytes(bytes[4], bytes[5]),
            nir: u16_from_bytes(bytes[6], bytes[7]),
        }
    }
}

impl Packable for RgbNir {
    fn unpack_from(input: &[u8]) -> Self {
        Self {
            red: u16::unpack_from(&input[0..2]),
            green: u16::unpack_from(&input[2..4]),
            blue: u16::unpack_from(&input[4..6]),
            nir: u16::unpack_from(&input[6..8]),
        }
    }

    fn pack_into(&self, output: &mut [u8]) {
        self.red.pack_into(&mut output[0..2]);
        self.green.pack_into(&mut output[2..4]);
        self.blue.pack_into(&mut output[4..6]);
        self.nir.pack_into(&mut output[6..8]);
    }
}

/// Bitmask over the 8 byte positions of a record, bit i set when byte i
/// differs from the previous record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct ChangedBytes {
    mask: u8,
}

impl ChangedBytes {
    pub(crate) fn between(current: &RgbNir, last: &RgbNir) -> Self {
        let current = current.bytes();
        let last = last.bytes();
        let mut mask = 0u8;
        for i in 0..8 {
            if current[i] != last[i] {
                mask |= 1 << i;
            }
        }
        Self { mask }
    }

    pub(crate) fn from_mask(mask: u8) -> Self {
        Self { mask }
    }

    pub(crate) fn mask(&self) -> u8 {
        self.mask
    }

    pub(crate) fn bit(&self, position: usize) -> bool {
        (self.mask >> position) & 1 != 0
    }
}

/// Older revision: changed bytes go through one 8-bit integer compressor
/// with one sub-context per byte position, predicting from the previous
/// byte.
pub mod v1 {
    use std::io::{Read, Write};

    use super::{ChangedBytes, RgbNir};
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::integer::{IntegerCompressor, IntegerCompressorBuilder};
    use crate::models::SymbolModel;
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor, NUM_CONTEXTS};
    use crate::{PczipError, Result};

    struct RgbNirContext {
        last: RgbNir,
        bytes_used_model: SymbolModel,
        ic_byte: IntegerCompressor,
    }

    impl RgbNirContext {
        fn from_seed(seed: RgbNir) -> Self {
            Self {
                last: seed,
                bytes_used_model: SymbolModel::new(256),
                ic_byte: IntegerCompressorBuilder::new()
                    .bits(8)
                    .contexts(8)
                    .build_initialized(),
            }
        }
    }

    pub struct RgbNirCompressor {
        contexts: [Option<RgbNirContext>; NUM_CONTEXTS],
    }

    impl RgbNirCompressor {
        pub fn new() -> Self {
            Self {
                contexts: Default::default(),
            }
        }
    }

    impl Default for RgbNirCompressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<W: Write> FieldCompressor<W> for RgbNirCompressor {
        fn size_of_field(&self) -> usize {
            RgbNir::SIZE
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
            self.contexts[context] = Some(RgbNirContext::from_seed(RgbNir::unpack_from(buf)));
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
            let current = RgbNir::unpack_from(buf);
            let changed = ChangedBytes::between(&current, &ctx.last);
            encoder.encode_symbol(&mut ctx.bytes_used_model, u32::from(changed.mask()))?;

            let current_bytes = current.bytes();
            let last_bytes = ctx.last.bytes();
            for i in 0..8 {
                if changed.bit(i) {
                    ctx.ic_byte.compress(
                        encoder,
                        i32::from(last_bytes[i]),
                        i32::from(current_bytes[i]),
                        i as u32,
                    )?;
                }
            }
            ctx.last = current;
            Ok(())
        }
    }

    pub struct RgbNirDecompressor {
        contexts: [Option<RgbNirContext>; NUM_CONTEXTS],
    }

    impl RgbNirDecompressor {
        pub fn new() -> Self {
            Self {
                contexts: Default::default(),
            }
        }
    }

    impl Default for RgbNirDecompressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<R: Read> FieldDecompressor<R> for RgbNirDecompressor {
        fn size_of_field(&self) -> usize {
            RgbNir::SIZE
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
            self.contexts[context] = Some(RgbNirContext::from_seed(RgbNir::unpack_from(buf)));
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
            let changed =
                ChangedBytes::from_mask(decoder.decode_symbol(&mut ctx.bytes_used_model)? as u8);

            let mut bytes = ctx.last.bytes();
            for i in 0..8 {
                if changed.bit(i) {
                    bytes[i] =
                        ctx.ic_byte
                            .decompress(decoder, i32::from(bytes[i]), i as u32)? as u8;
                }
            }
            let current = RgbNir::from_bytes(bytes);
            current.pack_into(buf);
            ctx.last = current;
            Ok(())
        }
    }
}

/// Current revision: changed bytes are coded as wrapping differences
/// through one adaptive model per byte position.
pub mod v2 {
    use std::io::{Read, Write};

    use super::{ChangedBytes, RgbNir};
    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::models::SymbolModel;
    use crate::packers::Packable;
    use crate::record::{FieldCompressor, FieldDecompressor, NUM_CONTEXTS};
    use crate::{PczipError, Result};

    struct RgbNirContext {
        last: RgbNir,
        bytes_used_model: SymbolModel,
        rgb_diff_models: Vec<SymbolModel>,
        nir_diff_models: Vec<SymbolModel>,
    }

    impl RgbNirContext {
        fn from_seed(seed: RgbNir) -> Self {
            Self {
                last: seed,
                bytes_used_model: SymbolModel::new(256),
                rgb_diff_models: (0..6).map(|_| SymbolModel::new(256)).collect(),
                nir_diff_models: (0..2).map(|_| SymbolModel::new(256)).collect(),
            }
        }

        fn diff_model(&mut self, position: usize) -> &mut SymbolModel {
            if position < 6 {
                &mut self.rgb_diff_models[position]
            } else {
                &mut self.nir_diff_models[position - 6]
            }
        }
    }

    pub struct RgbNirCompressor {
        contexts: [Option<RgbNirContext>; NUM_CONTEXTS],
    }

    impl RgbNirCompressor {
        pub fn new() -> Self {
            Self {
                contexts: Default::default(),
            }
        }
    }

    impl Default for RgbNirCompressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<W: Write> FieldCompressor<W> for RgbNirCompressor {
        fn size_of_field(&self) -> usize {
            RgbNir::SIZE
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
            self.contexts[context] = Some(RgbNirContext::from_seed(RgbNir::unpack_from(buf)));
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
            let current = RgbNir::unpack_from(buf);
            let changed = ChangedBytes::between(&current, &ctx.last);
            encoder.encode_symbol(&mut ctx.bytes_used_model, u32::from(changed.mask()))?;

            let current_bytes = current.bytes();
            let last_bytes = ctx.last.bytes();
            for i in 0..8 {
                if changed.bit(i) {
                    let diff = current_bytes[i].wrapping_sub(last_bytes[i]);
                    encoder.encode_symbol(ctx.diff_model(i), u32::from(diff))?;
                }
            }
            ctx.last = current;
            Ok(())
        }
    }

    pub struct RgbNirDecompressor {
        contexts: [Option<RgbNirContext>; NUM_CONTEXTS],
    }

    impl RgbNirDecompressor {
        pub fn new() -> Self {
            Self {
                contexts: Default::default(),
            }
        }
    }

    impl Default for RgbNirDecompressor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<R: Read> FieldDecompressor<R> for RgbNirDecompressor {
        fn size_of_field(&self) -> usize {
            RgbNir::SIZE
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
            self.contexts[context] = Some(RgbNirContext::from_seed(RgbNir::unpack_from(buf)));
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
            let changed =
                ChangedBytes::from_mask(decoder.decode_symbol(&mut ctx.bytes_used_model)? as u8);

            let mut bytes = ctx.last.bytes();
            for i in 0..8 {
                if changed.bit(i) {
                    let diff = decoder.decode_symbol(ctx.diff_model(i))? as u8;
                    bytes[i] = bytes[i].wrapping_add(diff);
                }
            }
            let current = RgbNir::from_bytes(bytes);
            current.pack_into(buf);
            ctx.last = current;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_bytes_flags_each_position() {
        let last = RgbNir {
            red: 0x1122,
            green: 0x3344,
            blue: 0x5566,
            nir: 0x7788,
        };
        assert_eq!(ChangedBytes::between(&last, &last).mask(), 0);

        let current = RgbNir {
            red: 0x1123,
            green: 0x3444,
            blue: 0x5566,
            nir: 0x0088,
        };
        let changed = ChangedBytes::between(&current, &last);
        assert!(changed.bit(0)); // red low
        assert!(!changed.bit(1)); // red high
        assert!(!changed.bit(2)); // green low
        assert!(changed.bit(3)); // green high
        assert!(!changed.bit(4));
        assert!(!changed.bit(5));
        assert!(!changed.bit(6)); // nir low
        assert!(changed.bit(7)); // nir high
    }

    #[test]
    fn record_packs_little_endian() {
        let record = RgbNir {
            red: 0x0102,
            green: 0x0304,
            blue: 0x0506,
            nir: 0x0708,
        };
        let mut buf = [0u8; RgbNir::SIZE];
        record.pack_into(&mut buf);
        assert_eq!(buf, [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07]);
        assert_eq!(RgbNir::unpack_from(&buf), record);
    }
}
