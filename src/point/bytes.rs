//! Codec for records made of opaque raw octets.
//!
//! Every byte position gets its own adaptive model coding the wrapping
//! difference against the previous record of the same context. There is
//! no bytes-used mask here: an unchanged byte is a difference of 0, which
//! a skewed model makes nearly free anyway.

pub mod v1 {
    use std::io::{Read, Write};

    use crate::decoders::ArithmeticDecoder;
    use crate::encoders::ArithmeticEncoder;
    use crate::models::SymbolModel;
    use crate::record::{FieldCompressor, FieldDecompressor, NUM_CONTEXTS};
    use crate::{PczipError, Result};

    struct BytesContext {
        last: Vec<u8>,
        diff_models: Vec<SymbolModel>,
    }

    impl BytesContext {
        fn from_seed(seed: &[u8]) -> Self {
            Self {
                last: seed.to_vec(),
                diff_models: (0..seed.len()).map(|_| SymbolModel::new(256)).collect(),
            }
        }
    }

    pub struct BytesCompressor {
        count: usize,
        contexts: [Option<BytesContext>; NUM_CONTEXTS],
    }

    impl BytesCompressor {
        pub fn new(count: usize) -> Self {
            Self {
                count,
                contexts: Default::default(),
            }
        }
    }

    impl<W: Write> FieldCompressor<W> for BytesCompressor {
        fn size_of_field(&self) -> usize {
            self.count
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
            self.contexts[context] = Some(BytesContext::from_seed(buf));
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
            for (i, (&byte, last)) in buf.iter().zip(ctx.last.iter_mut()).enumerate() {
                let diff = byte.wrapping_sub(*last);
                encoder.encode_symbol(&mut ctx.diff_models[i], u32::from(diff))?;
                *last = byte;
            }
            Ok(())
        }
    }

    pub struct BytesDecompressor {
        count: usize,
        contexts: [Option<BytesContext>; NUM_CONTEXTS],
    }

    impl BytesDecompressor {
        pub fn new(count: usize) -> Self {
            Self {
                count,
                contexts: Default::default(),
            }
        }
    }

    impl<R: Read> FieldDecompressor<R> for BytesDecompressor {
        fn size_of_field(&self) -> usize {
            self.count
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
            self.contexts[context] = Some(BytesContext::from_seed(buf));
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
            for (i, (byte, last)) in buf.iter_mut().zip(ctx.last.iter_mut()).enumerate() {
                let diff = decoder.decode_symbol(&mut ctx.diff_models[i])? as u8;
                *byte = last.wrapping_add(diff);
                *last = *byte;
            }
            Ok(())
        }
    }
}

// the bytes protocol did not change between revisions
pub use v1 as v2;
