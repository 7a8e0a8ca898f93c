/*
===============================================================================

  CONTENTS:
    Arithmetic encoder, after the FastAC coder of Amir Said & William A.
    Pearlman ("Introduction to Arithmetic Coding Theory and Practice",
    HP Labs report HPL-2004-76): 32-bit base/length, 32-bit products,
    periodic model updates.

  PROGRAMMERS:
    martin.isenburg@rapidlasso.com  -  http://rapidlasso.com
    uday.karan@gmail.com - Hobu, Inc.

  COPYRIGHT:
    (c) 2007-2014, martin isenburg, rapidlasso - tools to catch reality
    (c) 2014, Uday Verma, Hobu, Inc.

    This is free software; you can redistribute and/or modify it under the
    terms of the GNU Lesser General Licence as published by the Free Software
    Foundation.

    This software is distributed WITHOUT ANY WARRANTY and without even the
    implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.

===============================================================================
*/

use std::io::Write;

use crate::decoders::{AC_MAX_LENGTH, AC_MIN_LENGTH};
use crate::models::{BitModel, SymbolModel, BIT_MODEL_LENGTH_SHIFT, MODEL_LENGTH_SHIFT};

/// Arithmetic encoder writing one chunk's worth of entropy-coded bytes.
///
/// Output bytes are held back until [`done`] because a carry can still
/// ripple into bytes that were renormalized out of the 32-bit base.
/// Chunks are bounded, so holding them in memory is fine and keeps the
/// carry propagation a plain backward walk over the buffer.
///
/// [`done`]: ArithmeticEncoder::done
pub struct ArithmeticEncoder<W: Write> {
    /// renormalized bytes of the chunk being encoded, not yet flushed
    pending: Vec<u8>,
    base: u32,
    length: u32,
    dest: W,
}

impl<W: Write> ArithmeticEncoder<W> {
    pub fn new(dest: W) -> Self {
        Self {
            pending: Vec::new(),
            base: 0,
            length: AC_MAX_LENGTH,
            dest,
        }
    }

    /// Makes the encoder ready to encode a new independent chunk.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.base = 0;
        self.length = AC_MAX_LENGTH;
    }

    /// Terminates the bitstream and flushes it to the destination.
    ///
    /// The tail is padded so that a decoder can always pull its 4
    /// initialization bytes plus any renormalization reads without
    /// running off the chunk.
    pub fn done(&mut self) -> std::io::Result<()> {
        let init_base = self.base;
        let another_byte;

        if self.length > 2 * AC_MIN_LENGTH {
            self.base = self.base.wrapping_add(AC_MIN_LENGTH);
            self.length = AC_MIN_LENGTH >> 1;
            another_byte = true;
        } else {
            self.base = self.base.wrapping_add(AC_MIN_LENGTH >> 1);
            self.length = AC_MIN_LENGTH >> 9;
            another_byte = false;
        }

        if init_base > self.base {
            self.propagate_carry();
        }
        self.renorm_interval();

        self.dest.write_all(&self.pending)?;
        self.pending.clear();
        self.dest.write_all(&[0u8, 0u8])?;
        if another_byte {
            self.dest.write_all(&[0u8])?;
        }
        Ok(())
    }

    pub fn encode_bit(&mut self, model: &mut BitModel, sym: u32) -> std::io::Result<()> {
        debug_assert!(sym <= 1);
        // product l x p0
        let x = model.bit_0_prob * (self.length >> BIT_MODEL_LENGTH_SHIFT);

        if sym == 0 {
            self.length = x;
            model.bit_0_count += 1;
        } else {
            let init_base = self.base;
            self.base = self.base.wrapping_add(x);
            self.length -= x;
            if init_base > self.base {
                self.propagate_carry();
            }
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval();
        }

        model.bits_until_update -= 1;
        if model.bits_until_update == 0 {
            model.update();
        }
        Ok(())
    }

    pub fn encode_symbol(&mut self, model: &mut SymbolModel, sym: u32) -> std::io::Result<()> {
        debug_assert!(sym <= model.last_symbol);
        let init_base = self.base;

        if sym == model.last_symbol {
            let x = model.distribution[sym as usize] * (self.length >> MODEL_LENGTH_SHIFT);
            self.base = self.base.wrapping_add(x);
            self.length -= x;
        } else {
            self.length >>= MODEL_LENGTH_SHIFT;
            let x = model.distribution[sym as usize] * self.length;
            self.base = self.base.wrapping_add(x);
            self.length = model.distribution[(sym + 1) as usize] * self.length - x;
        }

        if init_base > self.base {
            self.propagate_carry();
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval();
        }

        model.symbol_count[sym as usize] += 1;
        model.symbols_until_update -= 1;
        if model.symbols_until_update == 0 {
            model.update();
        }
        Ok(())
    }

    /// Encodes a bit without any modelling.
    pub fn write_bit(&mut self, sym: u32) -> std::io::Result<()> {
        debug_assert!(sym <= 1);
        let init_base = self.base;
        self.length >>= 1;
        self.base = self.base.wrapping_add(sym * self.length);

        if init_base > self.base {
            self.propagate_carry();
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval();
        }
        Ok(())
    }

    /// Encodes the lowest `bits` bits of `sym` without any modelling.
    pub fn write_bits(&mut self, mut bits: u32, mut sym: u32) -> std::io::Result<()> {
        debug_assert!(bits >= 1 && bits <= 32);
        debug_assert!(bits == 32 || sym < (1u32 << bits));

        if bits > 19 {
            self.write_short((sym & 0xFFFF) as u16)?;
            sym >>= 16;
            bits -= 16;
        }

        let init_base = self.base;
        self.length >>= bits;
        self.base = self.base.wrapping_add(sym * self.length);

        if init_base > self.base {
            self.propagate_carry();
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval();
        }
        Ok(())
    }

    pub fn write_byte(&mut self, sym: u8) -> std::io::Result<()> {
        let init_base = self.base;
        self.length >>= 8;
        self.base = self.base.wrapping_add(u32::from(sym) * self.length);

        if init_base > self.base {
            self.propagate_carry();
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval();
        }
        Ok(())
    }

    pub fn write_short(&mut self, sym: u16) -> std::io::Result<()> {
        let init_base = self.base;
        self.length >>= 16;
        self.base = self.base.wrapping_add(u32::from(sym) * self.length);

        if init_base > self.base {
            self.propagate_carry();
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval();
        }
        Ok(())
    }

    pub fn write_int(&mut self, sym: u32) -> std::io::Result<()> {
        self.write_short((sym & 0xFFFF) as u16)?;
        self.write_short((sym >> 16) as u16)
    }

    pub fn dest_mut(&mut self) -> &mut W {
        &mut self.dest
    }

    pub fn into_dest(self) -> W {
        self.dest
    }

    fn propagate_carry(&mut self) {
        for byte in self.pending.iter_mut().rev() {
            if *byte == 0xFF {
                *byte = 0;
            } else {
                *byte += 1;
                return;
            }
        }
        debug_assert!(false, "carry propagated past the start of the chunk");
    }

    fn renorm_interval(&mut self) {
        loop {
            self.pending.push((self.base >> 24) as u8);
            self.base <<= 8;
            self.length <<= 8;
            if self.length >= AC_MIN_LENGTH {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_stream_flushes_four_bytes() {
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        encoder.done().unwrap();
        let data = encoder.into_dest().into_inner();
        assert_eq!(&data, &[1u8, 0u8, 0u8, 0u8]);
    }

    #[test]
    fn reset_discards_pending_bytes() {
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        for _ in 0..100 {
            encoder.write_byte(0xAB).unwrap();
        }
        encoder.reset();
        encoder.done().unwrap();
        let data = encoder.into_dest().into_inner();
        assert_eq!(&data, &[1u8, 0u8, 0u8, 0u8]);
    }
}
