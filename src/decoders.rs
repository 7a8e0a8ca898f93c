/*
===============================================================================

  CONTENTS:
    Arithmetic decoder, after the FastAC coder of Amir Said & William A.
    Pearlman ("Introduction to Arithmetic Coding Theory and Practice",
    HP Labs report HPL-2004-76): 32-bit value/length, 32-bit products,
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

use std::io::Read;

use byteorder::ReadBytesExt;

use crate::models::{BitModel, SymbolModel, BIT_MODEL_LENGTH_SHIFT, MODEL_LENGTH_SHIFT};

pub const AC_MAX_LENGTH: u32 = 0xFFFF_FFFF;
// renormalization threshold
pub const AC_MIN_LENGTH: u32 = 0x0100_0000;

/// Arithmetic decoder, the mirror of [`crate::encoders::ArithmeticEncoder`].
///
/// Bytes are pulled from the source lazily, one at a time, on
/// renormalization. [`read_init_bytes`] must be called once per chunk
/// before anything is decoded.
///
/// [`read_init_bytes`]: ArithmeticDecoder::read_init_bytes
pub struct ArithmeticDecoder<R: Read> {
    source: R,
    value: u32,
    length: u32,
}

impl<R: Read> ArithmeticDecoder<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            value: 0,
            length: AC_MAX_LENGTH,
        }
    }

    /// Makes the decoder ready to decode a new independent chunk.
    pub fn reset(&mut self) {
        self.value = 0;
        self.length = AC_MAX_LENGTH;
    }

    /// Loads the 4 bytes the interval arithmetic starts from.
    pub fn read_init_bytes(&mut self) -> std::io::Result<()> {
        let mut bytes = [0u8; 4];
        self.source.read_exact(&mut bytes)?;
        self.value = u32::from_be_bytes(bytes);
        Ok(())
    }

    pub fn decode_bit(&mut self, model: &mut BitModel) -> std::io::Result<u32> {
        // product l x p0
        let x = model.bit_0_prob * (self.length >> BIT_MODEL_LENGTH_SHIFT);
        let sym = self.value >= x;

        if !sym {
            self.length = x;
            model.bit_0_count += 1;
        } else {
            self.value -= x;
            self.length -= x;
        }
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval()?;
        }

        model.bits_until_update -= 1;
        if model.bits_until_update == 0 {
            model.update();
        }
        Ok(sym as u32)
    }

    /// Decodes one symbol by bisecting the model's cumulative distribution.
    pub fn decode_symbol(&mut self, model: &mut SymbolModel) -> std::io::Result<u32> {
        let mut sym = 0u32;
        let mut x = 0u32;
        let mut y = self.length;

        self.length >>= MODEL_LENGTH_SHIFT;
        let mut n = model.symbols;
        let mut k = n >> 1;
        loop {
            let z = self.length * model.distribution[k as usize];
            if z > self.value {
                n = k;
                y = z;
            } else {
                sym = k;
                x = z;
            }
            k = (sym + n) >> 1;
            if k == sym {
                break;
            }
        }

        self.value -= x;
        self.length = y - x;
        if self.length < AC_MIN_LENGTH {
            self.renorm_interval()?;
        }

        model.symbol_count[sym as usize] += 1;
        model.symbols_until_update -= 1;
        if model.symbols_until_update == 0 {
            model.update();
        }
        Ok(sym)
    }

    pub fn read_bit(&mut self) -> std::io::Result<u32> {
        self.length >>= 1;
        let sym = self.value / self.length;
        self.value -= self.length * sym;

        if self.length < AC_MIN_LENGTH {
            self.renorm_interval()?;
        }
        Ok(sym)
    }

    pub fn read_bits(&mut self, mut bits: u32) -> std::io::Result<u32> {
        debug_assert!(bits >= 1 && bits <= 32);
        if bits > 19 {
            let low = u32::from(self.read_short()?);
            bits -= 16;
            let high = self.read_bits(bits)? << 16;
            Ok(high | low)
        } else {
            self.length >>= bits;
            let sym = self.value / self.length;
            self.value -= self.length * sym;

            if self.length < AC_MIN_LENGTH {
                self.renorm_interval()?;
            }
            Ok(sym)
        }
    }

    pub fn read_byte(&mut self) -> std::io::Result<u8> {
        self.length >>= 8;
        let sym = self.value / self.length;
        self.value -= self.length * sym;

        if self.length < AC_MIN_LENGTH {
            self.renorm_interval()?;
        }
        debug_assert!(sym < (1 << 8));
        Ok(sym as u8)
    }

    pub fn read_short(&mut self) -> std::io::Result<u16> {
        self.length >>= 16;
        let sym = self.value / self.length;
        self.value -= self.length * sym;

        if self.length < AC_MIN_LENGTH {
            self.renorm_interval()?;
        }
        debug_assert!(sym < (1 << 16));
        Ok(sym as u16)
    }

    pub fn read_int(&mut self) -> std::io::Result<u32> {
        let low = u32::from(self.read_short()?);
        let high = u32::from(self.read_short()?);
        Ok((high << 16) | low)
    }

    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_source(self) -> R {
        self.source
    }

    fn renorm_interval(&mut self) -> std::io::Result<()> {
        loop {
            self.value = (self.value << 8) | u32::from(self.source.read_u8()?);
            self.length <<= 8;
            if self.length >= AC_MIN_LENGTH {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::ArithmeticEncoder;
    use std::io::Cursor;

    #[test]
    fn raw_bits_round_trip() {
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        encoder.write_bits(7, 0x5A).unwrap();
        encoder.write_byte(0xC3).unwrap();
        encoder.write_short(0xBEEF).unwrap();
        encoder.write_int(0xDEAD_BEEF).unwrap();
        encoder.write_bit(1).unwrap();
        encoder.done().unwrap();

        let mut data = encoder.into_dest();
        data.set_position(0);
        let mut decoder = ArithmeticDecoder::new(data);
        decoder.read_init_bytes().unwrap();
        assert_eq!(decoder.read_bits(7).unwrap(), 0x5A);
        assert_eq!(decoder.read_byte().unwrap(), 0xC3);
        assert_eq!(decoder.read_short().unwrap(), 0xBEEF);
        assert_eq!(decoder.read_int().unwrap(), 0xDEAD_BEEF);
        assert_eq!(decoder.read_bit().unwrap(), 1);
    }

    #[test]
    fn modelled_symbols_round_trip() {
        let symbols = [0u32, 3, 3, 3, 1, 0, 2, 3, 3, 3, 3, 0, 1, 2, 3];
        let mut encoder = ArithmeticEncoder::new(Cursor::new(Vec::<u8>::new()));
        let mut model = SymbolModel::new(4);
        let mut bit_model = BitModel::new();
        for &sym in &symbols {
            encoder.encode_symbol(&mut model, sym).unwrap();
            encoder.encode_bit(&mut bit_model, sym & 1).unwrap();
        }
        encoder.done().unwrap();

        let mut data = encoder.into_dest();
        data.set_position(0);
        let mut decoder = ArithmeticDecoder::new(data);
        decoder.read_init_bytes().unwrap();
        let mut model = SymbolModel::new(4);
        let mut bit_model = BitModel::new();
        for &sym in &symbols {
            assert_eq!(decoder.decode_symbol(&mut model).unwrap(), sym);
            assert_eq!(decoder.decode_bit(&mut bit_model).unwrap(), sym & 1);
        }
    }
}
