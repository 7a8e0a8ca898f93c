/*
===============================================================================

  CONTENTS:
    Adaptive compressor for bounded integer correctors

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

use std::io::{Read, Write};

use crate::decoders::ArithmeticDecoder;
use crate::encoders::ArithmeticEncoder;
use crate::models::{BitModel, SymbolModel};

const DEFAULT_BITS: u32 = 16;
const DEFAULT_CONTEXTS: u32 = 1;
const DEFAULT_BITS_HIGH: u32 = 8;
const DEFAULT_RANGE: u32 = 0;

/// Adaptive coder for bounded integer deltas.
///
/// A value is coded as a corrector against a prediction: first the index
/// `k` of the tightest interval `[-(2^k - 1), 2^k]` containing the
/// corrector, through a per-context model, then the corrector's position
/// inside that interval. Positions wider than `bits_high` bits split into
/// a modelled high part and raw low bits.
///
/// One instance must drive either compression or decompression of a
/// stream, never both: each call updates the model statistics and both
/// sides must see the same sequence.
#[derive(Debug)]
pub struct IntegerCompressor {
    k: u32,

    contexts: u32,
    bits_high: u32,

    corr_bits: u32,
    corr_range: u32,
    corr_min: i32,
    corr_max: i32,

    interval_models: Vec<SymbolModel>,
    corrector_0: BitModel,
    corrector_models: Vec<SymbolModel>,
}

impl IntegerCompressor {
    pub fn new(bits: u32, contexts: u32, bits_high: u32, mut range: u32) -> Self {
        let mut corr_bits: u32;
        let corr_range: u32;
        let corr_min: i32;
        let corr_max: i32;

        if range != 0 {
            corr_bits = 0;
            corr_range = range;
            while range != 0 {
                range >>= 1;
                corr_bits += 1;
            }
            if corr_range == (1u32 << (corr_bits - 1)) {
                corr_bits -= 1;
            }
            corr_min = -((corr_range / 2) as i32);
            corr_max = corr_min + (corr_range - 1) as i32;
        } else if bits >= 1 && bits < 32 {
            corr_bits = bits;
            corr_range = 1u32 << bits;
            corr_min = -((corr_range / 2) as i32);
            corr_max = corr_min + (corr_range - 1) as i32;
        } else {
            // the corrector spans the whole i32 range, no folding
            corr_bits = 32;
            corr_range = 0;
            corr_min = std::i32::MIN;
            corr_max = std::i32::MAX;
        }

        Self {
            k: 0,
            contexts,
            bits_high,
            corr_bits,
            corr_range,
            corr_min,
            corr_max,
            interval_models: vec![],
            corrector_0: BitModel::new(),
            corrector_models: vec![],
        }
    }

    pub fn init(&mut self) {
        if self.interval_models.is_empty() {
            for _ in 0..self.contexts {
                self.interval_models.push(SymbolModel::new(self.corr_bits + 1));
            }
            for i in 1..=self.corr_bits {
                let symbols = if i <= self.bits_high {
                    1 << i
                } else {
                    1 << self.bits_high
                };
                self.corrector_models.push(SymbolModel::new(symbols));
            }
        }
    }

    pub fn compress<W: Write>(
        &mut self,
        encoder: &mut ArithmeticEncoder<W>,
        pred: i32,
        real: i32,
        context: u32,
    ) -> std::io::Result<()> {
        // fold the corrector into [corr_min, corr_max]
        let mut corr = real.wrapping_sub(pred);
        if corr < self.corr_min {
            corr += self.corr_range as i32;
        } else if corr > self.corr_max {
            corr -= self.corr_range as i32;
        }

        // tightest interval [-(2^k - 1), 2^k] containing the corrector,
        // adjusting for c == 2^k sitting at the top of the interval
        let mut c = corr;
        self.k = 0;
        let mut c1 = if c <= 0 { c.wrapping_neg() } else { c - 1 } as u32;
        while c1 != 0 {
            c1 >>= 1;
            self.k += 1;
        }

        encoder.encode_symbol(&mut self.interval_models[context as usize], self.k)?;

        if self.k != 0 {
            debug_assert!(c != 0 && c != 1);
            if self.k < 32 {
                // translate c into the k-bit interval [0, 2^k - 1]
                if c >= 0 {
                    c -= 1;
                } else {
                    c += ((1u32 << self.k) - 1) as i32;
                }

                if self.k <= self.bits_high {
                    encoder
                        .encode_symbol(&mut self.corrector_models[(self.k - 1) as usize], c as u32)?;
                } else {
                    // modelled high bits, raw low bits
                    let k1 = self.k - self.bits_high;
                    let low = (c & ((1u32 << k1) - 1) as i32) as u32;
                    c >>= k1 as i32;
                    encoder
                        .encode_symbol(&mut self.corrector_models[(self.k - 1) as usize], c as u32)?;
                    encoder.write_bits(k1, low)?;
                }
            }
        } else {
            debug_assert!(c == 0 || c == 1);
            encoder.encode_bit(&mut self.corrector_0, c as u32)?;
        }
        Ok(())
    }

    pub fn decompress<R: Read>(
        &mut self,
        decoder: &mut ArithmeticDecoder<R>,
        pred: i32,
        context: u32,
    ) -> std::io::Result<i32> {
        self.k = decoder.decode_symbol(&mut self.interval_models[context as usize])?;

        let corr: i32 = if self.k != 0 {
            if self.k < 32 {
                let mut c;
                if self.k <= self.bits_high {
                    c = decoder.decode_symbol(&mut self.corrector_models[(self.k - 1) as usize])?
                        as i32;
                } else {
                    let k1 = self.k - self.bits_high;
                    c = decoder.decode_symbol(&mut self.corrector_models[(self.k - 1) as usize])?
                        as i32;
                    let low = decoder.read_bits(k1)?;
                    c = (c << k1 as i32) | low as i32;
                }
                // translate c back out of the k-bit interval
                if c >= (1u32 << (self.k - 1)) as i32 {
                    c + 1
                } else {
                    c - ((1u32 << self.k) - 1) as i32
                }
            } else {
                self.corr_min
            }
        } else {
            decoder.decode_bit(&mut self.corrector_0)? as i32
        };

        let mut real = pred.wrapping_add(corr);
        if real < 0 {
            real += self.corr_range as i32;
        } else if real >= self.corr_range as i32 {
            real -= self.corr_range as i32;
        }
        Ok(real)
    }
}

pub struct IntegerCompressorBuilder {
    bits: u32,
    contexts: u32,
    bits_high: u32,
    range: u32,
}

impl IntegerCompressorBuilder {
    pub fn new() -> Self {
        Self {
            bits: DEFAULT_BITS,
            contexts: DEFAULT_CONTEXTS,
            bits_high: DEFAULT_BITS_HIGH,
            range: DEFAULT_RANGE,
        }
    }

    pub fn bits(&mut self, bits: u32) -> &mut Self {
        self.bits = bits;
        self
    }

    pub fn contexts(&mut self, contexts: u32) -> &mut Self {
        self.contexts = contexts;
        self
    }

    pub fn build(&self) -> IntegerCompressor {
        IntegerCompressor::new(self.bits, self.contexts, self.bits_high, self.range)
    }

    pub fn build_initialized(&self) -> IntegerCompressor {
        let mut ic = self.build();
        ic.init();
        ic
    }
}

impl Default for IntegerCompressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
