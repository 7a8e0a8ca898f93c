/*
===============================================================================

  CONTENTS:
    Adaptive probability models driven by the arithmetic coder

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

// number of length bits discarded before the interval multiplication
pub(crate) const MODEL_LENGTH_SHIFT: u32 = 15;
pub(crate) const MODEL_MAX_COUNT: u32 = 1 << MODEL_LENGTH_SHIFT;

pub(crate) const BIT_MODEL_LENGTH_SHIFT: u32 = 13;
pub(crate) const BIT_MODEL_MAX_COUNT: u32 = 1 << BIT_MODEL_LENGTH_SHIFT;

/// Adaptive frequency model over a small symbol alphabet.
///
/// The cumulative distribution is rebuilt on a geometric update schedule,
/// with counts halved whenever the total crosses [MODEL_MAX_COUNT].
/// The same instance must drive either encoding or decoding of one stream,
/// both sides update their statistics identically and stay in lockstep.
#[derive(Debug)]
pub struct SymbolModel {
    pub(crate) symbols: u32,
    pub(crate) distribution: Vec<u32>,
    pub(crate) symbol_count: Vec<u32>,
    pub(crate) total_count: u32,
    pub(crate) update_cycle: u32,
    pub(crate) symbols_until_update: u32,
    pub(crate) last_symbol: u32,
}

impl SymbolModel {
    pub fn new(symbols: u32) -> Self {
        assert!(
            symbols >= 2 && symbols <= (1 << 11),
            "invalid number of symbols"
        );
        let mut model = Self {
            symbols,
            distribution: vec![0u32; symbols as usize],
            symbol_count: vec![1u32; symbols as usize],
            total_count: 0,
            update_cycle: symbols,
            symbols_until_update: 0,
            last_symbol: symbols - 1,
        };
        model.update();
        // start with frequent updates while the statistics are still raw
        model.update_cycle = (symbols + 6) >> 1;
        model.symbols_until_update = model.update_cycle;
        model
    }

    pub(crate) fn update(&mut self) {
        self.total_count += self.update_cycle;
        if self.total_count > MODEL_MAX_COUNT {
            self.total_count = 0;
            for count in &mut self.symbol_count {
                *count = (*count + 1) >> 1;
                self.total_count += *count;
            }
        }

        let scale = 0x8000_0000u32 / self.total_count;
        let mut sum = 0u32;
        for (cumulative, count) in self.distribution.iter_mut().zip(&self.symbol_count) {
            *cumulative = (scale * sum) >> (31 - MODEL_LENGTH_SHIFT);
            sum += *count;
        }

        self.update_cycle = (5 * self.update_cycle) >> 2;
        let max_cycle = (self.symbols + 6) << 3;
        if self.update_cycle > max_cycle {
            self.update_cycle = max_cycle;
        }
        self.symbols_until_update = self.update_cycle;
    }
}

/// Adaptive model for a single binary decision.
#[derive(Debug)]
pub struct BitModel {
    pub(crate) bit_0_count: u32,
    pub(crate) bit_count: u32,
    pub(crate) bit_0_prob: u32,
    pub(crate) bits_until_update: u32,
    pub(crate) update_cycle: u32,
}

impl BitModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update(&mut self) {
        self.bit_count += self.update_cycle;
        if self.bit_count > BIT_MODEL_MAX_COUNT {
            self.bit_count = (self.bit_count + 1) >> 1;
            self.bit_0_count = (self.bit_0_count + 1) >> 1;
            if self.bit_0_count == self.bit_count {
                self.bit_count += 1;
            }
        }

        let scale = 0x8000_0000u32 / self.bit_count;
        self.bit_0_prob = (self.bit_0_count * scale) >> (31 - BIT_MODEL_LENGTH_SHIFT);

        self.update_cycle = (5 * self.update_cycle) >> 2;
        if self.update_cycle > 64 {
            self.update_cycle = 64;
        }
        self.bits_until_update = self.update_cycle;
    }
}

impl Default for BitModel {
    fn default() -> Self {
        // equiprobable start
        Self {
            bit_0_count: 1,
            bit_count: 2,
            bit_0_prob: 1u32 << (BIT_MODEL_LENGTH_SHIFT - 1),
            bits_until_update: 4,
            update_cycle: 4,
        }
    }
}
