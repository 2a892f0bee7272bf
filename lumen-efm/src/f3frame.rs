// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `f3frame` module defines the F3 frame: 588 channel bits demodulated into one subcode
//! symbol and 32 data symbols.

use crate::efmtable::EFM_CODES;

/// Number of channel bits in one F3 frame.
pub const FRAME_LENGTH_BITS: u32 = 588;

/// The 24-bit frame synchronisation pattern preceding the channel words.
pub const FRAME_SYNC: u32 = 0b1000_0000_0001_0000_0000_0010;

/// The subcode synchronisation patterns. These are channel words outside the data code table,
/// carried in the subcode position of the first two frames of each section.
pub const SYNC0: u16 = 0b00100000000001;
pub const SYNC1: u16 = 0b00000000010010;

/// Channel word to data symbol table: -1 marks words outside the code.
const EFM_DECODE: [i16; 16384] = {
    let mut table = [-1i16; 16384];
    let mut i = 0;
    while i < 256 {
        table[EFM_CODES[i] as usize] = i as i16;
        i += 1;
    }
    table
};

enum Symbol {
    Valid(u8),
    Corrected(u8),
    Invalid,
}

/// Decode one 14-bit channel word, attempting single-bit correction on words outside the code.
fn decode_channel_word(word: u16) -> Symbol {
    let value = EFM_DECODE[(word & 0x3fff) as usize];
    if value >= 0 {
        return Symbol::Valid(value as u8);
    }

    // Try every single-bit flip; accept only an unambiguous match.
    let mut candidate = -1i16;
    for bit in 0..14 {
        let value = EFM_DECODE[((word ^ (1 << bit)) & 0x3fff) as usize];
        if value >= 0 {
            if candidate >= 0 {
                return Symbol::Invalid;
            }
            candidate = value;
        }
    }

    if candidate >= 0 {
        Symbol::Corrected(candidate as u8)
    } else {
        Symbol::Invalid
    }
}

/// One demodulated F3 frame: a subcode symbol and 32 data symbols with per-symbol error flags.
#[derive(Clone, Debug, Default)]
pub struct F3Frame {
    data_symbols: [u8; 32],
    error_flags: [bool; 32],
    subcode_symbol: u8,
    is_sync0: bool,
    is_sync1: bool,
    is_first_after_sync: bool,
    valid_symbols: u32,
    invalid_symbols: u32,
    corrected_symbols: u32,
}

impl F3Frame {
    /// Demodulate a frame from its T-values.
    ///
    /// The T-values are converted to 588 channel bits (each value produces a one followed by
    /// `t - 1` zeros); short frames are zero padded and long frames truncated. The frame sync
    /// (24 + 3 bits) is skipped, then 33 channel words of 14 + 3 bits are decoded.
    pub fn from_t_values(t_values: &[u8]) -> F3Frame {
        // Unpack the T-values into a bit buffer.
        let mut bits = [0u8; FRAME_LENGTH_BITS as usize];
        let mut position = 0;

        for &t in t_values {
            if position >= bits.len() {
                break;
            }
            bits[position] = 1;
            position += t as usize;
        }

        let get_word = |start: usize, width: usize| -> u32 {
            let mut word = 0u32;
            for bit in 0..width {
                word <<= 1;
                if start + bit < bits.len() {
                    word |= u32::from(bits[start + bit]);
                }
            }
            word
        };

        let mut frame = F3Frame::default();

        // Skip the frame sync pattern and its merging bits, then decode the 33 channel words.
        let mut position = 24 + 3;

        for symbol in 0..33 {
            let word = get_word(position, 14) as u16;
            position += 14 + 3;

            if symbol == 0 {
                // The first channel word is the subcode symbol, which may instead carry one of
                // the out-of-code section sync patterns.
                if word == SYNC0 {
                    frame.is_sync0 = true;
                } else if word == SYNC1 {
                    frame.is_sync1 = true;
                } else {
                    match decode_channel_word(word) {
                        Symbol::Valid(value) => frame.subcode_symbol = value,
                        Symbol::Corrected(value) => frame.subcode_symbol = value,
                        Symbol::Invalid => frame.subcode_symbol = 0,
                    }
                }
                continue;
            }

            match decode_channel_word(word) {
                Symbol::Valid(value) => {
                    frame.data_symbols[symbol - 1] = value;
                    frame.valid_symbols += 1;
                }
                Symbol::Corrected(value) => {
                    frame.data_symbols[symbol - 1] = value;
                    frame.corrected_symbols += 1;
                }
                Symbol::Invalid => {
                    frame.data_symbols[symbol - 1] = 0;
                    frame.error_flags[symbol - 1] = true;
                    frame.invalid_symbols += 1;
                }
            }
        }

        frame
    }

    pub fn data_symbols(&self) -> &[u8; 32] {
        &self.data_symbols
    }

    /// Per-symbol error flags: true marks a symbol whose channel word could not be decoded.
    pub fn error_flags(&self) -> &[bool; 32] {
        &self.error_flags
    }

    pub fn subcode_symbol(&self) -> u8 {
        self.subcode_symbol
    }

    pub fn is_subcode_sync0(&self) -> bool {
        self.is_sync0
    }

    pub fn is_subcode_sync1(&self) -> bool {
        self.is_sync1
    }

    /// True for the first frame emitted after frame sync was (re)acquired.
    pub fn is_first_after_sync(&self) -> bool {
        self.is_first_after_sync
    }

    pub(crate) fn set_first_after_sync(&mut self) {
        self.is_first_after_sync = true;
    }

    pub fn valid_symbols(&self) -> u32 {
        self.valid_symbols
    }

    pub fn invalid_symbols(&self) -> u32 {
        self.invalid_symbols
    }

    pub fn corrected_symbols(&self) -> u32 {
        self.corrected_symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efmtable::EFM_CODES;

    #[test]
    fn verify_code_table_run_lengths() {
        // Every channel word must keep the modulated signal within T3..T11: at least two and at
        // most ten zeros between ones, and no edge run longer than ten zeros.
        for (value, &code) in EFM_CODES.iter().enumerate() {
            assert_eq!(code >> 14, 0, "word {value:#x} wider than 14 bits");

            let mut previous = None;
            for bit in (0..14).rev() {
                if code & (1 << bit) == 0 {
                    continue;
                }
                let position = 13 - bit;
                if let Some(previous) = previous {
                    let gap: i32 = position - previous - 1;
                    assert!(gap >= 2 && gap <= 10, "word {value:#x} has a run of {gap} zeros");
                }
                previous = Some(position);
            }
        }
    }

    #[test]
    fn verify_code_table_uniqueness() {
        let mut seen = [false; 16384];
        for &code in EFM_CODES.iter() {
            assert!(!seen[code as usize], "duplicate channel word {code:#016b}");
            seen[code as usize] = true;
        }

        // The subcode sync patterns must lie outside the data code.
        assert!(!seen[SYNC0 as usize]);
        assert!(!seen[SYNC1 as usize]);
    }

    #[test]
    fn verify_single_bit_correction() {
        let word = EFM_CODES[0x5a];

        match decode_channel_word(word) {
            Symbol::Valid(value) => assert_eq!(value, 0x5a),
            _ => panic!("clean word did not decode"),
        }

        // A single bit error that leaves exactly one codeword within Hamming distance one should
        // be corrected.
        let corrupted = EFM_CODES[0x00] ^ (1 << 7);
        match decode_channel_word(corrupted) {
            Symbol::Corrected(value) => assert_eq!(value, 0x00),
            Symbol::Valid(_) => panic!("corrupted word decoded as clean"),
            Symbol::Invalid => panic!("single bit error not corrected"),
        }
    }
}
