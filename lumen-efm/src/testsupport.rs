// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Encoders for building test streams: the exact inverses of the EFM demodulator and the CIRC
//! decoder, used to synthesize discs with known content.

use crate::efmtable::EFM_CODES;
use crate::f3frame::{F3Frame, FRAME_LENGTH_BITS, FRAME_SYNC, SYNC0, SYNC1};
use crate::galois::fill_check_symbols;
use crate::section::q_channel_crc;
use crate::time::TrackTime;

/// The subcode position of one F3 frame.
#[derive(Clone, Copy, Debug)]
pub enum SubcodeSymbol {
    Sync0,
    Sync1,
    Data(u8),
}

pub fn int_to_bcd(value: i32) -> u8 {
    assert!(value >= 0 && value <= 99);
    (((value / 10) << 4) | (value % 10)) as u8
}

/// Append `width` bits of `value`, most significant first.
fn push_bits(bits: &mut Vec<u8>, value: u32, width: u32) {
    for bit in (0..width).rev() {
        bits.push(((value >> bit) & 1) as u8);
    }
}

fn leading_zeros(word: u16) -> usize {
    (0..14).take_while(|bit| word & (1 << (13 - bit)) == 0).count()
}

/// Append three merging bits legal between the current tail of `bits` and a pattern starting
/// with `next_leading` zeros.
///
/// Runs of ten zeros (T11) are avoided at the joins where possible, so the frame sync pattern
/// cannot occur spuriously inside a frame.
fn push_merging_bits(bits: &mut Vec<u8>, next_leading: usize) {
    let trailing = bits.iter().rev().take_while(|&&bit| bit == 0).count();

    for max_run in [9usize, 10] {
        for candidate in [[0u8, 0, 0], [1, 0, 0], [0, 1, 0], [0, 0, 1]] {
            let ok = match candidate.iter().position(|&bit| bit == 1) {
                None => trailing + 3 + next_leading <= max_run,
                Some(position) => {
                    let before = trailing + position;
                    let after = (2 - position) + next_leading;
                    before >= 2 && before <= max_run && after >= 2 && after <= max_run
                }
            };

            if ok {
                bits.extend_from_slice(&candidate);
                return;
            }
        }
    }

    panic!("no legal merging bits for trailing {trailing} / leading {next_leading}");
}

/// Encode one F3 frame's 33 channel words into T-values.
///
/// The frame's final run length assumes the next frame begins with its sync pattern, so frames
/// encoded in sequence concatenate into a continuous T-value stream.
pub fn encode_f3_frame_words(words: &[u16; 33]) -> Vec<u8> {
    let mut bits: Vec<u8> = Vec::with_capacity(FRAME_LENGTH_BITS as usize);

    push_bits(&mut bits, FRAME_SYNC, 24);

    for &word in words {
        push_merging_bits(&mut bits, leading_zeros(word));
        push_bits(&mut bits, u32::from(word), 14);
    }

    // The closing merging bits run up against the next frame's sync, which starts with a one.
    push_merging_bits(&mut bits, 0);

    assert_eq!(bits.len(), FRAME_LENGTH_BITS as usize);

    // Convert to run lengths; the final run ends on the next frame's first channel bit.
    let ones: Vec<usize> = (0..bits.len()).filter(|&i| bits[i] == 1).collect();
    assert_eq!(ones[0], 0);

    let mut t_values: Vec<u8> = ones.windows(2).map(|pair| (pair[1] - pair[0]) as u8).collect();
    t_values.push((bits.len() - ones[ones.len() - 1]) as u8);

    assert!(t_values.iter().all(|&t| t >= 3 && t <= 11));
    t_values
}

/// Encode an F3 frame of 33 data symbols (the first being the subcode symbol) into T-values.
pub fn encode_f3_frame(symbols: &[u8]) -> Vec<u8> {
    assert_eq!(symbols.len(), 33);

    let mut words = [0u16; 33];
    for (word, &symbol) in words.iter_mut().zip(symbols.iter()) {
        *word = EFM_CODES[symbol as usize];
    }

    encode_f3_frame_words(&words)
}

/// Build an F3 frame by modulating and demodulating it, so it reflects exactly what the
/// demodulator produces for clean input.
pub fn make_f3_frame(data_symbols: &[u8; 32], subcode: SubcodeSymbol) -> F3Frame {
    let mut words = [0u16; 33];

    words[0] = match subcode {
        SubcodeSymbol::Sync0 => SYNC0,
        SubcodeSymbol::Sync1 => SYNC1,
        SubcodeSymbol::Data(symbol) => EFM_CODES[symbol as usize],
    };
    for (word, &symbol) in words[1..].iter_mut().zip(data_symbols.iter()) {
        *word = EFM_CODES[symbol as usize];
    }

    F3Frame::from_t_values(&encode_f3_frame_words(&words))
}

/// Build the Q channel payload of a mode 1 section in the programme area.
pub fn mode1_q_payload(disc_time: TrackTime, track_number: i32) -> [u8; 12] {
    let mut q = [0u8; 12];

    q[0] = 0x01; // Control 0, mode 1.
    q[1] = int_to_bcd(track_number);
    q[2] = 0x01; // Index 1: encoder running.
    q[3] = int_to_bcd(disc_time.minutes());
    q[4] = int_to_bcd(disc_time.seconds());
    q[5] = int_to_bcd(disc_time.frames());
    q[6] = 0x00;
    q[7] = int_to_bcd(disc_time.minutes());
    q[8] = int_to_bcd(disc_time.seconds());
    q[9] = int_to_bcd(disc_time.frames());

    let crc = q_channel_crc(&q[..10]);
    q[10] = (crc >> 8) as u8;
    q[11] = (crc & 0xff) as u8;

    q
}

/// The subcode symbol for frame `position` (0..98) of a section at `disc_time`.
pub fn section_subcode(position: usize, disc_time: TrackTime, track_number: i32) -> SubcodeSymbol {
    match position {
        0 => SubcodeSymbol::Sync0,
        1 => SubcodeSymbol::Sync1,
        _ => {
            let q = mode1_q_payload(disc_time, track_number);

            let bit_index = position - 2;
            let q_bit = q[bit_index / 8] & (0x80 >> (bit_index % 8)) != 0;

            // The Q channel is bit 6 of the subcode symbol.
            SubcodeSymbol::Data(if q_bit { 0x40 } else { 0x00 })
        }
    }
}

/// A bank of per-symbol encoder delay lines (unflagged, zero filled).
struct EncoderDelays {
    lines: Vec<Vec<u8>>,
}

impl EncoderDelays {
    fn new(delays: &[usize]) -> EncoderDelays {
        EncoderDelays { lines: delays.iter().map(|&delay| vec![0u8; delay]).collect() }
    }

    fn process(&mut self, symbols: &[u8]) -> Vec<u8> {
        symbols
            .iter()
            .zip(self.lines.iter_mut())
            .map(|(&symbol, line)| {
                if line.is_empty() {
                    return symbol;
                }
                line.push(symbol);
                line.remove(0)
            })
            .collect()
    }
}

/// CIRC-encode a stream of 24-byte payload frames into per-frame 32-symbol words.
///
/// This is the exact inverse of the decoder's data path: each stage applies the complementary
/// delay, so a symbol's encoder delay plus decoder delay is constant (111 frames overall).
pub fn encode_circ_stream(payloads: &[[u8; 24]]) -> Vec<[u8; 32]> {
    // Complementary delays to the decoder's: the halves split, the interleave, the C1 stage.
    let pre_delays: Vec<usize> = (0..24).map(|k| if k < 12 { 2 } else { 0 }).collect();
    let interleave_delays: Vec<usize> = (0..28).map(|k| k * 4).collect();
    let c1_delays: Vec<usize> = (0..32).map(|k| if k % 2 == 1 { 1 } else { 0 }).collect();

    let mut pre = EncoderDelays::new(&pre_delays);
    let mut interleave = EncoderDelays::new(&interleave_delays);
    let mut c1_stage = EncoderDelays::new(&c1_delays);

    let mut frames = Vec::with_capacity(payloads.len());

    for payload in payloads {
        let split = pre.process(payload);

        // C2 encode: payload around the check symbols at positions 12..15.
        let mut c2_word = vec![0u8; 28];
        c2_word[..12].copy_from_slice(&split[..12]);
        c2_word[16..].copy_from_slice(&split[12..]);
        fill_check_symbols(&mut c2_word, &[12, 13, 14, 15]);

        let interleaved = interleave.process(&c2_word);

        // C1 encode: check symbols appended at positions 28..31.
        let mut c1_word = vec![0u8; 32];
        c1_word[..28].copy_from_slice(&interleaved);
        fill_check_symbols(&mut c1_word, &[28, 29, 30, 31]);

        let mut staged = c1_stage.process(&c1_word);

        // The check symbols are inverted on disc.
        for k in (12..16).chain(28..32) {
            staged[k] = !staged[k];
        }

        let mut frame = [0u8; 32];
        frame.copy_from_slice(&staged);
        frames.push(frame);
    }

    frames
}

/// Build a clean mode 1 data sector: sync, BCD header, user data, EDC, product-code parity,
/// scrambled like the real channel.
pub fn encode_sector(address: TrackTime, user_data: &[u8]) -> [u8; crate::sector::SECTOR_SIZE] {
    use lumen_core::checksum::Crc32Edc;

    assert_eq!(user_data.len(), 2048);

    let mut sector = [0u8; crate::sector::SECTOR_SIZE];

    // Sync pattern.
    sector[0] = 0x00;
    for byte in sector[1..11].iter_mut() {
        *byte = 0xff;
    }
    sector[11] = 0x00;

    // Header: BCD address plus mode.
    sector[12] = int_to_bcd(address.minutes());
    sector[13] = int_to_bcd(address.seconds());
    sector[14] = int_to_bcd(address.frames());
    sector[15] = 0x01;

    sector[16..2064].copy_from_slice(user_data);

    // EDC over sync, header and data.
    let mut edc = Crc32Edc::new();
    edc.process_buf_bytes(&sector[..2064]);
    sector[2064..2068].copy_from_slice(&edc.crc().to_le_bytes());

    // Product code parity: P columns first, then Q diagonals over the P-protected region.
    for plane in 0..2 {
        for column in 0..43 {
            let mut positions = [0usize; 26];
            for row in 0..24 {
                positions[row] = 12 + 2 * (43 * row + column) + plane;
            }
            positions[24] = 2076 + 2 * column + plane;
            positions[25] = 2076 + 2 * (43 + column) + plane;

            let mut word: Vec<u8> = positions.iter().map(|&p| sector[p]).collect();
            fill_check_symbols(&mut word, &[24, 25]);
            for (&position, &value) in positions.iter().zip(word.iter()) {
                sector[position] = value;
            }
        }
    }
    for plane in 0..2 {
        for diagonal in 0..26 {
            let mut positions = [0usize; 45];
            for step in 0..43 {
                positions[step] = 12 + 2 * ((44 * diagonal + 43 * step) % 1118) + plane;
            }
            positions[43] = 2248 + 2 * diagonal + plane;
            positions[44] = 2248 + 2 * (26 + diagonal) + plane;

            let mut word: Vec<u8> = positions.iter().map(|&p| sector[p]).collect();
            fill_check_symbols(&mut word, &[43, 44]);
            for (&position, &value) in positions.iter().zip(word.iter()) {
                sector[position] = value;
            }
        }
    }

    crate::sector::unscramble(&mut sector);

    sector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_frame_encoding_shape() {
        let t_values = encode_f3_frame(&[0u8; 33]);

        // A frame always starts with the two T11 sync runs and totals 588 channel bits.
        assert_eq!(t_values[0], 11);
        assert_eq!(t_values[1], 11);
        assert_eq!(t_values.iter().map(|&t| u32::from(t)).sum::<u32>(), FRAME_LENGTH_BITS);
    }

    #[test]
    fn verify_mode1_q_payload_crc() {
        let q = mode1_q_payload(TrackTime::new(1, 2, 3), 7);
        assert_eq!(q_channel_crc(&q[..10]), (u16::from(q[10]) << 8) | u16::from(q[11]));
        assert_eq!(q[1], 0x07);
        assert_eq!(q[5], 0x03);
    }
}
