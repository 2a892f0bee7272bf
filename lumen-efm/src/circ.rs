// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `circ` module converts F3 frames into F2 frames by decoding the Cross-Interleaved
//! Reed-Solomon Code.
//!
//! Each F3 frame's 32 data symbols pass through two decoders: C1, a (32,28) code correcting up
//! to two symbol errors, and -- after the de-interleave delay lines that spread one C2 codeword
//! over 109 frames -- C2, a (28,24) code filling up to four erasures flagged by C1. Sections of
//! 98 frames are aligned on the subcode sync patterns, and each section's Q channel supplies the
//! disc and track time attached to the emitted F2 frames.
//!
//! The delay lines start out flushed with flagged padding, so the first hundred-odd F2 frames
//! out of a fresh (or re-flushed) decoder carry unrecoverable symbols. Downstream stages conceal
//! or pad those like any other damage.

use log::{debug, info};

use crate::f2frame::{F2Frame, SymbolStatus};
use crate::f3frame::F3Frame;
use crate::galois::{correct_double, correct_erasures, RsOutcome};
use crate::section::{Section, FRAMES_PER_SECTION};
use crate::time::TrackTime;

/// Statistics for the F3 to F2 stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub c1_passed: u64,
    pub c1_corrected: u64,
    pub c1_failed: u64,

    pub c2_passed: u64,
    pub c2_corrected: u64,
    pub c2_failed: u64,

    pub total_sections: u64,
    pub poor_section_syncs: u64,
    pub section_sync_losses: u64,
    pub invalid_q_sections: u64,
}

/// A delayed symbol with its correction status.
type Symbol = (u8, SymbolStatus);

/// A bank of per-symbol delay lines.
struct DelayLines {
    lines: Vec<Vec<Symbol>>,
}

impl DelayLines {
    /// Create one delay line per entry of `delays`, pre-flushed with flagged padding.
    fn new(delays: &[usize]) -> DelayLines {
        let lines =
            delays.iter().map(|&delay| vec![(0u8, SymbolStatus::Unrecoverable); delay]).collect();
        DelayLines { lines }
    }

    /// Push one frame's symbols in, returning the delayed symbols.
    fn process(&mut self, symbols: &[Symbol]) -> Vec<Symbol> {
        assert_eq!(symbols.len(), self.lines.len());

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

/// The CIRC data path for one continuous run of frames.
struct CircDecoder {
    /// One-frame delay on even-indexed symbols ahead of C1, undoing the encoder's split of
    /// adjacent symbols across two frames.
    c1_delay: DelayLines,
    /// De-interleave delays between C1 and C2: symbol k is delayed by (27 - k) * 4 frames.
    c2_delay: DelayLines,
    /// Two-frame delay realigning the halves of each frame after C2.
    unscramble_delay: DelayLines,
}

impl CircDecoder {
    fn new() -> CircDecoder {
        let c1_delays: Vec<usize> = (0..32).map(|k| if k % 2 == 0 { 1 } else { 0 }).collect();
        let c2_delays: Vec<usize> = (0..28).map(|k| (27 - k) * 4).collect();
        let unscramble_delays: Vec<usize> = (0..24).map(|k| if k < 12 { 0 } else { 2 }).collect();

        CircDecoder {
            c1_delay: DelayLines::new(&c1_delays),
            c2_delay: DelayLines::new(&c2_delays),
            unscramble_delay: DelayLines::new(&unscramble_delays),
        }
    }

    /// Decode one frame's 32 symbols into 24 payload symbols with status flags.
    fn process_frame(&mut self, frame: &F3Frame, statistics: &mut Statistics) -> [Symbol; 24] {
        // Un-invert the C2 and C1 parity symbols and attach the demodulator's error flags.
        let symbols: Vec<Symbol> = frame
            .data_symbols()
            .iter()
            .zip(frame.error_flags().iter())
            .enumerate()
            .map(|(i, (&value, &flagged))| {
                let value =
                    if (12..16).contains(&i) || (28..32).contains(&i) { !value } else { value };
                let status =
                    if flagged { SymbolStatus::Unrecoverable } else { SymbolStatus::Valid };
                (value, status)
            })
            .collect();

        let symbols = self.c1_delay.process(&symbols);

        // C1: correct up to two errors across the 32 symbols.
        let mut word: Vec<u8> = symbols.iter().map(|&(value, _)| value).collect();
        let c1_status = match correct_double(&mut word) {
            RsOutcome::Clean => {
                statistics.c1_passed += 1;
                SymbolStatus::Valid
            }
            RsOutcome::Corrected(_) => {
                statistics.c1_corrected += 1;
                SymbolStatus::Corrected
            }
            RsOutcome::Failed => {
                statistics.c1_failed += 1;
                SymbolStatus::Unrecoverable
            }
        };

        // Drop the C1 parity and propagate the outcome. A C1 failure marks every surviving
        // symbol as an erasure for C2 to repair after the de-interleave.
        let symbols: Vec<Symbol> = word[..28].iter().map(|&value| (value, c1_status)).collect();

        let symbols = self.c2_delay.process(&symbols);

        // C2: fill up to four erasures flagged by C1. With no flagged erasures but bad
        // syndromes, fall back to straight error correction.
        let mut word: Vec<u8> = symbols.iter().map(|&(value, _)| value).collect();
        let erasures: Vec<usize> = symbols
            .iter()
            .enumerate()
            .filter(|&(_, &(_, status))| status == SymbolStatus::Unrecoverable)
            .map(|(k, _)| k)
            .collect();

        let c2_outcome = if erasures.len() > 4 {
            RsOutcome::Failed
        } else if erasures.is_empty() {
            correct_double(&mut word)
        } else {
            for &position in &erasures {
                word[position] = 0;
            }
            correct_erasures(&mut word, &erasures)
        };

        let output_status = match c2_outcome {
            RsOutcome::Clean => {
                statistics.c2_passed += 1;
                SymbolStatus::Valid
            }
            RsOutcome::Corrected(_) => {
                statistics.c2_corrected += 1;
                SymbolStatus::Corrected
            }
            RsOutcome::Failed => {
                statistics.c2_failed += 1;
                SymbolStatus::Unrecoverable
            }
        };

        // Drop the C2 parity (symbols 12..15) and restore the payload order.
        let mut payload: Vec<Symbol> = Vec::with_capacity(24);
        for (k, &value) in word.iter().enumerate() {
            if (12..16).contains(&k) {
                continue;
            }
            payload.push((value, output_status));
        }

        let payload = self.unscramble_delay.process(&payload);

        let mut result = [(0u8, SymbolStatus::Valid); 24];
        result.copy_from_slice(&payload);
        result
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    GetSync0,
    GetSync1,
    GetSection,
}

/// F3 frame to F2 frame converter: section alignment, CIRC decode, Q channel timing.
pub struct F3ToF2Frames {
    state: State,
    section_frames: Vec<F3Frame>,
    missed_section_syncs: u32,
    circ: CircDecoder,
    last_disc_time: Option<TrackTime>,
    statistics: Statistics,
}

impl F3ToF2Frames {
    pub fn new() -> F3ToF2Frames {
        F3ToF2Frames {
            state: State::GetSync0,
            section_frames: Vec::with_capacity(FRAMES_PER_SECTION),
            missed_section_syncs: 0,
            circ: CircDecoder::new(),
            last_disc_time: None,
            statistics: Statistics::default(),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn reset(&mut self) {
        self.flush();
        self.last_disc_time = None;
        self.statistics = Statistics::default();
    }

    /// Drop section alignment and re-flush the CIRC delay lines. Called on severe sync loss,
    /// when the data entering the delay lines is no longer contiguous with what is inside them.
    pub fn flush(&mut self) {
        self.state = State::GetSync0;
        self.section_frames.clear();
        self.missed_section_syncs = 0;
        self.circ = CircDecoder::new();
    }

    /// Feed F3 frames in, returning the completed F2 frames.
    pub fn process(&mut self, f3_frames: &[F3Frame]) -> Vec<F2Frame> {
        let mut f2_frames = Vec::new();

        for frame in f3_frames {
            match self.state {
                State::GetSync0 => {
                    // Anything before the first SYNC0 is discarded: with no section alignment
                    // the frame's payload cannot be timed.
                    if frame.is_subcode_sync0() {
                        self.section_frames.push(frame.clone());
                        self.state = State::GetSync1;
                    }
                }
                State::GetSync1 => {
                    if frame.is_subcode_sync1() {
                        self.section_frames.push(frame.clone());
                        self.state = State::GetSection;
                    } else {
                        self.section_frames.clear();
                        self.state = State::GetSync0;
                    }
                }
                State::GetSection => {
                    self.section_frames.push(frame.clone());

                    // Once the first two frames of a section are in, check its sync pattern.
                    // A section with a damaged sync is still decoded, but four bad sections in
                    // a row means the alignment is gone.
                    if self.section_frames.len() == 2 {
                        let sync0 = self.section_frames[0].is_subcode_sync0();
                        let sync1 = self.section_frames[1].is_subcode_sync1();

                        if sync0 && sync1 {
                            self.missed_section_syncs = 0;
                        } else {
                            self.missed_section_syncs += 1;
                            self.statistics.poor_section_syncs += 1;

                            if self.missed_section_syncs == 4 {
                                debug!("section sync lost");
                                self.statistics.section_sync_losses += 1;
                                self.flush();
                                continue;
                            }
                        }
                    }

                    if self.section_frames.len() == FRAMES_PER_SECTION {
                        self.process_section(&mut f2_frames);
                        self.section_frames.clear();
                    }
                }
            }
        }

        f2_frames
    }

    /// Run one aligned section through the CIRC and attach its Q channel timing.
    fn process_section(&mut self, f2_frames: &mut Vec<F2Frame>) {
        let mut subcode = [0u8; FRAMES_PER_SECTION];
        for (symbol, frame) in subcode.iter_mut().zip(self.section_frames.iter()) {
            *symbol = frame.subcode_symbol();
        }

        let section = Section::decode(&subcode);

        // Recover the section's timing from the Q channel; if the CRC failed, extrapolate from
        // the previous section.
        let (disc_time, track_time, track_number, encoder_running) = match &section {
            Some(section) if section.q_mode() == 1 || section.q_mode() == 4 => {
                let meta = &section.q_metadata().mode1_and_4;
                (meta.disc_time, meta.track_time, meta.track_number, meta.is_encoder_running)
            }
            _ => {
                self.statistics.invalid_q_sections += 1;
                let mut time = self.last_disc_time.unwrap_or_default();
                time.add_frames(1);
                (time, TrackTime::default(), 0, true)
            }
        };

        self.last_disc_time = Some(disc_time);
        self.statistics.total_sections += 1;

        for frame in &self.section_frames {
            let payload = self.circ.process_frame(frame, &mut self.statistics);

            let mut f2 = F2Frame {
                disc_time,
                track_time,
                track_number,
                is_encoder_running: encoder_running,
                ..F2Frame::default()
            };
            for (i, &(value, status)) in payload.iter().enumerate() {
                f2.data[i] = value;
                f2.status[i] = status;
            }

            f2_frames.push(f2);
        }
    }

    /// Log the stage statistics.
    pub fn report(&self) {
        let s = &self.statistics;
        info!("F3 to F2 frames:");
        info!("  C1 passed/corrected/failed: {}/{}/{}", s.c1_passed, s.c1_corrected, s.c1_failed);
        info!("  C2 passed/corrected/failed: {}/{}/{}", s.c2_passed, s.c2_corrected, s.c2_failed);
        info!("  sections: {} ({} with invalid Q)", s.total_sections, s.invalid_q_sections);
        info!(
            "  poor section syncs: {} (lost alignment {} times)",
            s.poor_section_syncs, s.section_sync_losses
        );
    }
}

impl Default for F3ToF2Frames {
    fn default() -> Self {
        F3ToF2Frames::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::f2frame::SymbolStatus;
    use crate::testsupport::{encode_circ_stream, make_f3_frame, section_subcode};
    use crate::time::TrackTime;

    /// Total data-path latency of the decoder in frames.
    const DECODER_DELAY: usize = 1 + 27 * 4 + 2;

    fn decode_stream(symbol_stream: &[[u8; 32]], decoder: &mut F3ToF2Frames) -> Vec<F2Frame> {
        let mut f2_frames = Vec::new();
        for (n, symbols) in symbol_stream.iter().enumerate() {
            let section = (n / FRAMES_PER_SECTION) as i32;
            let subcode =
                section_subcode(n % FRAMES_PER_SECTION, TrackTime::new(0, 2, section), 1);
            let frame = make_f3_frame(symbols, subcode);
            f2_frames.extend(decoder.process(&[frame]));
        }
        f2_frames
    }

    #[test]
    fn verify_clean_stream_round_trips() {
        // Three sections of payload, each frame filled with a recognisable pattern.
        let num_frames = 3 * FRAMES_PER_SECTION;
        let payloads: Vec<[u8; 24]> = (0..num_frames)
            .map(|n| {
                let mut data = [0u8; 24];
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = ((n * 7 + i) & 0xff) as u8;
                }
                data
            })
            .collect();

        let symbol_stream = encode_circ_stream(&payloads);

        let mut decoder = F3ToF2Frames::new();
        let f2_frames = decode_stream(&symbol_stream, &mut decoder);

        // Everything after the delay lines prime must decode cleanly and match the input.
        assert_eq!(f2_frames.len(), num_frames);
        let mut checked = 0;
        for (n, f2) in f2_frames.iter().enumerate() {
            if n < DECODER_DELAY {
                continue;
            }
            assert!(!f2.is_corrupt(), "frame {n} corrupt");
            assert_eq!(f2.data, payloads[n - DECODER_DELAY], "frame {n} data mismatch");
            checked += 1;
        }
        assert!(checked > FRAMES_PER_SECTION);

        let stats = decoder.statistics();
        assert_eq!(stats.c1_failed, 0);
        assert_eq!(stats.total_sections, 3);
        assert_eq!(stats.invalid_q_sections, 0);

        // Section timing came from the Q channel.
        assert_eq!(f2_frames[0].disc_time, TrackTime::new(0, 2, 0));
        assert_eq!(f2_frames[2 * FRAMES_PER_SECTION].disc_time, TrackTime::new(0, 2, 2));
    }

    #[test]
    fn verify_symbol_errors_are_corrected() {
        let num_frames = 2 * FRAMES_PER_SECTION;
        let payloads: Vec<[u8; 24]> = (0..num_frames).map(|_| [0x5au8; 24]).collect();

        let mut symbol_stream = encode_circ_stream(&payloads);

        // Corrupt two symbols in one frame: within C1's correction power.
        symbol_stream[FRAMES_PER_SECTION][3] ^= 0xff;
        symbol_stream[FRAMES_PER_SECTION][19] ^= 0x55;

        let mut decoder = F3ToF2Frames::new();
        let f2_frames = decode_stream(&symbol_stream, &mut decoder);

        for (n, f2) in f2_frames.iter().enumerate() {
            if n < DECODER_DELAY {
                continue;
            }
            assert_eq!(f2.data, [0x5au8; 24], "frame {n} not recovered");
            assert!(!f2.is_corrupt());
        }

        assert!(decoder.statistics().c1_corrected >= 1);
    }

    #[test]
    fn verify_priming_frames_are_flagged() {
        let payloads: Vec<[u8; 24]> = (0..FRAMES_PER_SECTION).map(|_| [0u8; 24]).collect();
        let symbol_stream = encode_circ_stream(&payloads);

        let mut decoder = F3ToF2Frames::new();
        let f2_frames = decode_stream(&symbol_stream, &mut decoder);

        // The very first frame out of a fresh decoder is mostly delay-line padding.
        assert_eq!(f2_frames.len(), FRAMES_PER_SECTION);
        assert!(f2_frames[0].status.iter().any(|&s| s == SymbolStatus::Unrecoverable));
    }
}
