// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `efmtof3` module recovers F3 frames from the stream of T-values (pit and land run
//! lengths) delivered by the RF decoder.
//!
//! Frame synchronisation is a small state machine: an initial search for two adjacent T11 run
//! lengths, confirmation that the next sync arrives one frame (588 channel bits) later, then a
//! steady state that tolerates damaged syncs by nudging the frame boundary and counting how many
//! consecutive frames look wrong. Too many bad frames in a row aborts back to the initial
//! search; the input is noisy tape, so none of this is fatal.

use log::debug;

use crate::f3frame::F3Frame;

/// The longest frame the steady-state parser will emit: (588 - two T11 syncs) / T3.
const MAX_T_VALUES_PER_FRAME: usize = 189;

/// Decoding statistics for the T-value to F3 frame stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub valid_syncs: u64,
    pub undershoot_syncs: u64,
    pub overshoot_syncs: u64,

    pub valid_frames: u64,
    pub undershoot_frames: u64,
    pub overshoot_frames: u64,

    pub valid_efm_symbols: u64,
    pub invalid_efm_symbols: u64,
    pub corrected_efm_symbols: u64,

    pub in_range_t_values: u64,
    pub out_of_range_t_values: u64,

    pub sync_losses: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Initial,
    FindInitialSyncStage1,
    FindInitialSyncStage2,
    FindSecondSync,
    SyncLost,
    ProcessFrame,
}

/// T-value to F3 frame converter.
pub struct EfmToF3Frames {
    buffer: Vec<u8>,
    state: State,
    waiting_for_data: bool,
    sequential_good_syncs: u32,
    sequential_bad_syncs: u32,
    end_sync_transition: usize,
    first_frame_after_sync: bool,
    statistics: Statistics,
    frames_out: Vec<F3Frame>,
}

impl EfmToF3Frames {
    pub fn new() -> EfmToF3Frames {
        EfmToF3Frames {
            buffer: Vec::new(),
            state: State::Initial,
            waiting_for_data: false,
            sequential_good_syncs: 0,
            sequential_bad_syncs: 0,
            end_sync_transition: 0,
            first_frame_after_sync: false,
            statistics: Statistics::default(),
            frames_out: Vec::new(),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::Initial;
        self.waiting_for_data = false;
        self.sequential_good_syncs = 0;
        self.sequential_bad_syncs = 0;
        self.end_sync_transition = 0;
        self.first_frame_after_sync = false;
        self.statistics = Statistics::default();
    }

    /// Feed more T-values into the converter, returning the F3 frames completed by them.
    pub fn process(&mut self, t_values: &[u8]) -> Vec<F3Frame> {
        self.frames_out.clear();
        self.buffer.extend_from_slice(t_values);

        self.waiting_for_data = false;
        while !self.waiting_for_data {
            self.state = match self.state {
                State::Initial => State::FindInitialSyncStage1,
                State::FindInitialSyncStage1 => self.find_initial_sync_stage_1(),
                State::FindInitialSyncStage2 => self.find_initial_sync_stage_2(),
                State::FindSecondSync => self.find_second_sync(),
                State::SyncLost => self.sync_lost(),
                State::ProcessFrame => self.process_frame(),
            };
        }

        std::mem::take(&mut self.frames_out)
    }

    /// Search for the first adjacent T11+T11 sync pattern in the buffer.
    fn find_initial_sync_stage_1(&mut self) -> State {
        let start = self.buffer.windows(2).position(|pair| pair[0] == 11 && pair[1] == 11);

        let start = match start {
            Some(start) => start,
            None => {
                // Keep the last value: it may pair with the first value of the next input.
                if !self.buffer.is_empty() {
                    let keep_from = self.buffer.len() - 1;
                    self.buffer.drain(..keep_from);
                }
                self.waiting_for_data = true;
                return State::FindInitialSyncStage1;
            }
        };

        debug!("initial F3 sync found at buffer position {start}");
        self.buffer.drain(..start);

        State::FindInitialSyncStage2
    }

    /// Confirm the initial sync by finding the next T11+T11 one frame length later.
    fn find_initial_sync_stage_2(&mut self) -> State {
        // Give up if the next sync is more than a few frame lengths out.
        let search_length = 588 * 4;

        let mut end_sync = None;
        let mut t_total: i32 = 11;

        for i in 1..self.buffer.len().saturating_sub(1) {
            if self.buffer[i] == 11 && self.buffer[i + 1] == 11 {
                end_sync = Some(i);
                break;
            }
            t_total += i32::from(self.buffer[i]);

            if t_total > search_length {
                end_sync = Some(i);
                break;
            }
        }

        if t_total > search_length {
            debug!("no second F3 sync within a reasonable length (T = {t_total}), restarting");
            self.buffer.drain(..end_sync.unwrap_or(0));
            return State::FindInitialSyncStage1;
        }

        let end_sync = match end_sync {
            Some(end_sync) => end_sync,
            None => {
                self.waiting_for_data = true;
                return State::FindInitialSyncStage2;
            }
        };

        // Is the frame length valid (or close enough)?
        if t_total < 587 || t_total > 589 {
            self.buffer.drain(..end_sync);
            return State::FindInitialSyncStage2;
        }

        debug!("found first F3 frame with a length of {t_total} bits");
        self.sequential_good_syncs = 0;
        self.end_sync_transition = end_sync;
        self.first_frame_after_sync = true;

        State::ProcessFrame
    }

    /// Steady state: expect the next sync one frame length ahead, tolerating damaged syncs.
    fn find_second_sync(&mut self) -> State {
        // Accumulate at least 588 channel bits of T-values.
        let mut i = 0;
        let mut t_total: i32 = 0;
        while i < self.buffer.len() && t_total < 588 {
            t_total += i32::from(self.buffer[i]);
            i += 1;
        }

        // Did we have enough data to reach 588, plus two values to verify the sync position?
        if t_total < 588 || (self.buffer.len() - i) < 2 {
            self.waiting_for_data = true;
            return State::FindSecondSync;
        }

        if t_total == 588 {
            self.end_sync_transition = i;
            self.sequential_bad_syncs = 0;
            self.statistics.valid_syncs += 1;
            self.sequential_good_syncs += 1;
        } else {
            // Handle the various possible sync issues in a (hopefully) smart way.
            if self.buffer[i] == 11 && self.buffer[i + 1] == 11 {
                // The sync is in the right position and valid; the frame contains a bad T value.
                self.end_sync_transition = i;
                self.statistics.valid_syncs += 1;
            } else if self.buffer[i - 1] == 11 && self.buffer[i] == 11 {
                // Sync valid, but off by one transition backwards.
                self.end_sync_transition = i - 1;
                self.statistics.undershoot_syncs += 1;
            } else if self.buffer[i - 1] >= 10 && self.buffer[i] >= 10 {
                // Sync value low and off by one transition backwards.
                self.end_sync_transition = i - 1;
                self.statistics.undershoot_syncs += 1;
            } else {
                if (t_total - 588).abs() < 3 {
                    // Error is less than T3, so nothing much to do about it.
                    self.end_sync_transition = i;
                } else {
                    // Move the end transition in an attempt to correct.
                    self.end_sync_transition = if t_total > 588 { i - 1 } else { i };
                }

                self.sequential_bad_syncs += 1;
                if t_total > 588 {
                    self.statistics.overshoot_syncs += 1;
                } else {
                    self.statistics.undershoot_syncs += 1;
                }

                // A failure with no good syncs since the last one means the lock is gone;
                // restart the search rather than limping on.
                if self.sequential_good_syncs == 0 {
                    debug!("F3 sync failing with no previous good frames, resetting sync");
                    self.statistics.sync_losses += 1;
                    return State::FindInitialSyncStage1;
                }

                self.sequential_good_syncs = 0;
            }
        }

        // Hit the limit of poor sync detections?
        if self.sequential_bad_syncs > 16 {
            self.sequential_bad_syncs = 0;
            debug!("too many sequential poor F3 sync detections, sync lost");
            return State::SyncLost;
        }

        State::ProcessFrame
    }

    fn sync_lost(&mut self) -> State {
        self.statistics.sync_losses += 1;
        State::FindInitialSyncStage1
    }

    /// Emit the T-values up to the end sync transition as one F3 frame.
    fn process_frame(&mut self) -> State {
        let t_length = self.end_sync_transition.min(MAX_T_VALUES_PER_FRAME);

        let mut t_total: i32 = 0;
        for &value in &self.buffer[..t_length] {
            if value < 3 || value > 11 {
                self.statistics.out_of_range_t_values += 1;
            } else {
                self.statistics.in_range_t_values += 1;
            }
            t_total += i32::from(value);
        }

        // Track framing accuracy.
        if t_total < 588 {
            self.statistics.undershoot_frames += 1;
        } else if t_total > 588 {
            self.statistics.overshoot_frames += 1;
        } else {
            self.statistics.valid_frames += 1;
        }

        let mut frame = F3Frame::from_t_values(&self.buffer[..t_length]);
        if self.first_frame_after_sync {
            frame.set_first_after_sync();
            self.first_frame_after_sync = false;
        }

        self.statistics.valid_efm_symbols += u64::from(frame.valid_symbols());
        self.statistics.invalid_efm_symbols += u64::from(frame.invalid_symbols());
        self.statistics.corrected_efm_symbols += u64::from(frame.corrected_symbols());

        self.frames_out.push(frame);

        // Discard everything up to the sync end.
        self.buffer.drain(..self.end_sync_transition);

        State::FindSecondSync
    }
}

impl Default for EfmToF3Frames {
    fn default() -> Self {
        EfmToF3Frames::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::encode_f3_frame;

    #[test]
    fn verify_clean_frames_decode() {
        let symbols: Vec<u8> = (0u8..33).collect();

        let mut t_values = Vec::new();
        for _ in 0..5 {
            t_values.extend(encode_f3_frame(&symbols));
        }
        // A trailing sync lets the state machine close the final frame.
        t_values.extend([11u8, 11]);

        let mut decoder = EfmToF3Frames::new();
        let frames = decoder.process(&t_values);

        assert_eq!(frames.len(), 5);
        for frame in &frames {
            assert_eq!(frame.subcode_symbol(), 0);
            for (i, &symbol) in frame.data_symbols().iter().enumerate() {
                assert_eq!(symbol, (i + 1) as u8);
            }
            assert_eq!(frame.invalid_symbols(), 0);
        }

        assert_eq!(decoder.statistics().sync_losses, 0);
        assert_eq!(decoder.statistics().valid_frames, 5);
        assert_eq!(decoder.statistics().out_of_range_t_values, 0);
    }

    #[test]
    fn verify_sync_loss_recovery() {
        let symbols: Vec<u8> = (100u8..133).collect();

        // 20 valid frames, a stretch of garbage, then 20 valid frames. The garbage is runs of
        // T5, which can never contain a frame sync.
        let mut t_values = Vec::new();
        for _ in 0..20 {
            t_values.extend(encode_f3_frame(&symbols));
        }

        for _ in 0..300 {
            t_values.push(5);
        }

        for _ in 0..20 {
            t_values.extend(encode_f3_frame(&symbols));
        }
        t_values.extend([11u8, 11]);

        let mut decoder = EfmToF3Frames::new();
        let frames = decoder.process(&t_values);

        // The decoder must report losing sync in the garbage and recover for the second run:
        // all 40 real frames decode, plus possibly a few frames of noise.
        assert!(decoder.statistics().sync_losses >= 1);
        assert!(frames.len() >= 40 && frames.len() <= 45, "got {} frames", frames.len());

        let clean = frames
            .iter()
            .filter(|frame| {
                frame.invalid_symbols() == 0 && frame.data_symbols()[0] == 101
            })
            .count();
        assert_eq!(clean, 40);

        // The trailing frames must decode cleanly again.
        let last = frames.last().unwrap();
        assert_eq!(last.invalid_symbols(), 0);
        assert_eq!(last.data_symbols()[0], 101);
    }

    #[test]
    fn verify_incremental_feeding() {
        let symbols = [0u8; 33];

        let mut t_values = Vec::new();
        for _ in 0..3 {
            t_values.extend(encode_f3_frame(&symbols));
        }
        t_values.extend([11u8, 11]);

        // Feed one value at a time; the output must be identical to a single call.
        let mut decoder = EfmToF3Frames::new();
        let mut frames = Vec::new();
        for &value in &t_values {
            frames.extend(decoder.process(&[value]));
        }

        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.invalid_symbols(), 0);
        }
    }
}
