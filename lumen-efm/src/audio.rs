// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module converts F1 frames into 44.1 kHz 16-bit stereo samples.
//!
//! Each F1 frame carries six stereo sample pairs, so one 98-frame section is 588 sample pairs,
//! 1/75th of a second. Frames the CIRC could not recover are either passed through, silenced, or
//! concealed by linear interpolation between the nearest intact samples on each side.

use log::info;

use crate::f1frame::F1Frame;

/// Sample pairs carried by one F1 frame.
const PAIRS_PER_FRAME: usize = 6;

/// How damaged audio frames are treated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ErrorTreatment {
    /// Interpolate linearly between the nearest valid samples.
    #[default]
    Conceal,
    /// Replace damaged frames with silence.
    Silence,
    /// Emit the damaged samples untouched.
    PassThrough,
}

/// Statistics for the audio stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    /// Total stereo sample pairs emitted.
    pub total_samples: u64,
    pub valid_samples: u64,
    pub padded_samples: u64,
    pub concealed_samples: u64,
    pub silenced_samples: u64,
    pub passed_through_samples: u64,
}

/// F1 frame to audio sample converter.
pub struct F1ToAudio {
    treatment: ErrorTreatment,
    /// Damaged frames held back until a valid frame supplies the interpolation target.
    pending: Vec<F1Frame>,
    /// The last valid stereo pair emitted, used as the interpolation origin.
    last_good_pair: Option<[i16; 2]>,
    statistics: Statistics,
}

impl F1ToAudio {
    pub fn new(treatment: ErrorTreatment) -> F1ToAudio {
        F1ToAudio {
            treatment,
            pending: Vec::new(),
            last_good_pair: None,
            statistics: Statistics::default(),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.last_good_pair = None;
        self.statistics = Statistics::default();
    }

    /// Feed F1 frames in, returning interleaved stereo samples.
    pub fn process(&mut self, f1_frames: &[F1Frame]) -> Vec<i16> {
        let mut samples = Vec::with_capacity(f1_frames.len() * PAIRS_PER_FRAME * 2);

        for frame in f1_frames {
            let damaged = frame.is_corrupt && !frame.is_padding;

            if damaged && self.treatment == ErrorTreatment::Conceal {
                // Hold the frame back until we see the next valid sample to interpolate to.
                self.pending.push(frame.clone());
                continue;
            }

            if !self.pending.is_empty() {
                // A valid frame has arrived: conceal the held-back span towards its first pair.
                let target = frame_pairs(frame)[0];
                self.conceal_pending(target, &mut samples);
            }

            self.emit_frame(frame, damaged, &mut samples);
        }

        samples
    }

    /// Drain any damaged frames still held back, concealing towards silence.
    pub fn flush(&mut self) -> Vec<i16> {
        let mut samples = Vec::new();
        if !self.pending.is_empty() {
            self.conceal_pending([0, 0], &mut samples);
        }
        samples
    }

    fn emit_frame(&mut self, frame: &F1Frame, damaged: bool, samples: &mut Vec<i16>) {
        for pair in frame_pairs(frame) {
            let pair = match (damaged, self.treatment) {
                (true, ErrorTreatment::Silence) => {
                    self.statistics.silenced_samples += 1;
                    [0, 0]
                }
                (true, ErrorTreatment::PassThrough) => {
                    self.statistics.passed_through_samples += 1;
                    pair
                }
                (true, ErrorTreatment::Conceal) => unreachable!("damaged frames are held back"),
                (false, _) => {
                    if frame.is_padding {
                        self.statistics.padded_samples += 1;
                    } else {
                        self.statistics.valid_samples += 1;
                    }
                    pair
                }
            };

            samples.push(pair[0]);
            samples.push(pair[1]);
            self.statistics.total_samples += 1;
        }

        if !damaged {
            self.last_good_pair = Some(frame_pairs(frame)[PAIRS_PER_FRAME - 1]);
        }
    }

    /// Replace the held-back damaged span with a linear ramp from the last good pair to
    /// `target`.
    fn conceal_pending(&mut self, target: [i16; 2], samples: &mut Vec<i16>) {
        let origin = self.last_good_pair.unwrap_or([0, 0]);
        let num_pairs = self.pending.len() * PAIRS_PER_FRAME;

        for index in 0..num_pairs {
            // Interpolation position: step 0 is the origin itself, which was already emitted.
            let fraction = (index + 1) as f64 / (num_pairs + 1) as f64;

            for channel in 0..2 {
                let origin = f64::from(origin[channel]);
                let target = f64::from(target[channel]);
                let value = origin + ((target - origin) * fraction);
                samples.push(value.round() as i16);
            }

            self.statistics.concealed_samples += 1;
            self.statistics.total_samples += 1;
        }

        self.pending.clear();
    }

    /// Log the stage statistics.
    pub fn report(&self) {
        let s = &self.statistics;
        info!("F1 frames to audio:");
        info!("  total sample pairs: {}", s.total_samples);
        info!("  valid/padded: {}/{}", s.valid_samples, s.padded_samples);
        info!(
            "  concealed/silenced/passed through: {}/{}/{}",
            s.concealed_samples, s.silenced_samples, s.passed_through_samples
        );
    }
}

/// Unpack an F1 frame's 24 bytes into six little-endian stereo pairs.
fn frame_pairs(frame: &F1Frame) -> [[i16; 2]; PAIRS_PER_FRAME] {
    let mut pairs = [[0i16; 2]; PAIRS_PER_FRAME];

    for (pair, bytes) in pairs.iter_mut().zip(frame.data.chunks_exact(4)) {
        pair[0] = i16::from_le_bytes([bytes[0], bytes[1]]);
        pair[1] = i16::from_le_bytes([bytes[2], bytes[3]]);
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_pairs(pairs: [[i16; 2]; PAIRS_PER_FRAME], corrupt: bool) -> F1Frame {
        let mut frame = F1Frame { is_corrupt: corrupt, ..F1Frame::default() };
        for (bytes, pair) in frame.data.chunks_exact_mut(4).zip(pairs.iter()) {
            bytes[..2].copy_from_slice(&pair[0].to_le_bytes());
            bytes[2..].copy_from_slice(&pair[1].to_le_bytes());
        }
        frame
    }

    #[test]
    fn verify_valid_frames_pass_through() {
        let mut converter = F1ToAudio::new(ErrorTreatment::Conceal);

        let pairs = [[100, -100], [200, -200], [300, -300], [400, -400], [500, -500], [600, -600]];
        let samples = converter.process(&[frame_with_pairs(pairs, false)]);

        assert_eq!(samples.len(), 12);
        assert_eq!(&samples[..4], &[100, -100, 200, -200]);
        assert_eq!(converter.statistics().valid_samples, 6);
    }

    #[test]
    fn verify_silence_treatment() {
        let mut converter = F1ToAudio::new(ErrorTreatment::Silence);

        let pairs = [[1000, 1000]; PAIRS_PER_FRAME];
        let samples = converter.process(&[frame_with_pairs(pairs, true)]);

        assert_eq!(samples, vec![0i16; 12]);
        assert_eq!(converter.statistics().silenced_samples, 6);
    }

    #[test]
    fn verify_pass_through_treatment() {
        let mut converter = F1ToAudio::new(ErrorTreatment::PassThrough);

        let pairs = [[1000, -1000]; PAIRS_PER_FRAME];
        let samples = converter.process(&[frame_with_pairs(pairs, true)]);

        assert_eq!(samples[0], 1000);
        assert_eq!(samples[1], -1000);
        assert_eq!(converter.statistics().passed_through_samples, 6);
    }

    #[test]
    fn verify_concealment_interpolates() {
        let mut converter = F1ToAudio::new(ErrorTreatment::Conceal);

        // A valid frame ending at 0, one corrupt frame, then a valid frame starting at 1400.
        // The damaged span is six pairs, so the ramp steps by 1400 / 7 = 200.
        let before = frame_with_pairs([[0, 0]; PAIRS_PER_FRAME], false);
        let corrupt = frame_with_pairs([[9999, 9999]; PAIRS_PER_FRAME], true);
        let after = frame_with_pairs([[1400, 1400]; PAIRS_PER_FRAME], false);

        let mut samples = Vec::new();
        samples.extend(converter.process(&[before]));
        samples.extend(converter.process(&[corrupt]));
        samples.extend(converter.process(&[after]));

        // before (12) + concealed (12) + after (12).
        assert_eq!(samples.len(), 36);

        let concealed = &samples[12..24];
        assert_eq!(concealed, &[200, 200, 400, 400, 600, 600, 800, 800, 1000, 1000, 1200, 1200]);
        assert_eq!(converter.statistics().concealed_samples, 6);
    }

    #[test]
    fn verify_flush_conceals_to_silence() {
        let mut converter = F1ToAudio::new(ErrorTreatment::Conceal);

        let corrupt = frame_with_pairs([[500, 500]; PAIRS_PER_FRAME], true);
        assert!(converter.process(&[corrupt]).is_empty());

        let samples = converter.flush();
        assert_eq!(samples.len(), 12);
        // With no good sample on either side, the span conceals to silence.
        assert_eq!(samples, vec![0i16; 12]);
    }
}
