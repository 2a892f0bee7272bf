// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `f2tof1` module maps F2 frames one-to-one onto F1 frames, padding the output with zero
//! sections wherever the disc time jumps (a section is 98 frames, 1/75th of a second).

use log::{debug, info};

use crate::f1frame::F1Frame;
use crate::f2frame::F2Frame;
use crate::section::FRAMES_PER_SECTION;
use crate::time::TrackTime;

/// Statistics for the F2 to F1 stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub valid_f2_frames: u64,
    pub invalid_f2_frames: u64,
    pub initial_padding_frames: u64,
    pub missing_section_frames: u64,
    pub encoder_off_frames: u64,
    pub total_frames: u64,

    pub frames_start: TrackTime,
    pub frame_current: TrackTime,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    GetInitialDiscTime,
    ProcessSection,
}

/// F2 frame to F1 frame converter.
pub struct F2ToF1Frames {
    /// Pad from disc time 00:00.00 up to the first section seen.
    pad_initial_disc_time: bool,
    /// Treat the input as having no usable time stamps: no gap padding, encoder always on.
    no_timestamps: bool,

    state: State,
    buffer: Vec<F2Frame>,
    last_disc_time: TrackTime,
    statistics: Statistics,
}

impl F2ToF1Frames {
    pub fn new(pad_initial_disc_time: bool, no_timestamps: bool) -> F2ToF1Frames {
        F2ToF1Frames {
            pad_initial_disc_time,
            no_timestamps,
            state: State::GetInitialDiscTime,
            buffer: Vec::new(),
            last_disc_time: TrackTime::default(),
            statistics: Statistics::default(),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn reset(&mut self) {
        self.state = State::GetInitialDiscTime;
        self.buffer.clear();
        self.last_disc_time = TrackTime::default();
        self.statistics = Statistics::default();
    }

    /// Feed F2 frames in, returning the F1 frames completed by them.
    pub fn process(&mut self, f2_frames: &[F2Frame]) -> Vec<F1Frame> {
        self.buffer.extend_from_slice(f2_frames);

        let mut f1_frames = Vec::new();

        if self.state == State::GetInitialDiscTime && !self.buffer.is_empty() {
            self.get_initial_disc_time(&mut f1_frames);
            self.state = State::ProcessSection;
        }

        while self.state == State::ProcessSection && self.buffer.len() >= FRAMES_PER_SECTION {
            self.process_section(&mut f1_frames);
        }

        f1_frames
    }

    fn get_initial_disc_time(&mut self, f1_frames: &mut Vec<F1Frame>) {
        self.last_disc_time = self.buffer[0].disc_time;
        self.statistics.frames_start = self.last_disc_time;
        self.statistics.frame_current = self.last_disc_time;
        debug!("initial disc time is {}", self.last_disc_time);

        // Optionally pad from 00:00.00 up to the first section received.
        if self.pad_initial_disc_time && !self.no_timestamps {
            let gap = self.last_disc_time.difference(TrackTime::new(0, 0, 0));
            if gap > 1 {
                debug!("initial disc time gap, adding {} sections of padding", gap - 1);
                let mut time = TrackTime::new(0, 0, 0);
                for _ in 0..(gap - 1) {
                    time.add_frames(1);
                    self.push_padding_section(time, f1_frames);
                    self.statistics.initial_padding_frames += FRAMES_PER_SECTION as u64;
                }
            }
        }

        // Back the last time up one frame so the first real section is seen as contiguous.
        self.last_disc_time.subtract_frames(1);
    }

    fn process_section(&mut self, f1_frames: &mut Vec<F1Frame>) {
        let current_disc_time = self.buffer[0].disc_time;

        // Pad the output when sections are missing between the last and current disc times.
        if !self.no_timestamps {
            let gap = current_disc_time.difference(self.last_disc_time);
            if gap > 1 {
                debug!(
                    "section gap: last seen {} current {}, adding {} sections of padding",
                    self.last_disc_time,
                    current_disc_time,
                    gap - 1
                );
                let mut time = self.last_disc_time;
                for _ in 0..(gap - 1) {
                    time.add_frames(1);
                    self.push_padding_section(time, f1_frames);
                    self.statistics.missing_section_frames += FRAMES_PER_SECTION as u64;
                }
            }
        }

        self.last_disc_time = current_disc_time;
        self.statistics.frame_current = current_disc_time;

        // Flag the section as encoder on/off, with a threshold to ride out false negatives.
        let encoder_count = self.buffer[..FRAMES_PER_SECTION]
            .iter()
            .filter(|frame| frame.is_encoder_running)
            .count();
        let section_encoder_on = encoder_count > 10 || self.no_timestamps;

        for f2 in self.buffer.drain(..FRAMES_PER_SECTION) {
            let corrupt = f2.is_corrupt();

            f1_frames.push(F1Frame {
                data: f2.data,
                is_corrupt: corrupt,
                is_padding: false,
                is_encoder_running: section_encoder_on,
                disc_time: f2.disc_time,
                track_time: f2.track_time,
                track_number: f2.track_number,
            });

            if corrupt {
                self.statistics.invalid_f2_frames += 1;
            } else {
                self.statistics.valid_f2_frames += 1;
            }
            if !section_encoder_on {
                self.statistics.encoder_off_frames += 1;
            }
            self.statistics.total_frames += 1;
        }
    }

    fn push_padding_section(&mut self, disc_time: TrackTime, f1_frames: &mut Vec<F1Frame>) {
        let frame = F1Frame {
            data: [0u8; 24],
            is_corrupt: false,
            is_padding: true,
            is_encoder_running: true,
            disc_time,
            track_time: TrackTime::default(),
            track_number: 0,
        };

        for _ in 0..FRAMES_PER_SECTION {
            f1_frames.push(frame.clone());
        }
        self.statistics.total_frames += FRAMES_PER_SECTION as u64;
    }

    /// Log the stage statistics.
    pub fn report(&self) {
        let s = &self.statistics;
        info!("F2 to F1 frames:");
        info!("  valid/invalid F2 frames: {}/{}", s.valid_f2_frames, s.invalid_f2_frames);
        info!("  initial padding frames: {}", s.initial_padding_frames);
        info!("  missing section frames: {}", s.missing_section_frames);
        info!("  encoder off frames: {}", s.encoder_off_frames);
        info!("  total frames: {} ({} to {})", s.total_frames, s.frames_start, s.frame_current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(disc_time: TrackTime, corrupt: bool) -> Vec<F2Frame> {
        (0..FRAMES_PER_SECTION)
            .map(|i| {
                let mut frame = F2Frame {
                    disc_time,
                    is_encoder_running: true,
                    ..F2Frame::default()
                };
                frame.data = [i as u8; 24];
                if corrupt {
                    frame.status[0] = crate::f2frame::SymbolStatus::Unrecoverable;
                }
                frame
            })
            .collect()
    }

    #[test]
    fn verify_contiguous_sections_pass_through() {
        let mut converter = F2ToF1Frames::new(false, false);

        let mut f1_frames = Vec::new();
        f1_frames.extend(converter.process(&section(TrackTime::new(0, 1, 0), false)));
        f1_frames.extend(converter.process(&section(TrackTime::new(0, 1, 1), false)));

        assert_eq!(f1_frames.len(), 2 * FRAMES_PER_SECTION);
        assert!(f1_frames.iter().all(|frame| !frame.is_padding && !frame.is_corrupt));
        assert_eq!(converter.statistics().missing_section_frames, 0);
    }

    #[test]
    fn verify_gap_is_padded() {
        let mut converter = F2ToF1Frames::new(false, false);

        let mut f1_frames = Vec::new();
        f1_frames.extend(converter.process(&section(TrackTime::new(0, 1, 0), false)));
        // Jump three frames ahead: two sections are missing.
        f1_frames.extend(converter.process(&section(TrackTime::new(0, 1, 3), false)));

        assert_eq!(f1_frames.len(), 4 * FRAMES_PER_SECTION);

        let padding: Vec<&F1Frame> = f1_frames.iter().filter(|frame| frame.is_padding).collect();
        assert_eq!(padding.len(), 2 * FRAMES_PER_SECTION);
        assert!(padding.iter().all(|frame| frame.data == [0u8; 24]));
        assert_eq!(
            converter.statistics().missing_section_frames,
            2 * FRAMES_PER_SECTION as u64
        );
    }

    #[test]
    fn verify_initial_padding() {
        let mut converter = F2ToF1Frames::new(true, false);

        // First section at 00:00.04: four frames from zero, so three sections of padding.
        let f1_frames = converter.process(&section(TrackTime::new(0, 0, 4), false));

        assert_eq!(f1_frames.len(), 4 * FRAMES_PER_SECTION);
        assert_eq!(
            converter.statistics().initial_padding_frames,
            3 * FRAMES_PER_SECTION as u64
        );
        assert_eq!(f1_frames[0].disc_time, TrackTime::new(0, 0, 1));
    }

    #[test]
    fn verify_no_timestamp_mode_never_pads() {
        let mut converter = F2ToF1Frames::new(true, true);

        let mut f1_frames = Vec::new();
        f1_frames.extend(converter.process(&section(TrackTime::new(0, 10, 0), false)));
        f1_frames.extend(converter.process(&section(TrackTime::new(0, 20, 0), false)));

        assert_eq!(f1_frames.len(), 2 * FRAMES_PER_SECTION);
        assert!(f1_frames.iter().all(|frame| frame.is_encoder_running));
    }

    #[test]
    fn verify_corrupt_frames_are_counted() {
        let mut converter = F2ToF1Frames::new(false, false);
        let f1_frames = converter.process(&section(TrackTime::new(0, 0, 1), true));

        assert!(f1_frames.iter().all(|frame| frame.is_corrupt));
        assert_eq!(converter.statistics().invalid_f2_frames, FRAMES_PER_SECTION as u64);
    }
}
