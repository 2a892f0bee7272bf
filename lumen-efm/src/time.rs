// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `time` module defines the MSF (minute:second.frame) time format used by the subcode,
//! counting 75 frames per second.

use std::fmt;

/// An absolute or per-track MSF time code.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct TrackTime {
    frames: i32,
}

impl TrackTime {
    pub const FRAMES_PER_SECOND: i32 = 75;

    pub fn new(minutes: i32, seconds: i32, frames: i32) -> TrackTime {
        TrackTime { frames: ((minutes * 60) + seconds) * TrackTime::FRAMES_PER_SECOND + frames }
    }

    /// Build a time code from BCD-coded minute, second and frame bytes, as stored in the Q
    /// channel. Returns `None` if any digit is out of range.
    pub fn from_bcd(min: u8, sec: u8, frame: u8) -> Option<TrackTime> {
        let minutes = bcd_to_integer(min)?;
        let seconds = bcd_to_integer(sec)?;
        let frames = bcd_to_integer(frame)?;

        if seconds >= 60 || frames >= TrackTime::FRAMES_PER_SECOND {
            return None;
        }

        Some(TrackTime::new(minutes, seconds, frames))
    }

    /// Total length in frames.
    pub fn total_frames(&self) -> i32 {
        self.frames
    }

    pub fn minutes(&self) -> i32 {
        self.frames / (60 * TrackTime::FRAMES_PER_SECOND)
    }

    pub fn seconds(&self) -> i32 {
        (self.frames / TrackTime::FRAMES_PER_SECOND) % 60
    }

    pub fn frames(&self) -> i32 {
        self.frames % TrackTime::FRAMES_PER_SECOND
    }

    pub fn add_frames(&mut self, frames: i32) {
        self.frames += frames;
    }

    pub fn subtract_frames(&mut self, frames: i32) {
        self.frames -= frames;
    }

    /// Difference from `other` to `self` in frames.
    pub fn difference(&self, other: TrackTime) -> i32 {
        self.frames - other.frames
    }
}

impl fmt::Display for TrackTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}.{:02}", self.minutes(), self.seconds(), self.frames())
    }
}

/// Convert a two-digit BCD byte to an integer. Returns `None` if either nibble exceeds 9.
pub fn bcd_to_integer(bcd: u8) -> Option<i32> {
    let high = i32::from(bcd >> 4);
    let low = i32::from(bcd & 0xf);

    if high > 9 || low > 9 {
        return None;
    }

    Some((high * 10) + low)
}
