// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `video` module defines the composite video system parameters shared by every decoder.

use crate::errors::{config_error, Result};

/// The broadcast system a capture was sampled from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VideoSystem {
    /// 625-line PAL.
    Pal,
    /// 525-line NTSC.
    Ntsc,
    /// 525-line PAL-M, i.e. NTSC line timing with PAL colour encoding.
    PalM,
}

impl VideoSystem {
    /// Returns true if the system uses PAL colour encoding (alternating V-switch).
    pub fn is_pal_colour(&self) -> bool {
        matches!(self, VideoSystem::Pal | VideoSystem::PalM)
    }

    /// Returns true if the system uses 625-line/25Hz timing.
    pub fn is_625_line(&self) -> bool {
        matches!(self, VideoSystem::Pal)
    }
}

/// Sampling geometry and levels of a time-base-corrected composite capture.
///
/// Coordinates are signed because filters routinely index a few samples or lines outside the
/// regions described here; the decoders substitute black for anything out of range.
#[derive(Clone, Debug)]
pub struct VideoParameters {
    pub system: VideoSystem,
    /// Sample rate in Hz. Captures are sampled at 4fSC.
    pub sample_rate: f64,
    /// Colour subcarrier frequency in Hz.
    pub fsc: f64,
    /// Width of one field in samples.
    pub field_width: i32,
    /// Height of one field in lines.
    pub field_height: i32,
    /// First and last active line numbers within the interlaced frame.
    pub first_active_frame_line: i32,
    pub last_active_frame_line: i32,
    /// First and last active line numbers within a single field.
    pub first_active_field_line: i32,
    pub last_active_field_line: i32,
    /// Active picture region within a line, in samples.
    pub active_video_start: i32,
    pub active_video_end: i32,
    /// Colourburst region within a line, in samples.
    pub colour_burst_start: i32,
    pub colour_burst_end: i32,
    /// 16-bit codes for reference black and peak white.
    pub black16b_ire: u16,
    pub white16b_ire: u16,
    pub is_widescreen: bool,
    /// True when the capture is subcarrier-locked rather than line-locked.
    pub is_subcarrier_locked: bool,
}

impl VideoParameters {
    /// Check the parameter set for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.white16b_ire <= self.black16b_ire {
            return config_error("white level must be above black level");
        }
        if self.active_video_start < self.colour_burst_end {
            return config_error("active video must start after the colourburst");
        }
        if self.active_video_end > self.field_width {
            return config_error("active video must end within the field");
        }
        if self.last_active_frame_line <= self.first_active_frame_line {
            return config_error("active frame region is empty");
        }
        if self.last_active_field_line <= self.first_active_field_line {
            return config_error("active field region is empty");
        }
        Ok(())
    }

    /// Height of the interlaced frame formed by two fields.
    pub fn frame_height(&self) -> i32 {
        (self.field_height * 2) - 1
    }

    /// Number of samples in one field.
    pub fn field_length(&self) -> usize {
        (self.field_width as usize) * (self.field_height as usize)
    }

    /// Standard PAL LaserDisc capture layout.
    pub fn pal() -> VideoParameters {
        VideoParameters {
            system: VideoSystem::Pal,
            sample_rate: 4.0 * 4433618.75,
            fsc: 4433618.75,
            field_width: 1135,
            field_height: 313,
            first_active_frame_line: 23,
            last_active_frame_line: 620,
            first_active_field_line: 22,
            last_active_field_line: 308,
            active_video_start: 185,
            active_video_end: 1107,
            colour_burst_start: 98,
            colour_burst_end: 138,
            black16b_ire: 16384,
            white16b_ire: 54016,
            is_widescreen: false,
            is_subcarrier_locked: false,
        }
    }

    /// Standard NTSC LaserDisc capture layout.
    pub fn ntsc() -> VideoParameters {
        VideoParameters {
            system: VideoSystem::Ntsc,
            sample_rate: 4.0 * 315000000.0 / 88.0,
            fsc: 315000000.0 / 88.0,
            field_width: 910,
            field_height: 263,
            first_active_frame_line: 40,
            last_active_frame_line: 525,
            first_active_field_line: 20,
            last_active_field_line: 259,
            active_video_start: 134,
            active_video_end: 894,
            colour_burst_start: 78,
            colour_burst_end: 110,
            black16b_ire: 15872,
            white16b_ire: 51200,
            is_widescreen: false,
            is_subcarrier_locked: false,
        }
    }

    /// Standard PAL-M capture layout: NTSC geometry, PAL colour.
    pub fn pal_m() -> VideoParameters {
        VideoParameters {
            system: VideoSystem::PalM,
            fsc: 3575611.49,
            sample_rate: 4.0 * 3575611.49,
            field_width: 909,
            colour_burst_start: 78,
            colour_burst_end: 110,
            active_video_start: 134,
            active_video_end: 894,
            ..VideoParameters::ntsc()
        }
    }
}
