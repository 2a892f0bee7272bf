// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `f1frame` module defines the F1 frame, the final 24-byte payload unit handed to the
//! audio and data back-ends. One F2 frame maps to exactly one F1 frame; 98 F1 frames make up
//! one section, 1/75th of a second.

use crate::time::TrackTime;

#[derive(Clone, Debug, Default)]
pub struct F1Frame {
    pub data: [u8; 24],
    /// True when the CIRC could not fully recover this frame's payload.
    pub is_corrupt: bool,
    /// True when this frame was synthesized to fill a gap in the disc time.
    pub is_padding: bool,
    pub is_encoder_running: bool,
    pub disc_time: TrackTime,
    pub track_time: TrackTime,
    pub track_number: i32,
}
