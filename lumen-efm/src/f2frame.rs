// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `f2frame` module defines the F2 frame: 24 bytes of payload recovered by the CIRC
//! decoder, with per-symbol correction status and the timing recovered from the subcode.

use crate::time::TrackTime;

/// Correction status of one payload symbol.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SymbolStatus {
    #[default]
    Valid,
    /// The symbol was repaired by C1 or C2.
    Corrected,
    /// The symbol is beyond the correction capability of the CIRC.
    Unrecoverable,
}

/// One post-CIRC frame.
#[derive(Clone, Debug, Default)]
pub struct F2Frame {
    pub data: [u8; 24],
    pub status: [SymbolStatus; 24],
    pub disc_time: TrackTime,
    pub track_time: TrackTime,
    pub track_number: i32,
    pub is_encoder_running: bool,
}

impl F2Frame {
    /// Returns true if any symbol of the frame is unrecoverable.
    pub fn is_corrupt(&self) -> bool {
        self.status.iter().any(|&status| status == SymbolStatus::Unrecoverable)
    }
}
