// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `decoder` module defines the seam between the decoder pool and the chroma decoders.

use lumen_core::errors::Result;
use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

use crate::sourcefield::SourceField;

/// A chroma decoder.
///
/// The decoder itself holds the configuration shared by every worker thread; each thread gets
/// its own [`DecoderWorker`] carrying the per-thread working state (filter banks, FFT plans,
/// scratch buffers).
pub trait Decoder: Sync {
    /// Configure the decoder for the given input. Fails if the video system is not one this
    /// decoder handles.
    fn configure(&mut self, params: &VideoParameters) -> Result<()>;

    /// The number of frames the decoder needs to see into the past. Zero is appropriate for
    /// 1D/2D decoders.
    fn look_behind(&self) -> i32 {
        0
    }

    /// The number of frames the decoder needs to see into the future. Zero is appropriate for
    /// 1D/2D decoders.
    fn look_ahead(&self) -> i32 {
        0
    }

    /// Create the working state for one worker thread.
    fn make_worker(&self) -> Result<Box<dyn DecoderWorker + Send>>;
}

/// Per-thread decoding state.
pub trait DecoderWorker {
    /// Decode a sequence of fields into a sequence of interlaced component frames.
    ///
    /// `fields[start_index..end_index]` are the field pairs to decode; fields outside that
    /// range are lookbehind/lookahead context. One frame is produced per field pair.
    fn decode_frames(
        &mut self,
        fields: &[SourceField],
        start_index: usize,
        end_index: usize,
        frames: &mut Vec<ComponentFrame>,
    );
}
