// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chroma decoders for time-base-corrected composite captures.
//!
//! A capture is a stream of monochrome composite fields; the decoders here separate each
//! interlaced frame into luma and chroma using one of several strategies:
//!
//! - [`pal::PalColour`]: a line-locked 2D FIR PAL decoder, optionally fed by the
//!   frequency-domain Transform PAL filters.
//! - [`comb::Comb`]: an NTSC comb filter with 1D, 2D and adaptive 3D modes, optionally fed by
//!   the Transform NTSC filter.
//! - [`mono::MonoDecoder`]: a pass-through for monochrome sources.
//!
//! [`pool::DecoderPool`] drives any of them across a worker-thread pool, reading batches of
//! fields and reassembling the decoded frames into a strictly ordered output stream.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Lumen crates. Please see the workspace Cargo.toml for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_range_loop)]

pub mod canvas;
pub mod comb;
pub mod decoder;
pub mod mono;
pub mod output;
pub mod pal;
pub mod pool;
pub mod sourcefield;
pub mod tbc;
pub mod transform;

pub use decoder::{Decoder, DecoderWorker};
pub use output::{OutputConfig, OutputFrame, OutputWriter, PixelFormat};
pub use pool::{DecoderPool, PoolEvent, PoolOptions};
pub use sourcefield::SourceField;
