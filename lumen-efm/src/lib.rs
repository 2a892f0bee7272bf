// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder pipeline for the EFM channel code read off a LaserDisc's digital audio tracks.
//!
//! The pipeline recovers audio samples and data sectors from a stream of T-values (pit/land run
//! lengths) in successive abstraction steps:
//!
//! ```text
//! T-values -> F3 frames -> (CIRC) F2 frames -> F1 frames -> audio samples
//!                                                        -> data sectors
//! ```
//!
//! Every stage is fail-soft: sync loss, uncorrectable symbols and missing sections degrade the
//! output (error flags, concealment, zero padding) rather than aborting the decode. The pipeline
//! carries state between calls and is deliberately single-threaded; feed it the capture in order.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Lumen crates. Please see the workspace Cargo.toml for
// their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::identity_op)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::needless_range_loop)]

pub mod audio;
pub mod circ;
pub mod efmtof3;
pub mod f1frame;
pub mod f2frame;
pub mod f2tof1;
pub mod f3frame;
pub mod galois;
pub mod pipeline;
pub mod section;
pub mod sector;
pub mod time;

mod efmtable;

#[cfg(test)]
mod testsupport;

pub use pipeline::{EfmDecoder, EfmDecoderOptions, EfmStatistics};
