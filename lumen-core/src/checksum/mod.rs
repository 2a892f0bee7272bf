// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `checksum` module provides implementations of the error-detecting codes used by the
//! subcode and sector layers.

mod crc16;
mod crc32;

pub use crc16::Crc16Ccitt;
pub use crc32::Crc32Edc;
