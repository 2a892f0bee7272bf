// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `meta` module defines the collaborator interfaces through which decoders see a capture:
//! a metadata object describing frames and fields, and a seekable source of field samples.

use crate::errors::Result;
use crate::video::VideoParameters;

/// A dropout: a horizontal run of samples on one field line that the RF decoder could not
/// recover.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Dropout {
    pub start_x: i32,
    pub end_x: i32,
    pub field_line: i32,
}

/// Per-field metadata provided by the capture's sidecar.
#[derive(Clone, Debug, Default)]
pub struct FieldMetadata {
    /// True for the first (top) field of a frame.
    pub is_first_field: bool,
    /// Subcarrier burst phase identifier: 1-4 for NTSC, 1-8 for PAL, 0 when unknown.
    pub phase_id: i32,
    pub dropouts: Vec<Dropout>,
}

/// Frame and field metadata for a whole capture.
///
/// Field numbers are 1-based, matching the numbering used by the capture tools.
pub trait VideoMetadata {
    fn video_parameters(&self) -> &VideoParameters;

    fn num_frames(&self) -> i32;

    fn num_fields(&self) -> i32;

    /// Get the field number of the first field of `frame_number`, or `None` if the sidecar is
    /// inconsistent for that frame.
    fn first_field_number(&self, frame_number: i32) -> Option<i32>;

    /// Get the field number of the second field of `frame_number`, or `None` if the sidecar is
    /// inconsistent for that frame.
    fn second_field_number(&self, frame_number: i32) -> Option<i32>;

    fn field(&self, field_number: i32) -> &FieldMetadata;
}

/// A seekable source of field samples.
pub trait FieldSource {
    /// Number of samples in one field.
    fn field_length(&self) -> usize;

    /// Read field `field_number` (1-based), replacing the contents of `data`.
    fn read_field(&mut self, field_number: i32, data: &mut Vec<u16>) -> Result<()>;
}

/// Simple in-memory metadata: fields are stored in capture order, frame `n` pairing fields
/// `2n-1` and `2n`. Suitable for synthesized captures and tests.
pub struct SimpleMetadata {
    params: VideoParameters,
    fields: Vec<FieldMetadata>,
}

impl SimpleMetadata {
    /// Describe a capture of `num_fields` fields laid out in strict first/second order.
    pub fn new(params: VideoParameters, num_fields: i32) -> SimpleMetadata {
        let fields = (0..num_fields)
            .map(|i| FieldMetadata {
                is_first_field: (i % 2) == 0,
                // NTSC burst phase advances by one per field, modulo four.
                phase_id: (i % 4) + 1,
                dropouts: Vec::new(),
            })
            .collect();

        SimpleMetadata { params, fields }
    }
}

impl VideoMetadata for SimpleMetadata {
    fn video_parameters(&self) -> &VideoParameters {
        &self.params
    }

    fn num_frames(&self) -> i32 {
        (self.fields.len() / 2) as i32
    }

    fn num_fields(&self) -> i32 {
        self.fields.len() as i32
    }

    fn first_field_number(&self, frame_number: i32) -> Option<i32> {
        if frame_number < 1 || frame_number > self.num_frames() {
            return None;
        }
        Some((frame_number * 2) - 1)
    }

    fn second_field_number(&self, frame_number: i32) -> Option<i32> {
        if frame_number < 1 || frame_number > self.num_frames() {
            return None;
        }
        Some(frame_number * 2)
    }

    fn field(&self, field_number: i32) -> &FieldMetadata {
        &self.fields[(field_number - 1) as usize]
    }
}

/// An in-memory field source holding every field of a capture.
pub struct MemoryFieldSource {
    field_length: usize,
    fields: Vec<Vec<u16>>,
}

impl MemoryFieldSource {
    pub fn new(field_length: usize, fields: Vec<Vec<u16>>) -> MemoryFieldSource {
        for field in &fields {
            assert_eq!(field.len(), field_length);
        }
        MemoryFieldSource { field_length, fields }
    }
}

impl FieldSource for MemoryFieldSource {
    fn field_length(&self) -> usize {
        self.field_length
    }

    fn read_field(&mut self, field_number: i32, data: &mut Vec<u16>) -> Result<()> {
        let field = &self.fields[(field_number - 1) as usize];
        data.clear();
        data.extend_from_slice(field);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::VideoParameters;

    #[test]
    fn verify_simple_metadata_field_numbering() {
        let meta = SimpleMetadata::new(VideoParameters::pal(), 6);

        assert_eq!(meta.num_frames(), 3);
        assert_eq!(meta.first_field_number(1), Some(1));
        assert_eq!(meta.second_field_number(1), Some(2));
        assert_eq!(meta.first_field_number(3), Some(5));
        assert_eq!(meta.first_field_number(0), None);
        assert_eq!(meta.second_field_number(4), None);

        assert!(meta.field(1).is_first_field);
        assert!(!meta.field(2).is_first_field);
    }
}
