// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sourcefield` module defines one field of composite samples with its metadata, and the
//! batch loader used by the decoder pool.

use log::warn;

use lumen_core::errors::{config_error, Result};
use lumen_core::meta::{FieldMetadata, FieldSource, VideoMetadata};
use lumen_core::video::VideoParameters;

/// A field read from the input, with metadata and data.
#[derive(Clone, Debug, Default)]
pub struct SourceField {
    pub field: FieldMetadata,
    pub data: Vec<u16>,
}

impl SourceField {
    /// The vertical offset of this field within the interlaced frame (0 for the top field, 1
    /// for the bottom field).
    pub fn offset(&self) -> i32 {
        if self.field.is_first_field {
            0
        } else {
            1
        }
    }

    /// The first active line number within this field's data, given the video parameters'
    /// first active frame line.
    pub fn first_active_line(&self, params: &VideoParameters) -> i32 {
        (params.first_active_frame_line + 1 - self.offset()) / 2
    }

    /// The last active line number within this field's data, given the video parameters' last
    /// active frame line.
    pub fn last_active_line(&self, params: &VideoParameters) -> i32 {
        (params.last_active_frame_line + 1 - self.offset()) / 2
    }

    /// Load a sequence of frames' fields from the input.
    ///
    /// `fields` is replaced with `{lookbehind fields.. [start_index] real fields.. [end_index]
    /// lookahead fields..}`. Frames requested outside the bounds of the input get frame 1's
    /// metadata and black data.
    ///
    /// Returns `(start_index, end_index)`.
    pub fn load_fields(
        source: &mut dyn FieldSource,
        metadata: &dyn VideoMetadata,
        first_frame_number: i32,
        num_frames: i32,
        look_behind_frames: i32,
        look_ahead_frames: i32,
        fields: &mut Vec<SourceField>,
    ) -> Result<(usize, usize)> {
        let params = metadata.video_parameters();

        let start_index = (2 * look_behind_frames) as usize;
        let end_index = start_index + (2 * num_frames) as usize;
        let total = end_index + (2 * look_ahead_frames) as usize;

        fields.clear();
        fields.resize(total, SourceField::default());

        let num_input_frames = metadata.num_frames();
        let mut frame_number = first_frame_number - look_behind_frames;

        for i in (0..total).step_by(2) {
            // Frames outside the bounds of the input become black fields carrying real
            // metadata (from frame 1).
            let mut use_blank_frame = frame_number < 1 || frame_number > num_input_frames;
            let metadata_frame = if use_blank_frame { 1 } else { frame_number };

            let (first_field_number, second_field_number) =
                match resolve_field_numbers(metadata, metadata_frame) {
                    Some(numbers) => numbers,
                    None => {
                        // The sidecar is unusable for this frame even after stepping back;
                        // skip it by substituting a black frame.
                        warn!("skipping frame {metadata_frame} with unusable field metadata");
                        use_blank_frame = true;
                        match resolve_field_numbers(metadata, 1) {
                            Some(numbers) => numbers,
                            None => {
                                return config_error("no usable field metadata in the input")
                            }
                        }
                    }
                };

            fields[i].field = metadata.field(first_field_number).clone();
            fields[i + 1].field = metadata.field(second_field_number).clone();

            let black = params.black16b_ire;

            if use_blank_frame {
                fields[i].data.clear();
                fields[i].data.resize(source.field_length(), black);
                fields[i + 1].data.clear();
                fields[i + 1].data.resize(source.field_length(), black);
            } else {
                source.read_field(first_field_number, &mut fields[i].data)?;
                source.read_field(second_field_number, &mut fields[i + 1].data)?;

                if params.system.is_pal_colour() && params.is_subcarrier_locked {
                    // With subcarrier-locked 4fSC PAL sampling, we have four "extra" samples
                    // over the course of the frame, so the two fields will be horizontally
                    // misaligned by two samples. Shift the second field to the left to
                    // compensate.
                    fields[i + 1].data.drain(..2);
                    fields[i + 1].data.push(black);
                    fields[i + 1].data.push(black);
                }
            }

            frame_number += 1;
        }

        Ok((start_index, end_index))
    }
}

/// Resolve the two field numbers of a frame, stepping back one frame if the sidecar is
/// inconsistent for it.
fn resolve_field_numbers(metadata: &dyn VideoMetadata, frame_number: i32) -> Option<(i32, i32)> {
    let resolve = |frame: i32| -> Option<(i32, i32)> {
        Some((metadata.first_field_number(frame)?, metadata.second_field_number(frame)?))
    };

    if let Some(numbers) = resolve(frame_number) {
        return Some(numbers);
    }

    warn!("inconsistent field metadata for frame {frame_number}, stepping back one frame");
    if frame_number > 1 {
        if let Some(numbers) = resolve(frame_number - 1) {
            return Some(numbers);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::meta::{MemoryFieldSource, SimpleMetadata};
    use lumen_core::video::VideoParameters;

    #[test]
    fn verify_active_line_ranges() {
        let params = VideoParameters::pal();

        let top = SourceField {
            field: FieldMetadata { is_first_field: true, ..FieldMetadata::default() },
            data: Vec::new(),
        };
        let bottom = SourceField { field: FieldMetadata::default(), data: Vec::new() };

        // PAL active frame lines 23..620 interlace to field lines 12..310 / 11..310.
        assert_eq!(top.offset(), 0);
        assert_eq!(bottom.offset(), 1);
        assert_eq!(top.first_active_line(&params), 12);
        assert_eq!(bottom.first_active_line(&params), 11);
        assert_eq!(top.last_active_line(&params), 310);
        assert_eq!(bottom.last_active_line(&params), 310);
    }

    #[test]
    fn verify_out_of_bounds_frames_are_black() {
        let params = VideoParameters::pal();
        let field_length = params.field_length();

        // A capture holding a single frame of mid-grey.
        let meta = SimpleMetadata::new(params.clone(), 2);
        let mut source =
            MemoryFieldSource::new(field_length, vec![vec![0x5555u16; field_length]; 2]);

        let mut fields = Vec::new();
        let (start_index, end_index) =
            SourceField::load_fields(&mut source, &meta, 1, 1, 1, 1, &mut fields).unwrap();

        assert_eq!((start_index, end_index), (2, 4));
        assert_eq!(fields.len(), 6);

        // The lookbehind and lookahead frames are out of bounds: black data, real metadata.
        for index in [0, 1, 4, 5] {
            assert!(fields[index].data.iter().all(|&s| s == params.black16b_ire));
        }
        assert!(fields[0].field.is_first_field);
        assert!(!fields[1].field.is_first_field);

        // The real frame holds the capture's data.
        assert!(fields[2].data.iter().all(|&s| s == 0x5555));
        assert!(fields[3].data.iter().all(|&s| s == 0x5555));
    }

    #[test]
    fn verify_subcarrier_locked_shift() {
        let mut params = VideoParameters::pal();
        params.is_subcarrier_locked = true;

        let field_length = params.field_length();
        let meta = SimpleMetadata::new(params.clone(), 2);

        // Second field counts up, so the shift is visible.
        let second: Vec<u16> = (0..field_length as u32).map(|i| i as u16).collect();
        let mut source = MemoryFieldSource::new(
            field_length,
            vec![vec![0u16; field_length], second],
        );

        let mut fields = Vec::new();
        SourceField::load_fields(&mut source, &meta, 1, 1, 0, 0, &mut fields).unwrap();

        // The second field is shifted left two samples, padded with black.
        assert_eq!(fields[1].data[0], 2);
        assert_eq!(fields[1].data[field_length - 3], (field_length - 1) as u16);
        assert_eq!(fields[1].data[field_length - 2], params.black16b_ire);
        assert_eq!(fields[1].data[field_length - 1], params.black16b_ire);
    }
}
