// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `mono` module passes all input through as luma, for purely monochrome sources.

use lumen_core::errors::Result;
use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

use crate::decoder::{Decoder, DecoderWorker};
use crate::sourcefield::SourceField;

/// Decoder that copies the composite signal unchanged into Y, leaving U and V zero.
#[derive(Default)]
pub struct MonoDecoder {
    params: Option<VideoParameters>,
    /// Skip allocating chroma planes; set when the output format is luma only.
    pub mono_frames: bool,
}

impl MonoDecoder {
    pub fn new() -> MonoDecoder {
        MonoDecoder::default()
    }
}

impl Decoder for MonoDecoder {
    fn configure(&mut self, params: &VideoParameters) -> Result<()> {
        // This decoder works for any system.
        params.validate()?;
        self.params = Some(params.clone());
        Ok(())
    }

    fn make_worker(&self) -> Result<Box<dyn DecoderWorker + Send>> {
        let params = self.params.clone().expect("decoder not configured");
        Ok(Box::new(MonoWorker { params, mono_frames: self.mono_frames }))
    }
}

struct MonoWorker {
    params: VideoParameters,
    mono_frames: bool,
}

impl DecoderWorker for MonoWorker {
    fn decode_frames(
        &mut self,
        fields: &[SourceField],
        start_index: usize,
        end_index: usize,
        frames: &mut Vec<ComponentFrame>,
    ) {
        frames.resize((end_index - start_index) / 2, ComponentFrame::new());

        for (frame_index, field_index) in (start_index..end_index).step_by(2).enumerate() {
            self.decode_frame(
                &fields[field_index],
                &fields[field_index + 1],
                &mut frames[frame_index],
            );
        }
    }
}

impl MonoWorker {
    fn decode_frame(
        &self,
        first_field: &SourceField,
        second_field: &SourceField,
        frame: &mut ComponentFrame,
    ) {
        let params = &self.params;

        // Initialise and clear the component frame.
        frame.init(params, self.mono_frames);

        // Interlace the active lines of the two input fields.
        for line in params.first_active_frame_line..params.last_active_frame_line {
            let field = if line % 2 == 0 { first_field } else { second_field };
            let field_line = (line / 2) as usize;
            let width = params.field_width as usize;

            let input = &field.data[field_line * width..(field_line + 1) * width];

            // Copy the whole composite signal to Y, leaving U and V blank.
            let out_y = frame.y_mut(line as usize);
            for x in params.active_video_start..params.active_video_end {
                out_y[x as usize] = f64::from(input[x as usize]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::meta::FieldMetadata;

    #[test]
    fn verify_mono_fidelity() {
        let params = VideoParameters::ntsc();

        let mut decoder = MonoDecoder::new();
        decoder.configure(&params).unwrap();
        let mut worker = decoder.make_worker().unwrap();

        // A pair of fields filled with a gradient.
        let width = params.field_width as usize;
        let make_field = |is_first: bool, base: u16| SourceField {
            field: FieldMetadata { is_first_field: is_first, ..FieldMetadata::default() },
            data: (0..params.field_length()).map(|i| base + (i % 971) as u16).collect(),
        };
        let fields = vec![make_field(true, 20000), make_field(false, 21000)];

        let mut frames = Vec::new();
        worker.decode_frames(&fields, 0, 2, &mut frames);

        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!(frame.height(), 525);

        // Within the active region, y(line, x) == composite(line, x) and u == v == 0.
        for line in params.first_active_frame_line..params.last_active_frame_line {
            let field = &fields[(line % 2) as usize];
            let field_line = (line / 2) as usize;

            for x in params.active_video_start..params.active_video_end {
                let composite = f64::from(field.data[field_line * width + x as usize]);
                assert_eq!(frame.y(line as usize)[x as usize], composite);
                assert_eq!(frame.u(line as usize)[x as usize], 0.0);
                assert_eq!(frame.v(line as usize)[x as usize], 0.0);
            }
        }
    }
}
