// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `frame` module defines the component frame produced by the chroma decoders.

use crate::video::VideoParameters;

/// Two complete, interlaced fields' worth of decoded luma and chroma information.
///
/// The luma and chroma samples have the same scaling as in the original composite signal (i.e.
/// they're not in Y'CbCr form yet). You can recover the chroma signal by subtracting Y from the
/// composite signal.
///
/// Each plane is one contiguous buffer of `width * height` samples; line `k` starts `k * width`
/// samples in. Indexing a line outside the frame is a programming error and panics.
#[derive(Clone, Debug, Default)]
pub struct ComponentFrame {
    width: usize,
    height: usize,
    y_data: Vec<f64>,
    u_data: Vec<f64>,
    v_data: Vec<f64>,
}

impl ComponentFrame {
    pub fn new() -> ComponentFrame {
        ComponentFrame::default()
    }

    /// Set the frame's size from the video parameters and clear it to black.
    ///
    /// If `mono` is true the U and V planes are released; a mono frame's chroma is implicitly
    /// zero and must not be read.
    pub fn init(&mut self, params: &VideoParameters, mono: bool) {
        self.width = params.field_width as usize;
        self.height = params.frame_height() as usize;

        let size = self.width * self.height;

        self.y_data.clear();
        self.y_data.resize(size, 0.0);

        let chroma_size = if mono { 0 } else { size };

        self.u_data.clear();
        self.u_data.resize(chroma_size, 0.0);

        self.v_data.clear();
        self.v_data.resize(chroma_size, 0.0);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns true if the frame was initialised without chroma planes.
    pub fn is_mono(&self) -> bool {
        self.u_data.is_empty()
    }

    pub fn y(&self, line: usize) -> &[f64] {
        let offset = self.line_offset(line);
        &self.y_data[offset..offset + self.width]
    }

    pub fn u(&self, line: usize) -> &[f64] {
        let offset = self.line_offset(line);
        &self.u_data[offset..offset + self.width]
    }

    pub fn v(&self, line: usize) -> &[f64] {
        let offset = self.line_offset(line);
        &self.v_data[offset..offset + self.width]
    }

    pub fn y_mut(&mut self, line: usize) -> &mut [f64] {
        let offset = self.line_offset(line);
        &mut self.y_data[offset..offset + self.width]
    }

    pub fn u_mut(&mut self, line: usize) -> &mut [f64] {
        let offset = self.line_offset(line);
        &mut self.u_data[offset..offset + self.width]
    }

    pub fn v_mut(&mut self, line: usize) -> &mut [f64] {
        let offset = self.line_offset(line);
        &mut self.v_data[offset..offset + self.width]
    }

    /// Get mutable views of all three planes of one line at once.
    pub fn yuv_mut(&mut self, line: usize) -> (&mut [f64], &mut [f64], &mut [f64]) {
        let offset = self.line_offset(line);
        let width = self.width;
        (
            &mut self.y_data[offset..offset + width],
            &mut self.u_data[offset..offset + width],
            &mut self.v_data[offset..offset + width],
        )
    }

    fn line_offset(&self, line: usize) -> usize {
        assert!(line < self.height, "line {} out of range for frame height {}", line, self.height);
        line * self.width
    }
}
