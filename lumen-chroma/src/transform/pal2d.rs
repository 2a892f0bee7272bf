// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D Transform PAL: frequency-domain chroma extraction over sample/line tiles within one
//! field.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use lumen_core::errors::Result;
use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

use crate::canvas::FrameCanvas;
use crate::sourcefield::SourceField;

use super::{
    abs_sq, build_thresholds, compute_window, fft_axis, overlay_fft_arrays, symmetrize,
    TransformConfig, TransformMode, TransformPal,
};

// The field is divided into tiles of XTILE x YTILE samples/lines, with adjacent tiles
// overlapping by half a tile.
const YTILE: usize = 16;
const HALFYTILE: usize = YTILE / 2;
const XTILE: usize = 32;
const HALFXTILE: usize = XTILE / 2;

// Size of the half-spectrum the filter examines. (The transform here is complex, but only bins
// with X frequency up to XTILE/2 are considered; the rest are reconstructed by symmetry.)
const YCOMPLEX: usize = YTILE;
const XCOMPLEX: usize = (XTILE / 2) + 1;

pub struct TransformPal2D {
    config: TransformConfig,

    // Window function applied before the FFT.
    window: [[f64; XTILE]; YTILE],

    // FFT plans, one per axis and direction. Plans are created once and reused.
    forward_x: Arc<dyn Fft<f64>>,
    forward_y: Arc<dyn Fft<f64>>,
    inverse_x: Arc<dyn Fft<f64>>,
    inverse_y: Arc<dyn Fft<f64>>,

    // FFT input/output buffers for the current tile.
    fft_in: Vec<Complex<f64>>,
    fft_out: Vec<Complex<f64>>,

    // The combined result of all the FFT processing for each input field. Inverse-FFT results
    // are accumulated into these buffers.
    chroma_buf: Vec<Vec<f64>>,
}

impl TransformPal2D {
    /// The number of FFT bins the filter considers, i.e. the expected size of a per-bin
    /// thresholds table.
    pub fn thresholds_size() -> usize {
        YCOMPLEX * ((XCOMPLEX / 4) + 1)
    }

    pub fn new(
        params: &VideoParameters,
        mode: TransformMode,
        threshold: f64,
        thresholds: &[f64],
    ) -> Result<TransformPal2D> {
        let thresholds = build_thresholds(threshold, thresholds, Self::thresholds_size())?;

        let mut window = [[0.0; XTILE]; YTILE];
        for (y, row) in window.iter_mut().enumerate() {
            let window_y = compute_window(y, YTILE);
            for (x, value) in row.iter_mut().enumerate() {
                *value = window_y * compute_window(x, XTILE);
            }
        }

        let mut planner = FftPlanner::new();

        Ok(TransformPal2D {
            config: TransformConfig { mode, params: params.clone(), thresholds },
            window,
            forward_x: planner.plan_fft_forward(XTILE),
            forward_y: planner.plan_fft_forward(YTILE),
            inverse_x: planner.plan_fft_inverse(XTILE),
            inverse_y: planner.plan_fft_inverse(YTILE),
            fft_in: vec![Complex::default(); YTILE * XTILE],
            fft_out: vec![Complex::default(); YTILE * XTILE],
            chroma_buf: Vec::new(),
        })
    }

    /// Process one field, accumulating the result into `chroma_buf[output_index]`.
    fn filter_field(&mut self, field: &SourceField, output_index: usize) {
        let params = self.config.params.clone();
        let first_line = field.first_active_line(&params);
        let last_line = field.last_active_line(&params);

        // Iterate through the overlapping tile positions, covering the active area.
        let mut tile_y = first_line - HALFYTILE as i32;
        while tile_y < last_line {
            // Work out which lines of these tiles are within the active region.
            let start_y = (first_line - tile_y).max(0) as usize;
            let end_y = ((last_line - tile_y) as usize).min(YTILE);

            let mut tile_x = params.active_video_start - HALFXTILE as i32;
            while tile_x < params.active_video_end {
                self.forward_fft_tile(tile_x, tile_y, start_y, end_y, field);
                self.apply_filter();
                self.inverse_fft_tile(tile_x, tile_y, start_y, end_y, output_index);

                tile_x += HALFXTILE as i32;
            }

            tile_y += HALFYTILE as i32;
        }
    }

    /// Forward-FFT one windowed input tile into `fft_in`.
    fn forward_fft_tile(
        &mut self,
        tile_x: i32,
        tile_y: i32,
        start_y: usize,
        end_y: usize,
        field: &SourceField,
    ) {
        let params = &self.config.params;
        let width = params.field_width as usize;
        let black = f64::from(params.black16b_ire);

        for y in 0..YTILE {
            // Lines above/below the active region are filled with black so the window still
            // matches.
            if y < start_y || y >= end_y {
                for x in 0..XTILE {
                    self.fft_in[(y * XTILE) + x] =
                        Complex::new(black * self.window[y][x], 0.0);
                }
                continue;
            }

            let line = (tile_y + y as i32) as usize;
            let row = &field.data[line * width..(line + 1) * width];
            for x in 0..XTILE {
                let sample = f64::from(row[(tile_x + x as i32) as usize]);
                self.fft_in[(y * XTILE) + x] = Complex::new(sample * self.window[y][x], 0.0);
            }
        }

        fft_axis(&mut self.fft_in, [1, YTILE, XTILE], 2, self.forward_x.as_ref());
        fft_axis(&mut self.fft_in, [1, YTILE, XTILE], 1, self.forward_y.as_ref());
    }

    /// Inverse-FFT `fft_out`, overlaying the normalised result into the chroma buffer.
    fn inverse_fft_tile(
        &mut self,
        tile_x: i32,
        tile_y: i32,
        start_y: usize,
        end_y: usize,
        output_index: usize,
    ) {
        let params = &self.config.params;
        let width = params.field_width as usize;

        // Work out what X range of this tile is inside the active area.
        let start_x = (params.active_video_start - tile_x).max(0) as usize;
        let end_x = ((params.active_video_end - tile_x) as usize).min(XTILE);

        fft_axis(&mut self.fft_out, [1, YTILE, XTILE], 1, self.inverse_y.as_ref());
        fft_axis(&mut self.fft_out, [1, YTILE, XTILE], 2, self.inverse_x.as_ref());

        let scale = 1.0 / (YTILE * XTILE) as f64;
        let output = &mut self.chroma_buf[output_index];

        for y in start_y..end_y {
            let line = (tile_y + y as i32) as usize;
            let row = &mut output[line * width..(line + 1) * width];
            for x in start_x..end_x {
                row[(tile_x + x as i32) as usize] += self.fft_out[(y * XTILE) + x].re * scale;
            }
        }
    }

    /// Apply the frequency-domain filter from `fft_in` to `fft_out`.
    fn apply_filter(&mut self) {
        // Clear fft_out. We discard values by default; the filter only copies values that look
        // like chroma.
        for value in self.fft_out.iter_mut() {
            *value = Complex::default();
        }

        // The general idea is that a real modulated chroma signal will be symmetrical around
        // the U carrier, which is at fSC Hz and 72 c/aph -- and because we're sampling at 4fSC,
        // this is handily equivalent to being symmetrical around the V carrier owing to
        // wraparound. We look at every bin that might be a chroma signal, and only keep it if
        // it's sufficiently symmetrical with its reflection.
        //
        // The Y axis covers 0 to 288 c/aph;  72 c/aph is 1/4 * YTILE.
        // The X axis covers 0 to 4fSC Hz;    fSC Hz   is 1/4 * XTILE.
        let mut thresholds = self.config.thresholds.iter();

        for y in 0..YTILE {
            // Reflect around 72 c/aph vertically.
            let y_ref = ((YTILE / 2) + YTILE - y) % YTILE;

            // We only need to look at horizontal frequencies that might be chroma
            // (0.5fSC to 1.5fSC).
            for x in XTILE / 8..=XTILE / 4 {
                // Reflect around fSC horizontally.
                let x_ref = (XTILE / 2) - x;

                let threshold_sq = *thresholds.next().expect("thresholds table exhausted");

                let in_val = self.fft_in[(y * XTILE) + x];
                let ref_val = self.fft_in[(y_ref * XTILE) + x_ref];

                if x == x_ref && y == y_ref {
                    // This bin is its own reflection (i.e. it's a carrier). Keep it!
                    self.fft_out[(y * XTILE) + x] = in_val;
                    continue;
                }

                let m_in_sq = abs_sq(in_val);
                let m_ref_sq = abs_sq(ref_val);

                if m_in_sq == 0.0 && m_ref_sq == 0.0 {
                    continue;
                }

                match self.config.mode {
                    TransformMode::Level => {
                        // Compare the magnitudes of the two values, and scale the larger one
                        // down so its magnitude is the same as the smaller one.
                        let factor = (m_in_sq / m_ref_sq).sqrt();
                        if m_in_sq > m_ref_sq {
                            self.fft_out[(y * XTILE) + x] = in_val / factor;
                            self.fft_out[(y_ref * XTILE) + x_ref] = ref_val;
                        } else {
                            self.fft_out[(y * XTILE) + x] = in_val;
                            self.fft_out[(y_ref * XTILE) + x_ref] = ref_val * factor;
                        }
                    }
                    TransformMode::Threshold => {
                        // Discard both bins if they are more different than the threshold for
                        // this bin.
                        if m_in_sq < m_ref_sq * threshold_sq || m_ref_sq < m_in_sq * threshold_sq
                        {
                            // Probably not a chroma signal; throw it away.
                        } else {
                            // They're similar. Keep it!
                            self.fft_out[(y * XTILE) + x] = in_val;
                            self.fft_out[(y_ref * XTILE) + x_ref] = ref_val;
                        }
                    }
                }
            }
        }

        assert!(thresholds.next().is_none());

        symmetrize(&mut self.fft_out, [1, YTILE, XTILE]);
    }
}

impl TransformPal for TransformPal2D {
    fn filter_fields(&mut self, fields: &[SourceField], start: usize, end: usize) {
        assert!(fields.len() % 2 == 0);
        assert!(fields.iter().all(|field| !field.data.is_empty()));

        // Allocate and clear the output buffers.
        let field_size = self.config.params.field_length();
        self.chroma_buf.resize(end - start, Vec::new());
        for buf in self.chroma_buf.iter_mut() {
            buf.clear();
            buf.resize(field_size, 0.0);
        }

        for (output_index, field) in fields[start..end].iter().enumerate() {
            self.filter_field(field, output_index);
        }
    }

    fn chroma(&self, index: usize) -> &[f64] {
        &self.chroma_buf[index]
    }

    fn overlay_fft(
        &mut self,
        position_x: i32,
        position_y: i32,
        fields: &[SourceField],
        start: usize,
        end: usize,
        frames: &mut [ComponentFrame],
    ) {
        let params = self.config.params.clone();

        // Do nothing if the tile isn't within the frame.
        if position_x < 0
            || position_x + XTILE as i32 > params.field_width
            || position_y < 0
            || position_y + YTILE as i32 > (2 * params.field_height) + 1
        {
            return;
        }

        // Visualise the first field of each frame.
        for (frame, field_index) in frames.iter_mut().zip((start..end).step_by(2)) {
            let field = &fields[field_index];
            let first_line = field.first_active_line(&params);
            let last_line = field.last_active_line(&params);

            // The requested position is in frame coordinates.
            let tile_y = position_y / 2;
            let start_y = (first_line - tile_y).max(0) as usize;
            let end_y = ((last_line - tile_y) as usize).min(YTILE);

            self.forward_fft_tile(position_x, tile_y, start_y, end_y, field);
            self.apply_filter();

            let mut canvas = FrameCanvas::new(frame, &params);

            // Outline the selected tile.
            let green = canvas.rgb(0, 0xffff, 0);
            canvas.draw_rectangle(
                position_x - 1,
                position_y + field.offset() - 1,
                XTILE as i32 + 1,
                (YTILE as i32 * 2) + 1,
                green,
            );

            overlay_fft_arrays(&self.fft_in, &self.fft_out, XCOMPLEX, YCOMPLEX, 1, &mut canvas);
        }
    }
}
