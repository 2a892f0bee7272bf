// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 3D Transform PAL: frequency-domain chroma extraction over sample/line/field tiles.
//!
//! Interlacing is handled by inserting blank lines to expand each field to the size of a frame,
//! maintaining the original lines in the right spatial positions.

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

// The input is divided into tiles of XTILE x YTILE x ZTILE, with adjacent tiles overlapping by
// half a tile. X, Y and Z here are samples, frame lines and fields.
pub(crate) const ZTILE: usize = 8;
pub(crate) const HALFZTILE: usize = ZTILE / 2;
pub(crate) const YTILE: usize = 32;
pub(crate) const HALFYTILE: usize = YTILE / 2;
pub(crate) const XTILE: usize = 16;
pub(crate) const HALFXTILE: usize = XTILE / 2;

pub(crate) const ZCOMPLEX: usize = ZTILE;
pub(crate) const YCOMPLEX: usize = YTILE;
pub(crate) const XCOMPLEX: usize = (XTILE / 2) + 1;

/// The shared tiling and FFT machinery of the 3D filters; the PAL and NTSC variants differ
/// only in their frequency-domain filter.
pub(crate) struct Transform3D {
    pub config: TransformConfig,

    window: Vec<f64>,

    forward_x: Arc<dyn Fft<f64>>,
    forward_y: Arc<dyn Fft<f64>>,
    forward_z: Arc<dyn Fft<f64>>,
    inverse_x: Arc<dyn Fft<f64>>,
    inverse_y: Arc<dyn Fft<f64>>,
    inverse_z: Arc<dyn Fft<f64>>,

    pub fft_in: Vec<Complex<f64>>,
    pub fft_out: Vec<Complex<f64>>,

    chroma_buf: Vec<Vec<f64>>,
}

impl Transform3D {
    /// The number of FFT bins the filters consider.
    pub fn thresholds_size() -> usize {
        ZCOMPLEX * YCOMPLEX * ((XCOMPLEX / 4) + 1)
    }

    pub fn new(
        params: &VideoParameters,
        mode: TransformMode,
        threshold: f64,
        thresholds: &[f64],
    ) -> Result<Transform3D> {
        let thresholds = build_thresholds(threshold, thresholds, Self::thresholds_size())?;

        let mut window = vec![0.0; ZTILE * YTILE * XTILE];
        for z in 0..ZTILE {
            let window_z = compute_window(z, ZTILE);
            for y in 0..YTILE {
                let window_y = compute_window(y, YTILE);
                for x in 0..XTILE {
                    window[((z * YTILE) + y) * XTILE + x] =
                        window_z * window_y * compute_window(x, XTILE);
                }
            }
        }

        let mut planner = FftPlanner::new();

        Ok(Transform3D {
            config: TransformConfig { mode, params: params.clone(), thresholds },
            window,
            forward_x: planner.plan_fft_forward(XTILE),
            forward_y: planner.plan_fft_forward(YTILE),
            forward_z: planner.plan_fft_forward(ZTILE),
            inverse_x: planner.plan_fft_inverse(XTILE),
            inverse_y: planner.plan_fft_inverse(YTILE),
            inverse_z: planner.plan_fft_inverse(ZTILE),
            fft_in: vec![Complex::default(); ZTILE * YTILE * XTILE],
            fft_out: vec![Complex::default(); ZTILE * YTILE * XTILE],
            chroma_buf: Vec::new(),
        })
    }

    /// Filter fields `start..end`, calling `filter` on each tile's spectrum.
    pub fn filter_fields_with(
        &mut self,
        fields: &[SourceField],
        start: usize,
        end: usize,
        filter: &mut dyn FnMut(&mut Transform3D),
    ) {
        assert!(fields.len() % 2 == 0);
        assert!(fields.iter().all(|field| !field.data.is_empty()));

        // Check that we've been given enough surrounding fields to compute FFTs that overlap
        // the fields we're actually interested in by half a tile.
        assert!(start >= HALFZTILE);
        assert!(fields.len() - end >= HALFZTILE);

        let field_size = self.config.params.field_length();
        self.chroma_buf.resize(end - start, Vec::new());
        for buf in self.chroma_buf.iter_mut() {
            buf.clear();
            buf.resize(field_size, 0.0);
        }

        let params = self.config.params.clone();

        // Iterate through the overlapping tile positions, covering the active area. (If you
        // change the Z tiling here, also review look_behind_frames/look_ahead_frames above.)
        let mut tile_z = start as i32 - HALFZTILE as i32;
        while tile_z < end as i32 {
            let mut tile_y = params.first_active_frame_line - HALFYTILE as i32;
            while tile_y < params.last_active_frame_line {
                let mut tile_x = params.active_video_start - HALFXTILE as i32;
                while tile_x < params.active_video_end {
                    self.forward_fft_tile(tile_x, tile_y, tile_z, fields);
                    filter(self);
                    self.inverse_fft_tile(tile_x, tile_y, tile_z, start, end);

                    tile_x += HALFXTILE as i32;
                }
                tile_y += HALFYTILE as i32;
            }
            tile_z += HALFZTILE as i32;
        }
    }

    pub fn chroma(&self, index: usize) -> &[f64] {
        &self.chroma_buf[index]
    }

    /// Forward-FFT one windowed input tile into `fft_in`.
    pub fn forward_fft_tile(
        &mut self,
        tile_x: i32,
        tile_y: i32,
        tile_z: i32,
        fields: &[SourceField],
    ) {
        let params = &self.config.params;
        let width = params.field_width as usize;
        let black = f64::from(params.black16b_ire);

        // Work out which lines of this tile are within the active region.
        let start_y = (params.first_active_frame_line - tile_y).max(0) as usize;
        let end_y = ((params.last_active_frame_line - tile_y) as usize).min(YTILE);

        for z in 0..ZTILE {
            let field_index = (tile_z + z as i32) as usize;
            let field = &fields[field_index];

            for y in 0..YTILE {
                let tile_offset = ((z * YTILE) + y) * XTILE;

                // If this frame line is not available in the field we're reading from (either
                // because it's above/below the active region, or because it's in the other
                // field), fill it with black instead.
                let frame_line = tile_y + y as i32;
                if y < start_y || y >= end_y || (frame_line % 2) != (field_index as i32 % 2) {
                    for x in 0..XTILE {
                        self.fft_in[tile_offset + x] =
                            Complex::new(black * self.window[tile_offset + x], 0.0);
                    }
                    continue;
                }

                let field_line = (frame_line / 2) as usize;
                let row = &field.data[field_line * width..(field_line + 1) * width];
                for x in 0..XTILE {
                    let sample = f64::from(row[(tile_x + x as i32) as usize]);
                    self.fft_in[tile_offset + x] =
                        Complex::new(sample * self.window[tile_offset + x], 0.0);
                }
            }
        }

        let dims = [ZTILE, YTILE, XTILE];
        fft_axis(&mut self.fft_in, dims, 2, self.forward_x.as_ref());
        fft_axis(&mut self.fft_in, dims, 1, self.forward_y.as_ref());
        fft_axis(&mut self.fft_in, dims, 0, self.forward_z.as_ref());
    }

    /// Inverse-FFT `fft_out`, overlaying the normalised result into the chroma buffers.
    fn inverse_fft_tile(
        &mut self,
        tile_x: i32,
        tile_y: i32,
        tile_z: i32,
        start: usize,
        end: usize,
    ) {
        let params = &self.config.params;
        let width = params.field_width as usize;

        // Work out what portion of this tile is inside the active area.
        let start_x = (params.active_video_start - tile_x).max(0) as usize;
        let end_x = ((params.active_video_end - tile_x) as usize).min(XTILE);
        let start_y = (params.first_active_frame_line - tile_y).max(0) as usize;
        let end_y = ((params.last_active_frame_line - tile_y) as usize).min(YTILE);
        let start_z = (start as i32 - tile_z).max(0) as usize;
        let end_z = ((end as i32 - tile_z) as usize).min(ZTILE);

        let dims = [ZTILE, YTILE, XTILE];
        fft_axis(&mut self.fft_out, dims, 0, self.inverse_z.as_ref());
        fft_axis(&mut self.fft_out, dims, 1, self.inverse_y.as_ref());
        fft_axis(&mut self.fft_out, dims, 2, self.inverse_x.as_ref());

        let scale = 1.0 / (ZTILE * YTILE * XTILE) as f64;

        for z in start_z..end_z {
            let output_index = (tile_z + z as i32) as usize - start;
            let output = &mut self.chroma_buf[output_index];

            for y in start_y..end_y {
                // If this frame line is not part of this field, ignore it.
                let frame_line = tile_y + y as i32;
                if (frame_line % 2) != (output_index as i32 + start as i32) % 2 {
                    continue;
                }

                let field_line = (frame_line / 2) as usize;
                let row = &mut output[field_line * width..(field_line + 1) * width];
                for x in start_x..end_x {
                    row[(tile_x + x as i32) as usize] +=
                        self.fft_out[((z * YTILE) + y) * XTILE + x].re * scale;
                }
            }
        }
    }
}

/// 3D Transform PAL filter.
pub struct TransformPal3D {
    inner: Transform3D,
}

impl TransformPal3D {
    /// The expected size of a per-bin thresholds table.
    pub fn thresholds_size() -> usize {
        Transform3D::thresholds_size()
    }

    /// The number of frames the filter needs to see into the past: tiles overlap at most half
    /// a tile of fields backwards.
    pub fn look_behind_frames() -> i32 {
        ((HALFZTILE + 1) / 2) as i32
    }

    /// The number of frames the filter needs to see into the future: at most a tile minus one
    /// field forwards.
    pub fn look_ahead_frames() -> i32 {
        (ZTILE / 2) as i32
    }

    pub fn new(
        params: &VideoParameters,
        mode: TransformMode,
        threshold: f64,
        thresholds: &[f64],
    ) -> Result<TransformPal3D> {
        Ok(TransformPal3D { inner: Transform3D::new(params, mode, threshold, thresholds)? })
    }

    /// Apply the frequency-domain filter from `fft_in` to `fft_out`.
    fn apply_filter(inner: &mut Transform3D) {
        for value in inner.fft_out.iter_mut() {
            *value = Complex::default();
        }

        // The general idea is that a real modulated chroma signal will be symmetrical around
        // the U carrier, which is at fSC Hz, 72 c/aph, 18.75 Hz -- and because we're sampling
        // at 4fSC, this is handily equivalent to being symmetrical around the V carrier owing
        // to wraparound. We look at every bin that might be a chroma signal, and only keep it
        // if it's sufficiently symmetrical with its reflection.
        //
        // The Z axis covers 0 to 50 Hz;      18.75 Hz is 3/8 * ZTILE.
        // The Y axis covers 0 to 576 c/aph;  72 c/aph is 1/8 * YTILE.
        // The X axis covers 0 to 4fSC Hz;    fSC Hz   is 1/4 * XTILE.
        let index = |z: usize, y: usize, x: usize| ((z * YTILE) + y) * XTILE + x;
        let mut thresholds = inner.config.thresholds.iter();

        for z in 0..ZTILE {
            // Reflect around 18.75 Hz temporally.
            let z_ref = ((ZTILE / 4) + ZTILE - z) % ZTILE;

            for y in 0..YTILE {
                // Reflect around 72 c/aph vertically.
                let y_ref = ((YTILE / 4) + YTILE - y) % YTILE;

                // We only need to look at horizontal frequencies that might be chroma
                // (0.5fSC to 1.5fSC).
                for x in XTILE / 8..=XTILE / 4 {
                    // Reflect around fSC horizontally.
                    let x_ref = (XTILE / 2) - x;

                    let threshold_sq = *thresholds.next().expect("thresholds table exhausted");

                    let in_val = inner.fft_in[index(z, y, x)];
                    let ref_val = inner.fft_in[index(z_ref, y_ref, x_ref)];

                    if x == x_ref && y == y_ref && z == z_ref {
                        // This bin is its own reflection (i.e. it's a carrier). Keep it!
                        inner.fft_out[index(z, y, x)] = in_val;
                        continue;
                    }

                    let m_in_sq = abs_sq(in_val);
                    let m_ref_sq = abs_sq(ref_val);

                    if m_in_sq == 0.0 && m_ref_sq == 0.0 {
                        continue;
                    }

                    match inner.config.mode {
                        TransformMode::Level => {
                            // Scale the larger of the two values down so its magnitude matches
                            // the smaller one.
                            let factor = (m_in_sq / m_ref_sq).sqrt();
                            if m_in_sq > m_ref_sq {
                                inner.fft_out[index(z, y, x)] = in_val / factor;
                                inner.fft_out[index(z_ref, y_ref, x_ref)] = ref_val;
                            } else {
                                inner.fft_out[index(z, y, x)] = in_val;
                                inner.fft_out[index(z_ref, y_ref, x_ref)] = ref_val * factor;
                            }
                        }
                        TransformMode::Threshold => {
                            // Discard both values if they are more different than the
                            // threshold for this bin.
                            if m_in_sq < m_ref_sq * threshold_sq
                                || m_ref_sq < m_in_sq * threshold_sq
                            {
                                // Probably not a chroma signal; throw it away.
                            } else {
                                inner.fft_out[index(z, y, x)] = in_val;
                                inner.fft_out[index(z_ref, y_ref, x_ref)] = ref_val;
                            }
                        }
                    }
                }
            }
        }

        assert!(thresholds.next().is_none());

        symmetrize(&mut inner.fft_out, [ZTILE, YTILE, XTILE]);
    }
}

impl TransformPal for TransformPal3D {
    fn filter_fields(&mut self, fields: &[SourceField], start: usize, end: usize) {
        self.inner.filter_fields_with(fields, start, end, &mut Self::apply_filter);
    }

    fn chroma(&self, index: usize) -> &[f64] {
        self.inner.chroma(index)
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
        let params = self.inner.config.params.clone();

        // Do nothing if the tile isn't within the frame.
        if position_x < 0
            || position_x + XTILE as i32 > params.field_width
            || position_y < 0
            || position_y + YTILE as i32 > (2 * params.field_height) + 1
        {
            return;
        }

        for (frame, field_index) in frames.iter_mut().zip((start..end).step_by(2)) {
            self.inner.forward_fft_tile(position_x, position_y, field_index as i32, fields);
            Self::apply_filter(&mut self.inner);

            let mut canvas = FrameCanvas::new(frame, &params);

            let green = canvas.rgb(0, 0xffff, 0);
            canvas.draw_rectangle(
                position_x - 1,
                position_y - 1,
                XTILE as i32 + 1,
                YTILE as i32 + 1,
                green,
            );

            overlay_fft_arrays(
                &self.inner.fft_in,
                &self.inner.fft_out,
                XCOMPLEX,
                YCOMPLEX,
                ZCOMPLEX,
                &mut canvas,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::meta::FieldMetadata;

    #[test]
    fn verify_lookbehind_lookahead() {
        assert_eq!(TransformPal3D::look_behind_frames(), 2);
        assert_eq!(TransformPal3D::look_ahead_frames(), 4);
    }

    #[test]
    fn verify_zero_input_gives_zero_chroma() {
        let params = VideoParameters::pal();
        let mut transform =
            TransformPal3D::new(&params, TransformMode::Threshold, 0.4, &[]).unwrap();

        // Two real fields with a half-tile of padding fields each side.
        let make_field = |is_first: bool| SourceField {
            field: FieldMetadata { is_first_field: is_first, ..FieldMetadata::default() },
            data: vec![0u16; params.field_length()],
        };

        let mut fields = Vec::new();
        for i in 0..(HALFZTILE + 2 + HALFZTILE) {
            fields.push(make_field(i % 2 == 0));
        }

        transform.filter_fields(&fields, HALFZTILE, HALFZTILE + 2);

        for index in 0..2 {
            assert!(transform.chroma(index).iter().all(|&value| value == 0.0));
        }
    }
}
