// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frequency-domain luma/chroma separation.
//!
//! The Transform filters cut each field into tiles that overlap by half their size in every
//! dimension, window them with a raised cosine, and examine the FFT of each tile: a real
//! modulated chroma signal is symmetrical around the subcarrier, so a bin is kept as chroma
//! only when it is sufficiently similar to its reflection. The overlapping inverse FFTs sum to
//! an exact reconstruction because the window is symmetric, so no inverse window is needed.

use rustfft::num_complex::Complex;
use rustfft::Fft;

use lumen_core::errors::{config_error, Result};
use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

use crate::canvas::FrameCanvas;
use crate::sourcefield::SourceField;

mod ntsc3d;
mod pal2d;
mod pal3d;

pub use ntsc3d::TransformNtsc3D;
pub use pal2d::TransformPal2D;
pub use pal3d::TransformPal3D;

/// How the similarity decision is applied to a pair of reflected bins.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TransformMode {
    /// Scale the larger of the two bins down to match the smaller, preserving both.
    Level,
    /// Discard both bins when their magnitude ratio exceeds the threshold.
    #[default]
    Threshold,
}

/// A Transform chroma filter back-end.
pub trait TransformPal: Send {
    /// Filter input fields `start..end`, using the fields outside that range as
    /// lookbehind/lookahead context where the filter needs it.
    fn filter_fields(&mut self, fields: &[SourceField], start: usize, end: usize);

    /// The chroma signal extracted for filtered field `index` (relative to `start`), one value
    /// per input sample.
    fn chroma(&self, index: usize) -> &[f64];

    /// Draw a visualisation of the FFT of one tile over each output frame. The FFT is computed
    /// per field, so this visualises the first field of each frame.
    fn overlay_fft(
        &mut self,
        position_x: i32,
        position_y: i32,
        fields: &[SourceField],
        start: usize,
        end: usize,
        frames: &mut [ComponentFrame],
    );
}

/// One value of the window function applied to tiles before the FFT. This is a symmetrical
/// raised cosine, which means the overlapping inverse-FFT tiles can be summed directly without
/// an inverse window.
pub(crate) fn compute_window(element: usize, limit: usize) -> f64 {
    0.5 - (0.5 * f64::cos((2.0 * std::f64::consts::PI * (element as f64 + 0.5)) / limit as f64))
}

/// Square the configured threshold(s) into the per-bin table the filters consume.
///
/// An empty `thresholds` applies `threshold` uniformly; otherwise one value per bin is
/// required.
pub(crate) fn build_thresholds(
    threshold: f64,
    thresholds: &[f64],
    size: usize,
) -> Result<Vec<f64>> {
    if thresholds.is_empty() {
        return Ok(vec![threshold * threshold; size]);
    }

    if thresholds.len() != size {
        return config_error(format!(
            "thresholds file has {} values, expected {}",
            thresholds.len(),
            size
        ));
    }

    Ok(thresholds.iter().map(|&value| value * value).collect())
}

/// Apply an FFT along one axis of a flattened `[Z][Y][X]` array.
pub(crate) fn fft_axis(
    data: &mut [Complex<f64>],
    dims: [usize; 3],
    axis: usize,
    fft: &dyn Fft<f64>,
) {
    let [zs, ys, xs] = dims;
    let index = |z: usize, y: usize, x: usize| ((z * ys) + y) * xs + x;

    match axis {
        // The X axis is contiguous: process() handles the whole buffer as a batch of rows.
        2 => fft.process(data),
        1 => {
            let mut line = vec![Complex::default(); ys];
            for z in 0..zs {
                for x in 0..xs {
                    for (y, value) in line.iter_mut().enumerate() {
                        *value = data[index(z, y, x)];
                    }
                    fft.process(&mut line);
                    for (y, value) in line.iter().enumerate() {
                        data[index(z, y, x)] = *value;
                    }
                }
            }
        }
        0 => {
            let mut line = vec![Complex::default(); zs];
            for y in 0..ys {
                for x in 0..xs {
                    for (z, value) in line.iter_mut().enumerate() {
                        *value = data[index(z, y, x)];
                    }
                    fft.process(&mut line);
                    for (z, value) in line.iter().enumerate() {
                        data[index(z, y, x)] = *value;
                    }
                }
            }
        }
        _ => unreachable!(),
    }
}

/// Restore Hermitian symmetry after filtering: the filters only write bins in the low half of
/// the X axis, so mirroring them into the conjugate bins makes the inverse transform real.
pub(crate) fn symmetrize(data: &mut [Complex<f64>], dims: [usize; 3]) {
    let [zs, ys, xs] = dims;
    let index = |z: usize, y: usize, x: usize| ((z * ys) + y) * xs + x;

    for z in 0..zs {
        for y in 0..ys {
            for x in 1..xs / 2 {
                let value = data[index(z, y, x)];
                data[index((zs - z) % zs, (ys - y) % ys, xs - x)] = value.conj();
            }
        }
    }
}

/// Squared magnitude of a complex bin.
#[inline]
pub(crate) fn abs_sq(value: Complex<f64>) -> f64 {
    (value.re * value.re) + (value.im * value.im)
}

/// Overlay the input and output FFT arrays onto a component frame, in either 2D or 3D.
///
/// Each block shows the absolute value of the real component of an FFT bin on a log scale.
pub(crate) fn overlay_fft_arrays(
    fft_in: &[Complex<f64>],
    fft_out: &[Complex<f64>],
    x_complex: usize,
    y_complex: usize,
    z_complex: usize,
    canvas: &mut FrameCanvas<'_>,
) {
    let green = canvas.rgb(0, 0xffff, 0);

    // How many pixels to draw for each bin.
    let x_scale = 2i32;
    let y_scale = 2i32;

    // Work out a scaling factor to make all values visible.
    let mut max_value = 0.0f64;
    for value in fft_in.iter().chain(fft_out.iter()) {
        max_value = max_value.max(value.re.abs());
    }
    let value_scale = 65535.0 / max_value.log2().max(1.0);

    // Draw each 2D plane of the two arrays side by side.
    for z in 0..z_complex {
        for column in 0..2 {
            let fft_data = if column == 0 { fft_in } else { fft_out };

            let y_start = canvas.top() + (z as i32 * ((y_scale * y_complex as i32) + 1));
            let x_start = canvas.right()
                - ((2 - column as i32) * ((x_scale * x_complex as i32) + 1))
                - 1;

            canvas.draw_rectangle(
                x_start,
                y_start,
                (x_scale * x_complex as i32) + 2,
                (y_scale * y_complex as i32) + 2,
                green,
            );

            for y in 0..y_complex {
                for x in 0..x_complex {
                    let value = fft_data[(((z * y_complex) + y) * x_complex) + x].re.abs();
                    let shade = if value <= 0.0 { 0.0 } else { value.log2() * value_scale };
                    let shade16 = shade.clamp(0.0, 65535.0) as u16;
                    let colour = canvas.grey(shade16);
                    canvas.fill_rectangle(
                        x_start + (x as i32 * x_scale) + 1,
                        y_start + (y as i32 * y_scale) + 1,
                        x_scale,
                        y_scale,
                        colour,
                    );
                }
            }
        }
    }
}

/// Shared configuration for the Transform filters.
#[derive(Clone, Debug)]
pub(crate) struct TransformConfig {
    pub mode: TransformMode,
    pub params: VideoParameters,
    pub thresholds: Vec<f64>,
}
