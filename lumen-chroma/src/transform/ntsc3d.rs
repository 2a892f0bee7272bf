// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 3D Transform NTSC: frequency-domain chroma extraction over sample/line/field tiles.
//!
//! This shares the 3D tiling machinery with the PAL filter but uses the NTSC subcarrier
//! geometry, and is less exact: NTSC chroma is only approximately symmetrical around the
//! subcarrier, so the filter additionally compares each candidate bin against the
//! corresponding luma frequency and distrusts chroma with no luma behind it.

use rustfft::num_complex::Complex;

use lumen_core::errors::Result;
use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

use crate::canvas::FrameCanvas;
use crate::sourcefield::SourceField;

use super::pal3d::{Transform3D, XCOMPLEX, XTILE, YCOMPLEX, YTILE, ZCOMPLEX, ZTILE};
use super::{abs_sq, overlay_fft_arrays, TransformMode, TransformPal};

#[inline]
fn dist_sq(x: f64, y: f64, z: f64) -> f64 {
    (x * x) + (y * y) + (z * z)
}

/// 3D Transform NTSC filter.
pub struct TransformNtsc3D {
    inner: Transform3D,
}

impl TransformNtsc3D {
    /// The expected size of a per-bin thresholds table.
    pub fn thresholds_size() -> usize {
        Transform3D::thresholds_size()
    }

    pub fn new(
        params: &VideoParameters,
        mode: TransformMode,
        threshold: f64,
        thresholds: &[f64],
    ) -> Result<TransformNtsc3D> {
        Ok(TransformNtsc3D { inner: Transform3D::new(params, mode, threshold, thresholds)? })
    }

    /// The number of frames the filter needs to see into the past.
    pub fn look_behind_frames() -> i32 {
        ((super::pal3d::HALFZTILE + 1) / 2 + 1) as i32
    }

    /// The number of frames the filter needs to see into the future: at most a tile minus one
    /// field forwards.
    pub fn look_ahead_frames() -> i32 {
        (ZTILE / 2) as i32
    }

    /// Apply the frequency-domain filter from `fft_in` to `fft_out`.
    fn apply_filter(inner: &mut Transform3D) {
        for value in inner.fft_out.iter_mut() {
            *value = Complex::default();
        }

        // A real modulated chroma signal will be approximately symmetrical around the
        // subcarrier, which is at fSC Hz, 120 c/aph, 15 Hz. We look at every bin that might be
        // a chroma signal, and only keep it if it's sufficiently symmetrical with its
        // reflection. This is less exact than the PAL case: we rely on the fact that it is
        // "unlikely" that I and Q have the amplitude/phase relationship that causes one of the
        // two frequency amplitudes to vanish.
        //
        // In addition, compare with the corresponding luma frequency: it is "unlikely" that
        // there is chroma but no corresponding luma.
        //
        //  0----------0  Here we can illustrate the effect of interlacing
        //  |    /\    |  in yz frequency space:
        //-z|   /  \   |   (y,z) and (y+YTILE/2,z+ZTILE/2) are equivalent.
        //  |  /    c  |  Thus, every point inside the diamond is
        //  | /      \ |  equivalent to a point outside the diamond.
        //  |/    0   \|  - The origin is at the corners+center.
        //  |\        /|  - The subcarrier is at the two 'c' points.
        //  | \      / |  - The origin is symmetric around the subcarrier,
        //  |  c    /  |    so if x=fSC then the reflection comparison
        //  |   \  /   |    tells us nothing.
        //+z|    \/    |  - The midpoints of the sides are also equivalent
        //  0----------0    and symmetric around the subcarrier. (This
        //    +y   -y       corresponds to fine details appearing in
        //                  different fields.)
        //
        // The Z axis covers 0 to 60 Hz;      15 Hz     is 1/4 * ZTILE.
        // The Y axis covers 0 to 480 c/aph;  120 c/aph is 1/4 * YTILE.
        // The X axis covers 0 to 4fSC Hz;    fSC Hz    is 1/4 * XTILE.
        let index = |z: usize, y: usize, x: usize| ((z * YTILE) + y) * XTILE + x;
        let mut thresholds = inner.config.thresholds.iter();

        for z in 0..ZTILE {
            // Reflect around 15 Hz temporally.
            let z_ref = ((ZTILE / 2) + ZTILE - z) % ZTILE;
            // Subtract 15 Hz.
            let z_lumaref = (z + ZTILE - ZTILE / 4) % ZTILE;
            let z_lumaref_neg = (ZTILE - z_lumaref) % ZTILE;
            let kz0 = z as f64 / ZTILE as f64;

            for y in 0..YTILE {
                // Reflect around 120 c/aph vertically.
                let y_ref = ((YTILE / 2) + YTILE - y) % YTILE;
                // Subtract 120 c/aph.
                let y_lumaref = (y + YTILE - YTILE / 4) % YTILE;
                let y_lumaref_neg = (YTILE - y_lumaref) % YTILE;
                let ky0 = y as f64 / YTILE as f64;

                // Map to the central "diamond".
                let (mut kz, mut ky) = if kz0 + ky0 < 0.5 {
                    (kz0 + 0.5, ky0 + 0.5)
                } else if kz0 + ky0 > 1.5 {
                    (kz0 - 0.5, ky0 - 0.5)
                } else if kz0 - ky0 > 0.5 {
                    (kz0 - 0.5, ky0 + 0.5)
                } else if ky0 - kz0 > 0.5 {
                    (kz0 + 0.5, ky0 - 0.5)
                } else {
                    (kz0, ky0)
                };
                // Bring to the lower-left half of the diamond.
                if kz + ky > 1.0 {
                    kz = 1.0 - kz;
                    ky = 1.0 - ky;
                }

                // We only need to look at horizontal frequencies that might be chroma
                // (0.5fSC to 1.5fSC).
                for x in XTILE / 8..=XTILE / 4 {
                    // Reflect around fSC horizontally.
                    let x_ref = (XTILE / 2) - x;
                    // Subtract fSC; if the result is negative, negate the whole reference
                    // frequency.
                    let x_lumaref = x as i32 - (XTILE / 4) as i32;
                    let kx = x as f64 / XTILE as f64;

                    let lumaref_val = if x_lumaref >= 0 {
                        inner.fft_in[index(z_lumaref, y_lumaref, x_lumaref as usize)]
                    } else {
                        inner.fft_in[index(z_lumaref_neg, y_lumaref_neg, (-x_lumaref) as usize)]
                    };

                    let threshold0_sq = *thresholds.next().expect("thresholds table exhausted");

                    let in_val = inner.fft_in[index(z, y, x)];
                    let ref_val = inner.fft_in[index(z_ref, y_ref, x_ref)];

                    if x == x_ref
                        && ((y == YTILE / 4 && z == ZTILE / 4)
                            || (y == 3 * YTILE / 4 && z == 3 * ZTILE / 4))
                    {
                        // This bin is its own reflection (i.e. it's a carrier). Keep it!
                        inner.fft_out[index(z, y, x)] = in_val;
                        continue;
                    }
                    if x == x_ref
                        && (((y == 0 || y == YTILE / 2) && (z == 0 || z == ZTILE / 2))
                            || (y == YTILE / 4 && z == 3 * ZTILE / 4)
                            || (y == 3 * YTILE / 4 && z == ZTILE / 4))
                    {
                        // This bin is its own reflection (but not a carrier). Discard it!
                        continue;
                    }

                    // Adjust the threshold based on distance to uniform luma vs uniform
                    // chroma. This breaks functionality based on reading in
                    // frequency-dependent thresholds.
                    let k_sq_luma = dist_sq(kz - 0.5, ky - 0.5, kx);
                    let k_sq_chroma = dist_sq(kz - 0.25, ky - 0.25, kx - 0.25);
                    let threshold_sq =
                        (k_sq_chroma / (k_sq_luma + k_sq_chroma)).powf(10.0 * threshold0_sq);

                    let m_in_sq = abs_sq(in_val);
                    let m_ref_sq = abs_sq(ref_val);
                    let m_lumaref_sq = abs_sq(lumaref_val);

                    if m_in_sq == 0.0 && m_ref_sq == 0.0 {
                        continue;
                    }

                    match inner.config.mode {
                        TransformMode::Level => {
                            let factor = (m_in_sq / m_ref_sq).sqrt();
                            if m_in_sq.max(m_ref_sq) > 10.0 * m_lumaref_sq {
                                // No corresponding luma signal: discard the bin.
                            } else if m_in_sq > 10.0 * m_ref_sq {
                                // Reduce in_val, keep ref_val as is.
                                inner.fft_out[index(z, y, x)] = in_val / factor;
                                inner.fft_out[index(z_ref, y_ref, x_ref)] = ref_val;
                            } else if m_ref_sq > 10.0 * m_in_sq {
                                // Reduce ref_val, keep in_val as is.
                                inner.fft_out[index(z, y, x)] = in_val;
                                inner.fft_out[index(z_ref, y_ref, x_ref)] = ref_val * factor;
                            } else {
                                // Keep both.
                                inner.fft_out[index(z, y, x)] = in_val;
                                inner.fft_out[index(z_ref, y_ref, x_ref)] = ref_val;
                            }
                        }
                        TransformMode::Threshold => {
                            // Discard both values if they are more different than the
                            // threshold for this bin.
                            let mut threshold2_sq = threshold_sq;
                            if m_lumaref_sq < m_in_sq.max(m_ref_sq) * threshold_sq {
                                // No corresponding luma signal: tighten the threshold.
                                threshold2_sq = 0.5 * (1.0 + threshold2_sq);
                            }

                            if m_in_sq < m_ref_sq * threshold2_sq
                                || m_ref_sq < m_in_sq * threshold2_sq
                            {
                                // Probably not a chroma signal; throw it away.
                            } else {
                                // They're similar. Keep it!
                                inner.fft_out[index(z, y, x)] = in_val;
                                inner.fft_out[index(z_ref, y_ref, x_ref)] = ref_val;
                            }
                        }
                    }
                }
            }
        }

        assert!(thresholds.next().is_none());

        super::symmetrize(&mut inner.fft_out, [ZTILE, YTILE, XTILE]);
    }
}

impl TransformPal for TransformNtsc3D {
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
