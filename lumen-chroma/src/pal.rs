// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pal` module implements a line-locked PAL decoder using 2D FIR filters.
//!
//! For a good overview of line-locked PAL decoding techniques, see BBC Research Department
//! Report 1986/02, "Colour encoding and decoding techniques for line-locked sampled PAL and
//! NTSC television signals" by C.K.P. Clark. The decoder here uses the architecture shown in
//! Figure 23(c), except that it has three separate baseband filters, one each for Y, U and V,
//! with different characteristics. Rather than tracking the colour subcarrier using a PLL, it
//! detects the phase of the subcarrier at the colourburst, and rotates the U/V output to
//! compensate when decoding.
//!
//! BBC Research Department Report 1988/11, "PAL decoding: Multi-dimensional filter design for
//! chrominance-luminance separation", also by C.K.P. Clark, describes the design concerns
//! behind these filters. As this is a software implementation, it can use larger filters with
//! more complex coefficients than the report describes.
//!
//! In place of the FIR chroma separation, the decoder can be fed by one of the
//! frequency-domain [Transform PAL filters](crate::transform).

use std::f64::consts::PI;

use lumen_core::errors::{unsupported_error, Result};
use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

use crate::decoder::{Decoder, DecoderWorker};
use crate::sourcefield::SourceField;
use crate::transform::{TransformMode, TransformPal, TransformPal2D, TransformPal3D};

/// Which filter separates luma and chroma.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ChromaFilterMode {
    /// The 2D FIR filter in this module.
    #[default]
    PalColour,
    /// The 2D Transform PAL frequency-domain filter.
    Transform2D,
    /// The 3D Transform PAL frequency-domain filter.
    Transform3D,
}

#[derive(Clone, Debug)]
pub struct PalConfiguration {
    pub chroma_gain: f64,
    /// Phase rotation applied to the output chroma, in degrees.
    pub chroma_phase: f64,
    /// Luma noise reduction level, in IRE.
    pub y_nr_level: f64,
    /// Use only a 1D horizontal filter for U and V.
    pub simple_pal: bool,
    pub chroma_filter: ChromaFilterMode,
    pub transform_mode: TransformMode,
    pub transform_threshold: f64,
    /// Per-bin thresholds; empty applies `transform_threshold` uniformly.
    pub transform_thresholds: Vec<f64>,
    pub show_ffts: bool,
    pub show_position_x: i32,
    pub show_position_y: i32,
}

impl Default for PalConfiguration {
    fn default() -> Self {
        PalConfiguration {
            chroma_gain: 1.0,
            chroma_phase: 0.0,
            y_nr_level: 0.5,
            simple_pal: false,
            chroma_filter: ChromaFilterMode::PalColour,
            transform_mode: TransformMode::Threshold,
            transform_threshold: 0.4,
            transform_thresholds: Vec::new(),
            show_ffts: false,
            show_position_x: 200,
            show_position_y: 200,
        }
    }
}

impl PalConfiguration {
    /// The expected size of a per-bin thresholds table for the selected filter.
    pub fn thresholds_size(&self) -> usize {
        match self.chroma_filter {
            ChromaFilterMode::Transform2D => TransformPal2D::thresholds_size(),
            ChromaFilterMode::Transform3D => TransformPal3D::thresholds_size(),
            ChromaFilterMode::PalColour => 0,
        }
    }

    pub fn look_behind(&self) -> i32 {
        match self.chroma_filter {
            ChromaFilterMode::Transform3D => TransformPal3D::look_behind_frames(),
            _ => 0,
        }
    }

    pub fn look_ahead(&self) -> i32 {
        match self.chroma_filter {
            ChromaFilterMode::Transform3D => TransformPal3D::look_ahead_frames(),
            _ => 0,
        }
    }
}

// Each 2D filter is (2 * FILTER_SIZE) + 1 samples wide.
const FILTER_SIZE: usize = 7;

/// Information about a line being decoded.
struct LineInfo {
    number: i32,
    // bp, bq = cos(t), sin(t), where t is the burst phase. They're used to build a rotation
    // matrix for the chroma signals in decode_line.
    bp: f64,
    bq: f64,
    vsw: f64,
    burst_norm: f64,
}

/// The line-locked PAL decoder.
pub struct PalColour {
    config: PalConfiguration,
    params: VideoParameters,

    // The subcarrier reference signal: quadrature samples of a sine wave at the subcarrier
    // frequency.
    sine: Vec<f64>,
    cosine: Vec<f64>,
    ref_norm: f64,

    // Coefficients for the three 2D chroma low-pass filters. There are separate filters for U
    // and V, but only the signs differ, so they can share a set of coefficients.
    //
    // The filters are horizontally and vertically symmetrical, so each array represents one
    // quarter of a filter. The zeroth horizontal element is included in the sum twice, so the
    // coefficient is halved to compensate.
    cfilt: [[f64; 4]; FILTER_SIZE + 1],
    yfilt: [[f64; 2]; FILTER_SIZE + 1],

    // The Transform PAL filter, when one is selected.
    transform: Option<Box<dyn TransformPal>>,
}

impl PalColour {
    pub fn new(params: &VideoParameters, config: &PalConfiguration) -> Result<PalColour> {
        let transform: Option<Box<dyn TransformPal>> = match config.chroma_filter {
            ChromaFilterMode::PalColour => None,
            ChromaFilterMode::Transform2D => Some(Box::new(TransformPal2D::new(
                params,
                config.transform_mode,
                config.transform_threshold,
                &config.transform_thresholds,
            )?)),
            ChromaFilterMode::Transform3D => Some(Box::new(TransformPal3D::new(
                params,
                config.transform_mode,
                config.transform_threshold,
                &config.transform_thresholds,
            )?)),
        };

        let mut decoder = PalColour {
            config: config.clone(),
            params: params.clone(),
            sine: Vec::new(),
            cosine: Vec::new(),
            ref_norm: 0.0,
            cfilt: [[0.0; 4]; FILTER_SIZE + 1],
            yfilt: [[0.0; 2]; FILTER_SIZE + 1],
            transform,
        };
        decoder.build_lookup_tables();

        Ok(decoder)
    }

    /// Build the reference carrier and the filter coefficient tables.
    fn build_lookup_tables(&mut self) {
        let params = &self.params;

        // Generate the reference carrier: quadrature samples of a sine wave at the subcarrier
        // frequency. We'll use this for two purposes below:
        // - product-detecting the line samples, to give us quadrature samples of the chroma
        //   information centred on 0 Hz
        // - working out what the phase of the subcarrier is on each line, so we can rotate the
        //   chroma samples to put U/V on the right axes
        let ref_ampl = 1.28;
        self.ref_norm = ref_ampl * ref_ampl / 2.0;

        self.sine.clear();
        self.cosine.clear();
        for i in 0..params.field_width {
            let rad = 2.0 * PI * f64::from(i) * params.fsc / params.sample_rate;
            self.sine.push(ref_ampl * rad.sin());
            self.cosine.push(ref_ampl * rad.cos());
        }

        // Create filter profiles for colour filtering.
        //
        // One can argue over merits of different filters, but we stick with a simple raised
        // cosine unless there's a compelling reason to do otherwise. PAL-I colour bandwidth
        // should be around 1.1 or 1.2 MHz; the width of the filter window scales with the
        // sample rate. The 0.93 is a bit empirical for the 4fSC sampled LaserDisc scans.
        let chroma_bandwidth_hz = 1100000.0 / 0.93;

        let ca = 0.5 * params.sample_rate / chroma_bandwidth_hz;
        let ya = ca;
        assert!(FILTER_SIZE >= ca as usize);

        // Note that the y-filter is *much* less selective in the vertical direction: this is
        // to prevent castellation on horizontal colour boundaries.
        let mut cdiv = 0.0;
        let mut ydiv = 0.0;

        for f in 0..=FILTER_SIZE {
            let ff = f as f64;

            // 0-2-4-6 sequence here because we're only processing one field.
            let fc = ca.min(ff);
            let fq = ca.min((ff * ff + 2.0 * 2.0).sqrt());
            let fqq = ca.min((ff * ff + 4.0 * 4.0).sqrt());
            let fqqq = ca.min((ff * ff + 6.0 * 6.0).sqrt());

            // Divider because we're only making half a filter kernel and the zeroth point
            // (vertically) is counted twice later.
            let d = if f == 0 { 2.0 } else { 1.0 };

            // For U/V. Elements 0, 2, 1, 3 are vertical taps 0, +/-1, +/-2, +/-3 (see the
            // filter loop in decode_line).
            self.cfilt[f][0] = 256.0 * (1.0 + (PI * fc / ca).cos()) / d;
            self.cfilt[f][2] = 256.0 * (1.0 + (PI * fq / ca).cos()) / d;
            self.cfilt[f][1] = 256.0 * (1.0 + (PI * fqq / ca).cos()) / d;
            self.cfilt[f][3] = 256.0 * (1.0 + (PI * fqqq / ca).cos()) / d;

            cdiv += self.cfilt[f][0] + 2.0 * self.cfilt[f][2] + 2.0 * self.cfilt[f][1]
                + 2.0 * self.cfilt[f][3];

            let fy = ya.min(ff);
            let fyy = ya.min((ff * ff + 4.0 * 4.0).sqrt());

            // For Y, only use lines n, n+/-2: the others cancel! Using lines +/-1 and 3 can be
            // made to work, but introduces phase-sensitivity to the filter, which leaks too
            // much subcarrier if anything phase-shifts.
            //
            // The 0.2 factor makes tap +/-2 much less sensitive to adjacent lines, reducing
            // castellations and residual dot patterning.
            //
            // Elements 0, 1 are vertical taps 0, +/-2.
            self.yfilt[f][0] = 256.0 * (1.0 + (PI * fy / ya).cos()) / d;
            self.yfilt[f][1] = 0.2 * 256.0 * (1.0 + (PI * fyy / ya).cos()) / d;

            ydiv += self.yfilt[f][0] + 2.0 * 0.0 + 2.0 * self.yfilt[f][1] + 2.0 * 0.0;
        }

        // Normalise the filter coefficients. We've already doubled above for horizontal
        // symmetry; do it again for vertical symmetry.
        cdiv *= 2.0;
        ydiv *= 2.0;
        for f in 0..=FILTER_SIZE {
            for value in self.cfilt[f].iter_mut() {
                *value /= cdiv;
            }
            for value in self.yfilt[f].iter_mut() {
                *value /= ydiv;
            }
        }
    }

    /// Decode a sequence of fields into a sequence of interlaced frames.
    pub fn decode_frames(
        &mut self,
        fields: &[SourceField],
        start_index: usize,
        end_index: usize,
        frames: &mut Vec<ComponentFrame>,
    ) {
        assert!((end_index - start_index) % 2 == 0);
        frames.resize((end_index - start_index) / 2, ComponentFrame::new());

        // Run the Transform filter over the whole batch first, if one is selected.
        if let Some(transform) = self.transform.as_mut() {
            transform.filter_fields(fields, start_index, end_index);
        }

        for (frame_index, field_index) in (start_index..end_index).step_by(2).enumerate() {
            frames[frame_index].init(&self.params, false);

            for field_offset in 0..2 {
                let chroma = self
                    .transform
                    .as_ref()
                    .map(|transform| transform.chroma(field_index + field_offset - start_index));
                self.decode_field(
                    &fields[field_index + field_offset],
                    chroma,
                    &mut frames[frame_index],
                );
            }
        }

        if self.config.show_ffts {
            if let Some(transform) = self.transform.as_mut() {
                transform.overlay_fft(
                    self.config.show_position_x,
                    self.config.show_position_y,
                    fields,
                    start_index,
                    end_index,
                    frames,
                );
            }
        }
    }

    fn decode_field(
        &self,
        field: &SourceField,
        chroma: Option<&[f64]>,
        frame: &mut ComponentFrame,
    ) {
        let first_line = field.first_active_line(&self.params);
        let last_line = field.last_active_line(&self.params);

        // The filters below all read f64; convert the composite field once.
        let composite: Vec<f64> = field.data.iter().map(|&sample| f64::from(sample)).collect();

        // The chroma source is either the Transform filter's output or the composite itself.
        let prefiltered = chroma.is_some();
        let chroma_data = chroma.unwrap_or(&composite);

        for line_number in first_line..last_line {
            let line = self.detect_burst(line_number, &composite);
            self.decode_line(
                field,
                &composite,
                chroma_data,
                prefiltered,
                (first_line, last_line),
                &line,
                frame,
            );
        }
    }

    /// Find the absolute burst phase of one line relative to the reference carrier, by product
    /// detection.
    fn detect_burst(&self, line_number: i32, composite: &[f64]) -> LineInfo {
        let params = &self.params;
        let width = params.field_width as usize;

        // Get the surrounding lines of input data. If a line we need is outside the field, use
        // black instead. (Unlike decode_line, we don't need to stay in the active area, since
        // we're only looking at the colourburst.)
        let zeros = vec![0.0; width];
        let row = |n: i32| -> &[f64] {
            if n < 0 || n >= params.field_height {
                &zeros
            } else {
                &composite[(n as usize) * width..(n as usize + 1) * width]
            }
        };

        let in0 = row(line_number);
        let in1 = row(line_number - 1);
        let in2 = row(line_number + 1);
        let in3 = row(line_number - 2);
        let in4 = row(line_number + 2);

        // To avoid hue-shifts on alternate lines, the phase is determined by averaging the
        // phase on the current line with the average of two other lines, one above and one
        // below it.
        //
        // We use the next-but-one line above and below (in the field), which will have the
        // same V-switch phase as the current line (and a 180 degree change of phase), and also
        // analyse the average (bpo/bqo) of the lines immediately above and below, which have
        // the opposite V-switch phase (and a 90 degree subcarrier phase shift).
        let mut bp = 0.0;
        let mut bq = 0.0;
        let mut bpo = 0.0;
        let mut bqo = 0.0;

        for i in params.colour_burst_start as usize..params.colour_burst_end as usize {
            bp += ((in0[i] - ((in3[i] + in4[i]) / 2.0)) / 2.0) * self.sine[i];
            bq += ((in0[i] - ((in3[i] + in4[i]) / 2.0)) / 2.0) * self.cosine[i];
            bpo += ((in2[i] - in1[i]) / 2.0) * self.sine[i];
            bqo += ((in2[i] - in1[i]) / 2.0) * self.cosine[i];
        }

        // Normalise the sums above.
        let burst_length = f64::from(params.colour_burst_end - params.colour_burst_start);
        bp /= burst_length;
        bq /= burst_length;
        bpo /= burst_length;
        bqo /= burst_length;

        // Detect the V-switch state on this line: compare the vector magnitude difference
        // between the burst phases of this line and the adjacent lines to the magnitude of the
        // burst itself.
        let vsw = if ((bp - bpo) * (bp - bpo)) + ((bq - bqo) * (bq - bqo))
            < (bp * bp + bq * bq) * 2.0
        {
            1.0
        } else {
            -1.0
        };

        // Average the burst phase to get -U (reference) phase out -- burst phase is (-U +/-V).
        let mut bp = (bp - bqo) / 2.0;
        let mut bq = (bq + bpo) / 2.0;

        // Apply the configured chroma phase rotation to the detected burst.
        if self.config.chroma_phase != 0.0 {
            let rotation = self.config.chroma_phase.to_radians();
            let (sin, cos) = rotation.sin_cos();
            (bp, bq) = ((bp * cos) - (bq * sin), (bp * sin) + (bq * cos));
        }

        // burst_norm normalises bp and bq to 1. Kill the colour if the burst is too weak.
        let burst_norm = (bp * bp + bq * bq).sqrt().max(130000.0 / 128.0);

        LineInfo { number: line_number, bp, bq, vsw, burst_norm }
    }

    /// Decode one line's worth of chroma and luma.
    #[allow(clippy::too_many_arguments)]
    fn decode_line(
        &self,
        field: &SourceField,
        composite: &[f64],
        chroma_data: &[f64],
        prefiltered: bool,
        active_lines: (i32, i32),
        line: &LineInfo,
        frame: &mut ComponentFrame,
    ) {
        let params = &self.params;
        let width = params.field_width as usize;
        let (first_line, last_line) = active_lines;

        // Get the surrounding lines of chroma input. If a line we need is outside the active
        // area, use black instead.
        let zeros = vec![0.0; width];
        let row = |n: i32| -> &[f64] {
            if n < first_line || n >= last_line {
                &zeros
            } else {
                &chroma_data[(n as usize) * width..(n as usize + 1) * width]
            }
        };

        let in0 = row(line.number);
        let in1 = row(line.number - 1);
        let in2 = row(line.number + 1);
        let in3 = row(line.number - 2);
        let in4 = row(line.number + 2);
        let in5 = row(line.number - 3);
        let in6 = row(line.number + 3);

        // Check that the filter isn't going to run out of data horizontally.
        assert!(params.active_video_start - (FILTER_SIZE as i32) >= params.colour_burst_end);
        assert!(params.active_video_end + (FILTER_SIZE as i32) + 1 <= params.field_width);

        // Multiply the composite input signal by the reference carrier, giving quadrature
        // samples where the colour subcarrier is now at 0 Hz. (There will be a considerable
        // amount of energy at higher frequencies resulting from the luma information and
        // aliases of the signal, so it needs low-pass filtering before the colour components
        // are extracted.)
        //
        // As the 2D filters are vertically symmetrical, we can pre-compute the sums of pairs
        // of lines above and below the current line to save some work in the inner loop.
        //
        // Vertical taps 1 and 2 are swapped in the array to save one addition in the filter
        // loop, as U and V use the same sign for taps 0 and 2.
        let filter_start = (params.active_video_start - FILTER_SIZE as i32) as usize;
        let filter_end = (params.active_video_end + FILTER_SIZE as i32 + 1) as usize;

        let mut m = vec![[0.0f64; 4]; width];
        let mut n = vec![[0.0f64; 4]; width];
        for i in filter_start..filter_end {
            m[i][0] = in0[i] * self.sine[i];
            m[i][2] = (in1[i] * self.sine[i]) - (in2[i] * self.sine[i]);
            m[i][1] = (-in3[i] * self.sine[i]) - (in4[i] * self.sine[i]);
            m[i][3] = (-in5[i] * self.sine[i]) + (in6[i] * self.sine[i]);

            n[i][0] = in0[i] * self.cosine[i];
            n[i][2] = (in1[i] * self.cosine[i]) - (in2[i] * self.cosine[i]);
            n[i][1] = (-in3[i] * self.cosine[i]) - (in4[i] * self.cosine[i]);
            n[i][3] = (-in5[i] * self.cosine[i]) + (in6[i] * self.cosine[i]);
        }

        let active_start = params.active_video_start as usize;
        let active_end = params.active_video_end as usize;

        // p and q are the sine/cosine components' amplitudes. Multi-line filtering assumes
        // perfect inter-line phase registration.
        let mut pu = vec![0.0f64; width];
        let mut qu = vec![0.0f64; width];
        let mut pv = vec![0.0f64; width];
        let mut qv = vec![0.0f64; width];
        let mut py = vec![0.0f64; width];
        let mut qy = vec![0.0f64; width];

        for i in active_start..active_end {
            let mut sums = [0.0f64; 6];

            // Carry out 2D filtering. P and Q are the two arbitrary sine/cosine phase
            // components; U filters for U, V for V, and Y for Y.
            //
            // U and V are the same for lines n (tap 0) and n+/-2 (tap 1), but differ in sign
            // for n+/-1 (tap 2) and n+/-3 (tap 3) owing to the forward/backward axis slant.
            //
            // With simple_pal set, U and V use only the current line: a 1D filter.
            for b in 0..=FILTER_SIZE {
                let l = i - b;
                let r = i + b;

                sums[4] += ((m[r][0] + m[l][0]) * self.yfilt[b][0])
                    + ((m[r][1] + m[l][1]) * self.yfilt[b][1]);
                sums[5] += ((n[r][0] + n[l][0]) * self.yfilt[b][0])
                    + ((n[r][1] + n[l][1]) * self.yfilt[b][1]);

                if self.config.simple_pal {
                    sums[0] += (m[r][0] + m[l][0]) * self.cfilt[b][0];
                    sums[1] += (n[r][0] + n[l][0]) * self.cfilt[b][0];
                    sums[2] += (m[r][0] + m[l][0]) * self.cfilt[b][0];
                    sums[3] += (n[r][0] + n[l][0]) * self.cfilt[b][0];
                } else {
                    sums[0] += ((m[r][0] + m[l][0]) * self.cfilt[b][0])
                        + ((m[r][1] + m[l][1]) * self.cfilt[b][1])
                        + ((n[r][2] + n[l][2]) * self.cfilt[b][2])
                        + ((n[r][3] + n[l][3]) * self.cfilt[b][3]);
                    sums[1] += ((n[r][0] + n[l][0]) * self.cfilt[b][0])
                        + ((n[r][1] + n[l][1]) * self.cfilt[b][1])
                        - ((m[r][2] + m[l][2]) * self.cfilt[b][2])
                        - ((m[r][3] + m[l][3]) * self.cfilt[b][3]);
                    sums[2] += ((m[r][0] + m[l][0]) * self.cfilt[b][0])
                        + ((m[r][1] + m[l][1]) * self.cfilt[b][1])
                        - ((n[r][2] + n[l][2]) * self.cfilt[b][2])
                        - ((n[r][3] + n[l][3]) * self.cfilt[b][3]);
                    sums[3] += ((n[r][0] + n[l][0]) * self.cfilt[b][0])
                        + ((n[r][1] + n[l][1]) * self.cfilt[b][1])
                        + ((m[r][2] + m[l][2]) * self.cfilt[b][2])
                        + ((m[r][3] + m[l][3]) * self.cfilt[b][3]);
                }
            }

            pu[i] = sums[0];
            qu[i] = sums[1];
            pv[i] = sums[2];
            qv[i] = sums[3];
            py[i] = sums[4];
            qy[i] = sums[5];
        }

        // The output line within the interlaced frame.
        let output_line = ((line.number * 2) + field.offset()) as usize;
        let comp = &composite[(line.number as usize) * width..(line.number as usize + 1) * width];

        // Gain for the U/V components, normalised by the burst amplitude.
        let scaled_saturation = 2.0 * self.config.chroma_gain / line.burst_norm;

        let (out_y, out_u, out_v) = frame.yuv_mut(output_line);

        for i in active_start..active_end {
            // Compute luma by...
            let y = if prefiltered {
                // ... subtracting the pre-filtered chroma from the composite input
                comp[i] - in0[i]
            } else {
                // ... resynthesising the chroma signal that the Y filter extracted, and
                // subtracting it from the composite input
                comp[i] - (((py[i] * self.sine[i]) + (qy[i] * self.cosine[i])) / self.ref_norm)
            };
            out_y[i] = y;

            // Rotate the p and q components (at the arbitrary sine/cosine reference phase)
            // backwards by the burst phase (relative to the reference phase), in order to
            // recover U and V. The V-switch is applied to flip the V phase on alternate lines.
            out_u[i] = -((pu[i] * line.bp) + (qu[i] * line.bq)) * scaled_saturation;
            out_v[i] = line.vsw * -((qv[i] * line.bp) - (pv[i] * line.bq)) * scaled_saturation;
        }

        self.do_ynr(&mut out_y[active_start..active_end]);
    }

    /// Luma noise reduction: a coring filter that removes low-level high-frequency noise.
    fn do_ynr(&self, y_line: &mut [f64]) {
        if self.config.y_nr_level <= 0.0 {
            return;
        }

        let params = &self.params;
        let ire_scale = (f64::from(params.white16b_ire) - f64::from(params.black16b_ire)) / 100.0;
        let core_level = self.config.y_nr_level * ire_scale;

        // Separate the high-frequency component with a short low-pass, then subtract the part
        // of it that's below the coring level.
        let original = y_line.to_vec();
        for i in 1..y_line.len() - 1 {
            let low_pass = (original[i - 1] + (2.0 * original[i]) + original[i + 1]) / 4.0;
            let high_freq = original[i] - low_pass;
            y_line[i] -= high_freq.clamp(-core_level, core_level);
        }
    }
}

/// The PAL decoder for the pool: wraps [`PalColour`] workers.
#[derive(Default)]
pub struct PalDecoder {
    config: PalConfiguration,
    params: Option<VideoParameters>,
}

impl PalDecoder {
    pub fn new(config: PalConfiguration) -> PalDecoder {
        PalDecoder { config, params: None }
    }
}

impl Decoder for PalDecoder {
    fn configure(&mut self, params: &VideoParameters) -> Result<()> {
        // Ensure the source video uses PAL colour encoding.
        if !params.system.is_pal_colour() {
            return unsupported_error("this decoder is for PAL video sources only");
        }
        params.validate()?;

        self.params = Some(params.clone());
        Ok(())
    }

    fn look_behind(&self) -> i32 {
        self.config.look_behind()
    }

    fn look_ahead(&self) -> i32 {
        self.config.look_ahead()
    }

    fn make_worker(&self) -> Result<Box<dyn DecoderWorker + Send>> {
        let params = self.params.as_ref().expect("decoder not configured");
        Ok(Box::new(PalWorker { pal: PalColour::new(params, &self.config)? }))
    }
}

struct PalWorker {
    pal: PalColour,
}

impl DecoderWorker for PalWorker {
    fn decode_frames(
        &mut self,
        fields: &[SourceField],
        start_index: usize,
        end_index: usize,
        frames: &mut Vec<ComponentFrame>,
    ) {
        self.pal.decode_frames(fields, start_index, end_index, frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::meta::FieldMetadata;

    fn make_field(params: &VideoParameters, samples: impl Fn(i32, i32) -> f64) -> SourceField {
        let width = params.field_width;
        let data = (0..params.field_length())
            .map(|i| {
                let line = (i as i32) / width;
                let x = (i as i32) % width;
                samples(line, x).round().clamp(0.0, 65535.0) as u16
            })
            .collect();

        SourceField {
            field: FieldMetadata { is_first_field: true, ..FieldMetadata::default() },
            data,
        }
    }

    fn field_pair(params: &VideoParameters, samples: impl Fn(i32, i32) -> f64) -> Vec<SourceField> {
        let mut first = make_field(params, &samples);
        let mut second = make_field(params, &samples);
        first.field.is_first_field = true;
        second.field.is_first_field = false;
        vec![first, second]
    }

    fn decode(params: &VideoParameters, config: &PalConfiguration, fields: &[SourceField]) -> ComponentFrame {
        let mut decoder = PalColour::new(params, config).unwrap();
        let mut frames = Vec::new();
        decoder.decode_frames(fields, 0, 2, &mut frames);
        frames.remove(0)
    }

    #[test]
    fn verify_flat_field_is_passed_to_luma() {
        let params = VideoParameters::pal();
        let level = 30000.0;

        let fields = field_pair(&params, |_, _| level);
        let frame = decode(&params, &PalConfiguration::default(), &fields);

        // With no burst and no modulation, luma passes through and chroma is muted.
        let line = (params.first_active_frame_line + 100) as usize;
        for x in (params.active_video_start + 50..params.active_video_end - 50).step_by(17) {
            let y = frame.y(line)[x as usize];
            assert!((y - level).abs() < level * 0.01, "y = {y}");

            assert!(frame.u(line)[x as usize].abs() < 100.0);
            assert!(frame.v(line)[x as usize].abs() < 100.0);
        }
    }

    #[test]
    fn verify_chroma_gain_scales_output() {
        let params = VideoParameters::pal();
        let black = f64::from(params.black16b_ire);

        // A synthetic signal: a luma pedestal plus a subcarrier whose phase retards a quarter
        // cycle per line, matching the spectral slant the U/V filters pass.
        let signal = |line: i32, x: i32| -> f64 {
            let phase = (PI / 2.0) * (f64::from(x) - f64::from(line));
            black + 10000.0 + (3000.0 * phase.sin())
        };

        let fields = field_pair(&params, signal);

        let unity = decode(&params, &PalConfiguration::default(), &fields);
        let double = decode(
            &params,
            &PalConfiguration { chroma_gain: 2.0, ..PalConfiguration::default() },
            &fields,
        );

        let line = (params.first_active_frame_line + 64) as usize;
        let mut checked = 0;
        for x in params.active_video_start + 50..params.active_video_end - 50 {
            let x = x as usize;
            let mag1 = (unity.u(line)[x].powi(2) + unity.v(line)[x].powi(2)).sqrt();
            let mag2 = (double.u(line)[x].powi(2) + double.v(line)[x].powi(2)).sqrt();
            if mag1 > 1.0 {
                assert!((mag2 / mag1 - 2.0).abs() < 0.01, "gain ratio {}", mag2 / mag1);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn verify_transform_filter_extracts_carrier() {
        let params = VideoParameters::pal();
        let black = f64::from(params.black16b_ire);
        let amplitude = 2000.0;

        // A tone at fSC with the vertical structure of the U carrier, on a black background.
        let tone = |line: i32, x: i32| -> f64 {
            let phase = (PI / 2.0) * (f64::from(x) + f64::from(line));
            black + (amplitude * phase.sin())
        };

        let fields = field_pair(&params, tone);

        let config = PalConfiguration {
            chroma_filter: ChromaFilterMode::Transform2D,
            ..PalConfiguration::default()
        };
        let frame = decode(&params, &config, &fields);

        // The Transform filter takes the whole tone as chroma, so the luma left behind is the
        // flat black background. Check the interior, away from tile boundary effects.
        for line in (params.first_active_frame_line + 64..params.last_active_frame_line - 64)
            .step_by(31)
        {
            for x in (params.active_video_start + 32..params.active_video_end - 32).step_by(13) {
                let y = frame.y(line as usize)[x as usize];
                assert!((y - black).abs() < amplitude * 0.05, "y = {y} at {line},{x}");
            }
        }
    }
}
