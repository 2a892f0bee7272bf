// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `comb` module implements the NTSC comb-filter decoder.
//!
//! At 4fSC the subcarrier inverts every two samples, every line, and every frame, so chroma can
//! be estimated by combing in one, two or three dimensions:
//!
//! - 1D: a horizontal bandpass around fSC within each line.
//! - 2D: the 1D estimate combed against the lines above and below, weighted by how well they
//!   agree; lines that disagree contribute nothing, avoiding hanging dots on colour edges.
//! - 3D: a temporal comb against the previous and next frames. In adaptive mode each pixel
//!   picks the better of the 2D and 3D estimates using a penalty that combines the temporal
//!   luma difference with how well the chroma inverts between frames; on static material this
//!   gives near-perfect separation while falling back to 2D on motion.
//!
//! Demodulation to U and V is quadrature product detection against the burst phase detected on
//! each line, as in the PAL decoder but without the V-switch. With phase compensation enabled
//! the exact detected phase is used (appropriate for tape sources); otherwise it is snapped to
//! the nearest quadrant, trusting the capture's sampling alignment.

use std::f64::consts::PI;

use lumen_core::errors::{unsupported_error, Result};
use lumen_core::frame::ComponentFrame;
use lumen_core::video::{VideoParameters, VideoSystem};

use crate::decoder::{Decoder, DecoderWorker};
use crate::sourcefield::SourceField;
use crate::transform::{TransformMode, TransformNtsc3D, TransformPal};

/// Width of the quarter filter kernel used for the U/V low-pass.
const FILTER_SIZE: usize = 7;

/// Penalty (in IRE) above which the adaptive 3D decoder falls back to the 2D estimate.
const ADAPTIVE_PENALTY_LIMIT: f64 = 6.0;

/// Line disagreement (in IRE) at which a neighbouring line stops contributing to the 2D comb.
const LINE_COMB_LIMIT: f64 = 45.0;

#[derive(Clone, Debug)]
pub struct CombConfiguration {
    pub chroma_gain: f64,
    /// Phase rotation applied to the output chroma, in degrees.
    pub chroma_phase: f64,
    /// Comb dimensions: 1, 2 or 3.
    pub dimensions: i32,
    /// In 3D mode, choose between the 2D and 3D estimates per pixel.
    pub adaptive: bool,
    /// Overlay the adaptive decision map on the output.
    pub show_map: bool,
    /// Use the exact detected burst phase rather than snapping it to the nearest quadrant.
    /// Appropriate for tape (VHS/Betamax) sources.
    pub phase_compensation: bool,
    /// Chroma noise reduction level, in IRE.
    pub c_nr_level: f64,
    /// Luma noise reduction level, in IRE.
    pub y_nr_level: f64,

    /// Use the Transform NTSC frequency-domain filter for chroma separation.
    pub use_transform_filter: bool,
    pub transform_mode: TransformMode,
    pub transform_threshold: f64,
    pub transform_thresholds: Vec<f64>,
    pub show_ffts: bool,
    pub show_position_x: i32,
    pub show_position_y: i32,
}

impl Default for CombConfiguration {
    fn default() -> Self {
        CombConfiguration {
            chroma_gain: 1.0,
            chroma_phase: 0.0,
            dimensions: 2,
            adaptive: true,
            show_map: false,
            phase_compensation: false,
            c_nr_level: 0.0,
            y_nr_level: 1.0,
            use_transform_filter: false,
            transform_mode: TransformMode::Threshold,
            transform_threshold: 0.4,
            transform_thresholds: Vec::new(),
            show_ffts: false,
            show_position_x: 200,
            show_position_y: 200,
        }
    }
}

impl CombConfiguration {
    pub fn look_behind(&self) -> i32 {
        if self.use_transform_filter {
            TransformNtsc3D::look_behind_frames()
        } else if self.dimensions == 3 {
            1
        } else {
            0
        }
    }

    pub fn look_ahead(&self) -> i32 {
        if self.use_transform_filter {
            TransformNtsc3D::look_ahead_frames()
        } else if self.dimensions == 3 {
            1
        } else {
            0
        }
    }
}

/// An input frame in the process of being decoded: the interlaced composite plus the chroma
/// estimates of each comb stage.
struct FrameBuffer {
    /// Composite samples interlaced to form a complete frame.
    composite: Vec<f64>,
    /// 1D chroma estimate.
    chroma_1d: Vec<f64>,
    /// 2D (line comb) chroma estimate.
    chroma_2d: Vec<f64>,
    /// Selected chroma estimate for demodulation.
    chroma: Vec<f64>,
    /// Per-pixel record of whether the adaptive 3D decision used the temporal estimate.
    used_3d: Vec<bool>,
}

impl FrameBuffer {
    fn new(params: &VideoParameters, first_field: &SourceField, second_field: &SourceField) -> FrameBuffer {
        let width = params.field_width as usize;
        let frame_height = params.frame_height() as usize;
        let size = width * frame_height;

        let mut composite = vec![0.0; size];
        for line in 0..frame_height {
            let field = if line % 2 == 0 { first_field } else { second_field };
            let field_line = line / 2;

            let src = &field.data[field_line * width..(field_line + 1) * width];
            let dst = &mut composite[line * width..(line + 1) * width];
            for (out, &sample) in dst.iter_mut().zip(src.iter()) {
                *out = f64::from(sample);
            }
        }

        FrameBuffer {
            composite,
            chroma_1d: vec![0.0; size],
            chroma_2d: vec![0.0; size],
            chroma: vec![0.0; size],
            used_3d: vec![false; size],
        }
    }

    fn line(buffer: &[f64], width: usize, line: i32) -> &[f64] {
        let line = line as usize;
        &buffer[line * width..(line + 1) * width]
    }
}

/// The NTSC comb-filter decoder.
pub struct Comb {
    config: CombConfiguration,
    params: VideoParameters,

    // The subcarrier reference signal.
    sine: Vec<f64>,
    cosine: Vec<f64>,

    // U/V low-pass filter kernel (one half; the zeroth coefficient is halved).
    cfilt: [f64; FILTER_SIZE + 1],

    // IRE in 16-bit sample units.
    ire_scale: f64,

    // Range of samples the chroma estimates are computed over: the active region plus the
    // filter margin.
    chroma_start: usize,
    chroma_end: usize,

    transform: Option<TransformNtsc3D>,
}

impl Comb {
    pub fn new(params: &VideoParameters, config: &CombConfiguration) -> Result<Comb> {
        let transform = if config.use_transform_filter {
            Some(TransformNtsc3D::new(
                params,
                config.transform_mode,
                config.transform_threshold,
                &config.transform_thresholds,
            )?)
        } else {
            None
        };

        let ref_ampl = 1.28;
        let mut sine = Vec::with_capacity(params.field_width as usize);
        let mut cosine = Vec::with_capacity(params.field_width as usize);
        for i in 0..params.field_width {
            let rad = 2.0 * PI * f64::from(i) * params.fsc / params.sample_rate;
            sine.push(ref_ampl * rad.sin());
            cosine.push(ref_ampl * rad.cos());
        }

        // Raised-cosine low-pass for the demodulated chroma, matching the chroma bandwidth.
        let chroma_bandwidth_hz = 1300000.0;
        let ca = (0.5 * params.sample_rate / chroma_bandwidth_hz).min(FILTER_SIZE as f64);

        let mut cfilt = [0.0; FILTER_SIZE + 1];
        let mut div = 0.0;
        for (b, value) in cfilt.iter_mut().enumerate() {
            let d = if b == 0 { 2.0 } else { 1.0 };
            *value = (1.0 + (PI * ca.min(b as f64) / ca).cos()) / d;
            div += 2.0 * *value;
        }
        for value in cfilt.iter_mut() {
            *value /= div;
        }

        let ire_scale = (f64::from(params.white16b_ire) - f64::from(params.black16b_ire)) / 100.0;

        let chroma_start = (params.active_video_start as usize) - FILTER_SIZE - 2;
        let chroma_end = (params.active_video_end as usize) + FILTER_SIZE + 2;

        Ok(Comb {
            config: config.clone(),
            params: params.clone(),
            sine,
            cosine,
            cfilt,
            ire_scale,
            chroma_start,
            chroma_end,
            transform,
        })
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
        let num_frames = (end_index - start_index) / 2;
        frames.resize(num_frames, ComponentFrame::new());

        if let Some(transform) = self.transform.as_mut() {
            transform.filter_fields(fields, start_index, end_index);
        }

        // Build frame buffers, including one frame of temporal context each way in 3D mode.
        let radius = if self.config.dimensions == 3 && !self.config.use_transform_filter {
            1i32
        } else {
            0
        };

        let mut buffers = Vec::new();
        for frame in -radius..(num_frames as i32) + radius {
            let field_index = (start_index as i32 + (frame * 2)) as usize;
            let mut buffer =
                FrameBuffer::new(&self.params, &fields[field_index], &fields[field_index + 1]);

            if self.config.use_transform_filter {
                self.load_transform_chroma(field_index - start_index, &mut buffer);
            } else {
                self.split_1d(&mut buffer);
                self.split_2d(&mut buffer);
            }

            buffers.push(buffer);
        }

        // Select each frame's chroma estimate and demodulate.
        for frame_index in 0..num_frames {
            let buffer_index = (frame_index as i32 + radius) as usize;

            if !self.config.use_transform_filter {
                match self.config.dimensions {
                    1 => {
                        let buffer = &mut buffers[buffer_index];
                        buffer.chroma = buffer.chroma_1d.clone();
                    }
                    2 => {
                        let buffer = &mut buffers[buffer_index];
                        buffer.chroma = buffer.chroma_2d.clone();
                    }
                    3 => {
                        let (before, rest) = buffers.split_at_mut(buffer_index);
                        let (current, after) = rest.split_at_mut(1);
                        self.split_3d(&mut current[0], &before[buffer_index - 1], &after[0]);
                    }
                    _ => unreachable!("dimensions validated in configure"),
                }
            }

            self.decode_frame(&buffers[buffer_index], &mut frames[frame_index]);

            if self.config.show_map && self.config.dimensions == 3 {
                self.overlay_map(&buffers[buffer_index], &mut frames[frame_index]);
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

    /// Interlace the Transform filter's per-field chroma into the frame buffer.
    fn load_transform_chroma(&self, output_index: usize, buffer: &mut FrameBuffer) {
        let transform = self.transform.as_ref().expect("transform filter not built");
        let width = self.params.field_width as usize;

        for line in 0..self.params.frame_height() as usize {
            let chroma = transform.chroma(output_index + (line % 2));
            let field_line = line / 2;

            buffer.chroma[line * width..(line + 1) * width]
                .copy_from_slice(&chroma[field_line * width..(field_line + 1) * width]);
        }
    }

    /// 1D chroma estimate: at 4fSC the subcarrier inverts every two samples, so the bandpass
    /// is the difference between a sample and the mean of its neighbours two away.
    fn split_1d(&self, buffer: &mut FrameBuffer) {
        let params = &self.params;
        let width = params.field_width as usize;

        for line in params.first_active_frame_line..params.last_active_frame_line {
            let row = FrameBuffer::line(&buffer.composite, width, line);
            let out = &mut buffer.chroma_1d[(line as usize) * width..(line as usize + 1) * width];

            for x in self.chroma_start..self.chroma_end {
                out[x] = ((2.0 * row[x]) - row[x - 2] - row[x + 2]) / 4.0;
            }
        }
    }

    /// 2D chroma estimate: comb the 1D estimate against the lines two above and below (the
    /// adjacent lines of the same field), which carry inverted chroma. Each neighbour is
    /// weighted by how well it mirrors the current line, so the comb opens up on vertical
    /// colour transitions instead of smearing them.
    fn split_2d(&self, buffer: &mut FrameBuffer) {
        let params = &self.params;
        let width = params.field_width as usize;
        let limit = LINE_COMB_LIMIT * self.ire_scale;

        for line in params.first_active_frame_line..params.last_active_frame_line {
            let in_range = |n: i32| n >= params.first_active_frame_line && n < params.last_active_frame_line;

            for x in self.chroma_start..self.chroma_end {
                let index = (line as usize) * width + x;
                let current = buffer.chroma_1d[index];

                let mut weighted = 0.0;
                let mut total_weight = 0.0;

                for neighbour_line in [line - 2, line + 2] {
                    if !in_range(neighbour_line) {
                        continue;
                    }
                    let neighbour = buffer.chroma_1d[(neighbour_line as usize) * width + x];

                    // A neighbour carrying the same chroma has the opposite sign here.
                    let disagreement = (current + neighbour).abs();
                    let weight = (1.0 - (disagreement / limit)).clamp(0.0, 1.0);

                    weighted += weight * neighbour;
                    total_weight += weight;
                }

                buffer.chroma_2d[index] = if total_weight > 0.0 {
                    ((total_weight * current) - weighted) / (2.0 * total_weight)
                } else {
                    // Neither neighbour agrees: fall back to the 1D estimate.
                    current
                };
            }
        }
    }

    /// 3D chroma estimate: comb against the previous and next frames, whose chroma is
    /// inverted. Each pixel is scored; in adaptive mode a pixel whose best temporal candidate
    /// looks unreliable (motion) falls back to the 2D estimate.
    fn split_3d(&self, buffer: &mut FrameBuffer, previous: &FrameBuffer, next: &FrameBuffer) {
        let params = &self.params;
        let width = params.field_width as usize;

        for line in params.first_active_frame_line..params.last_active_frame_line {
            for x in self.chroma_start..self.chroma_end {
                let index = (line as usize) * width + x;

                if !self.config.adaptive {
                    // Plain temporal comb against both frames.
                    buffer.chroma[index] = ((2.0 * buffer.composite[index])
                        - previous.composite[index]
                        - next.composite[index])
                        / 4.0;
                    buffer.used_3d[index] = true;
                    continue;
                }

                let (previous_penalty, previous_sample) =
                    self.candidate(buffer, previous, index);
                let (next_penalty, next_sample) = self.candidate(buffer, next, index);

                let (penalty, sample) = if previous_penalty <= next_penalty {
                    (previous_penalty, previous_sample)
                } else {
                    (next_penalty, next_sample)
                };

                if penalty < ADAPTIVE_PENALTY_LIMIT {
                    buffer.chroma[index] = sample;
                    buffer.used_3d[index] = true;
                } else {
                    buffer.chroma[index] = buffer.chroma_2d[index];
                    buffer.used_3d[index] = false;
                }
            }
        }
    }

    /// Score one temporal candidate: how plausible is it that `other` carries the same picture
    /// as `buffer` at this pixel, one frame apart?
    fn candidate(&self, buffer: &FrameBuffer, other: &FrameBuffer, index: usize) -> (f64, f64) {
        // Subcarrier-cancelling luma estimates; a static pixel should have equal luma in both
        // frames.
        let luma = |frame: &FrameBuffer| {
            (frame.composite[index - 2] + (2.0 * frame.composite[index]) + frame.composite[index + 2])
                / 4.0
        };
        let luma_difference = (luma(buffer) - luma(other)).abs();

        // The chroma of a static pixel inverts between frames, so the 1D estimates should sum
        // to zero.
        let chroma_mismatch = (buffer.chroma_1d[index] + other.chroma_1d[index]).abs();

        let penalty = (luma_difference + chroma_mismatch) / self.ire_scale;
        let sample = (buffer.composite[index] - other.composite[index]) / 2.0;

        (penalty, sample)
    }

    /// Demodulate one frame's chroma estimate and write the component output.
    fn decode_frame(&self, buffer: &FrameBuffer, frame: &mut ComponentFrame) {
        let params = &self.params;

        frame.init(params, false);

        for line in params.first_active_frame_line..params.last_active_frame_line {
            self.decode_line(buffer, line, frame);
        }
    }

    fn decode_line(&self, buffer: &FrameBuffer, line: i32, frame: &mut ComponentFrame) {
        let params = &self.params;
        let width = params.field_width as usize;

        let composite = FrameBuffer::line(&buffer.composite, width, line);
        let chroma = FrameBuffer::line(&buffer.chroma, width, line);

        let (bp, bq, burst_norm) = self.detect_burst(buffer, line);

        // Demodulate to quadrature samples and low-pass them.
        let mut p = vec![0.0; width];
        let mut q = vec![0.0; width];
        for x in self.chroma_start..self.chroma_end {
            p[x] = chroma[x] * self.sine[x];
            q[x] = chroma[x] * self.cosine[x];
        }

        let active_start = params.active_video_start as usize;
        let active_end = params.active_video_end as usize;

        let scaled_saturation = 2.0 * self.config.chroma_gain / burst_norm;

        let (out_y, out_u, out_v) = frame.yuv_mut(line as usize);

        for x in active_start..active_end {
            let mut pf = 0.0;
            let mut qf = 0.0;
            for b in 0..=FILTER_SIZE {
                pf += (p[x - b] + p[x + b]) * self.cfilt[b];
                qf += (q[x - b] + q[x + b]) * self.cfilt[b];
            }

            // Rotate by the burst phase to recover U and V.
            out_u[x] = -((pf * bp) + (qf * bq)) * scaled_saturation;
            out_v[x] = -((qf * bp) - (pf * bq)) * scaled_saturation;

            // Luma is the composite with the chroma estimate removed.
            out_y[x] = composite[x] - chroma[x];
        }

        self.do_cnr(&mut out_u[active_start..active_end], &mut out_v[active_start..active_end]);
        self.do_ynr(&mut out_y[active_start..active_end]);
    }

    /// Detect the burst phase of one line by product detection against the reference carrier,
    /// using the lines two above and below (inverted burst) to steady the estimate.
    fn detect_burst(&self, buffer: &FrameBuffer, line: i32) -> (f64, f64, f64) {
        let params = &self.params;
        let width = params.field_width as usize;
        let frame_height = params.frame_height();

        let zeros = vec![0.0; width];
        let row = |n: i32| -> &[f64] {
            if n < 0 || n >= frame_height {
                &zeros
            } else {
                FrameBuffer::line(&buffer.composite, width, n)
            }
        };

        let in0 = row(line);
        let in3 = row(line - 2);
        let in4 = row(line + 2);

        let mut bp = 0.0;
        let mut bq = 0.0;
        for i in params.colour_burst_start as usize..params.colour_burst_end as usize {
            bp += ((in0[i] - ((in3[i] + in4[i]) / 2.0)) / 2.0) * self.sine[i];
            bq += ((in0[i] - ((in3[i] + in4[i]) / 2.0)) / 2.0) * self.cosine[i];
        }

        let burst_length = f64::from(params.colour_burst_end - params.colour_burst_start);
        bp /= burst_length;
        bq /= burst_length;

        // Without phase compensation, trust the capture's quadrature alignment and snap the
        // detected phase to the nearest quadrant; with it, use the exact phase (QADM).
        if !self.config.phase_compensation {
            let magnitude = (bp * bp + bq * bq).sqrt();
            let quadrant = (bq.atan2(bp) / (PI / 2.0)).round() * (PI / 2.0);
            bp = magnitude * quadrant.cos();
            bq = magnitude * quadrant.sin();
        }

        // Apply the configured chroma phase rotation.
        if self.config.chroma_phase != 0.0 {
            let rotation = self.config.chroma_phase.to_radians();
            let (sin, cos) = rotation.sin_cos();
            (bp, bq) = ((bp * cos) - (bq * sin), (bp * sin) + (bq * cos));
        }

        // Kill the colour if the burst is too weak.
        let burst_norm = (bp * bp + bq * bq).sqrt().max(130000.0 / 128.0);

        (bp, bq, burst_norm)
    }

    /// Chroma noise reduction: coring on the demodulated U and V.
    fn do_cnr(&self, u_line: &mut [f64], v_line: &mut [f64]) {
        if self.config.c_nr_level <= 0.0 {
            return;
        }
        let core_level = self.config.c_nr_level * self.ire_scale;

        for line in [u_line, v_line] {
            let original = line.to_vec();
            for i in 1..line.len() - 1 {
                let low_pass = (original[i - 1] + (2.0 * original[i]) + original[i + 1]) / 4.0;
                let high_freq = original[i] - low_pass;
                line[i] -= high_freq.clamp(-core_level, core_level);
            }
        }
    }

    /// Luma noise reduction: coring on the high-frequency component.
    fn do_ynr(&self, y_line: &mut [f64]) {
        if self.config.y_nr_level <= 0.0 {
            return;
        }
        let core_level = self.config.y_nr_level * self.ire_scale;

        let original = y_line.to_vec();
        for i in 1..y_line.len() - 1 {
            let low_pass = (original[i - 1] + (2.0 * original[i]) + original[i + 1]) / 4.0;
            let high_freq = original[i] - low_pass;
            y_line[i] -= high_freq.clamp(-core_level, core_level);
        }
    }

    /// Overlay the adaptive decision map: pixels decoded with the temporal estimate show
    /// bright, pixels that fell back to 2D show dark.
    fn overlay_map(&self, buffer: &FrameBuffer, frame: &mut ComponentFrame) {
        let params = &self.params;
        let width = params.field_width as usize;
        let black = f64::from(params.black16b_ire);
        let white = f64::from(params.white16b_ire);

        for line in params.first_active_frame_line..params.last_active_frame_line {
            let (out_y, out_u, out_v) = frame.yuv_mut(line as usize);

            for x in params.active_video_start as usize..params.active_video_end as usize {
                let used_3d = buffer.used_3d[(line as usize) * width + x];
                out_y[x] = if used_3d { white } else { black + ((white - black) * 0.25) };
                out_u[x] = 0.0;
                out_v[x] = 0.0;
            }
        }
    }
}

/// The NTSC decoder for the pool: wraps [`Comb`] workers.
#[derive(Default)]
pub struct NtscDecoder {
    config: CombConfiguration,
    params: Option<VideoParameters>,
}

impl NtscDecoder {
    pub fn new(config: CombConfiguration) -> NtscDecoder {
        NtscDecoder { config, params: None }
    }
}

impl Decoder for NtscDecoder {
    fn configure(&mut self, params: &VideoParameters) -> Result<()> {
        // Ensure the source video is NTSC.
        if params.system != VideoSystem::Ntsc {
            return unsupported_error("this decoder is for NTSC video sources only");
        }
        params.validate()?;
        if self.config.dimensions < 1 || self.config.dimensions > 3 {
            return lumen_core::errors::config_error(format!(
                "invalid comb dimensions {}",
                self.config.dimensions
            ));
        }

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
        Ok(Box::new(NtscWorker { comb: Comb::new(params, &self.config)? }))
    }
}

struct NtscWorker {
    comb: Comb,
}

impl DecoderWorker for NtscWorker {
    fn decode_frames(
        &mut self,
        fields: &[SourceField],
        start_index: usize,
        end_index: usize,
        frames: &mut Vec<ComponentFrame>,
    ) {
        self.comb.decode_frames(fields, start_index, end_index, frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::meta::FieldMetadata;

    fn make_fields(
        params: &VideoParameters,
        count: usize,
        samples: impl Fn(usize, i32, i32) -> f64,
    ) -> Vec<SourceField> {
        let width = params.field_width;
        (0..count)
            .map(|field| SourceField {
                field: FieldMetadata {
                    is_first_field: field % 2 == 0,
                    ..FieldMetadata::default()
                },
                data: (0..params.field_length())
                    .map(|i| {
                        let line = (i as i32) / width;
                        let x = (i as i32) % width;
                        samples(field, line, x).round().clamp(0.0, 65535.0) as u16
                    })
                    .collect(),
            })
            .collect()
    }

    /// NTSC-shaped test signal: luma pedestal plus a subcarrier whose phase inverts every
    /// line and every frame, with a burst of the same structure.
    fn ntsc_signal(params: &VideoParameters, luma: f64, chroma: f64) -> impl Fn(usize, i32, i32) -> f64 {
        let black = f64::from(params.black16b_ire);
        move |field, line, x| {
            let frame = field / 2;
            // The subcarrier inverts on every successive field line and again between frames.
            let inversions = f64::from(line % 2) + (frame % 2) as f64;
            let phase = (PI / 2.0) * f64::from(x) + (PI * inversions);
            black + luma + (chroma * phase.sin())
        }
    }

    #[test]
    fn verify_flat_field_decodes_to_luma() {
        let params = VideoParameters::ntsc();
        let signal = ntsc_signal(&params, 20000.0, 0.0);
        let fields = make_fields(&params, 2, signal);

        let mut comb = Comb::new(&params, &CombConfiguration::default()).unwrap();
        let mut frames = Vec::new();
        comb.decode_frames(&fields, 0, 2, &mut frames);

        let frame = &frames[0];
        let expected = f64::from(params.black16b_ire) + 20000.0;

        let line = (params.first_active_frame_line + 101) as usize;
        for x in (params.active_video_start + 40..params.active_video_end - 40).step_by(13) {
            assert!((frame.y(line)[x as usize] - expected).abs() < 200.0);
            assert!(frame.u(line)[x as usize].abs() < 50.0);
            assert!(frame.v(line)[x as usize].abs() < 50.0);
        }
    }

    #[test]
    fn verify_subcarrier_is_separated_from_luma() {
        let params = VideoParameters::ntsc();
        let signal = ntsc_signal(&params, 15000.0, 3000.0);
        let fields = make_fields(&params, 2, signal);

        for dimensions in [1, 2] {
            let config = CombConfiguration { dimensions, ..CombConfiguration::default() };
            let mut comb = Comb::new(&params, &config).unwrap();
            let mut frames = Vec::new();
            comb.decode_frames(&fields, 0, 2, &mut frames);

            let frame = &frames[0];
            let expected_luma = f64::from(params.black16b_ire) + 15000.0;

            // The luma output must be free of the subcarrier, and the chroma magnitude must be
            // roughly constant across the active area.
            let line = (params.first_active_frame_line + 64) as usize;
            let mut min_mag = f64::MAX;
            let mut max_mag = 0.0f64;
            for x in params.active_video_start + 40..params.active_video_end - 40 {
                let y = frame.y(line)[x as usize];
                assert!(
                    (y - expected_luma).abs() < 400.0,
                    "dims {dimensions}: y = {y} at x {x}"
                );

                let u = frame.u(line)[x as usize];
                let v = frame.v(line)[x as usize];
                let magnitude = ((u * u) + (v * v)).sqrt();
                min_mag = min_mag.min(magnitude);
                max_mag = max_mag.max(magnitude);
            }

            assert!(max_mag > 100.0, "dims {dimensions}: no chroma decoded");
            assert!(
                (max_mag - min_mag) / max_mag < 0.2,
                "dims {dimensions}: chroma magnitude varies {min_mag}..{max_mag}"
            );
        }
    }

    #[test]
    fn verify_adaptive_3d_uses_temporal_comb_on_static_material() {
        let params = VideoParameters::ntsc();
        let signal = ntsc_signal(&params, 15000.0, 3000.0);
        // Three frames: lookbehind, the real frame, lookahead.
        let fields = make_fields(&params, 6, signal);

        let config = CombConfiguration { dimensions: 3, ..CombConfiguration::default() };
        let mut comb = Comb::new(&params, &config).unwrap();
        let mut frames = Vec::new();
        comb.decode_frames(&fields, 2, 4, &mut frames);

        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        let expected_luma = f64::from(params.black16b_ire) + 15000.0;

        // On static material the temporal comb separates the static subcarrier exactly.
        let line = (params.first_active_frame_line + 80) as usize;
        for x in (params.active_video_start + 40..params.active_video_end - 40).step_by(7) {
            let y = frame.y(line)[x as usize];
            assert!((y - expected_luma).abs() < 300.0, "y = {y}");
        }
    }

    #[test]
    fn verify_configure_rejects_pal() {
        let mut decoder = NtscDecoder::new(CombConfiguration::default());
        assert!(decoder.configure(&VideoParameters::pal()).is_err());
        assert!(decoder.configure(&VideoParameters::ntsc()).is_ok());
    }

    #[test]
    fn verify_lookbehind_lookahead() {
        let config = CombConfiguration { dimensions: 3, ..CombConfiguration::default() };
        assert_eq!(config.look_behind(), 1);
        assert_eq!(config.look_ahead(), 1);

        let config = CombConfiguration {
            use_transform_filter: true,
            ..CombConfiguration::default()
        };
        assert_eq!(config.look_behind(), 3);
        assert_eq!(config.look_ahead(), 4);
    }
}
