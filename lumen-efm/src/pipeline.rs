// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pipeline` module wires the decoder stages into one single-threaded pipeline and
//! aggregates their statistics.

use crate::audio::{ErrorTreatment, F1ToAudio};
use crate::circ::F3ToF2Frames;
use crate::efmtof3::EfmToF3Frames;
use crate::f2tof1::F2ToF1Frames;
use crate::sector::F1ToData;
use crate::{audio, circ, efmtof3, f2tof1, sector};

/// Pipeline options.
#[derive(Clone, Copy, Debug)]
pub struct EfmDecoderOptions {
    /// Decode the payload as 44.1 kHz stereo audio.
    pub decode_audio: bool,
    /// Decode the payload as data sectors.
    pub decode_data: bool,
    /// Treatment of audio frames the CIRC could not recover.
    pub error_treatment: ErrorTreatment,
    /// Pad the audio from disc time 00:00.00 up to the first section seen.
    pub pad_initial_disc_time: bool,
    /// The capture carries no usable time stamps; disable gap padding.
    pub no_timestamps: bool,
}

impl Default for EfmDecoderOptions {
    fn default() -> Self {
        EfmDecoderOptions {
            decode_audio: true,
            decode_data: false,
            error_treatment: ErrorTreatment::Conceal,
            pad_initial_disc_time: false,
            no_timestamps: false,
        }
    }
}

/// Aggregated statistics from every stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct EfmStatistics {
    pub efm_to_f3: efmtof3::Statistics,
    pub f3_to_f2: circ::Statistics,
    pub f2_to_f1: f2tof1::Statistics,
    pub audio: audio::Statistics,
    pub data: sector::Statistics,
}

/// Output produced by one processing call.
#[derive(Clone, Debug, Default)]
pub struct EfmOutput {
    /// Interleaved stereo samples (when audio decoding is enabled).
    pub audio: Vec<i16>,
    /// Sector user data bytes (when data decoding is enabled).
    pub data: Vec<u8>,
}

/// The complete EFM decoding pipeline.
///
/// Deliberately single-threaded: the CIRC delay lines and the framing state machines carry
/// history from frame to frame, so the T-value stream must be processed in order.
pub struct EfmDecoder {
    options: EfmDecoderOptions,
    efm_to_f3: EfmToF3Frames,
    f3_to_f2: F3ToF2Frames,
    f2_to_f1: F2ToF1Frames,
    f1_to_audio: F1ToAudio,
    f1_to_data: F1ToData,
}

impl EfmDecoder {
    pub fn new(options: EfmDecoderOptions) -> EfmDecoder {
        EfmDecoder {
            options,
            efm_to_f3: EfmToF3Frames::new(),
            f3_to_f2: F3ToF2Frames::new(),
            f2_to_f1: F2ToF1Frames::new(options.pad_initial_disc_time, options.no_timestamps),
            f1_to_audio: F1ToAudio::new(options.error_treatment),
            f1_to_data: F1ToData::new(),
        }
    }

    /// Feed a buffer of T-values through the pipeline.
    pub fn process(&mut self, t_values: &[u8]) -> EfmOutput {
        let sync_losses_before = self.efm_to_f3.statistics().sync_losses;

        let f3_frames = self.efm_to_f3.process(t_values);

        // A frame sync loss means the data entering the CIRC delay lines is no longer
        // contiguous with what is inside them; flush so stale symbols are not combined with
        // fresh ones.
        if self.efm_to_f3.statistics().sync_losses > sync_losses_before {
            self.f3_to_f2.flush();
        }

        let f2_frames = self.f3_to_f2.process(&f3_frames);
        let f1_frames = self.f2_to_f1.process(&f2_frames);

        let mut output = EfmOutput::default();
        if self.options.decode_audio {
            output.audio = self.f1_to_audio.process(&f1_frames);
        }
        if self.options.decode_data {
            output.data = self.f1_to_data.process(&f1_frames);
        }

        output
    }

    /// Drain any buffered output at the end of the input.
    pub fn flush(&mut self) -> EfmOutput {
        let mut output = EfmOutput::default();
        if self.options.decode_audio {
            output.audio = self.f1_to_audio.flush();
        }
        output
    }

    pub fn statistics(&self) -> EfmStatistics {
        EfmStatistics {
            efm_to_f3: *self.efm_to_f3.statistics(),
            f3_to_f2: *self.f3_to_f2.statistics(),
            f2_to_f1: *self.f2_to_f1.statistics(),
            audio: *self.f1_to_audio.statistics(),
            data: *self.f1_to_data.statistics(),
        }
    }

    /// Log the statistics of every stage.
    pub fn report(&self) {
        let s = self.efm_to_f3.statistics();
        log::info!("EFM to F3 frames:");
        log::info!(
            "  valid/undershoot/overshoot syncs: {}/{}/{}",
            s.valid_syncs,
            s.undershoot_syncs,
            s.overshoot_syncs
        );
        log::info!(
            "  valid/undershoot/overshoot frames: {}/{}/{}",
            s.valid_frames,
            s.undershoot_frames,
            s.overshoot_frames
        );
        log::info!(
            "  valid/invalid/corrected EFM symbols: {}/{}/{}",
            s.valid_efm_symbols,
            s.invalid_efm_symbols,
            s.corrected_efm_symbols
        );
        log::info!(
            "  in-range/out-of-range T values: {}/{}",
            s.in_range_t_values,
            s.out_of_range_t_values
        );
        log::info!("  sync losses: {}", s.sync_losses);

        self.f3_to_f2.report();
        self.f2_to_f1.report();
        if self.options.decode_audio {
            self.f1_to_audio.report();
        }
        if self.options.decode_data {
            self.f1_to_data.report();
        }
    }
}
