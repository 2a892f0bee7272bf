// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pool` module drives a chroma decoder across a pool of worker threads.
//!
//! Workers pull batches of frames from the input under one mutex and push decoded output under
//! another; no thread ever holds both. The workers complete frames in an arbitrary order, so
//! finished frames go into a map keyed by frame number, and whenever the next expected frame is
//! present it is written out, keeping the output stream in strict frame order regardless of
//! thread scheduling.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use log::{error, info};

use lumen_core::errors::{config_error, decode_error, Result};
use lumen_core::frame::ComponentFrame;
use lumen_core::meta::{FieldSource, VideoMetadata};

use crate::decoder::Decoder;
use crate::output::{OutputFrame, OutputWriter};
use crate::sourcefield::SourceField;

/// Default batch size, in frames.
const DEFAULT_BATCH_SIZE: i32 = 16;

/// Progress events delivered to a registered callback.
#[derive(Clone, Copy, Debug)]
pub enum PoolEvent {
    /// A number of frames have been written to the output.
    Progress(i32),
    /// Processing finished; the flag reports success.
    Completed(bool),
}

/// Pool options.
#[derive(Clone, Copy, Debug)]
pub struct PoolOptions {
    /// First frame to decode (1-based); `None` starts at the beginning.
    pub start_frame: Option<i32>,
    /// Number of frames to decode; `None` decodes to the end.
    pub length: Option<i32>,
    /// Number of worker threads.
    pub max_threads: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions {
            start_frame: None,
            length: None,
            max_threads: thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

struct InputState<'a> {
    source: &'a mut (dyn FieldSource + Send),
    /// Next frame number to be read.
    frame_number: i32,
}

struct OutputState<'a> {
    sink: &'a mut (dyn Write + Send),
    /// Next frame number to be written.
    frame_number: i32,
    /// Decoded frames waiting for their predecessors.
    pending: BTreeMap<i32, OutputFrame>,
}

/// Work-dispatching scheduler feeding a [`Decoder`]'s workers and reassembling their output.
pub struct DecoderPool<'a> {
    decoder: &'a dyn Decoder,
    metadata: &'a (dyn VideoMetadata + Sync),
    writer: &'a OutputWriter,

    options: PoolOptions,
    start_frame: i32,
    last_frame: i32,
    length: i32,
    look_behind: i32,
    look_ahead: i32,

    input: Mutex<InputState<'a>>,
    output: Mutex<OutputState<'a>>,

    // Shared by worker threads; workers watch this and shut down as soon as possible if it
    // becomes true.
    abort: AtomicBool,

    events: Option<&'a (dyn Fn(PoolEvent) + Sync)>,
}

impl<'a> DecoderPool<'a> {
    /// Build a pool over a configured decoder and output writer.
    ///
    /// The decoder must already have been configured with the (writer-adjusted) video
    /// parameters.
    pub fn new(
        decoder: &'a dyn Decoder,
        metadata: &'a (dyn VideoMetadata + Sync),
        source: &'a mut (dyn FieldSource + Send),
        writer: &'a OutputWriter,
        sink: &'a mut (dyn Write + Send),
        options: PoolOptions,
        events: Option<&'a (dyn Fn(PoolEvent) + Sync)>,
    ) -> Result<DecoderPool<'a>> {
        let num_frames = metadata.num_frames();

        let start_frame = options.start_frame.unwrap_or(1);
        if start_frame < 1 || start_frame > num_frames {
            return config_error(format!(
                "start frame {start_frame} is out of bounds, {num_frames} frames available"
            ));
        }

        let available = num_frames - (start_frame - 1);
        let length = match options.length {
            None => available,
            Some(length) if length > available => {
                info!("requested length {length} exceeds the input, decoding {available} frames");
                available
            }
            Some(length) if length < 1 => {
                return config_error("length must be at least one frame");
            }
            Some(length) => length,
        };

        if options.max_threads < 1 {
            return config_error("thread count must be at least one");
        }

        Ok(DecoderPool {
            decoder,
            metadata,
            writer,
            options,
            start_frame,
            last_frame: start_frame + length - 1,
            length,
            look_behind: decoder.look_behind(),
            look_ahead: decoder.look_ahead(),
            input: Mutex::new(InputState { source, frame_number: start_frame }),
            output: Mutex::new(OutputState {
                sink,
                frame_number: start_frame,
                pending: BTreeMap::new(),
            }),
            abort: AtomicBool::new(false),
            events,
        })
    }

    /// Decode all requested frames. Returns an error if any worker failed or the final state
    /// is inconsistent.
    pub fn process(&mut self) -> Result<()> {
        // Write the stream header (if there is one).
        {
            let mut output = self.output.lock().unwrap();
            let header = self.writer.stream_header();
            if !header.is_empty() {
                output.sink.write_all(&header)?;
            }
        }

        info!(
            "using {} threads to process {} frames from frame #{}",
            self.options.max_threads, self.length, self.start_frame
        );

        thread::scope(|scope| {
            for _ in 0..self.options.max_threads {
                scope.spawn(|| self.worker_loop());
            }
        });

        if self.abort.load(Ordering::SeqCst) {
            self.emit(PoolEvent::Completed(false));
            return decode_error("processing aborted");
        }

        // Check we've processed all the frames, now the workers have finished.
        {
            let input = self.input.lock().unwrap();
            let output = self.output.lock().unwrap();
            if input.frame_number != self.last_frame + 1
                || output.frame_number != self.last_frame + 1
                || !output.pending.is_empty()
            {
                self.emit(PoolEvent::Completed(false));
                return decode_error("incorrect state at end of processing");
            }
        }

        info!("processing complete, {} frames", self.length);
        self.emit(PoolEvent::Completed(true));

        Ok(())
    }

    fn emit(&self, event: PoolEvent) {
        if let Some(events) = self.events {
            events(event);
        }
    }

    fn worker_loop(&self) {
        let mut worker = match self.decoder.make_worker() {
            Ok(worker) => worker,
            Err(err) => {
                error!("failed to create decoder worker: {err}");
                self.abort.store(true, Ordering::SeqCst);
                return;
            }
        };

        let mut fields: Vec<SourceField> = Vec::new();
        let mut component_frames: Vec<ComponentFrame> = Vec::new();
        let mut output_frames: Vec<OutputFrame> = Vec::new();

        while !self.abort.load(Ordering::SeqCst) {
            // Get the next batch of fields to process.
            let (start_frame_number, start_index, end_index) =
                match self.get_input_frames(&mut fields) {
                    Ok(Some(batch)) => batch,
                    Ok(None) => break,
                    Err(err) => {
                        error!("reading the input file failed: {err}");
                        self.abort.store(true, Ordering::SeqCst);
                        break;
                    }
                };

            // Decode the fields into component frames.
            worker.decode_frames(&fields, start_index, end_index, &mut component_frames);

            // Convert the component frames to the output format.
            let num_frames = (end_index - start_index) / 2;
            output_frames.resize(num_frames, OutputFrame::new());
            for (component, output) in component_frames.iter().zip(output_frames.iter_mut()) {
                self.writer.convert(component, output);
            }

            // Queue the frames for writing.
            if !self.put_output_frames(start_frame_number, &output_frames) {
                self.abort.store(true, Ordering::SeqCst);
                break;
            }
        }
    }

    /// Get the next batch of input fields.
    ///
    /// `fields` is filled with `{lookbehind.. real.. lookahead}`; the returned tuple is the
    /// first frame number and the field range holding the real frames. Returns `Ok(None)` when
    /// the input is exhausted.
    fn get_input_frames(
        &self,
        fields: &mut Vec<SourceField>,
    ) -> Result<Option<(i32, usize, usize)>> {
        let mut input = self.input.lock().unwrap();
        let input = &mut *input;

        // Work out a reasonable batch size to provide work for all threads. This assumes that
        // the synchronisation to get a new batch is less expensive than computing a single
        // frame, so a batch size of one is reasonable.
        let max_batch_size =
            DEFAULT_BATCH_SIZE.min(1.max(self.length / self.options.max_threads as i32));

        let batch_frames = max_batch_size.min(self.last_frame + 1 - input.frame_number);
        if batch_frames <= 0 {
            // No more input frames.
            return Ok(None);
        }

        let start_frame_number = input.frame_number;
        input.frame_number += batch_frames;

        let (start_index, end_index) = SourceField::load_fields(
            input.source,
            self.metadata,
            start_frame_number,
            batch_frames,
            self.look_behind,
            self.look_ahead,
            fields,
        )?;

        Ok(Some((start_frame_number, start_index, end_index)))
    }

    /// Queue decoded frames for writing, with the first frame being `start_frame_number`.
    /// Returns false on a write failure.
    fn put_output_frames(&self, start_frame_number: i32, frames: &[OutputFrame]) -> bool {
        let mut output = self.output.lock().unwrap();
        let output = &mut *output;

        for (i, frame) in frames.iter().enumerate() {
            output.pending.insert(start_frame_number + (i as i32), frame.clone());
        }

        // Write out as many frames as possible.
        while let Some(frame) = output.pending.remove(&output.frame_number) {
            // Write the frame header (if there is one) then the frame data.
            let header = self.writer.frame_header();
            let result = if header.is_empty() {
                output.sink.write_all(bytemuck::cast_slice(frame.as_slice()))
            } else {
                output
                    .sink
                    .write_all(&header)
                    .and_then(|_| output.sink.write_all(bytemuck::cast_slice(frame.as_slice())))
            };

            if let Err(err) = result {
                error!("writing to the output file failed: {err}");
                return false;
            }

            output.frame_number += 1;

            let output_count = output.frame_number - self.start_frame;
            if output_count % 32 == 0 {
                self.emit(PoolEvent::Progress(output_count));
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderWorker;
    use crate::mono::MonoDecoder;
    use crate::output::{OutputConfig, PixelFormat};
    use lumen_core::errors::Result;
    use lumen_core::meta::{MemoryFieldSource, SimpleMetadata};
    use lumen_core::video::VideoParameters;

    use std::time::Duration;

    fn run_pool(
        decoder: &mut dyn Decoder,
        params: VideoParameters,
        num_frames: i32,
        field_value: u16,
        threads: usize,
        pixel_format: PixelFormat,
    ) -> Result<Vec<u8>> {
        let mut adjusted = params.clone();

        let mut writer = OutputWriter::new();
        writer
            .update_configuration(
                &mut adjusted,
                &OutputConfig { use_padding: true, pixel_format, output_y4m: false },
            )
            .unwrap();

        decoder.configure(&adjusted)?;

        let metadata = SimpleMetadata::new(adjusted.clone(), num_frames * 2);
        let field_length = params.field_length();
        let mut source = MemoryFieldSource::new(
            field_length,
            vec![vec![field_value; field_length]; (num_frames * 2) as usize],
        );

        let mut sink: Vec<u8> = Vec::new();
        let mut pool = DecoderPool::new(
            decoder,
            &metadata,
            &mut source,
            &writer,
            &mut sink,
            PoolOptions { start_frame: None, length: None, max_threads: threads },
            None,
        )?;
        pool.process()?;
        drop(pool);

        Ok(sink)
    }

    #[test]
    fn verify_gray16_output_levels_pal() {
        // Two fields of mid-grey decode to a uniform Y' of (32768 - 16384) * (56064 / 37632)
        // + 4096.
        let mut decoder = MonoDecoder::new();
        decoder.mono_frames = true;
        let bytes = run_pool(
            &mut decoder,
            VideoParameters::pal(),
            1,
            32768,
            1,
            PixelFormat::Gray16,
        )
        .unwrap();

        // 928 x 600 padded output.
        assert_eq!(bytes.len(), 928 * 600 * 2);

        let expected: u16 = 28504;
        let black: u16 = 4096;

        let samples: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        // Padding lines are black; every active sample has the expected level.
        assert!(samples.iter().all(|&s| s == expected || s == black));
        let active = samples.iter().filter(|&&s| s == expected).count();
        assert_eq!(active, 928 * 597);
    }

    #[test]
    fn verify_gray16_output_levels_ntsc() {
        let mut decoder = MonoDecoder::new();
        decoder.mono_frames = true;
        let bytes = run_pool(
            &mut decoder,
            VideoParameters::ntsc(),
            1,
            32768,
            1,
            PixelFormat::Gray16,
        )
        .unwrap();

        // NTSC: (32768 - 15872) * (56064 / 35328) + 4096 = 30909.
        let expected: u16 = 30909;
        let samples: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert!(samples.iter().any(|&s| s == expected));
        assert!(samples.iter().all(|&s| s == expected || s == 4096));
    }

    /// A decoder that stalls for an artificial delay proportional to the frame number, to
    /// shake out ordering bugs in the pool.
    struct JitteryDecoder {
        params: Option<VideoParameters>,
    }

    struct JitteryWorker {
        params: VideoParameters,
    }

    impl Decoder for JitteryDecoder {
        fn configure(&mut self, params: &VideoParameters) -> Result<()> {
            self.params = Some(params.clone());
            Ok(())
        }

        fn make_worker(&self) -> Result<Box<dyn DecoderWorker + Send>> {
            Ok(Box::new(JitteryWorker { params: self.params.clone().unwrap() }))
        }
    }

    impl DecoderWorker for JitteryWorker {
        fn decode_frames(
            &mut self,
            fields: &[SourceField],
            start_index: usize,
            end_index: usize,
            frames: &mut Vec<ComponentFrame>,
        ) {
            let num_frames = (end_index - start_index) / 2;
            frames.resize(num_frames, ComponentFrame::new());

            for (frame_index, field_index) in (start_index..end_index).step_by(2).enumerate() {
                // The fields carry their frame number; stall proportionally to it so frames
                // complete out of order across the pool.
                let frame_number = fields[field_index].data[0] / 100;
                std::thread::sleep(Duration::from_millis(u64::from(frame_number % 3) * 5));

                frames[frame_index].init(&self.params, false);

                // Mark each frame with a value derived from its field data so ordering is
                // observable in the output.
                let value = f64::from(fields[field_index].data[0]);
                let line = self.params.first_active_frame_line as usize;
                for sample in frames[frame_index].y_mut(line).iter_mut() {
                    *sample = value;
                }
            }
        }
    }

    #[test]
    fn verify_ordered_output_with_many_threads() {
        let params = VideoParameters::ntsc();
        let num_frames = 11;
        let field_length = params.field_length();

        // Each frame's fields carry its frame number, so the output is checkable.
        let fields: Vec<Vec<u16>> = (0..num_frames * 2)
            .map(|field| vec![(field / 2 + 1) as u16 * 100; field_length])
            .collect();

        let mut reference: Option<Vec<u8>> = None;

        for threads in [1usize, 4] {
            let mut adjusted = params.clone();
            let mut writer = OutputWriter::new();
            writer
                .update_configuration(
                    &mut adjusted,
                    &OutputConfig {
                        use_padding: true,
                        pixel_format: PixelFormat::Gray16,
                        output_y4m: false,
                    },
                )
                .unwrap();

            let mut decoder = JitteryDecoder { params: None };
            decoder.configure(&adjusted).unwrap();

            let metadata = SimpleMetadata::new(adjusted.clone(), num_frames * 2);
            let mut source = MemoryFieldSource::new(field_length, fields.clone());

            let mut sink: Vec<u8> = Vec::new();
            let mut pool = DecoderPool::new(
                &decoder,
                &metadata,
                &mut source,
                &writer,
                &mut sink,
                PoolOptions { start_frame: None, length: None, max_threads: threads },
                None,
            )
            .unwrap();
            pool.process().unwrap();
            drop(pool);

            let per_frame = writer.active_width() as usize * writer.output_height() as usize * 2;
            assert_eq!(sink.len(), per_frame * num_frames as usize);

            match &reference {
                None => reference = Some(sink),
                Some(reference) => {
                    // The multi-threaded output must be bit-identical to the single-threaded
                    // run.
                    assert_eq!(reference, &sink);
                }
            }
        }
    }

    #[test]
    fn verify_start_frame_validation() {
        let params = VideoParameters::pal();
        let metadata = SimpleMetadata::new(params.clone(), 4);
        let field_length = params.field_length();
        let mut source =
            MemoryFieldSource::new(field_length, vec![vec![0u16; field_length]; 4]);

        let mut writer = OutputWriter::new();
        let mut adjusted = params.clone();
        writer.update_configuration(&mut adjusted, &OutputConfig::default()).unwrap();

        let mut decoder = MonoDecoder::new();
        decoder.configure(&adjusted).unwrap();

        let mut sink: Vec<u8> = Vec::new();
        let result = DecoderPool::new(
            &decoder,
            &metadata,
            &mut source,
            &writer,
            &mut sink,
            PoolOptions { start_frame: Some(10), length: None, max_threads: 1 },
            None,
        );
        assert!(result.is_err());
    }
}
