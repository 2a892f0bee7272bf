// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decode a TBC composite capture into component video.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info};

use lumen_chroma::comb::{CombConfiguration, NtscDecoder};
use lumen_chroma::mono::MonoDecoder;
use lumen_chroma::pal::{ChromaFilterMode, PalConfiguration, PalDecoder};
use lumen_chroma::tbc::TbcFieldSource;
use lumen_chroma::transform::TransformMode;
use lumen_chroma::{Decoder, DecoderPool, OutputConfig, OutputWriter, PixelFormat, PoolEvent, PoolOptions};
use lumen_core::errors::{config_error, Result};
use lumen_core::meta::{FieldMetadata, SimpleMetadata, VideoMetadata};
use lumen_core::video::VideoParameters;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum DecoderName {
    Pal2d,
    Transform2d,
    Transform3d,
    Ntsc1d,
    Ntsc2d,
    Ntsc3d,
    Ntsc3dnoadapt,
    Mono,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum SystemName {
    Pal,
    Ntsc,
    Palm,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Rgb,
    Yuv,
    Y4m,
    Gray,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum TransformModeName {
    Level,
    Threshold,
}

/// Decode a TBC composite capture into component video.
#[derive(Parser)]
#[command(name = "lumen-chroma-decode", version)]
struct Args {
    /// Input TBC file.
    input: PathBuf,

    /// Output file (omit or use "-" for stdout).
    output: Option<PathBuf>,

    /// Chroma decoder to use.
    #[arg(short = 'f', long = "decoder", value_enum)]
    decoder: Option<DecoderName>,

    /// Video system of the capture.
    #[arg(long, value_enum, default_value = "pal")]
    system: SystemName,

    /// First frame to decode (1-based).
    #[arg(short = 's', long = "start")]
    start: Option<i32>,

    /// Number of frames to decode.
    #[arg(short = 'l', long = "length")]
    length: Option<i32>,

    /// Number of worker threads (default: all logical CPUs).
    #[arg(short = 't', long = "threads")]
    threads: Option<usize>,

    /// Output pixel format / container.
    #[arg(short = 'p', long = "output-format", value_enum, default_value = "rgb")]
    output_format: OutputFormat,

    /// Decode losing all chroma information.
    #[arg(short = 'b', long = "blackandwhite")]
    blackandwhite: bool,

    /// Disable padding the output to dimensions divisible by 8.
    #[arg(long = "no-padding")]
    no_padding: bool,

    /// Treat the fields as second-field-first.
    #[arg(short = 'r', long = "reverse")]
    reverse: bool,

    /// Gain applied to the chroma components.
    #[arg(long = "chroma-gain", default_value_t = 1.0)]
    chroma_gain: f64,

    /// Phase rotation applied to the chroma components, in degrees.
    #[arg(long = "chroma-phase", default_value_t = 0.0)]
    chroma_phase: f64,

    /// Chroma noise reduction level, in IRE (NTSC decoders).
    #[arg(long = "chroma-nr", default_value_t = 0.0)]
    chroma_nr: f64,

    /// Luma noise reduction level, in IRE (default 0.5 for PAL, 1.0 for NTSC).
    #[arg(long = "luma-nr")]
    luma_nr: Option<f64>,

    /// Use only a 1D filter for the U/V components (PAL decoders).
    #[arg(long = "simple-pal")]
    simple_pal: bool,

    /// Transform filter bin-pair decision mode.
    #[arg(long = "transform-mode", value_enum, default_value = "threshold")]
    transform_mode: TransformModeName,

    /// Uniform similarity threshold for the Transform filters.
    #[arg(long = "transform-threshold", default_value_t = 0.4)]
    transform_threshold: f64,

    /// File of per-bin similarity thresholds for the Transform filters.
    #[arg(long = "transform-thresholds")]
    transform_thresholds: Option<PathBuf>,

    /// Overlay the Transform filter's FFTs on the output.
    #[arg(long = "show-ffts")]
    show_ffts: bool,

    /// Overlay the adaptive 3D decision map on the output (ntsc3d).
    #[arg(short = 'o', long = "show-map")]
    show_map: bool,

    /// Use exact burst-phase compensation when demodulating NTSC chroma.
    #[arg(long = "ntsc-phase-comp")]
    ntsc_phase_comp: bool,

    /// Show debug output.
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

/// Frame/field metadata synthesized from the standard system layout, since this tool reads
/// bare TBC files. The reverse flag swaps the field pairing.
struct CliMetadata {
    inner: SimpleMetadata,
    reverse: bool,
    reversed_fields: Vec<FieldMetadata>,
}

impl CliMetadata {
    fn new(params: VideoParameters, num_fields: i32, reverse: bool) -> CliMetadata {
        let inner = SimpleMetadata::new(params, num_fields);

        // With reversed field order, the capture's even fields are second fields.
        let reversed_fields = (0..num_fields)
            .map(|i| FieldMetadata {
                is_first_field: (i % 2) == 1,
                phase_id: (i % 4) + 1,
                dropouts: Vec::new(),
            })
            .collect();

        CliMetadata { inner, reverse, reversed_fields }
    }
}

impl VideoMetadata for CliMetadata {
    fn video_parameters(&self) -> &VideoParameters {
        self.inner.video_parameters()
    }

    fn num_frames(&self) -> i32 {
        self.inner.num_frames()
    }

    fn num_fields(&self) -> i32 {
        self.inner.num_fields()
    }

    fn first_field_number(&self, frame_number: i32) -> Option<i32> {
        if self.reverse {
            self.inner.second_field_number(frame_number)
        } else {
            self.inner.first_field_number(frame_number)
        }
    }

    fn second_field_number(&self, frame_number: i32) -> Option<i32> {
        if self.reverse {
            self.inner.first_field_number(frame_number)
        } else {
            self.inner.second_field_number(frame_number)
        }
    }

    fn field(&self, field_number: i32) -> &FieldMetadata {
        if self.reverse {
            &self.reversed_fields[(field_number - 1) as usize]
        } else {
            self.inner.field(field_number)
        }
    }
}

fn load_thresholds(path: &PathBuf) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)?;

    let mut thresholds = Vec::new();
    for token in text.split_whitespace() {
        match token.parse::<f64>() {
            Ok(value) => thresholds.push(value),
            Err(_) => return config_error(format!("bad threshold value {token:?}")),
        }
    }

    Ok(thresholds)
}

fn run(args: &Args) -> Result<()> {
    let mut params = match args.system {
        SystemName::Pal => VideoParameters::pal(),
        SystemName::Ntsc => VideoParameters::ntsc(),
        SystemName::Palm => VideoParameters::pal_m(),
    };

    // Select the decoder, defaulting by system.
    let decoder_name = args.decoder.unwrap_or(match args.system {
        SystemName::Ntsc => DecoderName::Ntsc2d,
        _ => DecoderName::Pal2d,
    });

    if args.show_map && decoder_name != DecoderName::Ntsc3d {
        return config_error("--show-map is only supported by the ntsc3d decoder");
    }
    if args.show_ffts
        && !matches!(decoder_name, DecoderName::Transform2d | DecoderName::Transform3d)
    {
        return config_error("--show-ffts is only supported by the Transform decoders");
    }

    // Work out the output configuration.
    let pixel_format = match args.output_format {
        OutputFormat::Rgb => PixelFormat::Rgb48,
        OutputFormat::Gray => PixelFormat::Gray16,
        OutputFormat::Yuv | OutputFormat::Y4m => {
            if args.blackandwhite || decoder_name == DecoderName::Mono {
                PixelFormat::Gray16
            } else {
                PixelFormat::Yuv444P16
            }
        }
    };

    let output_config = OutputConfig {
        use_padding: !args.no_padding,
        pixel_format,
        output_y4m: args.output_format == OutputFormat::Y4m,
    };

    let mut writer = OutputWriter::new();
    writer.update_configuration(&mut params, &output_config)?;
    writer.print_output_info();

    let transform_mode = match args.transform_mode {
        TransformModeName::Level => TransformMode::Level,
        TransformModeName::Threshold => TransformMode::Threshold,
    };
    let transform_thresholds = match &args.transform_thresholds {
        Some(path) => load_thresholds(path)?,
        None => Vec::new(),
    };

    let pal_config = |chroma_filter: ChromaFilterMode| PalConfiguration {
        chroma_gain: args.chroma_gain,
        chroma_phase: args.chroma_phase,
        y_nr_level: args.luma_nr.unwrap_or(0.5),
        simple_pal: args.simple_pal,
        chroma_filter,
        transform_mode,
        transform_threshold: args.transform_threshold,
        transform_thresholds: transform_thresholds.clone(),
        show_ffts: args.show_ffts,
        ..PalConfiguration::default()
    };

    let ntsc_config = |dimensions: i32, adaptive: bool, transform: bool| CombConfiguration {
        chroma_gain: args.chroma_gain,
        chroma_phase: args.chroma_phase,
        dimensions,
        adaptive,
        show_map: args.show_map,
        phase_compensation: args.ntsc_phase_comp,
        c_nr_level: args.chroma_nr,
        y_nr_level: args.luma_nr.unwrap_or(1.0),
        use_transform_filter: transform,
        transform_mode,
        transform_threshold: args.transform_threshold,
        transform_thresholds: transform_thresholds.clone(),
        show_ffts: args.show_ffts,
        ..CombConfiguration::default()
    };

    let mut decoder: Box<dyn Decoder> = match decoder_name {
        DecoderName::Pal2d => Box::new(PalDecoder::new(pal_config(ChromaFilterMode::PalColour))),
        DecoderName::Transform2d => {
            Box::new(PalDecoder::new(pal_config(ChromaFilterMode::Transform2D)))
        }
        DecoderName::Transform3d => {
            Box::new(PalDecoder::new(pal_config(ChromaFilterMode::Transform3D)))
        }
        DecoderName::Ntsc1d => Box::new(NtscDecoder::new(ntsc_config(1, false, false))),
        DecoderName::Ntsc2d => Box::new(NtscDecoder::new(ntsc_config(2, false, false))),
        DecoderName::Ntsc3d => Box::new(NtscDecoder::new(ntsc_config(3, true, false))),
        DecoderName::Ntsc3dnoadapt => Box::new(NtscDecoder::new(ntsc_config(3, false, false))),
        DecoderName::Mono => {
            let mut mono = MonoDecoder::new();
            mono.mono_frames = pixel_format == PixelFormat::Gray16;
            Box::new(mono)
        }
    };

    decoder.configure(&params)?;

    // Open the input and work out how many frames it holds.
    let input = File::open(&args.input)?;
    let field_length = params.field_length();
    let num_fields = (input.metadata()?.len() / (field_length as u64 * 2)) as i32;
    if num_fields < 2 {
        return config_error("input file holds less than one frame");
    }

    let metadata = CliMetadata::new(params.clone(), num_fields, args.reverse);
    let mut source = TbcFieldSource::new(BufReader::new(input), field_length);

    let options = PoolOptions {
        start_frame: args.start,
        length: args.length,
        max_threads: args.threads.unwrap_or_else(|| PoolOptions::default().max_threads),
    };

    let events = |event: PoolEvent| {
        if let PoolEvent::Progress(frames) = event {
            info!("{frames} frames processed");
        }
    };

    // Open the output and run the pool.
    match &args.output {
        Some(path) if path.as_os_str() != "-" => {
            let mut sink = BufWriter::new(File::create(path)?);
            DecoderPool::new(
                decoder.as_ref(),
                &metadata,
                &mut source,
                &writer,
                &mut sink,
                options,
                Some(&events),
            )?
            .process()?;
            sink.flush()?;
        }
        _ => {
            info!("writing output to stdout");
            let mut sink = std::io::stdout();
            DecoderPool::new(
                decoder.as_ref(),
                &metadata,
                &mut source,
                &writer,
                &mut sink,
                options,
                Some(&events),
            )?
            .process()?;
            sink.flush()?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.debug {
        pretty_env_logger::formatted_builder().filter_level(log::LevelFilter::Debug).init();
    } else {
        pretty_env_logger::formatted_builder().filter_level(log::LevelFilter::Info).init();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
