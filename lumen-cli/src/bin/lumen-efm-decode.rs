// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decode an EFM T-values capture into audio samples or data sectors.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::error;

use lumen_core::errors::Result;
use lumen_efm::audio::ErrorTreatment;
use lumen_efm::{EfmDecoder, EfmDecoderOptions};

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ErrorTreatmentName {
    Conceal,
    Silence,
    Passthrough,
}

/// Decode an EFM T-values capture into audio samples or data sectors.
#[derive(Parser)]
#[command(name = "lumen-efm-decode", version)]
struct Args {
    /// Input file of T-values, one per byte.
    input: PathBuf,

    /// Output file: 16-bit stereo samples (audio) or sector payloads (data).
    output: PathBuf,

    /// Decode the payload as data sectors rather than audio.
    #[arg(long)]
    data: bool,

    /// Treatment of audio frames the error correction could not recover.
    #[arg(long = "error-treatment", value_enum, default_value = "conceal")]
    error_treatment: ErrorTreatmentName,

    /// Pad the audio from disc time 00:00.00 up to the first section found.
    #[arg(long = "pad-start")]
    pad_start: bool,

    /// The capture carries no usable time stamps; disable gap padding.
    #[arg(long = "no-timestamp")]
    no_timestamp: bool,

    /// Show debug output.
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn run(args: &Args) -> Result<()> {
    let options = EfmDecoderOptions {
        decode_audio: !args.data,
        decode_data: args.data,
        error_treatment: match args.error_treatment {
            ErrorTreatmentName::Conceal => ErrorTreatment::Conceal,
            ErrorTreatmentName::Silence => ErrorTreatment::Silence,
            ErrorTreatmentName::Passthrough => ErrorTreatment::PassThrough,
        },
        pad_initial_disc_time: args.pad_start,
        no_timestamps: args.no_timestamp,
    };

    let mut decoder = EfmDecoder::new(options);

    let mut input = BufReader::new(File::open(&args.input)?);
    let mut output = BufWriter::new(File::create(&args.output)?);

    // Feed the decoder a buffer at a time; it carries framing state between calls.
    let mut buffer = vec![0u8; 1 << 20];
    loop {
        let bytes_read = input.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        let decoded = decoder.process(&buffer[..bytes_read]);
        if !decoded.audio.is_empty() {
            output.write_all(bytemuck::cast_slice(decoded.audio.as_slice()))?;
        }
        if !decoded.data.is_empty() {
            output.write_all(&decoded.data)?;
        }
    }

    let decoded = decoder.flush();
    if !decoded.audio.is_empty() {
        output.write_all(bytemuck::cast_slice(decoded.audio.as_slice()))?;
    }
    output.flush()?;

    decoder.report();

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
