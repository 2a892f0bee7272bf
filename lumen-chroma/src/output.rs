// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `output` module converts component frames into packed output samples, with optional
//! padding to codec-friendly sizes and YUV4MPEG2 stream framing.

use log::info;

use lumen_core::errors::{config_error, Result};
use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

// Limits, zero points and scaling factors (from 0-1) for Y'CbCr colour representations
// [Poynton ch25 p305] [BT.601-7 sec 2.5.3]
const Y_MIN: f64 = 1.0 * 256.0;
const Y_ZERO: f64 = 16.0 * 256.0;
const Y_SCALE: f64 = 219.0 * 256.0;
const Y_MAX: f64 = 254.75 * 256.0;
const C_MIN: f64 = 1.0 * 256.0;
const C_ZERO: f64 = 128.0 * 256.0;
const C_SCALE: f64 = 112.0 * 256.0;
const C_MAX: f64 = 254.75 * 256.0;

// ITU-R BT.601-7 [Poynton eq 25.1 p303 and eq 25.5 p307]
const ONE_MINUS_KB: f64 = 1.0 - 0.114;
const ONE_MINUS_KR: f64 = 1.0 - 0.299;

// kB = sqrt(209556997.0 / 96146491.0) / 3.0
// kR = sqrt(221990474.0 / 288439473.0)
// [Poynton eq 28.1 p336]
const KB: f64 = 0.49211104112248356308804691718185;
const KR: f64 = 0.87728321993817866838972487283129;

/// Output pixel formats. All three use 16-bit little-endian samples.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PixelFormat {
    #[default]
    Rgb48,
    Yuv444P16,
    Gray16,
}

impl PixelFormat {
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Rgb48 => "RGB48",
            PixelFormat::Yuv444P16 => "YUV444P16",
            PixelFormat::Gray16 => "GRAY16",
        }
    }
}

/// Output settings.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Pad the active area until both dimensions are divisible by 8, as video codecs expect.
    pub use_padding: bool,
    pub pixel_format: PixelFormat,
    /// Wrap the output in a YUV4MPEG2 stream.
    pub output_y4m: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { use_padding: true, pixel_format: PixelFormat::Rgb48, output_y4m: false }
    }
}

/// A frame converted to one of the supported output formats. Since all the formats use 16-bit
/// samples, this is just a vector of 16-bit numbers.
pub type OutputFrame = Vec<u16>;

/// Converts component frames to the configured output format.
#[derive(Clone, Debug, Default)]
pub struct OutputWriter {
    config: OutputConfig,
    params: Option<VideoParameters>,

    // Number of blank lines added at the top and bottom of the output.
    top_pad_lines: i32,
    bottom_pad_lines: i32,

    // Output size.
    active_width: i32,
    active_height: i32,
    output_height: i32,
}

impl OutputWriter {
    pub fn new() -> OutputWriter {
        OutputWriter::default()
    }

    /// Set the output configuration, adjusting the video parameters to suit. (If padding is
    /// disabled, the parameters are not changed.)
    pub fn update_configuration(
        &mut self,
        params: &mut VideoParameters,
        config: &OutputConfig,
    ) -> Result<()> {
        if config.output_y4m && config.pixel_format == PixelFormat::Rgb48 {
            return config_error("pixel format not supported in yuv4mpeg output");
        }

        self.config = config.clone();
        self.top_pad_lines = 0;
        self.bottom_pad_lines = 0;

        self.active_width = params.active_video_end - params.active_video_start;
        self.active_height = params.last_active_frame_line - params.first_active_frame_line;
        self.output_height = self.active_height;

        if self.config.use_padding {
            // Expand the horizontal active region so the width is divisible by 8, adding
            // pixels to the right and left sides in turn to keep the active area centred.
            loop {
                self.active_width = params.active_video_end - params.active_video_start;
                if self.active_width % 8 == 0 {
                    break;
                }

                if self.active_width % 2 == 0 {
                    params.active_video_end += 1;
                } else {
                    params.active_video_start -= 1;
                }
            }

            // Insert empty padding lines so the height is divisible by 8, adding lines to the
            // bottom and top in turn.
            loop {
                self.output_height = self.top_pad_lines + self.active_height + self.bottom_pad_lines;
                if self.output_height % 8 == 0 {
                    break;
                }

                if self.output_height % 2 == 0 {
                    self.bottom_pad_lines += 1;
                } else {
                    self.top_pad_lines += 1;
                }
            }
        }

        self.params = Some(params.clone());
        Ok(())
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.config.pixel_format
    }

    pub fn active_width(&self) -> i32 {
        self.active_width
    }

    pub fn output_height(&self) -> i32 {
        self.output_height
    }

    /// Log a description of the output format.
    pub fn print_output_info(&self) {
        let params = self.params.as_ref().expect("writer not configured");
        let frame_height = params.frame_height();
        info!(
            "input video of {}x{} will be decoded and trimmed to {}x{} {} frames",
            params.field_width,
            frame_height,
            self.active_width,
            self.output_height,
            self.config.pixel_format.name()
        );
    }

    /// Get the header data to be written at the start of the stream.
    pub fn stream_header(&self) -> Vec<u8> {
        // Only yuv4mpeg output needs a header.
        if !self.config.output_y4m {
            return Vec::new();
        }

        let params = self.params.as_ref().expect("writer not configured");

        let mut header = String::from("YUV4MPEG2");

        // Frame size.
        header.push_str(&format!(" W{} H{}", self.active_width, self.output_height));

        // Frame rate.
        if params.system.is_625_line() {
            header.push_str(" F25:1");
        } else {
            header.push_str(" F30000:1001");
        }

        // Field order.
        header.push_str(" It");

        // Pixel aspect ratio.
        if params.system.is_625_line() {
            if params.is_widescreen {
                header.push_str(" A512:461"); // (16 / 9) * (576 / 922)
            } else {
                header.push_str(" A384:461"); // (4 / 3) * (576 / 922)
            }
        } else if params.is_widescreen {
            header.push_str(" A194:171"); // (16 / 9) * (485 / 760)
        } else {
            header.push_str(" A97:114"); // (4 / 3) * (485 / 760)
        }

        // Pixel format.
        match self.config.pixel_format {
            PixelFormat::Yuv444P16 => header.push_str(" C444p16 XCOLORRANGE=LIMITED"),
            PixelFormat::Gray16 => header.push_str(" Cmono16 XCOLORRANGE=LIMITED"),
            PixelFormat::Rgb48 => unreachable!("rejected in update_configuration"),
        }

        header.push('\n');
        header.into_bytes()
    }

    /// Get the header data to be written before each frame.
    pub fn frame_header(&self) -> Vec<u8> {
        // Only yuv4mpeg output needs a header.
        if !self.config.output_y4m {
            return Vec::new();
        }

        b"FRAME\n".to_vec()
    }

    /// Convert a component frame to the configured output format.
    pub fn convert(&self, frame: &ComponentFrame, output: &mut OutputFrame) {
        // Work out the number of output values, and resize the buffer accordingly.
        let mut total_size = (self.active_width * self.output_height) as usize;
        match self.config.pixel_format {
            PixelFormat::Rgb48 | PixelFormat::Yuv444P16 => total_size *= 3,
            PixelFormat::Gray16 => {}
        }
        output.clear();
        output.resize(total_size, 0);

        // Clear padding.
        self.clear_pad_lines(0, self.top_pad_lines, output);
        self.clear_pad_lines(self.output_height - self.bottom_pad_lines, self.bottom_pad_lines, output);

        // Convert active lines.
        for line in 0..self.active_height {
            self.convert_line(line, frame, output);
        }
    }

    fn clear_pad_lines(&self, first_line: i32, num_lines: i32, output: &mut OutputFrame) {
        let width = self.active_width as usize;
        let first = first_line as usize;
        let count = num_lines as usize * width;

        match self.config.pixel_format {
            PixelFormat::Rgb48 => {
                // Fill with RGB black.
                for value in output[first * width * 3..][..count * 3].iter_mut() {
                    *value = 0;
                }
            }
            PixelFormat::Yuv444P16 => {
                // Fill Y with black, no chroma.
                let plane = (self.active_width * self.output_height) as usize;
                for i in first * width..first * width + count {
                    output[i] = Y_ZERO as u16;
                    output[plane + i] = C_ZERO as u16;
                    output[(2 * plane) + i] = C_ZERO as u16;
                }
            }
            PixelFormat::Gray16 => {
                for value in output[first * width..][..count].iter_mut() {
                    *value = Y_ZERO as u16;
                }
            }
        }
    }

    fn convert_line(&self, line_number: i32, frame: &ComponentFrame, output: &mut OutputFrame) {
        let params = self.params.as_ref().expect("writer not configured");

        let input_line = (params.first_active_frame_line + line_number) as usize;
        let start = params.active_video_start as usize;
        let width = self.active_width as usize;

        let in_y = &frame.y(input_line)[start..start + width];

        let output_line = (self.top_pad_lines + line_number) as usize;

        let y_offset = f64::from(params.black16b_ire);
        let y_range = f64::from(params.white16b_ire) - f64::from(params.black16b_ire);
        let uv_range = y_range;

        match self.config.pixel_format {
            PixelFormat::Rgb48 => {
                // Convert Y'UV to full-range R'G'B' [Poynton eq 28.6 p337]
                let in_u = &frame.u(input_line)[start..start + width];
                let in_v = &frame.v(input_line)[start..start + width];

                let y_scale = 65535.0 / y_range;
                let uv_scale = 65535.0 / uv_range;

                let out = &mut output[output_line * width * 3..][..width * 3];
                for x in 0..width {
                    // Scale Y'UV to 0-65535.
                    let y = ((in_y[x] - y_offset) * y_scale).clamp(0.0, 65535.0);
                    let u = in_u[x] * uv_scale;
                    let v = in_v[x] * uv_scale;

                    // Convert Y'UV to R'G'B'.
                    let pos = x * 3;
                    out[pos] = (y + (1.139883 * v)).clamp(0.0, 65535.0) as u16;
                    out[pos + 1] =
                        (y + (-0.394642 * u) + (-0.580622 * v)).clamp(0.0, 65535.0) as u16;
                    out[pos + 2] = (y + (2.032062 * u)).clamp(0.0, 65535.0) as u16;
                }
            }
            PixelFormat::Yuv444P16 => {
                // Convert Y'UV to Y'CbCr [Poynton eq 25.5 p307]
                let in_u = &frame.u(input_line)[start..start + width];
                let in_v = &frame.v(input_line)[start..start + width];

                let y_scale = Y_SCALE / y_range;
                let cb_scale = (C_SCALE / (ONE_MINUS_KB * KB)) / uv_range;
                let cr_scale = (C_SCALE / (ONE_MINUS_KR * KR)) / uv_range;

                let plane = (self.active_width * self.output_height) as usize;
                let line_offset = output_line * width;
                for x in 0..width {
                    output[line_offset + x] =
                        (((in_y[x] - y_offset) * y_scale) + Y_ZERO).clamp(Y_MIN, Y_MAX) as u16;
                    output[plane + line_offset + x] =
                        ((in_u[x] * cb_scale) + C_ZERO).clamp(C_MIN, C_MAX) as u16;
                    output[(2 * plane) + line_offset + x] =
                        ((in_v[x] * cr_scale) + C_ZERO).clamp(C_MIN, C_MAX) as u16;
                }
            }
            PixelFormat::Gray16 => {
                // Throw away UV and just convert Y' to the same scale as Y'CbCr.
                let y_scale = Y_SCALE / y_range;

                let out = &mut output[output_line * width..][..width];
                for x in 0..width {
                    out[x] = (((in_y[x] - y_offset) * y_scale) + Y_ZERO).clamp(Y_MIN, Y_MAX) as u16;
                }
            }
        }
    }
}
