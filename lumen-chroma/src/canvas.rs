// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `canvas` module provides simple drawing over a component frame, used by the debug
//! overlays (`show_ffts`, `show_map`).

use lumen_core::frame::ComponentFrame;
use lumen_core::video::VideoParameters;

/// A colour in component form, convertible from R'G'B' or grey levels.
#[derive(Clone, Copy, Debug)]
pub struct CanvasColour {
    y: f64,
    u: f64,
    v: f64,
}

/// Drawing surface over a component frame, in frame coordinates.
pub struct FrameCanvas<'a> {
    frame: &'a mut ComponentFrame,
    black: f64,
    white: f64,
    active_left: i32,
    active_right: i32,
    active_top: i32,
    active_bottom: i32,
}

impl<'a> FrameCanvas<'a> {
    pub fn new(frame: &'a mut ComponentFrame, params: &VideoParameters) -> FrameCanvas<'a> {
        FrameCanvas {
            frame,
            black: f64::from(params.black16b_ire),
            white: f64::from(params.white16b_ire),
            active_left: params.active_video_start,
            active_right: params.active_video_end,
            active_top: params.first_active_frame_line,
            active_bottom: params.last_active_frame_line,
        }
    }

    pub fn top(&self) -> i32 {
        self.active_top
    }

    pub fn bottom(&self) -> i32 {
        self.active_bottom
    }

    pub fn left(&self) -> i32 {
        self.active_left
    }

    pub fn right(&self) -> i32 {
        self.active_right
    }

    /// Convert 16-bit R'G'B' values into a canvas colour.
    pub fn rgb(&self, r: u16, g: u16, b: u16) -> CanvasColour {
        let r = f64::from(r) / 65535.0;
        let g = f64::from(g) / 65535.0;
        let b = f64::from(b) / 65535.0;

        // BT.601 luma and colour differences, scaled to the composite sample range.
        let y = (0.299 * r) + (0.587 * g) + (0.114 * b);
        let u = 0.492111 * (b - y);
        let v = 0.877283 * (r - y);

        let range = self.white - self.black;
        CanvasColour { y: self.black + (y * range), u: u * range, v: v * range }
    }

    /// Convert a 16-bit grey level into a canvas colour.
    pub fn grey(&self, level: u16) -> CanvasColour {
        let range = self.white - self.black;
        CanvasColour { y: self.black + ((f64::from(level) / 65535.0) * range), u: 0.0, v: 0.0 }
    }

    /// Set one pixel, ignoring positions outside the frame.
    pub fn plot(&mut self, x: i32, y: i32, colour: CanvasColour) {
        if x < 0 || y < 0 || y >= self.frame.height() as i32 || x >= self.frame.width() as i32 {
            return;
        }

        let (line_y, line_u, line_v) = self.frame.yuv_mut(y as usize);
        line_y[x as usize] = colour.y;
        line_u[x as usize] = colour.u;
        line_v[x as usize] = colour.v;
    }

    /// Fill a rectangle of `width` x `height` pixels with `colour`.
    pub fn fill_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32, colour: CanvasColour) {
        for py in y..y + height {
            for px in x..x + width {
                self.plot(px, py, colour);
            }
        }
    }

    /// Draw a one-pixel outline of a rectangle of `width` x `height` pixels.
    pub fn draw_rectangle(&mut self, x: i32, y: i32, width: i32, height: i32, colour: CanvasColour) {
        self.fill_rectangle(x, y, width, 1, colour);
        self.fill_rectangle(x, y + height - 1, width, 1, colour);
        self.fill_rectangle(x, y + 1, 1, height - 2, colour);
        self.fill_rectangle(x + width - 1, y + 1, 1, height - 2, colour);
    }
}
