use image::Rgb;

use crate::geometry::PixelRect;
use crate::types::{Frame, FrameResult};

const FACE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const EYE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const GAZE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Draws face and eye boxes plus one gaze arrow per eye onto `canvas`
pub fn draw_result(canvas: &mut Frame, result: &FrameResult, arrow_length: f32) {
    let face = result.face_rect;
    draw_rect(canvas, &face, FACE_COLOR);

    for eye in [result.left_eye_rect, result.right_eye_rect] {
        // eye rects are relative to the face crop
        let eye = eye.offset(face.xmin, face.ymin);
        draw_rect(canvas, &eye, EYE_COLOR);

        let (cx, cy) = eye.center();
        let tip = (
            cx + result.gaze.x * arrow_length,
            cy - result.gaze.y * arrow_length,
        );
        draw_line(canvas, (cx, cy), tip, GAZE_COLOR);
    }
}

pub fn draw_rect(canvas: &mut Frame, rect: &PixelRect, color: Rgb<u8>) {
    let (x0, y0) = (rect.xmin as f32, rect.ymin as f32);
    let (x1, y1) = (rect.xmax as f32, rect.ymax as f32);
    draw_line(canvas, (x0, y0), (x1, y0), color);
    draw_line(canvas, (x1, y0), (x1, y1), color);
    draw_line(canvas, (x1, y1), (x0, y1), color);
    draw_line(canvas, (x0, y1), (x0, y0), color);
}

/// DDA line, clipped per pixel
pub fn draw_line(canvas: &mut Frame, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        put_pixel(canvas, from.0 + dx * t, from.1 + dy * t, color);
    }
}

fn put_pixel(canvas: &mut Frame, x: f32, y: f32, color: Rgb<u8>) {
    let (x, y) = (x.round(), y.round());
    if x >= 0.0 && y >= 0.0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// Packs RGB pixels into minifb's 0RGB words
pub fn to_argb(frame: &Frame, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        frame
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32),
    );
}

#[cfg(feature = "display")]
pub use window::WindowOutput;

#[cfg(feature = "display")]
mod window {
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use minifb::{Key, Window, WindowOptions};

    use super::to_argb;
    use crate::types::Frame;

    pub struct WindowOutput {
        window: Window,
        buffer: Vec<u32>,
    }

    impl WindowOutput {
        pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
            let mut window = Window::new(
                title,
                width,
                height,
                WindowOptions {
                    resize: true,
                    ..WindowOptions::default()
                },
            )
            .map_err(|e| anyhow!("Failed to create window: {}", e))?;

            window.limit_update_rate(Some(Duration::from_micros(16600)));

            Ok(Self {
                window,
                buffer: Vec::with_capacity(width * height),
            })
        }

        /// False once the window was closed or Escape pressed
        pub fn is_open(&self) -> bool {
            self.window.is_open() && !self.window.is_key_down(Key::Escape)
        }

        pub fn show(&mut self, frame: &Frame) -> Result<()> {
            to_argb(frame, &mut self.buffer);
            self.window
                .update_with_buffer(&self.buffer, frame.width() as usize, frame.height() as usize)
                .map_err(|e| anyhow!("Window update failed: {}", e))
        }
    }
}
