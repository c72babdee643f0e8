//! Coordinate conversion between detector space, frame pixels and face-crop
//! pixels, and the crops built from them.

use serde::{Deserialize, Serialize};

use crate::types::{DetectionBox, Frame, LandmarkPoint};

/// Integer pixel bounds, `max` exclusive. Coordinates may lie outside the
/// image they refer to; `crop` clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl PixelRect {
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> u32 {
        self.xmax.saturating_sub(self.xmin).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.ymax.saturating_sub(self.ymin).max(0) as u32
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.xmin as f32 + self.xmax as f32) / 2.0,
            (self.ymin as f32 + self.ymax as f32) / 2.0,
        )
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.xmin.saturating_add(dx),
            self.ymin.saturating_add(dy),
            self.xmax.saturating_add(dx),
            self.ymax.saturating_add(dy),
        )
    }
}

/// Half extents of the eye patch cut around each eye landmark.
///
/// The landmark model only emits a point per eye, so the patch size is a
/// tuning knob rather than model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeOffsets {
    pub half_width: i32,
    pub half_height: i32,
}

impl EyeOffsets {
    /// Offsets used by the benchmark tuning runs
    pub const TUNED: Self = Self {
        half_width: 35,
        half_height: 20,
    };

    /// Wider patch from the first interactive build
    pub const WIDE: Self = Self {
        half_width: 50,
        half_height: 25,
    };

    pub fn new(half_width: i32, half_height: i32) -> Self {
        Self {
            half_width,
            half_height,
        }
    }
}

impl Default for EyeOffsets {
    fn default() -> Self {
        Self::TUNED
    }
}

/// Scales a normalized detection to frame pixels, rounding to nearest.
///
/// Nothing checks that the box is ordered or inside the frame.
pub fn face_rect(detection: &DetectionBox, frame_width: u32, frame_height: u32) -> PixelRect {
    let w = frame_width as f32;
    let h = frame_height as f32;
    PixelRect::new(
        (detection.xmin * w).round() as i32,
        (detection.ymin * h).round() as i32,
        (detection.xmax * w).round() as i32,
        (detection.ymax * h).round() as i32,
    )
}

/// Landmark position in face-crop pixels. Truncates toward zero.
pub fn landmark_pixel(point: &LandmarkPoint, face_width: u32, face_height: u32) -> (i32, i32) {
    (
        (point.x * face_width as f32) as i32,
        (point.y * face_height as f32) as i32,
    )
}

/// Eye patch around a landmark, every coordinate clamped to `>= 0`.
///
/// Only the lower bound is clamped; a patch running past the right or bottom
/// edge of the face is left as is and trimmed by `crop`.
pub fn eye_rect(
    point: &LandmarkPoint,
    face_width: u32,
    face_height: u32,
    offsets: EyeOffsets,
) -> PixelRect {
    let (px, py) = landmark_pixel(point, face_width, face_height);
    PixelRect::new(
        px.saturating_sub(offsets.half_width).max(0),
        py.saturating_sub(offsets.half_height).max(0),
        px.saturating_add(offsets.half_width).max(0),
        py.saturating_add(offsets.half_height).max(0),
    )
}

/// Copies the part of `rect` that lies inside `image`.
///
/// Returns an empty (0x0) image when the intersection has no area.
pub fn crop(image: &Frame, rect: &PixelRect) -> Frame {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x0 = (rect.xmin as i64).clamp(0, w);
    let y0 = (rect.ymin as i64).clamp(0, h);
    let x1 = (rect.xmax as i64).clamp(0, w);
    let y1 = (rect.ymax as i64).clamp(0, h);

    if x1 <= x0 || y1 <= y0 {
        return Frame::new(0, 0);
    }

    image::imageops::crop_imm(
        image,
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    )
    .to_image()
}

pub fn is_empty(image: &Frame) -> bool {
    image.width() == 0 || image.height() == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> Frame {
        Frame::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 0]))
    }

    #[test]
    fn test_face_rect_scales_and_rounds() {
        let rect = face_rect(&DetectionBox::new(0.2, 0.2, 0.6, 0.8), 640, 480);
        assert_eq!(rect, PixelRect::new(128, 96, 384, 384));
        assert_eq!((rect.width(), rect.height()), (256, 288));

        let rect = face_rect(&DetectionBox::new(0.101, 0.0, 0.5, 0.999), 100, 100);
        assert_eq!(rect, PixelRect::new(10, 0, 50, 100));
    }

    #[test]
    fn test_face_rect_keeps_ordering_for_ordered_boxes() {
        let sizes = [(640, 480), (1920, 1080), (7, 3), (1, 1)];
        let mut t = 0.0f32;
        while t < 0.95 {
            let b = DetectionBox::new(t, t * 0.5, t + 0.05, t * 0.5 + 0.3);
            for (w, h) in sizes {
                let r = face_rect(&b, w, h);
                assert!(r.xmin <= r.xmax, "{b:?} {w}x{h}");
                assert!(r.ymin <= r.ymax, "{b:?} {w}x{h}");
            }
            t += 0.05;
        }
    }

    #[test]
    fn test_eye_rect_end_to_end_scenario() {
        let rect = eye_rect(&LandmarkPoint::new(0.3, 0.4), 256, 288, EyeOffsets::TUNED);
        assert_eq!(rect, PixelRect::new(41, 95, 111, 135));
        assert_eq!((rect.width(), rect.height()), (70, 40));
    }

    #[test]
    fn test_eye_rect_wide_offsets() {
        let rect = eye_rect(&LandmarkPoint::new(0.5, 0.5), 200, 100, EyeOffsets::WIDE);
        assert_eq!(rect, PixelRect::new(50, 25, 150, 75));
    }

    #[test]
    fn test_eye_rect_never_negative() {
        for i in 0..=20 {
            for j in 0..=20 {
                let p = LandmarkPoint::new(i as f32 / 20.0 - 0.2, j as f32 / 20.0 - 0.2);
                let r = eye_rect(&p, 120, 90, EyeOffsets::WIDE);
                assert!(r.xmin >= 0 && r.ymin >= 0 && r.xmax >= 0 && r.ymax >= 0, "{r:?}");
            }
        }
    }

    #[test]
    fn test_eye_rect_does_not_clamp_upper_bound() {
        let rect = eye_rect(&LandmarkPoint::new(0.875, 0.875), 100, 100, EyeOffsets::TUNED);
        assert_eq!(rect, PixelRect::new(52, 67, 122, 107));
    }

    #[test]
    fn test_crop_inside_bounds() {
        let frame = gradient(64, 48);
        let face = crop(&frame, &PixelRect::new(10, 5, 30, 25));
        assert_eq!(face.dimensions(), (20, 20));
        assert_eq!(face.get_pixel(0, 0), &Rgb([10, 5, 0]));
        assert_eq!(face.get_pixel(19, 19), &Rgb([29, 24, 0]));
    }

    #[test]
    fn test_crop_trims_to_image() {
        let frame = gradient(64, 48);
        let trimmed = crop(&frame, &PixelRect::new(-10, 40, 100, 60));
        assert_eq!(trimmed.dimensions(), (64, 8));
        assert_eq!(trimmed.get_pixel(0, 0), &Rgb([0, 40, 0]));
    }

    #[test]
    fn test_crop_degenerate_is_empty() {
        let frame = gradient(64, 48);
        assert!(is_empty(&crop(&frame, &PixelRect::new(30, 10, 20, 40))));
        assert!(is_empty(&crop(&frame, &PixelRect::new(70, 50, 90, 60))));
        assert!(is_empty(&crop(&frame, &PixelRect::new(5, 5, 5, 20))));
    }

    #[test]
    fn test_pixel_rect_helpers() {
        let r = PixelRect::new(10, 20, 30, 60);
        assert_eq!(r.center(), (20.0, 40.0));
        assert_eq!(r.offset(5, -5), PixelRect::new(15, 15, 35, 55));
        assert_eq!(PixelRect::new(5, 5, 1, 1).width(), 0);
    }

    #[test]
    fn test_eye_rect_saturates_for_extreme_landmarks() {
        let face = gradient(256, 288);
        let far_right = eye_rect(&LandmarkPoint::new(1.0e7, 0.4), 256, 288, EyeOffsets::TUNED);
        assert_eq!(far_right, PixelRect::new(i32::MAX - 35, 95, i32::MAX, 135));
        assert!(is_empty(&crop(&face, &far_right)));

        let far_left = eye_rect(&LandmarkPoint::new(-1.0e7, 0.4), 256, 288, EyeOffsets::TUNED);
        assert_eq!(far_left, PixelRect::new(0, 95, 0, 135));
        assert!(is_empty(&crop(&face, &far_left)));
    }

    #[test]
    fn test_pixel_rect_helpers_saturate() {
        let r = PixelRect::new(i32::MAX - 10, 0, i32::MAX, 10);
        assert_eq!(r.offset(100, 0).xmax, i32::MAX);
        assert_eq!(PixelRect::new(i32::MIN, 0, i32::MAX, 1).width(), i32::MAX as u32);
        assert!(r.center().0 > 2.0e9);
    }
}
