//! Coordinate transforms between the camera frame, the detector's input crop
//! and the display canvas.

use nalgebra::{Matrix3, Vector3};

use crate::error::{FusionError, Result};
use crate::tracker::{Detection, Rect};

/// Affine map between two pixel spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    matrix: Matrix3<f32>,
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl FrameTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Map a `src_w x src_h` image onto `dst_w x dst_h`, rotating it clockwise
    /// by `rotation_deg` (a multiple of 90) about its centre.
    ///
    /// With `maintain_aspect` the larger of the two scale factors is applied
    /// to both axes, so the image covers the destination.
    pub fn new(
        src_w: f32,
        src_h: f32,
        dst_w: f32,
        dst_h: f32,
        rotation_deg: i32,
        maintain_aspect: bool,
    ) -> Result<Self> {
        if rotation_deg % 90 != 0 {
            return Err(FusionError::Config(format!(
                "rotation must be a multiple of 90 degrees, got {rotation_deg}"
            )));
        }
        if [src_w, src_h, dst_w, dst_h].iter().any(|v| !(*v > 0.0)) {
            return Err(FusionError::Config(format!(
                "transform sizes must be positive, got {src_w}x{src_h} -> {dst_w}x{dst_h}"
            )));
        }

        let mut matrix = Matrix3::identity();
        if rotation_deg != 0 {
            matrix = translation(-src_w / 2.0, -src_h / 2.0);
            matrix = rotation(rotation_deg) * matrix;
        }

        let transpose = (rotation_deg.abs() + 90) % 180 == 0;
        let (in_w, in_h) = if transpose { (src_h, src_w) } else { (src_w, src_h) };
        if in_w != dst_w || in_h != dst_h {
            let sx = dst_w / in_w;
            let sy = dst_h / in_h;
            let (sx, sy) = if maintain_aspect {
                let s = sx.max(sy);
                (s, s)
            } else {
                (sx, sy)
            };
            matrix = Matrix3::new_nonuniform_scaling(&nalgebra::Vector2::new(sx, sy)) * matrix;
        }

        if rotation_deg != 0 {
            matrix = translation(dst_w / 2.0, dst_h / 2.0) * matrix;
        }
        Ok(Self { matrix })
    }

    /// Fit a frame onto a canvas, rotated by the sensor orientation and scaled
    /// uniformly to the largest size that fits.
    pub fn frame_to_canvas(
        frame_w: f32,
        frame_h: f32,
        canvas_w: f32,
        canvas_h: f32,
        sensor_orientation: i32,
    ) -> Result<Self> {
        let rotated = sensor_orientation.rem_euclid(180) == 90;
        let (out_w, out_h) = if rotated {
            (frame_h, frame_w)
        } else {
            (frame_w, frame_h)
        };
        let multiplier = (canvas_w / out_w).min(canvas_h / out_h);
        Self::new(
            frame_w,
            frame_h,
            (multiplier * out_w).floor(),
            (multiplier * out_h).floor(),
            sensor_orientation,
            false,
        )
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        (p.x, p.y)
    }

    /// Map both corners and re-normalise, so rotated boxes stay well-formed.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        let a = self.map_point(rect.left, rect.top);
        let b = self.map_point(rect.right, rect.bottom);
        Rect::from_corners(a, b)
    }

    pub fn invert(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }

    /// Apply `self`, then `next`.
    pub fn then(&self, next: &FrameTransform) -> Self {
        Self {
            matrix: next.matrix * self.matrix,
        }
    }
}

fn translation(dx: f32, dy: f32) -> Matrix3<f32> {
    Matrix3::new_translation(&nalgebra::Vector2::new(dx, dy))
}

/// Clockwise rotation in image coordinates (y pointing down).
fn rotation(deg: i32) -> Matrix3<f32> {
    let (sin, cos) = match deg.rem_euclid(360) {
        0 => (0.0, 1.0),
        90 => (1.0, 0.0),
        180 => (0.0, -1.0),
        _ => (-1.0, 0.0),
    };
    Matrix3::new(cos, -sin, 0.0, sin, cos, 0.0, 0.0, 0.0, 1.0)
}

/// Map detector output into frame coordinates, keeping only well-formed
/// detections at or above `min_confidence`.
pub fn project_detections(
    detections: &[Detection],
    crop_to_frame: &FrameTransform,
    min_confidence: f32,
) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.is_valid() && d.confidence >= min_confidence)
        .map(|d| Detection {
            bbox: crop_to_frame.map_rect(&d.bbox),
            ..d.clone()
        })
        .collect()
}
