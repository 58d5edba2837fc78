//! Template-matching frame tracker.
//!
//! Works on luminance frames shrunk by an integer factor. Each region keeps
//! the zero-mean appearance it had when tracking began; every frame the
//! appearance is searched for around a constant-velocity prediction and the
//! best normalised cross-correlation becomes the region's correlation.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayView2, s};
use tracing::trace;

use crate::config::TemplateTrackerConfig;
use crate::error::{FusionError, Result};
use crate::tracker::capability::{
    Frame, FrameGeometry, FrameTracker, FrameTrackerFactory, TrackHandle,
};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::rect::Rect;

/// Zero-mean appearance patch.
#[derive(Debug, Clone)]
struct Template {
    pixels: Array2<f32>,
    norm: f32,
    /// Top-left corner in downsampled pixels.
    x: usize,
    y: usize,
}

impl Template {
    fn width(&self) -> usize {
        self.pixels.ncols()
    }

    fn height(&self) -> usize {
        self.pixels.nrows()
    }

    fn center(&self) -> [f64; 2] {
        [
            self.x as f64 + self.width() as f64 / 2.0,
            self.y as f64 + self.height() as f64 / 2.0,
        ]
    }
}

#[derive(Debug, Clone)]
struct TrackedRegion {
    /// Full region in downsampled coordinates.
    region: Rect,
    /// `None` when the region had no usable texture.
    template: Option<Template>,
    correlation: f32,
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

/// Frame tracker backend following regions by template matching.
pub struct TemplateTracker {
    config: TemplateTrackerConfig,
    geometry: FrameGeometry,
    kalman: KalmanFilter,
    /// Downsampled plane of the last frame seen, keyed by its timestamp.
    downsampled: Option<(u64, Array2<f32>)>,
    regions: HashMap<u64, TrackedRegion>,
    next_id: u64,
}

impl TemplateTracker {
    /// Create a tracker for frames of the given geometry.
    pub fn new(config: TemplateTrackerConfig, geometry: FrameGeometry) -> Self {
        Self {
            config,
            geometry,
            kalman: KalmanFilter::default(),
            downsampled: None,
            regions: HashMap::new(),
            next_id: 0,
        }
    }

    /// Number of regions currently followed.
    pub fn live_regions(&self) -> usize {
        self.regions.len()
    }

    fn factor(&self) -> f32 {
        self.config.downsample_factor as f32
    }

    fn load_frame(&mut self, frame: &Frame, timestamp: u64, operation: &'static str) -> Result<()> {
        if frame.geometry() != self.geometry {
            return Err(FusionError::call(
                operation,
                format!(
                    "frame is {}x{}, tracker was created for {}x{}",
                    frame.width(),
                    frame.height(),
                    self.geometry.width,
                    self.geometry.height
                ),
            ));
        }
        if matches!(&self.downsampled, Some((ts, _)) if *ts == timestamp) {
            return Ok(());
        }
        let plane = downsample(frame.luminance().view(), self.config.downsample_factor);
        self.downsampled = Some((timestamp, plane));
        Ok(())
    }

    fn region(&self, handle: &TrackHandle) -> Result<&TrackedRegion> {
        self.regions
            .get(&handle.id())
            .ok_or(FusionError::UnknownHandle(handle.id()))
    }

    fn cut_template(&self, plane: &Array2<f32>, region: &Rect) -> Option<Template> {
        let (rows, cols) = plane.dim();
        let max_side = self.config.max_template_side.max(2);

        // Clamp before casting; boxes may lie far outside the plane.
        let (w, h) = (cols as f32, rows as f32);
        let x0 = region.left.clamp(0.0, w).floor() as usize;
        let y0 = region.top.clamp(0.0, h).floor() as usize;
        let x1 = region.right.clamp(0.0, w).ceil() as usize;
        let y1 = region.bottom.clamp(0.0, h).ceil() as usize;
        if x1 < x0.saturating_add(2) || y1 < y0.saturating_add(2) {
            return None;
        }

        // Large regions keep only their central patch.
        let (x0, x1) = central_span(x0, x1, max_side);
        let (y0, y1) = central_span(y0, y1, max_side);

        let patch = plane.slice(s![y0..y1, x0..x1]);
        let mean = patch.mean()?;
        let pixels = patch.mapv(|v| v - mean);
        let norm = pixels.mapv(|v| v * v).sum().sqrt();
        let std = norm / (pixels.len() as f32).sqrt();
        if std < self.config.min_texture_std {
            return None;
        }

        Some(Template {
            pixels,
            norm,
            x: x0,
            y: y0,
        })
    }
}

impl FrameTracker for TemplateTracker {
    fn advance(&mut self, frame: &Frame, timestamp: u64) -> Result<()> {
        self.load_frame(frame, timestamp, "advance")?;
        let Some((_, plane)) = &self.downsampled else {
            return Ok(());
        };
        let radius = self.config.search_radius as isize;

        for region in self.regions.values_mut() {
            let Some(template) = &mut region.template else {
                continue;
            };

            let (mean, covariance) = self.kalman.predict(&region.mean, &region.covariance);
            let predicted_x = (mean[0] - template.width() as f64 / 2.0).round() as isize;
            let predicted_y = (mean[1] - template.height() as f64 / 2.0).round() as isize;

            let Some((score, x, y)) = search(plane, template, predicted_x, predicted_y, radius) else {
                region.correlation = 0.0;
                region.mean = mean;
                region.covariance = covariance;
                continue;
            };

            let dx = x as f32 - template.x as f32;
            let dy = y as f32 - template.y as f32;
            template.x = x;
            template.y = y;
            region.region = region.region.translate(dx, dy);
            region.correlation = score.clamp(0.0, 1.0);

            let (mean, covariance) = self.kalman.update(&mean, &covariance, template.center());
            region.mean = mean;
            region.covariance = covariance;
            trace!(x, y, correlation = region.correlation, "region matched");
        }
        Ok(())
    }

    fn begin_track(&mut self, region: Rect, frame: &Frame, timestamp: u64) -> Result<(TrackHandle, f32)> {
        self.load_frame(frame, timestamp, "begin_track")?;
        let Some((_, plane)) = &self.downsampled else {
            return Err(FusionError::call("begin_track", "no frame"));
        };

        let region = region.scale(1.0 / self.factor());
        let template = self.cut_template(plane, &region);
        let correlation = if template.is_some() { 1.0 } else { 0.0 };

        let center = match &template {
            Some(t) => t.center(),
            None => {
                let (cx, cy) = region.center();
                [cx as f64, cy as f64]
            }
        };
        let (mean, covariance) = self.kalman.initiate(center);

        self.next_id += 1;
        let id = self.next_id;
        self.regions.insert(
            id,
            TrackedRegion {
                region,
                template,
                correlation,
                mean,
                covariance,
            },
        );
        Ok((TrackHandle::new(id), correlation))
    }

    fn current_correlation(&self, handle: &TrackHandle) -> Result<f32> {
        Ok(self.region(handle)?.correlation)
    }

    fn tracked_position(&self, handle: &TrackHandle) -> Result<Rect> {
        Ok(self.region(handle)?.region.scale(self.factor()))
    }

    fn stop_tracking(&mut self, handle: TrackHandle) {
        let removed = self.regions.remove(&handle.id());
        debug_assert!(removed.is_some(), "released unknown handle {}", handle.id());
    }
}

/// Creates a [`TemplateTracker`] sized for the first frame.
#[derive(Debug, Clone, Default)]
pub struct TemplateTrackerFactory {
    pub config: TemplateTrackerConfig,
}

impl TemplateTrackerFactory {
    /// Create a factory producing trackers with `config`.
    pub fn new(config: TemplateTrackerConfig) -> Self {
        Self { config }
    }
}

impl FrameTrackerFactory for TemplateTrackerFactory {
    fn create(&self, geometry: FrameGeometry) -> Result<Box<dyn FrameTracker>> {
        let factor = self.config.downsample_factor;
        if factor == 0 || geometry.width < factor || geometry.height < factor {
            return Err(FusionError::TrackerUnavailable(format!(
                "{}x{} frames cannot be downsampled by {}",
                geometry.width, geometry.height, factor
            )));
        }
        Ok(Box::new(TemplateTracker::new(self.config.clone(), geometry)))
    }
}

/// Block-average the plane by `factor`; trailing partial blocks are dropped.
fn downsample(plane: ArrayView2<'_, u8>, factor: usize) -> Array2<f32> {
    let (rows, cols) = plane.dim();
    let (out_rows, out_cols) = (rows / factor, cols / factor);
    let scale = 1.0 / (factor * factor) as f32;
    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let block = plane.slice(s![r * factor..(r + 1) * factor, c * factor..(c + 1) * factor]);
        block.iter().map(|&v| v as f32).sum::<f32>() * scale
    })
}

fn central_span(start: usize, end: usize, max_len: usize) -> (usize, usize) {
    let len = end - start;
    if len <= max_len {
        return (start, end);
    }
    let offset = (len - max_len) / 2;
    (start + offset, start + offset + max_len)
}

/// Best NCC position of `template` within `radius` of the predicted top-left.
fn search(
    plane: &Array2<f32>,
    template: &Template,
    predicted_x: isize,
    predicted_y: isize,
    radius: isize,
) -> Option<(f32, usize, usize)> {
    let (rows, cols) = plane.dim();
    let (tw, th) = (template.width(), template.height());
    if tw > cols || th > rows {
        return None;
    }
    let max_x = (cols - tw) as isize;
    let max_y = (rows - th) as isize;

    let x_lo = (predicted_x - radius).clamp(0, max_x);
    let x_hi = (predicted_x + radius).clamp(0, max_x);
    let y_lo = (predicted_y - radius).clamp(0, max_y);
    let y_hi = (predicted_y + radius).clamp(0, max_y);

    let mut best: Option<(f32, usize, usize)> = None;
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let (x, y) = (x as usize, y as usize);
            let patch = plane.slice(s![y..y + th, x..x + tw]);
            let score = ncc(&template.pixels, template.norm, patch);
            if best.is_none_or(|(b, _, _)| score > b) {
                best = Some((score, x, y));
            }
        }
    }
    best
}

/// Normalised cross-correlation of a zero-mean template against a patch.
fn ncc(template: &Array2<f32>, template_norm: f32, patch: ArrayView2<'_, f32>) -> f32 {
    let Some(mean) = patch.mean() else {
        return 0.0;
    };
    let mut dot = 0.0f32;
    let mut energy = 0.0f32;
    for (&t, &p) in template.iter().zip(patch.iter()) {
        let centred = p - mean;
        dot += t * centred;
        energy += centred * centred;
    }
    let denom = template_norm * energy.sqrt();
    if denom <= f32::EPSILON { 0.0 } else { dot / denom }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const W: usize = 160;
    const H: usize = 120;

    /// Flat background with a 40x40 non-repeating texture at (40 + dx, 30 + dy).
    fn scene(dx: usize, dy: usize) -> Frame {
        let plane = Array2::from_shape_fn((H, W), |(y, x)| {
            let (ox, oy) = (40 + dx, 30 + dy);
            if x >= ox && x < ox + 40 && y >= oy && y < oy + 40 {
                let (bx, by) = ((x - ox) / 2, (y - oy) / 2);
                (((bx * 37 + by * 91) ^ (bx * by * 13)) % 251) as u8
            } else {
                20
            }
        });
        Frame::from_array(plane)
    }

    fn tracker() -> TemplateTracker {
        TemplateTracker::new(
            TemplateTrackerConfig::default(),
            FrameGeometry { width: W, height: H },
        )
    }

    #[test]
    fn test_textured_region_locks_on() {
        let mut tracker = tracker();
        let frame = scene(0, 0);
        let (handle, correlation) = tracker
            .begin_track(Rect::new(40.0, 30.0, 80.0, 70.0), &frame, 1)
            .unwrap();
        assert_eq!(correlation, 1.0);
        assert_eq!(
            tracker.tracked_position(&handle).unwrap(),
            Rect::new(40.0, 30.0, 80.0, 70.0)
        );
    }

    #[test]
    fn test_flat_region_has_no_lock() {
        let mut tracker = tracker();
        let frame = scene(0, 0);
        let (handle, correlation) = tracker
            .begin_track(Rect::new(100.0, 80.0, 140.0, 110.0), &frame, 1)
            .unwrap();
        assert_eq!(correlation, 0.0);
        tracker.advance(&scene(0, 0), 2).unwrap();
        assert_eq!(tracker.current_correlation(&handle).unwrap(), 0.0);
    }

    #[test]
    fn test_region_outside_frame_has_no_lock() {
        let mut tracker = tracker();
        let frame = scene(0, 0);
        let (far, correlation) = tracker
            .begin_track(Rect::new(1e20, 0.0, 2e20, 40.0), &frame, 1)
            .unwrap();
        assert_eq!(correlation, 0.0);
        let (above, correlation) = tracker
            .begin_track(Rect::new(40.0, -500.0, 80.0, -400.0), &frame, 1)
            .unwrap();
        assert_eq!(correlation, 0.0);

        tracker.advance(&scene(0, 0), 2).unwrap();
        assert_eq!(tracker.current_correlation(&far).unwrap(), 0.0);
        tracker.stop_tracking(far);
        tracker.stop_tracking(above);
        assert_eq!(tracker.live_regions(), 0);
    }

    #[test]
    fn test_partially_visible_region_is_clipped() {
        let mut tracker = tracker();
        let (handle, correlation) = tracker
            .begin_track(Rect::new(-20.0, 30.0, 80.0, 70.0), &scene(0, 0), 1)
            .unwrap();
        assert_eq!(correlation, 1.0);
        assert_eq!(
            tracker.tracked_position(&handle).unwrap(),
            Rect::new(-20.0, 30.0, 80.0, 70.0)
        );
    }

    #[test]
    fn test_follows_moving_region() {
        let mut tracker = tracker();
        let (handle, _) = tracker
            .begin_track(Rect::new(40.0, 30.0, 80.0, 70.0), &scene(0, 0), 1)
            .unwrap();

        tracker.advance(&scene(4, 2), 2).unwrap();
        assert_eq!(
            tracker.tracked_position(&handle).unwrap(),
            Rect::new(44.0, 32.0, 84.0, 72.0)
        );
        assert_relative_eq!(
            tracker.current_correlation(&handle).unwrap(),
            1.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_correlation_drops_when_region_vanishes() {
        let mut tracker = tracker();
        let (handle, _) = tracker
            .begin_track(Rect::new(40.0, 30.0, 80.0, 70.0), &scene(0, 0), 1)
            .unwrap();
        let blank = Frame::from_array(Array2::from_elem((H, W), 20u8));
        tracker.advance(&blank, 2).unwrap();
        assert!(tracker.current_correlation(&handle).unwrap() < 0.3);
    }

    #[test]
    fn test_stop_tracking_forgets_region() {
        let mut tracker = tracker();
        let (handle, _) = tracker
            .begin_track(Rect::new(40.0, 30.0, 80.0, 70.0), &scene(0, 0), 1)
            .unwrap();
        let probe = TrackHandle::new(handle.id());
        assert_eq!(tracker.live_regions(), 1);
        tracker.stop_tracking(handle);
        assert_eq!(tracker.live_regions(), 0);
        assert_eq!(
            tracker.current_correlation(&probe),
            Err(FusionError::UnknownHandle(probe.id()))
        );
    }

    #[test]
    fn test_rejects_foreign_geometry() {
        let mut tracker = tracker();
        let small = Frame::from_array(Array2::zeros((10, 10)));
        assert!(matches!(
            tracker.advance(&small, 1),
            Err(FusionError::TrackerCall { operation: "advance", .. })
        ));
    }

    #[test]
    fn test_downsample_block_average() {
        let plane = Array2::from_shape_vec((2, 4), vec![0u8, 2, 10, 10, 4, 6, 10, 10]).unwrap();
        let out = downsample(plane.view(), 2);
        assert_eq!(out, Array2::from_shape_vec((1, 2), vec![3.0f32, 10.0]).unwrap());
    }

    #[test]
    fn test_factory_rejects_tiny_frames() {
        let factory = TemplateTrackerFactory::default();
        assert!(factory.create(FrameGeometry { width: 1, height: 1 }).is_err());
        assert!(factory.create(FrameGeometry { width: W, height: H }).is_ok());
    }
}
