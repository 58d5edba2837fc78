//! Frame tracker capability: the contract between the association engine and
//! whatever frame-to-frame tracking backend the platform provides.
//!
//! The engine treats the backend as opaque. It only hands it frames, asks it
//! to lock onto regions and reads back correlations and positions through
//! [`TrackHandle`]s.

use ndarray::Array2;

use crate::error::{FusionError, Result};
use crate::tracker::rect::Rect;

/// A luminance frame owned by the engine.
///
/// Built by copying the caller's buffer so the capture source can reuse its
/// memory as soon as construction returns.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    luminance: Array2<u8>,
}

impl Frame {
    /// Copy a luminance plane with the given row stride.
    pub fn from_luminance(width: usize, height: usize, row_stride: usize, data: &[u8]) -> Result<Self> {
        if row_stride < width {
            return Err(FusionError::InvalidFrame {
                expected: width,
                got: row_stride,
            });
        }
        let expected = if height == 0 {
            0
        } else {
            row_stride * (height - 1) + width
        };
        if data.len() < expected {
            return Err(FusionError::InvalidFrame {
                expected,
                got: data.len(),
            });
        }
        let luminance = Array2::from_shape_fn((height, width), |(y, x)| data[y * row_stride + x]);
        Ok(Self { luminance })
    }

    pub fn from_array(luminance: Array2<u8>) -> Self {
        Self { luminance }
    }

    pub fn width(&self) -> usize {
        self.luminance.ncols()
    }

    pub fn height(&self) -> usize {
        self.luminance.nrows()
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Pixel rows x columns view of the plane.
    pub fn luminance(&self) -> &Array2<u8> {
        &self.luminance
    }
}

/// Dimensions of the frames a backend is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
}

/// Opaque, move-only reference to one region followed by a backend.
///
/// [`FrameTracker::stop_tracking`] consumes the handle, so a handle can only
/// be released once and never used afterwards.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TrackHandle(u64);

impl TrackHandle {
    /// Backends mint handles from their own identifiers.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Frame-to-frame region tracker.
///
/// Calls are bounded-latency and never suspend. Correlations are in [0, 1].
pub trait FrameTracker: Send {
    /// Feed the next frame; every live region is re-located in it.
    fn advance(&mut self, frame: &Frame, timestamp: u64) -> Result<()>;

    /// Start following `region` as it appears in `frame`.
    ///
    /// Returns the new handle and the correlation at inception.
    fn begin_track(&mut self, region: Rect, frame: &Frame, timestamp: u64) -> Result<(TrackHandle, f32)>;

    fn current_correlation(&self, handle: &TrackHandle) -> Result<f32>;

    /// Last position of the region in full-frame coordinates.
    fn tracked_position(&self, handle: &TrackHandle) -> Result<Rect>;

    /// Release the region. Unknown handles are a contract violation.
    fn stop_tracking(&mut self, handle: TrackHandle);
}

/// Creates the backend for the first frame's geometry.
///
/// An error means the capability is unavailable on this platform and the
/// engine runs in snapshot mode for the rest of its life.
pub trait FrameTrackerFactory: Send {
    fn create(&self, geometry: FrameGeometry) -> Result<Box<dyn FrameTracker>>;
}

impl<F> FrameTrackerFactory for F
where
    F: Fn(FrameGeometry) -> Result<Box<dyn FrameTracker>> + Send,
{
    fn create(&self, geometry: FrameGeometry) -> Result<Box<dyn FrameTracker>> {
        self(geometry)
    }
}

/// Factory for platforms without a tracking backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFrameTracker;

impl FrameTrackerFactory for NoFrameTracker {
    fn create(&self, _geometry: FrameGeometry) -> Result<Box<dyn FrameTracker>> {
        Err(FusionError::TrackerUnavailable(
            "no tracking backend on this platform".into(),
        ))
    }
}
