//! Track association engine.
//!
//! Reconciles each frame's detections with the live track set. A candidate
//! detection is first locked onto by the frame tracker, then either rejected,
//! or committed in place of the tracks it overlaps (or of the weakest track
//! when the set is full).

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::tracker::capability::{
    Frame, FrameTracker, FrameTrackerFactory, NoFrameTracker, TrackHandle,
};
use crate::tracker::detection::Detection;
use crate::tracker::rect::{Rect, iou_batch, max_pairwise_iou};
use crate::tracker::track::{Track, TrackColor, TrackSet, TrackSnapshot};

/// Lifecycle of the engine's single capability instance.
enum Backend {
    /// Created from the first frame's geometry.
    Pending,
    Active(Box<dyn FrameTracker>),
    /// Snapshot mode for the rest of the engine's life.
    Unavailable,
}

/// What happened to one candidate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The tracker could not lock onto the region at inception.
    LowCorrelation,
    /// An overlapping track with higher confidence and a good lock kept its place.
    Defended,
    /// The set is full and every track is at least as confident.
    Outranked,
    /// A new track was committed, replacing `evicted` existing ones.
    Committed { evicted: usize },
}

/// Candidate locked onto by the tracker, not yet part of the set.
struct Tentative<'a> {
    detection: &'a Detection,
    handle: TrackHandle,
    correlation: f32,
    bbox: Rect,
}

/// Owns the live track set and the single frame tracker backend.
pub struct AssociationEngine {
    config: EngineConfig,
    factory: Box<dyn FrameTrackerFactory>,
    backend: Backend,
    tracks: TrackSet,
}

impl AssociationEngine {
    /// Create an engine whose backend is built by `factory` on the first frame.
    pub fn new<F>(config: EngineConfig, factory: F) -> Self
    where
        F: FrameTrackerFactory + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            backend: Backend::Pending,
            tracks: TrackSet::Uninitialized,
        }
    }

    /// Engine that always runs in snapshot mode.
    pub fn without_tracker(config: EngineConfig) -> Self {
        Self::new(config, NoFrameTracker)
    }

    /// Get a reference to the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True once backend creation has failed.
    pub fn is_degraded(&self) -> bool {
        matches!(self.backend, Backend::Unavailable)
    }

    /// Feed the frame to the tracker and drop tracks it has lost.
    ///
    /// Call once per frame before [`reconcile`](Self::reconcile). A no-op in
    /// snapshot mode.
    pub fn advance_frame(&mut self, frame: &Frame, timestamp: u64) {
        self.ensure_backend(frame);
        let Backend::Active(tracker) = &mut self.backend else {
            return;
        };

        if let Err(e) = tracker.advance(frame, timestamp) {
            warn!(timestamp, error = %e, "frame tracker advance failed, skipping frame");
            return;
        }

        let TrackSet::Tracks(tracks) = &mut self.tracks else {
            return;
        };

        let readings = match read_tracks(&**tracker, tracks) {
            Ok(readings) => readings,
            Err(e) => {
                warn!(timestamp, error = %e, "frame tracker query failed, skipping frame");
                return;
            }
        };

        let min_correlation = self.config.min_correlation;
        let mut kept = Vec::with_capacity(tracks.len());
        for (mut track, reading) in tracks.drain(..).zip(readings) {
            if let Some((correlation, bbox)) = reading {
                if correlation < min_correlation {
                    debug!(
                        label = %track.label,
                        correlation,
                        "track lost, releasing"
                    );
                    release(&mut **tracker, track);
                    continue;
                }
                track.correlation = correlation;
                track.bbox = bbox;
            }
            kept.push(track);
        }
        *tracks = kept;
    }

    /// Reconcile this frame's detections with the live set.
    ///
    /// `detections` must already be in frame coordinates; `frame` is the
    /// frame they were computed on and is used to seed new tracker regions.
    pub fn reconcile(&mut self, detections: &[Detection], frame: &Frame, timestamp: u64) {
        self.ensure_backend(frame);

        let min_size = self.config.min_size;
        let candidates: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.is_valid() && d.is_trackable(min_size))
            .collect();

        if candidates.is_empty() {
            self.clear();
            self.tracks = TrackSet::Empty;
            return;
        }

        let Backend::Active(tracker) = &mut self.backend else {
            // Snapshot mode: no continuity between frames.
            self.tracks.drain();
            self.tracks =
                TrackSet::Tracks(candidates.iter().map(|d| Track::snapshot(d)).collect());
            return;
        };

        // Every fallible capability call happens up front so a failure leaves
        // the set exactly as it was.
        let readings = match read_tracks(&**tracker, self.tracks.as_slice()) {
            Ok(readings) => readings,
            Err(e) => {
                warn!(timestamp, error = %e, "frame tracker query failed, dropping detections");
                return;
            }
        };
        let tentatives = match begin_candidates(&mut **tracker, &candidates, frame, timestamp) {
            Ok(tentatives) => tentatives,
            Err(e) => {
                warn!(timestamp, error = %e, "frame tracker seeding failed, dropping detections");
                return;
            }
        };

        let mut tracks = self.tracks.drain();
        for (track, reading) in tracks.iter_mut().zip(readings) {
            if let Some((correlation, bbox)) = reading {
                track.correlation = correlation;
                track.bbox = bbox;
            }
        }

        for tentative in tentatives {
            let label = tentative.detection.label.clone();
            let confidence = tentative.detection.confidence;
            let resolution = resolve(&self.config, &mut **tracker, &mut tracks, tentative);
            debug!(%label, confidence, ?resolution, "candidate resolved");
        }

        self.tracks = TrackSet::Tracks(tracks);
    }

    /// Consistent copy of the live set for a renderer.
    pub fn current_tracks(&self) -> TrackSnapshot {
        self.tracks.snapshot()
    }

    /// Largest IoU between two live tracks.
    pub fn max_overlap(&self) -> f32 {
        let boxes: Vec<Rect> = self.tracks.as_slice().iter().map(|t| t.bbox).collect();
        max_pairwise_iou(&boxes)
    }

    /// Release every track and tear the backend down.
    ///
    /// A fresh backend is created on the next frame unless the capability
    /// was found unavailable.
    pub fn reset(&mut self) {
        self.clear();
        self.tracks = TrackSet::Uninitialized;
        if matches!(self.backend, Backend::Active(_)) {
            self.backend = Backend::Pending;
            debug!("frame tracker released");
        }
    }

    fn clear(&mut self) {
        let tracks = self.tracks.drain();
        match &mut self.backend {
            Backend::Active(tracker) => {
                for track in tracks {
                    release(&mut **tracker, track);
                }
            }
            _ => debug_assert!(tracks.iter().all(|t| t.handle.is_none())),
        }
    }

    fn ensure_backend(&mut self, frame: &Frame) {
        if !matches!(self.backend, Backend::Pending) {
            return;
        }
        let geometry = frame.geometry();
        self.backend = match self.factory.create(geometry) {
            Ok(tracker) => {
                info!(
                    width = geometry.width,
                    height = geometry.height,
                    "frame tracker created"
                );
                Backend::Active(tracker)
            }
            Err(e) => {
                warn!(error = %e, "frame tracker unavailable, tracks are detection snapshots");
                Backend::Unavailable
            }
        };
    }
}

impl Drop for AssociationEngine {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Correlation and position of every track that holds a handle.
fn read_tracks(tracker: &dyn FrameTracker, tracks: &[Track]) -> Result<Vec<Option<(f32, Rect)>>> {
    tracks
        .iter()
        .map(|track| match &track.handle {
            Some(handle) => Ok(Some((
                tracker.current_correlation(handle)?,
                tracker.tracked_position(handle)?,
            ))),
            None => Ok(None),
        })
        .collect()
}

/// Ask the tracker to lock onto every candidate.
///
/// On failure every handle obtained so far is released.
fn begin_candidates<'a>(
    tracker: &mut dyn FrameTracker,
    candidates: &[&'a Detection],
    frame: &Frame,
    timestamp: u64,
) -> Result<Vec<Tentative<'a>>> {
    let mut tentatives: Vec<Tentative<'a>> = Vec::with_capacity(candidates.len());
    for &detection in candidates {
        let seeded = tracker
            .begin_track(detection.bbox, frame, timestamp)
            .and_then(|(handle, correlation)| match tracker.tracked_position(&handle) {
                Ok(bbox) => Ok((handle, correlation, bbox)),
                Err(e) => {
                    tracker.stop_tracking(handle);
                    Err(e)
                }
            });
        match seeded {
            Ok((handle, correlation, bbox)) => tentatives.push(Tentative {
                detection,
                handle,
                correlation,
                bbox,
            }),
            Err(e) => {
                for tentative in tentatives {
                    tracker.stop_tracking(tentative.handle);
                }
                return Err(e);
            }
        }
    }
    Ok(tentatives)
}

/// Conflict resolution for one candidate against the current set.
///
/// Removals are applied immediately, so later candidates of the same frame
/// never see tracks an earlier one replaced.
fn resolve(
    config: &EngineConfig,
    tracker: &mut dyn FrameTracker,
    tracks: &mut Vec<Track>,
    candidate: Tentative<'_>,
) -> Resolution {
    let confidence = candidate.detection.confidence;

    if candidate.correlation < config.marginal_correlation {
        tracker.stop_tracking(candidate.handle);
        return Resolution::LowCorrelation;
    }

    let boxes: Vec<Rect> = tracks.iter().map(|t| t.bbox).collect();
    let ious = iou_batch(std::slice::from_ref(&candidate.bbox), &boxes);

    let mut to_remove = Vec::new();
    let mut donor: Option<usize> = None;
    let mut max_iou = 0.0f32;

    for (i, track) in tracks.iter().enumerate() {
        let iou = ious[[0, i]];
        if iou <= config.max_overlap {
            continue;
        }
        if track.correlation > config.marginal_correlation && track.confidence > confidence {
            tracker.stop_tracking(candidate.handle);
            return Resolution::Defended;
        }
        to_remove.push(i);
        if iou > max_iou {
            max_iou = iou;
            donor = Some(i);
        }
    }

    if to_remove.is_empty() && tracks.len() >= config.max_tracks {
        // Full and no spatial conflict: bump the weakest track if this one beats it.
        for (i, track) in tracks.iter().enumerate() {
            if track.confidence < confidence
                && donor.is_none_or(|d| track.confidence < tracks[d].confidence)
            {
                donor = Some(i);
            }
        }
        match donor {
            Some(i) => to_remove.push(i),
            None => {
                tracker.stop_tracking(candidate.handle);
                return Resolution::Outranked;
            }
        }
    }

    let color = donor
        .map(|i| tracks[i].color)
        .unwrap_or_else(|| TrackColor::for_label(&candidate.detection.label));

    let evicted = to_remove.len();
    to_remove.sort_unstable_by(|a, b| b.cmp(a));
    for i in to_remove {
        let track = tracks.remove(i);
        debug!(label = %track.label, confidence = track.confidence, "track replaced");
        release(tracker, track);
    }

    tracks.push(Track {
        handle: Some(candidate.handle),
        bbox: candidate.bbox,
        correlation: candidate.correlation,
        confidence,
        color,
        label: candidate.detection.label.clone(),
    });

    Resolution::Committed { evicted }
}

fn release(tracker: &mut dyn FrameTracker, track: Track) {
    if let Some(handle) = track.handle {
        tracker.stop_tracking(handle);
    }
}
