//! Tracked objects and the read-only views handed to renderers.

use crate::tracker::capability::TrackHandle;
use crate::tracker::detection::{Detection, Label};
use crate::tracker::rect::Rect;

/// Display colour of a track, also used to fill the overlay when the camera
/// preview is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackColor {
    Red,
    Green,
    #[default]
    Neutral,
}

impl TrackColor {
    /// `red` and `green` map to their colour, everything else is neutral.
    pub fn for_label(label: &Label) -> Self {
        match label {
            Label::Red => TrackColor::Red,
            Label::Green => TrackColor::Green,
            _ => TrackColor::Neutral,
        }
    }

    pub fn rgb(&self) -> [u8; 3] {
        match self {
            TrackColor::Red => [255, 0, 0],
            TrackColor::Green => [0, 255, 0],
            TrackColor::Neutral => [136, 136, 136],
        }
    }
}

/// Engine-owned record of one followed object.
///
/// Holds its tracker handle exclusively; the engine hands the handle back to
/// the backend when the track is dropped from the set.
#[derive(Debug)]
pub(crate) struct Track {
    /// `None` in snapshot mode.
    pub handle: Option<TrackHandle>,
    /// Last known position, refreshed from the backend every frame.
    pub bbox: Rect,
    /// Last correlation read from the backend (1.0 for snapshots).
    pub correlation: f32,
    /// Detection confidence at creation.
    pub confidence: f32,
    pub color: TrackColor,
    pub label: Label,
}

impl Track {
    /// Position-frozen record built straight from a detection.
    pub fn snapshot(det: &Detection) -> Self {
        Self {
            handle: None,
            bbox: det.bbox,
            correlation: 1.0,
            confidence: det.confidence,
            color: TrackColor::for_label(&det.label),
            label: det.label.clone(),
        }
    }

    pub fn render(&self) -> RenderedTrack {
        RenderedTrack {
            bbox: self.bbox,
            color: self.color,
            label: self.label.clone(),
            confidence: self.confidence,
        }
    }
}

/// The engine's live set.
///
/// `Empty` is the explicit "ran, but nothing worth tracking this frame"
/// state, distinct from never having reconciled at all.
#[derive(Debug, Default)]
pub(crate) enum TrackSet {
    #[default]
    Uninitialized,
    Empty,
    Tracks(Vec<Track>),
}

impl TrackSet {
    pub fn as_slice(&self) -> &[Track] {
        match self {
            TrackSet::Tracks(tracks) => tracks,
            _ => &[],
        }
    }

    /// Take every track out, leaving the set uninitialized.
    pub fn drain(&mut self) -> Vec<Track> {
        match std::mem::take(self) {
            TrackSet::Tracks(tracks) => tracks,
            _ => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        match self {
            TrackSet::Uninitialized => TrackSnapshot::Uninitialized,
            TrackSet::Empty => TrackSnapshot::Empty,
            TrackSet::Tracks(tracks) => {
                TrackSnapshot::Tracks(tracks.iter().map(Track::render).collect())
            }
        }
    }
}

/// A track as seen by a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTrack {
    pub bbox: Rect,
    pub color: TrackColor,
    pub label: Label,
    pub confidence: f32,
}

impl RenderedTrack {
    /// Overlay caption: `"red 0.87"`, or only the confidence for unlabelled tracks.
    pub fn caption(&self) -> String {
        if self.label.is_none() {
            format!("{:.2}", self.confidence)
        } else {
            format!("{} {:.2}", self.label, self.confidence)
        }
    }
}

/// Consistent copy of the track set taken between frames.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TrackSnapshot {
    /// No frame has been reconciled yet.
    #[default]
    Uninitialized,
    /// The last frame had nothing worth tracking.
    Empty,
    Tracks(Vec<RenderedTrack>),
}

impl TrackSnapshot {
    pub fn tracks(&self) -> &[RenderedTrack] {
        match self {
            TrackSnapshot::Tracks(tracks) => tracks,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.tracks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks().is_empty()
    }

    /// Map every box through a caller-supplied transform, e.g. frame to canvas.
    pub fn project<F>(&self, transform: F) -> TrackSnapshot
    where
        F: Fn(&Rect) -> Rect,
    {
        match self {
            TrackSnapshot::Tracks(tracks) => TrackSnapshot::Tracks(
                tracks
                    .iter()
                    .map(|t| RenderedTrack {
                        bbox: transform(&t.bbox),
                        ..t.clone()
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
