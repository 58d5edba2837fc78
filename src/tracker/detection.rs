//! Per-frame detector observations and their class labels.

use std::fmt;
use std::str::FromStr;

use crate::tracker::rect::Rect;

/// Class label reported by the detector.
///
/// `None` is the sentinel for "no qualifying detection" and is what the
/// stabilizer reports while it is not stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Label {
    #[default]
    None,
    Red,
    Green,
    /// Any other label from the detector's label map.
    Other(String),
}

impl Label {
    pub fn is_none(&self) -> bool {
        matches!(self, Label::None)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::None => "none",
            Label::Red => "red",
            Label::Green => "green",
            Label::Other(name) => name,
        }
    }
}

impl FromStr for Label {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "none" => Label::None,
            "red" => Label::Red,
            "green" => Label::Green,
            other => Label::Other(other.to_string()),
        })
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(label) => label,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box in frame coordinates.
    pub bbox: Rect,
    /// Detection confidence score in [0, 1].
    pub confidence: f32,
    pub label: Label,
}

impl Detection {
    pub fn new(bbox: Rect, confidence: f32, label: Label) -> Self {
        Self {
            bbox,
            confidence,
            label,
        }
    }

    /// Well-formed box and a finite confidence in [0, 1].
    pub fn is_valid(&self) -> bool {
        self.bbox.is_well_formed() && (0.0..=1.0).contains(&self.confidence)
    }

    /// Large enough in both dimensions to be worth tracking.
    pub fn is_trackable(&self, min_size: f32) -> bool {
        self.bbox.width() >= min_size && self.bbox.height() >= min_size
    }
}

/// Label of the largest-area detection at or above `min_confidence`.
///
/// The first detection wins on equal area. Returns [`Label::None`] when no
/// detection qualifies.
pub fn dominant_label(detections: &[Detection], min_confidence: f32) -> Label {
    let mut best: Option<&Detection> = None;
    let mut best_area = 0.0f32;
    for det in detections {
        if !det.is_valid() || det.confidence < min_confidence {
            continue;
        }
        let area = det.bbox.area();
        if area > best_area {
            best_area = area;
            best = Some(det);
        }
    }
    best.map(|d| d.label.clone()).unwrap_or_default()
}
