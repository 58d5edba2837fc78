//! Track association: detections, the frame tracker capability, the live
//! track set and the template-matching backend.

mod association;
mod capability;
mod detection;
mod kalman_filter;
mod rect;
mod template;
mod track;

pub use association::{AssociationEngine, Resolution};
pub use capability::{
    Frame, FrameGeometry, FrameTracker, FrameTrackerFactory, NoFrameTracker, TrackHandle,
};
pub use detection::{Detection, Label, dominant_label};
pub use rect::{Rect, iou_batch, max_pairwise_iou};
pub use template::{TemplateTracker, TemplateTrackerFactory};
pub use track::{RenderedTrack, TrackColor, TrackSnapshot};
