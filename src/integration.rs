//! Glue between a capture source, an external detector and the engine.
//!
//! Detector output is projected into frame coordinates, then each frame runs
//! through a [`FrameProcessor`], either inline or on a [`FrameWorker`].

mod builder;
mod pipeline;
mod projection;
mod worker;

pub use builder::DetectionBuilder;
pub use pipeline::{FrameJob, FrameOutcome, FrameProcessor, PauseSignal, SharedEngine};
pub use projection::{FrameTransform, project_detections};
pub use worker::{Admission, FrameWorker};
