//! Detection fusion and alerting for a handheld traffic-light detector.
//!
//! Detector output arrives per frame. The [`tracker`] module follows the
//! detected objects across frames through a pluggable [`FrameTracker`]
//! backend, and the [`alerting`] module turns the per-frame dominant label
//! into debounced alert events.

pub mod alerting;
pub mod config;
pub mod error;
pub mod integration;
pub mod tracker;

pub use alerting::{AlertEvent, AlertPolicy, ClassificationStabilizer, Cue, CuePolicy, CueSink};
pub use config::{CueConfig, EngineConfig, PipelineConfig, StabilizerConfig, TemplateTrackerConfig};
pub use error::{FusionError, Result};
pub use integration::{
    Admission, DetectionBuilder, FrameProcessor, FrameTransform, FrameWorker, PauseSignal,
    SharedEngine,
};
pub use tracker::{
    AssociationEngine, Detection, Frame, FrameGeometry, FrameTracker, FrameTrackerFactory, Label,
    Rect, TemplateTrackerFactory, TrackHandle, TrackSnapshot,
};
