//! Per-frame processing: association engine plus classification stabilizer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::alerting::{AlertEvent, ClassificationStabilizer};
use crate::config::PipelineConfig;
use crate::tracker::{
    AssociationEngine, Detection, Frame, FrameTrackerFactory, Label, TrackColor, TrackSnapshot,
    dominant_label,
};

/// Association engine shared between the frame worker and a renderer.
///
/// Every engine operation runs under one lock, so a renderer only ever sees
/// the set between operations.
#[derive(Clone)]
pub struct SharedEngine(Arc<Mutex<AssociationEngine>>);

impl SharedEngine {
    /// Wrap an engine for sharing.
    pub fn new(engine: AssociationEngine) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    /// Lock the engine for one operation.
    pub fn lock(&self) -> MutexGuard<'_, AssociationEngine> {
        self.0.lock()
    }

    /// Consistent copy of the live set.
    pub fn current_tracks(&self) -> TrackSnapshot {
        self.0.lock().current_tracks()
    }

    /// Release every track and the backend.
    pub fn reset(&self) {
        self.0.lock().reset();
    }
}

/// "Inference suspended" flag driven by an external sensor gate.
#[derive(Debug, Clone, Default)]
pub struct PauseSignal(Arc<AtomicBool>);

impl PauseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set by the sensor gate; read once per frame.
    pub fn set_suspended(&self, suspended: bool) {
        self.0.store(suspended, Ordering::Release);
    }

    pub fn is_suspended(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One unit of work: a frame and the detections already computed on it.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub frame: Frame,
    /// Detections in frame coordinates.
    pub detections: Vec<Detection>,
    /// Frame sequence number handed to the frame tracker.
    pub timestamp: u64,
    /// Wall-clock milliseconds used for alert debouncing.
    pub now_ms: u64,
}

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub timestamp: u64,
    pub suspended: bool,
    /// Stable classification after this frame, `Label::None` if not stable.
    pub stable: Label,
    pub events: Vec<AlertEvent>,
}

impl FrameOutcome {
    /// Overlay fill used when the camera preview is off.
    pub fn fill_color(&self) -> TrackColor {
        TrackColor::for_label(&self.stable)
    }
}

/// Runs one frame at a time through the engine and the stabilizer.
pub struct FrameProcessor {
    engine: SharedEngine,
    stabilizer: ClassificationStabilizer,
    pause: PauseSignal,
}

impl FrameProcessor {
    /// Create a processor from its parts.
    pub fn new(engine: SharedEngine, stabilizer: ClassificationStabilizer, pause: PauseSignal) -> Self {
        Self {
            engine,
            stabilizer,
            pause,
        }
    }

    /// Create a processor with a fresh engine and stabilizer built from `config`.
    pub fn from_config<F>(config: &PipelineConfig, factory: F) -> Self
    where
        F: FrameTrackerFactory + 'static,
    {
        Self::new(
            SharedEngine::new(AssociationEngine::new(config.engine.clone(), factory)),
            ClassificationStabilizer::new(config.stabilizer.clone()),
            PauseSignal::new(),
        )
    }

    /// Run one frame.
    ///
    /// While suspended only the reminder path runs; otherwise the tracker is
    /// advanced, the dominant label is stabilized and the detections are
    /// reconciled into the track set.
    pub fn process(&mut self, job: FrameJob) -> FrameOutcome {
        let FrameJob {
            frame,
            detections,
            timestamp,
            now_ms,
        } = job;

        if self.pause.is_suspended() {
            let events = self.stabilizer.maybe_reminder(true, now_ms).into_iter().collect();
            return FrameOutcome {
                timestamp,
                suspended: true,
                stable: Label::None,
                events,
            };
        }

        self.engine.lock().advance_frame(&frame, timestamp);

        let dominant = dominant_label(&detections, self.stabilizer.config().min_confidence);
        let stable = self.stabilizer.observe(dominant, now_ms);
        let events: Vec<AlertEvent> = self.stabilizer.maybe_fire(&stable, now_ms).into_iter().collect();

        self.engine.lock().reconcile(&detections, &frame, timestamp);
        debug!(timestamp, %stable, detections = detections.len(), "frame processed");

        FrameOutcome {
            timestamp,
            suspended: false,
            stable,
            events,
        }
    }

    /// Get a reference to the shared engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn pause_signal(&self) -> &PauseSignal {
        &self.pause
    }

    /// Get a reference to the stabilizer.
    pub fn stabilizer(&self) -> &ClassificationStabilizer {
        &self.stabilizer
    }
}
