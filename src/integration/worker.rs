//! Background frame worker with single-slot admission.
//!
//! At most one frame is in flight. A frame offered while the worker is busy
//! is dropped, so the capture source never waits and the worker always
//! processes the freshest admitted frame.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use tracing::{debug, info, warn};

use crate::alerting::AlertPolicy;
use crate::error::{FusionError, Result};
use crate::integration::pipeline::{
    FrameJob, FrameOutcome, FrameProcessor, PauseSignal, SharedEngine,
};
use crate::tracker::{Detection, Frame};

const OUTCOME_BACKLOG: usize = 64;

/// Whether an offered frame was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// A frame was still in flight; the caller may reuse its buffer.
    Dropped,
}

/// Background thread running a [`FrameProcessor`] fed through a single-slot queue.
pub struct FrameWorker {
    jobs: Option<Sender<FrameJob>>,
    permits: Receiver<()>,
    permit_tx: Sender<()>,
    outcomes: Receiver<FrameOutcome>,
    engine: SharedEngine,
    pause: PauseSignal,
    handle: Option<JoinHandle<()>>,
}

impl FrameWorker {
    /// Start the worker thread. Events are handed to `policy` on that thread.
    pub fn spawn<P>(mut processor: FrameProcessor, mut policy: P) -> Result<Self>
    where
        P: AlertPolicy + 'static,
    {
        let (permit_tx, permits) = bounded(1);
        let (job_tx, job_rx) = bounded::<FrameJob>(1);
        let (outcome_tx, outcomes) = bounded(OUTCOME_BACKLOG);

        permit_tx
            .try_send(())
            .map_err(|_| FusionError::WorkerStopped)?;

        let engine = processor.engine().clone();
        let pause = processor.pause_signal().clone();
        let returned_permits = permit_tx.clone();

        let handle = thread::Builder::new()
            .name("frame-worker".into())
            .spawn(move || {
                for job in job_rx.iter() {
                    let outcome = processor.process(job);
                    for event in &outcome.events {
                        policy.on_event(event);
                    }
                    let _ = returned_permits.try_send(());
                    match outcome_tx.try_send(outcome) {
                        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                        Err(TrySendError::Full(outcome)) => {
                            debug!(timestamp = outcome.timestamp, "outcome backlog full");
                        }
                    }
                }
                info!("frame worker exiting");
            })
            .map_err(|e| {
                warn!(error = %e, "failed to spawn frame worker");
                FusionError::WorkerStopped
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            permits,
            permit_tx,
            outcomes,
            engine,
            pause,
            handle: Some(handle),
        })
    }

    /// Offer a frame. The luminance buffer is copied before this returns.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &self,
        luminance: &[u8],
        width: usize,
        height: usize,
        row_stride: usize,
        detections: Vec<Detection>,
        timestamp: u64,
        now_ms: u64,
    ) -> Result<Admission> {
        let Some(jobs) = &self.jobs else {
            return Err(FusionError::WorkerStopped);
        };

        match self.permits.try_recv() {
            Ok(()) => {}
            Err(TryRecvError::Empty) => {
                if self.handle.as_ref().is_none_or(|h| h.is_finished()) {
                    return Err(FusionError::WorkerStopped);
                }
                debug!(timestamp, "frame in flight, dropping frame");
                return Ok(Admission::Dropped);
            }
            Err(TryRecvError::Disconnected) => return Err(FusionError::WorkerStopped),
        }

        let frame = match Frame::from_luminance(width, height, row_stride, luminance) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = self.permit_tx.try_send(());
                return Err(e);
            }
        };

        let job = FrameJob {
            frame,
            detections,
            timestamp,
            now_ms,
        };
        match jobs.try_send(job) {
            Ok(()) => Ok(Admission::Accepted),
            Err(TrySendError::Full(_)) => {
                let _ = self.permit_tx.try_send(());
                Ok(Admission::Dropped)
            }
            Err(TrySendError::Disconnected(_)) => Err(FusionError::WorkerStopped),
        }
    }

    /// Outcomes of processed frames, oldest first.
    pub fn outcomes(&self) -> &Receiver<FrameOutcome> {
        &self.outcomes
    }

    /// Get a reference to the shared engine, e.g. for a renderer.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Get a reference to the pause flag consumed by the worker.
    pub fn pause_signal(&self) -> &PauseSignal {
        &self.pause
    }

    /// Stop accepting frames, let the in-flight one finish and join the
    /// thread.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        self.jobs.take();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                warn!("frame worker panicked");
                FusionError::WorkerStopped
            }),
            None => Ok(()),
        }
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
