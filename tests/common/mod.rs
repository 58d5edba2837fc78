#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use ampeltrack_rs::tracker::{Frame, FrameGeometry, FrameTracker, FrameTrackerFactory, Rect, TrackHandle};
use ampeltrack_rs::{FusionError, Result};
use ndarray::Array2;
use parking_lot::Mutex;

#[derive(Debug)]
struct Region {
    rect: Rect,
    correlation: f32,
}

#[derive(Debug, Default)]
struct ScriptState {
    next_id: u64,
    live: HashMap<u64, Region>,
    released: usize,
    unknown_releases: usize,
    default_inception: f32,
    inception: Vec<(Rect, f32)>,
    /// Calls left before the scripted failure, if one is armed.
    fail_in: Option<usize>,
}

impl ScriptState {
    fn tick(&mut self, operation: &'static str) -> Result<()> {
        match self.fail_in {
            Some(0) => {
                self.fail_in = None;
                Err(FusionError::TrackerCall {
                    operation,
                    reason: "scripted failure".into(),
                })
            }
            Some(n) => {
                self.fail_in = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Frame tracker double whose correlations are set by the test.
///
/// Regions never move. Clones share state, so a test keeps one clone to
/// script and inspect the instance the engine owns.
#[derive(Clone)]
pub struct ScriptedTracker {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                default_inception: 0.9,
                ..ScriptState::default()
            })),
        }
    }

    pub fn factory(&self) -> impl FrameTrackerFactory + 'static {
        let tracker = self.clone();
        move |_geometry: FrameGeometry| -> Result<Box<dyn FrameTracker>> {
            Ok(Box::new(tracker.clone()))
        }
    }

    /// Inception correlation for candidates seeded exactly at `rect`.
    pub fn set_inception(&self, rect: Rect, correlation: f32) {
        self.state.lock().inception.push((rect, correlation));
    }

    /// Current correlation of every live region at `rect`.
    pub fn set_correlation(&self, rect: Rect, correlation: f32) {
        for region in self.state.lock().live.values_mut() {
            if region.rect == rect {
                region.correlation = correlation;
            }
        }
    }

    /// Make the `n`-th capability call from now fail (0 = the next one).
    pub fn fail_on_call(&self, n: usize) {
        self.state.lock().fail_in = Some(n);
    }

    pub fn live(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn released(&self) -> usize {
        self.state.lock().released
    }

    pub fn unknown_releases(&self) -> usize {
        self.state.lock().unknown_releases
    }
}

impl FrameTracker for ScriptedTracker {
    fn advance(&mut self, _frame: &Frame, _timestamp: u64) -> Result<()> {
        self.state.lock().tick("advance")
    }

    fn begin_track(&mut self, region: Rect, _frame: &Frame, _timestamp: u64) -> Result<(TrackHandle, f32)> {
        let mut state = self.state.lock();
        state.tick("begin_track")?;
        let correlation = state
            .inception
            .iter()
            .find(|(rect, _)| *rect == region)
            .map(|(_, c)| *c)
            .unwrap_or(state.default_inception);
        state.next_id += 1;
        let id = state.next_id;
        state.live.insert(
            id,
            Region {
                rect: region,
                correlation,
            },
        );
        Ok((TrackHandle::new(id), correlation))
    }

    fn current_correlation(&self, handle: &TrackHandle) -> Result<f32> {
        let mut state = self.state.lock();
        state.tick("current_correlation")?;
        state
            .live
            .get(&handle.id())
            .map(|r| r.correlation)
            .ok_or(FusionError::UnknownHandle(handle.id()))
    }

    fn tracked_position(&self, handle: &TrackHandle) -> Result<Rect> {
        let mut state = self.state.lock();
        state.tick("tracked_position")?;
        state
            .live
            .get(&handle.id())
            .map(|r| r.rect)
            .ok_or(FusionError::UnknownHandle(handle.id()))
    }

    fn stop_tracking(&mut self, handle: TrackHandle) {
        let mut state = self.state.lock();
        if state.live.remove(&handle.id()).is_some() {
            state.released += 1;
        } else {
            state.unknown_releases += 1;
        }
    }
}

pub fn blank_frame() -> Frame {
    Frame::from_array(Array2::zeros((120, 160)))
}

/// Flat background with a 40x40 non-repeating texture at (40 + dx, 30 + dy).
pub fn textured_scene(dx: usize, dy: usize) -> Frame {
    let plane = Array2::from_shape_fn((120, 160), |(y, x)| {
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
