//! Classification stabilization and alert delivery.

mod policy;
mod stabilizer;
mod window;

pub use policy::{AlertPolicy, Cue, CuePolicy, CueSink, SilentPolicy, cues_for};
pub use stabilizer::{AlertEvent, ClassificationStabilizer};
pub use window::StabilizationWindow;
