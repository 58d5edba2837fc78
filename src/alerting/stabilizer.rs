//! Classification stabilizer: turns per-frame dominant labels into a
//! debounced stream of alert and reminder events.

use tracing::{info, trace};

use crate::alerting::window::StabilizationWindow;
use crate::config::StabilizerConfig;
use crate::tracker::Label;

/// Signal handed to the alert policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    /// The window has been unanimous on `label`; re-fires while it stays so.
    Stable { label: Label, at_ms: u64 },
    /// Inference is suspended; ask the user to hold the device up.
    Reminder { at_ms: u64 },
}

/// Two-stage gate: window unanimity, then a minimum re-fire interval.
///
/// Alerts are timestamp-gated rather than edge-triggered, so a state that
/// never changes keeps re-firing every interval.
#[derive(Debug, Clone)]
pub struct ClassificationStabilizer {
    config: StabilizerConfig,
    window: StabilizationWindow,
    last_alert_ms: Option<u64>,
    last_reminder_ms: Option<u64>,
}

impl Default for ClassificationStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}

impl ClassificationStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            window: StabilizationWindow::new(config.window_len),
            config,
            last_alert_ms: None,
            last_reminder_ms: None,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Push this frame's dominant label and return the stable state.
    pub fn observe(&mut self, label: Label, now_ms: u64) -> Label {
        self.window.push(label);
        let stable = self.window.stable();
        trace!(at_ms = now_ms, %stable, "label observed");
        stable
    }

    /// Emit an alert for a stable state if the re-fire interval has elapsed.
    pub fn maybe_fire(&mut self, stable: &Label, now_ms: u64) -> Option<AlertEvent> {
        if stable.is_none() {
            return None;
        }
        let fired = gate(
            &mut self.last_alert_ms,
            now_ms,
            self.config.alert_interval_ms,
        )?;
        info!(label = %stable, at_ms = fired, "stable classification alert");
        Some(AlertEvent::Stable {
            label: stable.clone(),
            at_ms: fired,
        })
    }

    /// Emit a hold-up reminder while inference is suspended. Independent of
    /// the window.
    pub fn maybe_reminder(&mut self, suspended: bool, now_ms: u64) -> Option<AlertEvent> {
        if !suspended {
            return None;
        }
        let fired = gate(
            &mut self.last_reminder_ms,
            now_ms,
            self.config.reminder_interval_ms,
        )?;
        info!(at_ms = fired, "hold-up reminder");
        Some(AlertEvent::Reminder { at_ms: fired })
    }

    pub fn window(&self) -> &StabilizationWindow {
        &self.window
    }

    pub fn last_alert_ms(&self) -> Option<u64> {
        self.last_alert_ms
    }

    pub fn last_reminder_ms(&self) -> Option<u64> {
        self.last_reminder_ms
    }
}

/// Fire when nothing fired yet or `interval_ms` has passed. The stored
/// timestamp never moves backwards.
fn gate(last: &mut Option<u64>, now_ms: u64, interval_ms: u64) -> Option<u64> {
    match *last {
        Some(prev) if now_ms.saturating_sub(prev) < interval_ms => None,
        Some(prev) => {
            let at = now_ms.max(prev);
            *last = Some(at);
            Some(at)
        }
        None => {
            *last = Some(now_ms);
            Some(now_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanimity_with_trailing_mismatch() {
        let mut stabilizer = ClassificationStabilizer::default();
        let mut states = Vec::new();
        for label in [Label::Red, Label::Red, Label::Red, Label::Green, Label::Red] {
            states.push(stabilizer.observe(label, 0));
        }
        assert_eq!(states, vec![Label::None; 5]);
    }

    #[test]
    fn test_alert_debounce() {
        let mut stabilizer = ClassificationStabilizer::default();
        assert!(stabilizer.maybe_fire(&Label::Red, 1000).is_some());
        assert!(stabilizer.maybe_fire(&Label::Red, 2499).is_none());
        assert_eq!(
            stabilizer.maybe_fire(&Label::Red, 2500),
            Some(AlertEvent::Stable {
                label: Label::Red,
                at_ms: 2500
            })
        );
        assert!(stabilizer.maybe_fire(&Label::None, 9000).is_none());
        assert_eq!(stabilizer.last_alert_ms(), Some(2500));
    }

    #[test]
    fn test_reminder_gate() {
        let mut stabilizer = ClassificationStabilizer::default();
        assert!(stabilizer.maybe_reminder(false, 0).is_none());
        assert!(stabilizer.maybe_reminder(true, 0).is_some());
        assert!(stabilizer.maybe_reminder(true, 6999).is_none());
        assert!(stabilizer.maybe_reminder(true, 7001).is_some());
    }

    #[test]
    fn test_gate_never_moves_backwards() {
        let mut last = Some(5000);
        assert_eq!(gate(&mut last, 100, 0), Some(5000));
        assert_eq!(last, Some(5000));
        assert_eq!(gate(&mut last, 100, 1500), None);
    }
}
