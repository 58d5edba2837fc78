//! Alert policy contract and the default mapping from events to audio and
//! vibration cues.
//!
//! Events arrive at least once per debounce interval, so policies must be
//! idempotent to repeated identical signals.

use tracing::debug;

use crate::alerting::stabilizer::AlertEvent;
use crate::config::CueConfig;
use crate::tracker::Label;

/// Consumer of stabilizer events.
pub trait AlertPolicy: Send {
    fn on_event(&mut self, event: &AlertEvent);
}

impl<F> AlertPolicy for F
where
    F: FnMut(&AlertEvent) + Send,
{
    fn on_event(&mut self, event: &AlertEvent) {
        self(event)
    }
}

/// Policy that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentPolicy;

impl AlertPolicy for SilentPolicy {
    fn on_event(&mut self, _event: &AlertEvent) {}
}

/// Output-device request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cue {
    /// `flush` drops whatever speech is still queued.
    Speak { text: String, flush: bool },
    /// Alternating off/on durations in milliseconds, starting with a delay.
    Vibrate { pattern_ms: Vec<u64> },
}

/// Text-to-speech and vibration devices.
pub trait CueSink: Send {
    fn emit(&mut self, cue: Cue);
}

const RED_PATTERN_MS: [u64; 6] = [0, 200, 300, 200, 300, 200];
const GREEN_PATTERN_MS: [u64; 2] = [0, 1000];
const SPEECH_RED: &str = "Es ist rot";
const SPEECH_GREEN: &str = "Es ist grün.";
const SPEECH_HOLD_UP: &str = "Halten Sie die Kamera bitte hoch!";

/// Cues for one event under `config`. Labels other than red and green are
/// silent.
pub fn cues_for(event: &AlertEvent, config: &CueConfig) -> Vec<Cue> {
    let mut cues = Vec::new();
    match event {
        AlertEvent::Stable { label, .. } => {
            let (pattern, speech): (&[u64], &str) = match label {
                Label::Red => (&RED_PATTERN_MS, SPEECH_RED),
                Label::Green => (&GREEN_PATTERN_MS, SPEECH_GREEN),
                _ => return cues,
            };
            if config.vibration {
                cues.push(Cue::Vibrate {
                    pattern_ms: pattern.to_vec(),
                });
            }
            if config.audio {
                cues.push(Cue::Speak {
                    text: speech.to_string(),
                    flush: true,
                });
            }
        }
        AlertEvent::Reminder { .. } => cues.push(Cue::Speak {
            text: SPEECH_HOLD_UP.to_string(),
            flush: false,
        }),
    }
    cues
}

/// Alert policy that routes events to a [`CueSink`].
pub struct CuePolicy<S: CueSink> {
    config: CueConfig,
    sink: S,
}

impl<S: CueSink> CuePolicy<S> {
    pub fn new(config: CueConfig, sink: S) -> Self {
        Self { config, sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: CueSink> AlertPolicy for CuePolicy<S> {
    fn on_event(&mut self, event: &AlertEvent) {
        for cue in cues_for(event, &self.config) {
            debug!(?cue, "emitting cue");
            self.sink.emit(cue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<Cue>);

    impl CueSink for Recorder {
        fn emit(&mut self, cue: Cue) {
            self.0.push(cue);
        }
    }

    fn stable(label: Label) -> AlertEvent {
        AlertEvent::Stable { label, at_ms: 0 }
    }

    #[test]
    fn test_red_cues() {
        let cues = cues_for(&stable(Label::Red), &CueConfig::default());
        assert_eq!(
            cues,
            vec![
                Cue::Vibrate {
                    pattern_ms: vec![0, 200, 300, 200, 300, 200]
                },
                Cue::Speak {
                    text: "Es ist rot".into(),
                    flush: true
                },
            ]
        );
    }

    #[test]
    fn test_switches_respected() {
        let config = CueConfig {
            audio: false,
            vibration: true,
        };
        let cues = cues_for(&stable(Label::Green), &config);
        assert_eq!(
            cues,
            vec![Cue::Vibrate {
                pattern_ms: vec![0, 1000]
            }]
        );
        assert!(cues_for(&stable(Label::Other("yellow".into())), &config).is_empty());
    }

    #[test]
    fn test_reminder_always_spoken() {
        let config = CueConfig {
            audio: false,
            vibration: false,
        };
        let mut policy = CuePolicy::new(config, Recorder::default());
        policy.on_event(&AlertEvent::Reminder { at_ms: 0 });
        assert_eq!(
            policy.into_sink().0,
            vec![Cue::Speak {
                text: "Halten Sie die Kamera bitte hoch!".into(),
                flush: false
            }]
        );
    }
}
