use ampeltrack_rs::alerting::{AlertEvent, ClassificationStabilizer, Cue, CuePolicy, CueSink};
use ampeltrack_rs::config::{CueConfig, StabilizerConfig};
use ampeltrack_rs::tracker::Label;
use ampeltrack_rs::AlertPolicy;
use proptest::prelude::*;

fn label_strategy() -> impl Strategy<Value = Label> {
    prop_oneof![
        Just(Label::None),
        Just(Label::Red),
        Just(Label::Green),
        Just(Label::Other("yellow".into())),
    ]
}

#[test]
fn test_stable_after_full_unanimous_window() {
    let mut stabilizer = ClassificationStabilizer::default();
    let states: Vec<Label> = (0..5).map(|i| stabilizer.observe(Label::Red, i * 100)).collect();
    assert_eq!(
        states,
        vec![Label::None, Label::None, Label::None, Label::Red, Label::Red]
    );
}

#[test]
fn test_unanimous_none_is_not_stable() {
    let mut stabilizer = ClassificationStabilizer::default();
    for i in 0..6 {
        assert_eq!(stabilizer.observe(Label::None, i), Label::None);
    }
}

#[test]
fn test_persistent_state_refires_each_interval() {
    let mut stabilizer = ClassificationStabilizer::default();
    let fired: Vec<u64> = (0..=40)
        .map(|i| i * 100)
        .filter_map(|now| match stabilizer.maybe_fire(&Label::Green, now) {
            Some(AlertEvent::Stable { at_ms, .. }) => Some(at_ms),
            _ => None,
        })
        .collect();
    assert_eq!(fired, vec![0, 1500, 3000]);
}

#[test]
fn test_reminder_interval() {
    let mut stabilizer = ClassificationStabilizer::new(StabilizerConfig::default());
    assert_eq!(
        stabilizer.maybe_reminder(true, 0),
        Some(AlertEvent::Reminder { at_ms: 0 })
    );
    assert_eq!(stabilizer.maybe_reminder(true, 6999), None);
    assert_eq!(
        stabilizer.maybe_reminder(true, 7001),
        Some(AlertEvent::Reminder { at_ms: 7001 })
    );
    // Alerts keep their own timer.
    assert!(stabilizer.maybe_fire(&Label::Red, 7002).is_some());
}

#[derive(Default)]
struct Recorder(Vec<Cue>);

impl CueSink for Recorder {
    fn emit(&mut self, cue: Cue) {
        self.0.push(cue);
    }
}

#[test]
fn test_cue_policy_routes_green() {
    let mut policy = CuePolicy::new(CueConfig::default(), Recorder::default());
    policy.on_event(&AlertEvent::Stable {
        label: Label::Green,
        at_ms: 0,
    });
    assert_eq!(
        policy.sink().0,
        vec![
            Cue::Vibrate {
                pattern_ms: vec![0, 1000]
            },
            Cue::Speak {
                text: "Es ist grün.".into(),
                flush: true
            },
        ]
    );
}

proptest! {
    #[test]
    fn prop_stable_iff_last_window_unanimous(labels in prop::collection::vec(label_strategy(), 1..40)) {
        let mut stabilizer = ClassificationStabilizer::default();
        for (i, label) in labels.iter().enumerate() {
            let stable = stabilizer.observe(label.clone(), i as u64);
            let expected = if i + 1 >= 4 {
                let tail = &labels[i + 1 - 4..=i];
                if tail.iter().all(|l| l == &tail[0]) { tail[0].clone() } else { Label::None }
            } else {
                Label::None
            };
            prop_assert_eq!(stable, expected);
        }
    }

    #[test]
    fn prop_alerts_spaced_by_interval(steps in prop::collection::vec(0u64..2000, 1..60)) {
        let mut stabilizer = ClassificationStabilizer::default();
        let mut now = 0u64;
        let mut last: Option<u64> = None;
        for step in steps {
            now += step;
            if let Some(AlertEvent::Stable { at_ms, .. }) = stabilizer.maybe_fire(&Label::Red, now) {
                if let Some(prev) = last {
                    prop_assert!(at_ms >= prev + 1500);
                }
                last = Some(at_ms);
            }
            prop_assert_eq!(stabilizer.last_alert_ms(), last);
        }
    }
}
