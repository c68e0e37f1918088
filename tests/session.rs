use notefall::core::dispatch::TickDispatcher;
use notefall::core::judge::{ChartNote, JudgeConfig, JudgmentEngine, JudgmentTier, Thresholds};
use notefall::core::midi::EventSourceAdapter;
use notefall::core::oscillator::EnvelopePhase;
use notefall::core::synth::{Synth, SynthConfig};
use notefall::messaging::{event_queue, LogHooks};
use notefall::utils::midi_note_to_freq;

fn session(thresholds: Thresholds) -> (EventSourceAdapter, TickDispatcher) {
    let (producer, consumer) = event_queue(64);
    let synth = Synth::new(SynthConfig { sample_rate: 8000, ..SynthConfig::default() });
    let mut judge = JudgmentEngine::new(JudgeConfig {
        lifetime: 8.0,
        thresholds,
        ..JudgeConfig::default()
    });
    judge.load(vec![ChartNote { pitch: 62, time: 10.0, duration: 0.4, velocity: 0.8 }]);

    let mut dispatcher = TickDispatcher::new(consumer, synth, judge, Box::new(LogHooks), 10);
    dispatcher.tick(0.0);
    dispatcher.tick(5.0);
    (EventSourceAdapter::new(producer), dispatcher)
}

fn press_at(thresholds: Thresholds, now: f64) -> Option<JudgmentTier> {
    let (adapter, mut dispatcher) = session(thresholds);
    if now > 5.0 {
        dispatcher.tick(now - 0.001);
    }
    assert!(adapter.handle_raw(0, &[0x90, 62, 100]));
    let report = dispatcher.tick(now);
    assert_eq!(report.events, 1);
    report.judgments.first().map(|r| r.tier)
}

#[test]
fn press_close_to_target_is_perfect() {
    assert_eq!(press_at(Thresholds::default(), 10.05), Some(JudgmentTier::Perfect));
}

#[test]
fn press_inside_good_window_is_good() {
    let wide = Thresholds { perfect: 0.1, good: 0.5, bad: 0.6 };
    assert_eq!(press_at(wide, 10.4), Some(JudgmentTier::Good));
}

#[test]
fn press_outside_default_good_window_is_bad() {
    assert_eq!(press_at(Thresholds::default(), 10.4), Some(JudgmentTier::Bad));
}

#[test]
fn press_after_retirement_matches_nothing() {
    assert_eq!(press_at(Thresholds::default(), 20.0), None);
}

#[test]
fn malformed_message_does_not_disturb_later_ones() {
    let (adapter, mut dispatcher) = session(Thresholds::default());
    assert!(!adapter.handle_raw(0, &[0x90]));
    assert!(adapter.handle_raw(1, &[0x90, 70, 90]));
    assert!(adapter.handle_raw(2, &[0x80, 70, 0]));

    let report = dispatcher.tick(6.0);
    assert_eq!(report.events, 2);
    assert_eq!(adapter.stats().malformed(), 1);
    assert_eq!(dispatcher.synth().voice_phase(70), Some(EnvelopePhase::Release));
}

#[test]
fn releasing_idle_pitch_is_a_noop() {
    let (adapter, mut dispatcher) = session(Thresholds::default());
    adapter.handle_raw(0, &[0x80, 40, 0]);
    dispatcher.tick(6.0);
    assert_eq!(dispatcher.synth().active_voice_count(), 0);
    assert_eq!(dispatcher.synth().stats().releases, 0);
}

#[test]
fn retrigger_restarts_attack_on_a_single_voice() {
    let (adapter, mut dispatcher) = session(Thresholds::default());
    adapter.handle_raw(0, &[0x90, 64, 100]);
    dispatcher.tick(6.0);
    dispatcher.tick(6.5);
    assert_eq!(dispatcher.synth().voice_phase(64), Some(EnvelopePhase::Sustain));

    adapter.handle_raw(1, &[0x90, 64, 100]);
    dispatcher.tick(6.6);
    assert_eq!(dispatcher.synth().active_voice_count(), 1);
    assert_eq!(dispatcher.synth().voice_phase(64), Some(EnvelopePhase::Attack));
}

#[test]
fn a4_is_440() {
    assert_eq!(midi_note_to_freq(69), 440.0);
}
