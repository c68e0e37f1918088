use crate::core::judge::{AutoPlayAction, JudgmentEngine, JudgmentRecord};
use crate::core::synth::Synth;
use crate::messaging::hooks::{self, BackgroundClip, GameHooks};
use crate::messaging::{CanonicalEvent, EventConsumer, EventKind};
use crate::utils::note_name;

pub const DEFAULT_EVENTS_PER_TICK: usize = 10;

const CC_MOD_WHEEL: u8 = 1;
const CC_VOLUME: u8 = 7;
const CC_SUSTAIN: u8 = 64;
const CC_ALL_NOTES_OFF: u8 = 123;

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub events: usize,
    /// Events handled by the second drain pass
    pub overflow: usize,
    pub judgments: Vec<JudgmentRecord>,
    pub auto_played: usize,
}

/// Single-threaded owner of the synth and the judgment engine.
///
/// Each tick: drain up to `events_per_tick` events, advance the schedule,
/// drain whatever is left, then advance the synth's envelopes.
pub struct TickDispatcher {
    consumer: EventConsumer,
    synth: Synth,
    judge: JudgmentEngine,
    hooks: Box<dyn GameHooks>,
    events_per_tick: usize,
}

impl TickDispatcher {
    pub fn new(
        consumer: EventConsumer,
        synth: Synth,
        judge: JudgmentEngine,
        hooks: Box<dyn GameHooks>,
        events_per_tick: usize,
    ) -> Self {
        Self {
            consumer,
            synth,
            judge,
            hooks,
            events_per_tick: events_per_tick.max(1),
        }
    }

    pub fn tick(&mut self, now: f64) -> TickReport {
        let mut report = TickReport::default();

        report.events = self.drain(now, self.events_per_tick, &mut report.judgments);

        let actions = self.judge.update(now);
        report.auto_played = actions.len();
        for action in actions {
            self.perform(action, now);
        }

        report.overflow = self.drain(now, usize::MAX, &mut report.judgments);
        if report.overflow > 0 {
            log::debug!("[TICK] second pass drained {} events", report.overflow);
        }
        report.events += report.overflow;

        self.synth.update(now);
        report
    }

    fn drain(&mut self, now: f64, limit: usize, judgments: &mut Vec<JudgmentRecord>) -> usize {
        let mut handled = 0;
        while handled < limit {
            let Some(event) = self.consumer.try_pop() else {
                break;
            };
            if let Some(record) = self.handle_event(&event, now) {
                judgments.push(record);
            }
            handled += 1;
        }
        handled
    }

    fn handle_event(&mut self, event: &CanonicalEvent, now: f64) -> Option<JudgmentRecord> {
        match event.kind {
            EventKind::NoteOn if !event.is_release() => {
                if let Err(e) = self.synth.trigger(event.pitch, event.velocity, true, now) {
                    log::warn!("[TICK] {}", e);
                    return None;
                }
                let record = self.judge.on_note_on(event.pitch, now);
                self.notify_visual(event.pitch, event.velocity);
                record
            },
            EventKind::NoteOn | EventKind::NoteOff => {
                self.synth.release(event.pitch, now);
                None
            },
            EventKind::ControlChange => {
                self.handle_control(event, now);
                None
            },
        }
    }

    fn handle_control(&mut self, event: &CanonicalEvent, now: f64) {
        match event.pitch {
            CC_VOLUME => {
                self.synth.set_volume(event.velocity);
                log::info!("[TICK] volume set to {:.2}", self.synth.volume());
            },
            CC_ALL_NOTES_OFF => {
                log::info!("[TICK] all notes off");
                self.synth.release_all(now);
            },
            CC_MOD_WHEEL | CC_SUSTAIN => {
                log::debug!("[TICK] controller {} = {:.2} (ignored)", event.pitch, event.velocity);
            },
            other => {
                log::debug!("[TICK] unhandled controller {} on channel {}", other, event.channel);
            },
        }
    }

    fn perform(&mut self, action: AutoPlayAction, now: f64) {
        match action {
            AutoPlayAction::NoteOn { pitch, velocity } => {
                log::debug!("[TICK] auto-play {}", note_name(pitch));
                if let Err(e) = self.synth.trigger(pitch, velocity, false, now) {
                    log::warn!("[TICK] {}", e);
                    return;
                }
                self.notify_visual(pitch, velocity);
            },
            AutoPlayAction::NoteOff { pitch } => self.synth.release(pitch, now),
        }
    }

    fn notify_visual(&mut self, pitch: u8, velocity: f32) {
        let target = &mut self.hooks;
        hooks::fire("on_note_visual", || target.on_note_visual(pitch, velocity));
    }

    /// Tell the game layer a background track can start
    pub fn announce_background(&mut self, clip: &BackgroundClip) {
        let target = &mut self.hooks;
        hooks::fire("on_background_track_ready", || target.on_background_track_ready(clip));
    }

    /// Mix the next block of audio starting at `start_time`
    pub fn render(&mut self, start_time: f64, out: &mut [f32]) {
        self.synth.render(start_time, out);
    }

    /// Release every voice, e.g. on shutdown
    pub fn silence(&mut self, now: f64) {
        self.synth.release_all(now);
        self.synth.update(now);
    }

    pub fn synth(&self) -> &Synth {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut Synth {
        &mut self.synth
    }

    pub fn judge(&self) -> &JudgmentEngine {
        &self.judge
    }

    pub fn judge_mut(&mut self) -> &mut JudgmentEngine {
        &mut self.judge
    }

    pub fn pending_events(&self) -> usize {
        self.consumer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use crate::core::judge::{ChartNote, JudgeConfig, JudgmentTier};
    use crate::core::oscillator::EnvelopePhase;
    use crate::core::synth::SynthConfig;
    use crate::messaging::{event_queue, EventProducer};
    use crate::utils::helpers::normalize_7bit;

    #[derive(Default, Clone)]
    struct Recorder {
        visuals: Arc<Mutex<Vec<u8>>>,
    }

    impl GameHooks for Recorder {
        fn on_note_visual(&mut self, pitch: u8, _velocity: f32) {
            self.visuals.lock().unwrap().push(pitch);
        }
    }

    struct Exploding;

    impl GameHooks for Exploding {
        fn on_note_visual(&mut self, _pitch: u8, _velocity: f32) {
            panic!("visual layer crashed");
        }
    }

    fn dispatcher(hooks: Box<dyn GameHooks>, judge: JudgeConfig, per_tick: usize) -> (EventProducer, TickDispatcher) {
        let (producer, consumer) = event_queue(256);
        let synth = Synth::new(SynthConfig { sample_rate: 8000, ..SynthConfig::default() });
        let judge = JudgmentEngine::new(judge);
        (producer, TickDispatcher::new(consumer, synth, judge, hooks, per_tick))
    }

    #[test]
    fn test_dispatch_preserves_fifo_order() {
        let recorder = Recorder::default();
        let (producer, mut dispatcher) = dispatcher(Box::new(recorder.clone()), JudgeConfig::default(), 4);

        let pitches: Vec<u8> = (40..72).collect();
        for (i, &pitch) in pitches.iter().enumerate() {
            assert!(producer.push(CanonicalEvent::note_on(pitch, 0.5, i as u64 * 1000)));
        }

        let report = dispatcher.tick(0.0);
        assert_eq!(report.events, pitches.len());
        assert_eq!(report.overflow, pitches.len() - 4);
        assert_eq!(*recorder.visuals.lock().unwrap(), pitches);
        assert_eq!(dispatcher.pending_events(), 0);
    }

    #[test]
    fn test_zero_velocity_note_on_releases() {
        let (producer, mut dispatcher) = dispatcher(Box::new(Recorder::default()), JudgeConfig::default(), 10);
        producer.push(CanonicalEvent::note_on(60, 0.7, 0));
        dispatcher.tick(0.0);
        dispatcher.tick(0.1);
        assert_eq!(dispatcher.synth().voice_phase(60), Some(EnvelopePhase::Sustain));

        producer.push(CanonicalEvent::note_on(60, 0.0, 1));
        dispatcher.tick(0.2);
        assert_eq!(dispatcher.synth().voice_phase(60), Some(EnvelopePhase::Release));
    }

    #[test]
    fn test_note_off_for_idle_pitch_is_harmless() {
        let (producer, mut dispatcher) = dispatcher(Box::new(Recorder::default()), JudgeConfig::default(), 10);
        producer.push(CanonicalEvent::note_off(90, 0));
        let report = dispatcher.tick(0.0);
        assert_eq!(report.events, 1);
        assert_eq!(dispatcher.synth().active_voice_count(), 0);
    }

    #[test]
    fn test_panicking_hook_does_not_stop_synthesis() {
        let (producer, mut dispatcher) = dispatcher(Box::new(Exploding), JudgeConfig::default(), 10);
        producer.push(CanonicalEvent::note_on(64, 1.0, 0));
        dispatcher.tick(0.0);
        assert!(dispatcher.synth().is_active(64));
    }

    #[test]
    fn test_control_changes() {
        let (producer, mut dispatcher) = dispatcher(Box::new(Recorder::default()), JudgeConfig::default(), 10);
        producer.push(CanonicalEvent::note_on(60, 1.0, 0));
        producer.push(CanonicalEvent::note_on(67, 1.0, 0));
        dispatcher.tick(0.0);

        let cc = |controller: u8, value: u8| CanonicalEvent {
            kind: EventKind::ControlChange,
            pitch: controller,
            velocity: normalize_7bit(value),
            channel: 0,
            source_timestamp: 1,
        };
        producer.push(cc(CC_VOLUME, 127));
        producer.push(cc(CC_ALL_NOTES_OFF, 0));
        dispatcher.tick(0.1);

        assert_eq!(dispatcher.synth().volume(), 1.0);
        assert_eq!(dispatcher.synth().voice_phase(60), Some(EnvelopePhase::Release));
        assert_eq!(dispatcher.synth().voice_phase(67), Some(EnvelopePhase::Release));
    }

    #[test]
    fn test_live_press_is_judged() {
        let (producer, mut dispatcher) = dispatcher(Box::new(Recorder::default()), JudgeConfig::default(), 10);
        dispatcher.judge_mut().load(vec![ChartNote { pitch: 62, time: 10.0, duration: 0.4, velocity: 0.8 }]);
        dispatcher.tick(5.0);

        producer.push(CanonicalEvent::note_on(62, 0.9, 0));
        let report = dispatcher.tick(10.05);
        assert_eq!(report.judgments.len(), 1);
        assert_eq!(report.judgments[0].tier, JudgmentTier::Perfect);
        assert!(dispatcher.synth().is_active(62));
    }

    #[test]
    fn test_auto_play_drives_synth_and_visuals() {
        let recorder = Recorder::default();
        let config = JudgeConfig { auto_play: true, ..JudgeConfig::default() };
        let (_producer, mut dispatcher) = dispatcher(Box::new(recorder.clone()), config, 10);
        dispatcher.judge_mut().load(vec![ChartNote { pitch: 70, time: 1.0, duration: 0.2, velocity: 0.8 }]);

        dispatcher.tick(0.5);
        assert!(!dispatcher.synth().is_active(70));

        let report = dispatcher.tick(1.0);
        assert_eq!(report.auto_played, 1);
        assert!(dispatcher.synth().is_active(70));
        assert_eq!(*recorder.visuals.lock().unwrap(), vec![70]);

        dispatcher.tick(1.25);
        assert_eq!(dispatcher.synth().voice_phase(70), Some(EnvelopePhase::Release));
        assert!(dispatcher.judge().is_finished());
    }

    #[test]
    fn test_auto_play_repeat_not_cut_by_earlier_release() {
        let config = JudgeConfig { auto_play: true, ..JudgeConfig::default() };
        let (_producer, mut dispatcher) = dispatcher(Box::new(Recorder::default()), config, 10);
        dispatcher.judge_mut().load(vec![
            ChartNote { pitch: 62, time: 1.0, duration: 1.0, velocity: 0.8 },
            ChartNote { pitch: 62, time: 1.5, duration: 1.0, velocity: 0.8 },
        ]);

        dispatcher.tick(1.0);
        dispatcher.tick(1.5);
        dispatcher.tick(2.0);
        assert_eq!(dispatcher.synth().voice_phase(62), Some(EnvelopePhase::Sustain));

        dispatcher.tick(2.5);
        assert_eq!(dispatcher.synth().voice_phase(62), Some(EnvelopePhase::Release));
    }
}
