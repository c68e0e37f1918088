use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use crate::core::judge::ChartNote;
use super::message::{note_off_bytes, note_on_bytes};
use super::EventSourceAdapter;

/// How closely the simulated player follows the chart
#[derive(Debug, Clone)]
pub struct PerformerConfig {
    pub jitter: f64,    // max timing error in seconds, uniform +/-
    pub miss_rate: f64, // probability of skipping a note entirely
    pub seed: u64,
    pub channel: u8,
}

impl Default for PerformerConfig {
    fn default() -> Self {
        Self {
            jitter: 0.0,
            miss_rate: 0.0,
            seed: 0x5eed,
            channel: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ScriptedMessage {
    time: f64,
    bytes: [u8; 3],
}

/// Plays a chart as raw MIDI bytes, standing in for a keyboard.
///
/// Messages go through the same `EventSourceAdapter` a hardware port uses,
/// either polled from the tick loop or pushed from a producer thread.
pub struct ScriptedPerformer {
    messages: Vec<ScriptedMessage>,
    next: usize,
}

impl ScriptedPerformer {
    pub fn new(notes: &[ChartNote], config: &PerformerConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let miss_rate = config.miss_rate.clamp(0.0, 1.0);
        let mut messages = Vec::with_capacity(notes.len() * 2);

        for note in notes {
            if miss_rate > 0.0 && rng.random_bool(miss_rate) {
                continue;
            }
            let offset = if config.jitter > 0.0 {
                rng.random_range(-config.jitter..=config.jitter)
            } else {
                0.0
            };
            let on_time = (note.time + offset).max(0.0);
            let velocity = (note.velocity * 127.0).round().clamp(1.0, 127.0) as u8;

            messages.push(ScriptedMessage {
                time: on_time,
                bytes: note_on_bytes(config.channel, note.pitch, velocity),
            });
            messages.push(ScriptedMessage {
                time: on_time + note.duration.max(0.0),
                bytes: note_off_bytes(config.channel, note.pitch),
            });
        }

        // stable: a release and a press at the same instant keep chart order
        messages.sort_by(|a, b| a.time.total_cmp(&b.time));

        Self { messages, next: 0 }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.messages.len()
    }

    /// Time of the last scripted message
    pub fn end_time(&self) -> f64 {
        self.messages.last().map(|m| m.time).unwrap_or(0.0)
    }

    /// Deliver every message due at `now`. Returns how many were sent.
    pub fn poll(&mut self, now: f64, adapter: &EventSourceAdapter) -> usize {
        let start = self.next;
        while let Some(msg) = self.messages.get(self.next) {
            if msg.time > now {
                break;
            }
            adapter.handle_raw(to_micros(msg.time), &msg.bytes);
            self.next += 1;
        }
        self.next - start
    }

    /// Play the script on its own thread in real time, like a driver callback would
    pub fn spawn(self, adapter: EventSourceAdapter, start: Instant) -> PerformerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::spawn(move || {
            for msg in &self.messages[self.next..] {
                let due = start + Duration::from_secs_f64(msg.time);
                while Instant::now() < due {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let remaining = due.saturating_duration_since(Instant::now());
                    std::thread::sleep(remaining.min(Duration::from_millis(5)));
                }
                adapter.handle_raw(to_micros(msg.time), &msg.bytes);
            }
        });

        PerformerHandle { stop, thread: Some(thread) }
    }
}

/// Running performer thread; stops when dropped
pub struct PerformerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PerformerHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for PerformerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn to_micros(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1_000_000.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{event_queue, EventKind};

    fn notes() -> Vec<ChartNote> {
        vec![
            ChartNote { pitch: 62, time: 0.0, duration: 0.4, velocity: 0.8 },
            ChartNote { pitch: 62, time: 0.5, duration: 0.4, velocity: 0.8 },
            ChartNote { pitch: 74, time: 1.0, duration: 0.4, velocity: 0.8 },
        ]
    }

    #[test]
    fn test_exact_performance_polls_in_order() {
        let (producer, consumer) = event_queue(64);
        let adapter = EventSourceAdapter::new(producer);
        let mut performer = ScriptedPerformer::new(&notes(), &PerformerConfig::default());
        assert_eq!(performer.len(), 6);

        assert_eq!(performer.poll(0.0, &adapter), 1);
        assert_eq!(performer.poll(0.45, &adapter), 1);
        assert_eq!(performer.poll(2.0, &adapter), 4);
        assert!(performer.is_finished());

        let kinds: Vec<(EventKind, u8)> = std::iter::from_fn(|| consumer.try_pop())
            .map(|e| (e.kind, e.pitch))
            .collect();
        assert_eq!(kinds, vec![
            (EventKind::NoteOn, 62),
            (EventKind::NoteOff, 62),
            (EventKind::NoteOn, 62),
            (EventKind::NoteOff, 62),
            (EventKind::NoteOn, 74),
            (EventKind::NoteOff, 74),
        ]);
    }

    #[test]
    fn test_jitter_is_bounded_and_seeded() {
        let config = PerformerConfig { jitter: 0.05, seed: 7, ..Default::default() };
        let a = ScriptedPerformer::new(&notes(), &config);
        let b = ScriptedPerformer::new(&notes(), &config);

        for (x, y) in a.messages.iter().zip(b.messages.iter()) {
            assert_eq!(x.time, y.time);
        }
        let first_on = a.messages.iter().find(|m| m.bytes[1] == 74 && m.bytes[0] == 0x90).unwrap();
        assert!((first_on.time - 1.0).abs() <= 0.05 + 1e-12);
    }

    #[test]
    fn test_miss_rate_one_plays_nothing() {
        let config = PerformerConfig { miss_rate: 1.0, ..Default::default() };
        assert!(ScriptedPerformer::new(&notes(), &config).is_empty());
    }

    #[test]
    fn test_spawned_thread_delivers_everything() {
        let (producer, consumer) = event_queue(64);
        let adapter = EventSourceAdapter::new(producer);
        let quick = vec![
            ChartNote { pitch: 60, time: 0.0, duration: 0.01, velocity: 1.0 },
            ChartNote { pitch: 61, time: 0.02, duration: 0.01, velocity: 1.0 },
        ];
        let handle = ScriptedPerformer::new(&quick, &PerformerConfig::default())
            .spawn(adapter, Instant::now());
        while !handle.is_finished() {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(std::iter::from_fn(|| consumer.try_pop()).count(), 4);
    }
}
