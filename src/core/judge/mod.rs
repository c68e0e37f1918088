pub mod chart;

pub use chart::{demo_riff, Chart, ChartNote};

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::utils::note_name;

/// Accuracy classes, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JudgmentTier {
    Perfect,
    Good,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Pending,
    Spawned,
    Hit(JudgmentTier),
    Missed,
}

impl Judgment {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Judgment::Hit(_) | Judgment::Missed)
    }
}

/// Inclusive upper bounds of each tier, in seconds of distance from the target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub perfect: f64,
    pub good: f64,
    pub bad: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { perfect: 0.1, good: 0.3, bad: 0.6 }
    }
}

impl Thresholds {
    pub fn classify(&self, distance: f64) -> Option<JudgmentTier> {
        let distance = distance.abs();
        if distance <= self.perfect {
            Some(JudgmentTier::Perfect)
        } else if distance <= self.good {
            Some(JudgmentTier::Good)
        } else if distance <= self.bad {
            Some(JudgmentTier::Bad)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// How long a spawned note stays matchable before it counts as missed
    pub lifetime: f64,
    /// Time between a note's target and the end of its lifetime
    pub preroll: f64,
    pub thresholds: Thresholds,
    pub auto_play: bool,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            lifetime: 8.0,
            preroll: 1.0,
            thresholds: Thresholds::default(),
            auto_play: false,
        }
    }
}

impl JudgeConfig {
    /// How far ahead of its target a note spawns
    pub fn lookahead(&self) -> f64 {
        (self.lifetime - self.preroll).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    pub pitch: u8,
    pub scheduled_time: f64,
    pub duration: f64,
    pub velocity: f32,
    pub spawn_time: f64,
    pub judgment: Judgment,
}

/// Result of matching a live key press against the schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgmentRecord {
    pub pitch: u8,
    pub scheduled_time: f64,
    /// Signed: negative means early
    pub offset: f64,
    pub tier: JudgmentTier,
}

/// Note events the engine plays by itself in auto-play mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutoPlayAction {
    NoteOn { pitch: u8, velocity: f32 },
    NoteOff { pitch: u8 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scoreboard {
    pub perfect: u32,
    pub good: u32,
    pub bad: u32,
    pub missed: u32,
    /// Key presses that matched nothing
    pub extras: u32,
}

impl Scoreboard {
    fn record(&mut self, tier: JudgmentTier) {
        match tier {
            JudgmentTier::Perfect => self.perfect += 1,
            JudgmentTier::Good => self.good += 1,
            JudgmentTier::Bad => self.bad += 1,
        }
    }

    pub fn hits(&self) -> u32 {
        self.perfect + self.good + self.bad
    }

    pub fn judged(&self) -> u32 {
        self.hits() + self.missed
    }

    /// Fraction of judged notes that were hit, 0.0 when nothing was judged
    pub fn accuracy(&self) -> f64 {
        match self.judged() {
            0 => 0.0,
            n => self.hits() as f64 / n as f64,
        }
    }
}

impl fmt::Display for Scoreboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "perfect {} / good {} / bad {} / missed {} / extra {} ({:.1}% hit)",
            self.perfect,
            self.good,
            self.bad,
            self.missed,
            self.extras,
            self.accuracy() * 100.0
        )
    }
}

/// Owns the note schedule and judges live input against it.
///
/// Notes are sorted by target time at load. `next_pending` walks forward as
/// notes spawn; `active` holds indices of spawned notes not yet judged.
pub struct JudgmentEngine {
    config: JudgeConfig,
    notes: Vec<ScheduledNote>,
    next_pending: usize,
    active: Vec<usize>,
    releases: Vec<(f64, u8)>,
    scoreboard: Scoreboard,
}

impl JudgmentEngine {
    pub fn new(config: JudgeConfig) -> Self {
        Self {
            config,
            notes: Vec::new(),
            next_pending: 0,
            active: Vec::new(),
            releases: Vec::new(),
            scoreboard: Scoreboard::default(),
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    pub fn set_auto_play(&mut self, auto_play: bool) {
        self.config.auto_play = auto_play;
    }

    /// Replace the schedule. Duplicate `(pitch, time)` entries are dropped.
    pub fn load(&mut self, mut notes: Vec<ChartNote>) {
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));

        let lookahead = self.config.lookahead();
        let mut scheduled: Vec<ScheduledNote> = Vec::with_capacity(notes.len());
        for note in notes {
            let duplicate = scheduled
                .iter()
                .rev()
                .take_while(|n| n.scheduled_time == note.time)
                .any(|n| n.pitch == note.pitch);
            if duplicate {
                log::warn!("[JUDGE] dropping duplicate {} at {:.3}s", note_name(note.pitch), note.time);
                continue;
            }
            scheduled.push(ScheduledNote {
                pitch: note.pitch,
                scheduled_time: note.time,
                duration: note.duration.max(0.0),
                velocity: note.velocity.clamp(0.0, 1.0),
                spawn_time: note.time - lookahead,
                judgment: Judgment::Pending,
            });
        }

        log::info!("[JUDGE] loaded {} notes", scheduled.len());
        self.notes = scheduled;
        self.next_pending = 0;
        self.active.clear();
        self.releases.clear();
        self.scoreboard = Scoreboard::default();
    }

    /// Advance the schedule to `now`: spawn notes, play them in auto-play
    /// mode, and retire expired ones. Returns the note events to perform.
    pub fn update(&mut self, now: f64) -> Vec<AutoPlayAction> {
        let mut actions = Vec::new();

        while let Some(note) = self.notes.get_mut(self.next_pending) {
            if now < note.spawn_time {
                break;
            }
            note.judgment = Judgment::Spawned;
            self.active.push(self.next_pending);
            self.next_pending += 1;
        }

        // releases scheduled by earlier ticks go out before any new press
        self.drain_releases(now, &mut actions);

        if self.config.auto_play {
            for &index in &self.active {
                let note = &mut self.notes[index];
                if note.judgment == Judgment::Spawned && now >= note.scheduled_time {
                    note.judgment = Judgment::Hit(JudgmentTier::Perfect);
                    self.scoreboard.record(JudgmentTier::Perfect);
                    actions.push(AutoPlayAction::NoteOn { pitch: note.pitch, velocity: note.velocity });
                    // a retrigger takes over the voice; the earlier note's release would cut it
                    let pitch = note.pitch;
                    self.releases.retain(|&(_, p)| p != pitch);
                    self.releases.push((note.scheduled_time + note.duration, note.pitch));
                }
            }
            self.drain_releases(now, &mut actions);
        }

        let lifetime = self.config.lifetime;
        for &index in &self.active {
            let note = &mut self.notes[index];
            if note.judgment == Judgment::Spawned && now - note.spawn_time >= lifetime {
                note.judgment = Judgment::Missed;
                self.scoreboard.missed += 1;
                log::info!("[JUDGE] {} at {:.3}s missed", note_name(note.pitch), note.scheduled_time);
            }
        }

        let notes = &self.notes;
        self.active.retain(|&i| notes[i].judgment == Judgment::Spawned);

        actions
    }

    fn drain_releases(&mut self, now: f64, actions: &mut Vec<AutoPlayAction>) {
        if self.releases.is_empty() {
            return;
        }
        self.releases.sort_by(|a, b| a.0.total_cmp(&b.0));
        let due = self.releases.iter().take_while(|(t, _)| *t <= now).count();
        actions.extend(self.releases.drain(..due).map(|(_, pitch)| AutoPlayAction::NoteOff { pitch }));
    }

    /// Judge a live key press. Returns `None` in auto-play mode or when no
    /// spawned note of that pitch is within the Bad window.
    pub fn on_note_on(&mut self, pitch: u8, now: f64) -> Option<JudgmentRecord> {
        if self.config.auto_play {
            return None;
        }

        let lifetime = self.config.lifetime;
        let bad = self.config.thresholds.bad;
        let mut best: Option<(usize, f64)> = None;

        for (slot, &index) in self.active.iter().enumerate() {
            let note = &self.notes[index];
            if note.pitch != pitch
                || note.judgment != Judgment::Spawned
                || now - note.spawn_time >= lifetime
            {
                continue;
            }
            let distance = (now - note.scheduled_time).abs();
            if distance > bad {
                continue;
            }
            // strict: on a tie the earlier scheduled note wins
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((slot, distance));
            }
        }

        let Some((slot, distance)) = best else {
            self.scoreboard.extras += 1;
            log::debug!("[JUDGE] extra key {} at {:.3}s", note_name(pitch), now);
            return None;
        };

        let index = self.active.remove(slot);
        let tier = self.config.thresholds.classify(distance)?;
        let note = &mut self.notes[index];
        note.judgment = Judgment::Hit(tier);
        self.scoreboard.record(tier);

        let record = JudgmentRecord {
            pitch,
            scheduled_time: note.scheduled_time,
            offset: now - note.scheduled_time,
            tier,
        };
        log::info!(
            "[JUDGE] {} {:?} ({:+.0} ms)",
            note_name(pitch),
            tier,
            record.offset * 1000.0
        );
        Some(record)
    }

    pub fn notes(&self) -> &[ScheduledNote] {
        &self.notes
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn scoreboard(&self) -> Scoreboard {
        self.scoreboard
    }

    /// Every note has been judged and no auto-play release is outstanding
    pub fn is_finished(&self) -> bool {
        self.next_pending >= self.notes.len() && self.active.is_empty() && self.releases.is_empty()
    }
}
