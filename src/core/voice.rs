use std::sync::Arc;
use crate::core::audio::WaveformTable;
use crate::core::oscillator::{Envelope, EnvelopePhase};

/// One sounding pitch. Owned by the synth; at most one per pitch.
pub struct Voice {
    pub pitch: u8,
    pub table: Arc<WaveformTable>,
    pub phase: EnvelopePhase,
    pub phase_start: f64,
    pub started_at: f64,
    pub base_volume: f32,
    pub looping: bool,
    cursor: usize,
    release_from: f32,
}

impl Voice {
    pub fn new(pitch: u8, table: Arc<WaveformTable>, base_volume: f32, looping: bool, now: f64) -> Self {
        Self {
            pitch,
            table,
            phase: EnvelopePhase::Attack,
            phase_start: now,
            started_at: now,
            base_volume,
            looping,
            cursor: 0,
            release_from: 1.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != EnvelopePhase::Idle
    }

    /// Envelope level at `now`, before velocity / volume scaling
    pub fn level(&self, now: f64, envelope: &Envelope) -> f32 {
        match self.phase {
            EnvelopePhase::Attack => envelope.attack_level(now - self.started_at),
            EnvelopePhase::Sustain => 1.0,
            EnvelopePhase::Release => envelope.release_level(self.release_from, now - self.phase_start),
            EnvelopePhase::Idle => 0.0,
        }
    }

    /// Start the release ramp from whatever level the voice is at now
    pub fn release(&mut self, now: f64, envelope: &Envelope) {
        if matches!(self.phase, EnvelopePhase::Attack | EnvelopePhase::Sustain) {
            self.release_from = self.level(now, envelope);
            self.phase = EnvelopePhase::Release;
            self.phase_start = now;
        }
    }

    /// Apply time-based phase transitions
    pub fn update(&mut self, now: f64, envelope: &Envelope) {
        match self.phase {
            EnvelopePhase::Attack if now - self.started_at >= envelope.attack => {
                self.phase = EnvelopePhase::Sustain;
                self.phase_start = self.started_at + envelope.attack;
            },
            EnvelopePhase::Release if now - self.phase_start >= envelope.release => {
                self.phase = EnvelopePhase::Idle;
            },
            _ => {}
        }
        if !self.looping && self.cursor >= self.table.len() {
            self.phase = EnvelopePhase::Idle;
        }
    }

    /// Produce the sample for time `t` and advance the playhead
    pub fn next_sample(&mut self, t: f64, envelope: &Envelope) -> f32 {
        if self.phase == EnvelopePhase::Idle || self.cursor >= self.table.len() {
            return 0.0;
        }

        // tables carry no attack, so attack and release both come from `level`
        let sample = self.table.samples[self.cursor] * self.base_volume * self.level(t, envelope);

        self.cursor += 1;
        if self.looping && self.cursor >= self.table.loop_end {
            self.cursor = self.table.loop_start;
        }
        sample
    }
}
