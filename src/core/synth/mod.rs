use std::sync::Arc;
use std::time::Instant;
use serde::{Serialize, Deserialize};
use crate::core::audio::WaveformTable;
use crate::core::oscillator::{Envelope, EnvelopePhase};
use crate::core::voice::Voice;
use crate::error::{Error, Result};
use crate::utils::{note_name, MAX_PITCH, PITCH_COUNT};

/// Engine-wide synthesis parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    pub sample_rate: u32,
    pub volume: f32,
    pub envelope: Envelope,
    /// Length of each pre-rendered table in seconds
    pub table_seconds: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            volume: 0.5,
            envelope: Envelope::default(),
            table_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthStats {
    pub triggers: u64,
    pub retriggers: u64,
    pub rejected: u64,
    pub releases: u64,
}

/// Per-pitch wavetable synthesizer: one voice slot and one cached table per
/// MIDI pitch. Only the tick loop touches it.
pub struct Synth {
    config: SynthConfig,
    voices: [Option<Voice>; PITCH_COUNT],
    tables: [Option<Arc<WaveformTable>>; PITCH_COUNT],
    stats: SynthStats,
}

impl Synth {
    pub fn new(config: SynthConfig) -> Self {
        Synth {
            config,
            voices: std::array::from_fn(|_| None),
            tables: std::array::from_fn(|_| None),
            stats: SynthStats::default(),
        }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn stats(&self) -> SynthStats {
        self.stats
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn volume(&self) -> f32 {
        self.config.volume
    }

    /// Master volume applied to notes triggered from now on
    pub fn set_volume(&mut self, volume: f32) {
        self.config.volume = volume.clamp(0.0, 1.0);
    }

    /// Render every pitch's table up front so the first note of each pitch
    /// does not pay for synthesis inside a tick
    pub fn precompute_all(&mut self) {
        let started = Instant::now();
        for pitch in 0..=MAX_PITCH {
            self.table_for(pitch);
        }
        log::info!(
            "[SYNTH] precomputed {} tables ({}s @ {} Hz) in {:?}",
            PITCH_COUNT,
            self.config.table_seconds,
            self.config.sample_rate,
            started.elapsed()
        );
    }

    pub fn cached_tables(&self) -> usize {
        self.tables.iter().filter(|t| t.is_some()).count()
    }

    fn table_for(&mut self, pitch: u8) -> Arc<WaveformTable> {
        let slot = &mut self.tables[pitch as usize];
        if let Some(table) = slot.as_ref() {
            return Arc::clone(table);
        }
        let table = Arc::new(WaveformTable::synthesize(
            pitch,
            self.config.sample_rate,
            self.config.table_seconds,
            &self.config.envelope,
        ));
        *slot = Some(Arc::clone(&table));
        table
    }

    /// Start a voice for `pitch`, replacing any voice already sounding there.
    /// Held notes loop their sustain region; one-shots stop at the table end.
    pub fn trigger(&mut self, pitch: u8, velocity: f32, looping: bool, now: f64) -> Result<()> {
        if pitch > MAX_PITCH {
            self.stats.rejected += 1;
            log::warn!("[SYNTH] rejected trigger for out-of-range pitch {}", pitch);
            return Err(Error::PitchOutOfRange(pitch));
        }

        let table = self.table_for(pitch);
        let base_volume = velocity.clamp(0.0, 1.0) * self.config.volume;
        let slot = &mut self.voices[pitch as usize];
        if slot.take().is_some() {
            self.stats.retriggers += 1;
            log::debug!("[SYNTH] retrigger {}", note_name(pitch));
        }
        *slot = Some(Voice::new(pitch, table, base_volume, looping, now));
        self.stats.triggers += 1;
        Ok(())
    }

    /// Begin the release ramp for `pitch`. Does nothing if it is not sounding.
    pub fn release(&mut self, pitch: u8, now: f64) {
        let envelope = self.config.envelope;
        if let Some(voice) = self.voices.get_mut(pitch as usize).and_then(|v| v.as_mut()) {
            if matches!(voice.phase, EnvelopePhase::Attack | EnvelopePhase::Sustain) {
                voice.release(now, &envelope);
                self.stats.releases += 1;
            }
        }
    }

    pub fn release_all(&mut self, now: f64) {
        for pitch in 0..=MAX_PITCH {
            self.release(pitch, now);
        }
    }

    /// Advance envelope phases and free finished voices
    pub fn update(&mut self, now: f64) {
        let envelope = self.config.envelope;
        for slot in self.voices.iter_mut() {
            let finished = match slot.as_mut() {
                Some(voice) => {
                    voice.update(now, &envelope);
                    !voice.is_active()
                },
                None => false,
            };
            if finished {
                *slot = None;
            }
        }
    }

    /// Mix all active voices into `out`; sample `i` is at `start_time + i / sample_rate`
    pub fn render(&mut self, start_time: f64, out: &mut [f32]) {
        let envelope = self.config.envelope;
        let sr = self.config.sample_rate.max(1) as f64;
        out.fill(0.0);

        for voice in self.voices.iter_mut().flatten() {
            for (i, sample) in out.iter_mut().enumerate() {
                *sample += voice.next_sample(start_time + i as f64 / sr, &envelope);
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_active(&self, pitch: u8) -> bool {
        self.voice_phase(pitch).is_some()
    }

    pub fn voice_phase(&self, pitch: u8) -> Option<EnvelopePhase> {
        self.voices
            .get(pitch as usize)
            .and_then(|v| v.as_ref())
            .map(|v| v.phase)
    }
}
