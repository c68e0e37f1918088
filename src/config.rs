use serde::{Serialize, Deserialize};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::core::dispatch::DEFAULT_EVENTS_PER_TICK;
use crate::core::judge::{JudgeConfig, Thresholds};
use crate::core::midi::{DEFAULT_DEVICE_PATTERNS, DEFAULT_RECONNECT_INTERVAL};
use crate::core::oscillator::Envelope;
use crate::core::synth::SynthConfig;
use crate::error::{Error, Result};
use crate::messaging::queue::DEFAULT_QUEUE_CAPACITY;
use crate::messaging::BackgroundClip;

const APP_DIR: &str = "notefall";
const SETTINGS_FILE: &str = "settings.json";

/// Everything the user can tune, persisted as JSON. Missing keys fall back
/// to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub volume: f32,
    pub attack_time: f64,
    pub release_time: f64,
    /// Only used for offline render; live output follows the device
    pub sample_rate: u32,
    pub table_seconds: f64,
    pub sustain_boundary: f64,
    pub decay_time: f64,
    pub precompute_tables: bool,

    pub perfect_window: f64,
    pub good_window: f64,
    pub bad_window: f64,
    pub note_lifetime: f64,
    pub preroll: f64,
    pub auto_play: bool,
    /// Silence before the first chart note
    pub lead_in: f64,

    pub tick_rate: u32,
    pub events_per_tick: usize,
    pub queue_capacity: usize,

    pub device_patterns: Vec<String>,
    pub reconnect_interval: f64,
    pub background_track: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let envelope = Envelope::default();
        let thresholds = Thresholds::default();
        let judge = JudgeConfig::default();
        Self {
            volume: 0.5,
            attack_time: envelope.attack,
            release_time: envelope.release,
            sample_rate: 44100,
            table_seconds: 1.0,
            sustain_boundary: envelope.sustain_boundary,
            decay_time: envelope.decay_time,
            precompute_tables: true,
            perfect_window: thresholds.perfect,
            good_window: thresholds.good,
            bad_window: thresholds.bad,
            note_lifetime: judge.lifetime,
            preroll: judge.preroll,
            auto_play: false,
            lead_in: 2.0,
            tick_rate: 120,
            events_per_tick: DEFAULT_EVENTS_PER_TICK,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            device_patterns: DEFAULT_DEVICE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL.as_secs_f64(),
            background_track: None,
        }
    }
}

impl Settings {
    /// `<config dir>/notefall/settings.json`
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not find config directory".to_string()))?;
        path.push(APP_DIR);
        path.push(SETTINGS_FILE);
        Ok(path)
    }

    /// Read settings from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("[CONFIG] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let file = File::open(path)?;
        let settings: Settings = serde_json::from_reader(BufReader::new(file))?;
        log::info!("[CONFIG] loaded settings from {}", path.display());
        Ok(settings.validated())
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Clamp or repair values that would break the engines
    pub fn validated(mut self) -> Self {
        let defaults = Settings::default();

        if !(0.0..=1.0).contains(&self.volume) {
            log::warn!("[CONFIG] volume {} out of range, clamping", self.volume);
            self.volume = self.volume.clamp(0.0, 1.0);
        }

        fix_positive("attack_time", &mut self.attack_time, defaults.attack_time);
        fix_positive("release_time", &mut self.release_time, defaults.release_time);
        fix_positive("table_seconds", &mut self.table_seconds, defaults.table_seconds);
        fix_positive("decay_time", &mut self.decay_time, defaults.decay_time);
        fix_positive("note_lifetime", &mut self.note_lifetime, defaults.note_lifetime);
        fix_positive("reconnect_interval", &mut self.reconnect_interval, defaults.reconnect_interval);
        fix_positive("perfect_window", &mut self.perfect_window, defaults.perfect_window);

        if self.sustain_boundary < self.attack_time {
            log::warn!("[CONFIG] sustain_boundary before end of attack, moving it");
            self.sustain_boundary = self.attack_time;
        }
        if !(0.0..self.note_lifetime).contains(&self.preroll) {
            log::warn!("[CONFIG] preroll {} outside [0, lifetime), using default", self.preroll);
            self.preroll = defaults.preroll.min(self.note_lifetime / 2.0);
        }
        if self.good_window < self.perfect_window {
            log::warn!("[CONFIG] good_window below perfect_window, raising it");
            self.good_window = self.perfect_window;
        }
        if self.bad_window < self.good_window {
            log::warn!("[CONFIG] bad_window below good_window, raising it");
            self.bad_window = self.good_window;
        }
        if self.lead_in < 0.0 {
            self.lead_in = 0.0;
        }

        self.sample_rate = self.sample_rate.max(8000);
        self.tick_rate = self.tick_rate.clamp(1, 1000);
        self.events_per_tick = self.events_per_tick.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self
    }

    pub fn envelope(&self) -> Envelope {
        Envelope {
            attack: self.attack_time,
            release: self.release_time,
            sustain_boundary: self.sustain_boundary,
            decay_time: self.decay_time,
        }
    }

    /// Synth parameters for output at `sample_rate`
    pub fn synth_config(&self, sample_rate: u32) -> SynthConfig {
        SynthConfig {
            sample_rate,
            volume: self.volume,
            envelope: self.envelope(),
            table_seconds: self.table_seconds,
        }
    }

    pub fn judge_config(&self) -> JudgeConfig {
        JudgeConfig {
            lifetime: self.note_lifetime,
            preroll: self.preroll,
            thresholds: Thresholds {
                perfect: self.perfect_window,
                good: self.good_window,
                bad: self.bad_window,
            },
            auto_play: self.auto_play,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_interval)
    }

    pub fn background_clip(&self) -> Option<BackgroundClip> {
        self.background_track.as_ref().map(|path| BackgroundClip {
            path: path.clone(),
            volume: self.volume,
        })
    }
}

fn fix_positive(name: &str, value: &mut f64, fallback: f64) {
    if !value.is_finite() || *value <= 0.0 {
        log::warn!("[CONFIG] {} must be positive (got {}), using {}", name, value, fallback);
        *value = fallback;
    }
}
