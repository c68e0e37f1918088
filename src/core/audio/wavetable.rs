use crate::core::oscillator::{harmonic_sample, Envelope};
use crate::utils::midi_note_to_freq;

/// Pre-rendered tone for a single pitch, shared by every voice playing it
#[derive(Debug, Clone)]
pub struct WaveformTable {
    pub pitch: u8,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
    /// Sustain loop region for held notes, `[loop_start, loop_end)`
    pub loop_start: usize,
    pub loop_end: usize,
}

impl WaveformTable {
    /// Render `seconds` of the harmonic tone for `pitch` with the baked decay
    /// tail. The attack is left to the voice so a release can start anywhere.
    ///
    /// The loop region starts after the attack and spans a whole number of
    /// fundamental periods so held notes wrap without a click.
    pub fn synthesize(pitch: u8, sample_rate: u32, seconds: f64, envelope: &Envelope) -> Self {
        let sr = sample_rate.max(1) as f64;
        let freq = midi_note_to_freq(pitch);
        let len = ((sr * seconds).floor() as usize).max(1);

        let samples: Vec<f32> = (0..len)
            .map(|i| {
                let t = i as f64 / sr;
                (harmonic_sample(freq, t) * envelope.tail_level(t)).clamp(-1.0, 1.0)
            })
            .collect();

        let (loop_start, loop_end) = loop_region(len, sr, freq, envelope);

        Self {
            pitch,
            sample_rate,
            samples,
            loop_start,
            loop_end,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }
}

fn loop_region(len: usize, sr: f64, freq: f64, envelope: &Envelope) -> (usize, usize) {
    let start = ((envelope.attack * sr).ceil() as usize).min(len);
    let boundary = ((envelope.sustain_boundary * sr).floor() as usize).min(len);
    if boundary <= start {
        return (0, len);
    }

    let available = (boundary - start) as f64;
    let period = sr / freq;
    let cycles = (available / period).floor();
    let loop_len = if cycles >= 1.0 {
        ((cycles * period).round() as usize).min(boundary - start)
    } else {
        boundary - start
    };

    (start, start + loop_len.max(1))
}
