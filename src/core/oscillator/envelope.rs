use serde::{Serialize, Deserialize};

/// Where a voice is in its amplitude curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Sustain,
    Release,
    Idle,
}

/// Attack / sustain / release shape. There is no decay stage: the pre-baked
/// tables hold at full level until `sustain_boundary`, then fall off
/// exponentially with time constant `decay_time`. Attack and release are
/// applied live by the voice, never baked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack: f64,
    pub release: f64,
    pub sustain_boundary: f64,
    pub decay_time: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.01,
            release: 0.5,
            sustain_boundary: 0.75,
            decay_time: 0.08,
        }
    }
}

impl Envelope {
    /// Level baked into a table `t` seconds in: flat, then the one-shot tail
    pub fn tail_level(&self, t: f64) -> f32 {
        if t < self.sustain_boundary {
            1.0
        } else if self.decay_time > 0.0 {
            (-(t - self.sustain_boundary) / self.decay_time).exp() as f32
        } else {
            0.0
        }
    }

    /// Linear 0 -> 1 ramp over the attack window
    pub fn attack_level(&self, elapsed: f64) -> f32 {
        if self.attack <= 0.0 {
            return 1.0;
        }
        (elapsed / self.attack).clamp(0.0, 1.0) as f32
    }

    /// Linear ramp from `from` to zero over the release window
    pub fn release_level(&self, from: f32, elapsed: f64) -> f32 {
        from * self.release_gain(elapsed)
    }

    /// Multiplier applied to a releasing voice, 1 -> 0
    pub fn release_gain(&self, elapsed: f64) -> f32 {
        if self.release <= 0.0 {
            return 0.0;
        }
        (1.0 - elapsed / self.release).clamp(0.0, 1.0) as f32
    }
}
