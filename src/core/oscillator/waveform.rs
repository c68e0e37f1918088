use std::f64::consts::PI;

/// Harmonic recipe of the keyboard tone: (frequency multiple, gain).
/// Gains sum to 0.4, so a full-level sample never leaves [-0.4, 0.4].
pub const PARTIALS: [(f64, f32); 3] = [(1.0, 0.25), (2.0, 0.10), (4.0, 0.05)];

/// Peak amplitude of the un-enveloped tone
pub fn peak_amplitude() -> f32 {
    PARTIALS.iter().map(|(_, gain)| gain).sum()
}

/// Raw tone at time `t` for fundamental `freq`, before the envelope
pub fn harmonic_sample(freq: f64, t: f64) -> f32 {
    PARTIALS
        .iter()
        .map(|&(multiple, gain)| (2.0 * PI * multiple * freq * t).sin() as f32 * gain)
        .sum()
}
