mod envelope;
mod waveform;

// Re-export key types so they're accessible from core::oscillator
pub use self::envelope::{Envelope, EnvelopePhase};
pub use self::waveform::{harmonic_sample, peak_amplitude, PARTIALS};
