pub mod audio;
pub mod dispatch;
pub mod judge;
pub mod midi;
pub mod oscillator;
pub mod synth;
pub mod voice;

pub use dispatch::TickDispatcher;
pub use judge::JudgmentEngine;
pub use synth::Synth;
