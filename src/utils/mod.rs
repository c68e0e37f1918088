pub mod helpers;

pub use helpers::{midi_note_to_freq, note_name, MAX_PITCH, PITCH_COUNT};
