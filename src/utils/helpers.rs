/// Highest valid MIDI note number
pub const MAX_PITCH: u8 = 127;

/// Number of addressable pitches (0-127)
pub const PITCH_COUNT: usize = 128;

/// Convert a MIDI note number to its frequency in Hz
pub fn midi_note_to_freq(note: u8) -> f64 {
    // A4 (note 69) is 440 Hz
    440.0 * 2.0f64.powf((note as f64 - 69.0) / 12.0)
}

/// Scientific pitch name, e.g. 60 -> "C4"
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    let octave = (note as i32 / 12) - 1;
    format!("{}{}", NAMES[note as usize % 12], octave)
}

/// Format a time value with appropriate unit suffix (ms, s)
pub fn format_time(time_in_seconds: f64) -> String {
    if time_in_seconds.abs() >= 1.0 {
        format!("{:.2} s", time_in_seconds)
    } else {
        format!("{:.0} ms", time_in_seconds * 1000.0)
    }
}

/// Normalize a 7-bit MIDI data byte to 0.0-1.0
pub fn normalize_7bit(value: u8) -> f32 {
    value.min(127) as f32 / 127.0
}
