/// Kind of a normalized input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    ControlChange,
}

/// Canonical note event carried from the event source to the tick loop.
///
/// For `ControlChange` events `pitch` holds the controller number and
/// `velocity` the normalized controller value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: f32, // 0.0 to 1.0
    pub channel: u8,   // 0-15
    pub source_timestamp: u64, // microseconds, as reported by the source
}

impl CanonicalEvent {
    pub fn note_on(pitch: u8, velocity: f32, source_timestamp: u64) -> Self {
        Self {
            kind: EventKind::NoteOn,
            pitch,
            velocity: velocity.clamp(0.0, 1.0),
            channel: 0,
            source_timestamp,
        }
    }

    pub fn note_off(pitch: u8, source_timestamp: u64) -> Self {
        Self {
            kind: EventKind::NoteOff,
            pitch,
            velocity: 0.0,
            channel: 0,
            source_timestamp,
        }
    }

    /// A NoteOn with zero velocity is a NoteOff in disguise
    pub fn is_release(&self) -> bool {
        match self.kind {
            EventKind::NoteOff => true,
            EventKind::NoteOn => self.velocity <= 0.0,
            EventKind::ControlChange => false,
        }
    }
}
