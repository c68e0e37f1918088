use crate::messaging::{CanonicalEvent, EventKind};
use crate::utils::helpers::normalize_7bit;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Why a raw message did not become an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than two bytes
    TooShort,
    /// Status kind we do not route (aftertouch, pitch bend, clock...)
    Unsupported(u8),
}

/// Parse a raw `[status, data1, data2?]` message into a canonical event.
///
/// Does not allocate, so it is safe to call from a driver callback.
pub fn parse(message: &[u8], source_timestamp: u64) -> Result<CanonicalEvent, ParseError> {
    if message.len() < 2 {
        return Err(ParseError::TooShort);
    }

    let status = message[0] & 0xF0;
    let channel = message[0] & 0x0F;
    let data1 = message[1];
    let data2 = message.get(2).copied().unwrap_or(0);

    let kind = match status {
        NOTE_ON => EventKind::NoteOn,
        NOTE_OFF => EventKind::NoteOff,
        CONTROL_CHANGE => EventKind::ControlChange,
        other => return Err(ParseError::Unsupported(other)),
    };

    Ok(CanonicalEvent {
        kind,
        pitch: data1,
        velocity: normalize_7bit(data2),
        channel,
        source_timestamp,
    })
}

/// Encode a note-on message (used by the simulated performer)
pub fn note_on_bytes(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [NOTE_ON | (channel & 0x0F), note, velocity]
}

/// Encode a note-off message
pub fn note_off_bytes(channel: u8, note: u8) -> [u8; 3] {
    [NOTE_OFF | (channel & 0x0F), note, 0]
}
