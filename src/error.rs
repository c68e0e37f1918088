use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("pitch {0} is outside the MIDI range 0-127")]
    PitchOutOfRange(u8),

    #[error("no MIDI input ports available")]
    NoInputPorts,

    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error("audio output error: {0}")]
    Audio(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid chart: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
