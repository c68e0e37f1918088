use midir::{Ignore, MidiInput, MidiInputConnection};
use crate::core::midi::message;
use crate::error::{Error, Result};
use crate::messaging::{CanonicalEvent, EventProducer, QueueStats};

/// Normalizes raw driver messages into canonical events and queues them.
///
/// This runs on the driver callback thread: it must not block, log or
/// allocate. Rejected messages only bump counters.
#[derive(Clone)]
pub struct EventSourceAdapter {
    producer: EventProducer,
}

impl EventSourceAdapter {
    pub fn new(producer: EventProducer) -> Self {
        Self { producer }
    }

    /// Handle one raw MIDI message. Returns true if an event was queued.
    pub fn handle_raw(&self, stamp: u64, raw: &[u8]) -> bool {
        match message::parse(raw, stamp) {
            Ok(event) => self.producer.push(event),
            Err(message::ParseError::TooShort) => {
                self.producer.stats().record_malformed();
                false
            },
            Err(message::ParseError::Unsupported(_)) => {
                self.producer.stats().record_ignored();
                false
            },
        }
    }

    /// Queue an already-typed event (simulated sources)
    pub fn push_event(&self, event: CanonicalEvent) -> bool {
        self.producer.push(event)
    }

    pub fn stats(&self) -> &QueueStats {
        self.producer.stats()
    }
}

/// The hardware side of device management
pub trait InputBackend {
    /// Names of the currently available input ports
    fn port_names(&mut self) -> Result<Vec<String>>;

    /// Open the named port and start feeding `adapter`
    fn open(&mut self, port_name: &str, adapter: EventSourceAdapter) -> Result<()>;

    /// Close the current port, if any. Events stop flowing immediately.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Handles MIDI input from connected devices through midir
pub struct MidirBackend {
    client_name: String,
    connection: Option<MidiInputConnection<()>>,
}

impl MidirBackend {
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_string(),
            connection: None,
        }
    }
}

impl InputBackend for MidirBackend {
    fn port_names(&mut self) -> Result<Vec<String>> {
        let midi_in = MidiInput::new(&self.client_name)
            .map_err(|e| Error::Midi(format!("Failed to create MIDI input: {}", e)))?;

        Ok(midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect())
    }

    fn open(&mut self, port_name: &str, adapter: EventSourceAdapter) -> Result<()> {
        // First disconnect if already connected
        self.close();

        let mut midi_in = MidiInput::new(&self.client_name)
            .map_err(|e| Error::Midi(format!("Failed to create MIDI input: {}", e)))?;
        // sysex, timing clock and active sensing never reach the adapter
        midi_in.ignore(Ignore::All);

        let ports = midi_in.ports();
        let port = ports
            .into_iter()
            .find(|port| midi_in.port_name(port).map(|name| name == port_name).unwrap_or(false))
            .ok_or_else(|| Error::PortNotFound(port_name.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                "notefall-input",
                move |stamp, raw, _| {
                    adapter.handle_raw(stamp, raw);
                },
                (),
            )
            .map_err(|e| Error::Midi(format!("Failed to connect to MIDI port: {}", e)))?;

        self.connection = Some(connection);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.close();
        }
    }

    fn is_open(&self) -> bool {
        self.connection.is_some()
    }
}
