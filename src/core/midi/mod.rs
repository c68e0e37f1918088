mod input;
pub mod message;
pub mod simulate;

pub use input::{EventSourceAdapter, InputBackend, MidirBackend};
pub use simulate::{PerformerConfig, ScriptedPerformer};

use std::time::{Duration, Instant};
use crate::error::{Error, Result};

pub const DEFAULT_DEVICE_PATTERNS: [&str; 4] = ["impact", "gx61", "gx 61", "nectar"];
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Connection lifecycle of the input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connected(String),
    /// Waiting for the next reconnection attempt
    Disconnected,
    /// Producing stopped on request; no reconnection attempts
    Suspended,
}

/// Pick the preferred port. Patterns are tried in order and the first one
/// that some port name contains (case-insensitive) wins; with no match the
/// first port is used.
pub fn select_port(ports: &[String], patterns: &[String]) -> Option<usize> {
    if ports.is_empty() {
        return None;
    }
    let names: Vec<String> = ports.iter().map(|name| name.to_lowercase()).collect();
    let preferred = patterns
        .iter()
        .filter(|p| !p.is_empty())
        .find_map(|p| {
            let p = p.to_lowercase();
            names.iter().position(|name| name.contains(&p))
        });
    Some(preferred.unwrap_or(0))
}

/// Owns the input device and keeps it connected with a fixed backoff.
///
/// The tick loop calls `poll` every tick; nothing here blocks for long and
/// the synth / judgment state is never touched, so a lost device only stops
/// new events from arriving.
pub struct DeviceManager<B: InputBackend> {
    backend: B,
    adapter: EventSourceAdapter,
    patterns: Vec<String>,
    retry_interval: Duration,
    state: ConnectionState,
    next_attempt: Instant,
}

impl<B: InputBackend> DeviceManager<B> {
    pub fn new(backend: B, adapter: EventSourceAdapter, patterns: Vec<String>, retry_interval: Duration) -> Self {
        Self {
            backend,
            adapter,
            patterns,
            retry_interval,
            state: ConnectionState::Disconnected,
            next_attempt: Instant::now(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected(_))
    }

    /// List all available input port names
    pub fn list_ports(&mut self) -> Result<Vec<String>> {
        self.backend.port_names()
    }

    /// Try to connect right now to the preferred port
    pub fn connect(&mut self) -> Result<String> {
        let ports = self.backend.port_names()?;
        for (i, name) in ports.iter().enumerate() {
            log::debug!("[MIDI] port {}: {}", i, name);
        }

        let index = select_port(&ports, &self.patterns).ok_or(Error::NoInputPorts)?;
        let name = ports[index].clone();
        if !self.matches_pattern(&name) {
            log::warn!("[MIDI] no preferred device found, falling back to '{}'", name);
        }

        self.backend.open(&name, self.adapter.clone())?;
        log::info!("[MIDI] connected to '{}'", name);
        self.state = ConnectionState::Connected(name.clone());
        Ok(name)
    }

    /// Advance the reconnection state machine
    pub fn poll(&mut self, now: Instant) {
        if now < self.next_attempt {
            return;
        }
        self.next_attempt = now + self.retry_interval;

        match self.state.clone() {
            ConnectionState::Suspended => {},
            ConnectionState::Disconnected => {
                if let Err(err) = self.connect() {
                    log::warn!(
                        "[MIDI] connection failed ({}); retrying in {:?}",
                        err, self.retry_interval
                    );
                }
            },
            ConnectionState::Connected(name) => {
                let still_present = match self.backend.port_names() {
                    Ok(names) => names.iter().any(|n| *n == name),
                    Err(err) => {
                        log::warn!("[MIDI] port enumeration failed: {}", err);
                        false
                    }
                };
                if !still_present || !self.backend.is_open() {
                    log::warn!("[MIDI] device '{}' disconnected", name);
                    self.backend.close();
                    self.state = ConnectionState::Disconnected;
                }
            },
        }
    }

    /// Stop producing events without touching downstream state
    pub fn suspend(&mut self) {
        self.backend.close();
        self.state = ConnectionState::Suspended;
        log::info!("[MIDI] input suspended");
    }

    /// Resume after `suspend`; the next `poll` attempts a connection
    pub fn resume(&mut self, now: Instant) {
        if self.state == ConnectionState::Suspended {
            self.state = ConnectionState::Disconnected;
        }
        self.next_attempt = now;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn matches_pattern(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.patterns.iter().any(|p| !p.is_empty() && name.contains(&p.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::event_queue;

    #[derive(Default)]
    struct FakeBackend {
        ports: Vec<String>,
        open: Option<String>,
        opens: usize,
        adapter: Option<EventSourceAdapter>,
    }

    impl InputBackend for FakeBackend {
        fn port_names(&mut self) -> Result<Vec<String>> {
            Ok(self.ports.clone())
        }

        fn open(&mut self, port_name: &str, adapter: EventSourceAdapter) -> Result<()> {
            if !self.ports.iter().any(|p| p == port_name) {
                return Err(Error::PortNotFound(port_name.to_string()));
            }
            self.open = Some(port_name.to_string());
            self.adapter = Some(adapter);
            self.opens += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.open = None;
            self.adapter = None;
        }

        fn is_open(&self) -> bool {
            self.open.is_some()
        }
    }

    fn patterns() -> Vec<String> {
        DEFAULT_DEVICE_PATTERNS.iter().map(|s| s.to_string()).collect()
    }

    fn manager(ports: &[&str]) -> DeviceManager<FakeBackend> {
        let (producer, _consumer) = event_queue(16);
        let backend = FakeBackend {
            ports: ports.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        DeviceManager::new(backend, EventSourceAdapter::new(producer), patterns(), Duration::from_secs(5))
    }

    #[test]
    fn test_select_port_prefers_pattern_match() {
        let ports = vec!["Midi Through".to_string(), "Nektar Impact GX61 MIDI1".to_string()];
        assert_eq!(select_port(&ports, &patterns()), Some(1));
    }

    #[test]
    fn test_select_port_follows_pattern_order() {
        let ports = vec!["Nektar Impact GX61".to_string(), "My Foo Synth".to_string()];
        let mut preferred = patterns();
        preferred.insert(0, "FOO".to_string());
        assert_eq!(select_port(&ports, &preferred), Some(1));
        assert_eq!(select_port(&ports, &patterns()), Some(0));
    }

    #[test]
    fn test_explicit_port_beats_default_patterns() {
        let (producer, _consumer) = event_queue(16);
        let backend = FakeBackend {
            ports: vec!["Impact GX61".to_string(), "Foo Keys".to_string()],
            ..Default::default()
        };
        let mut preferred = patterns();
        preferred.insert(0, "foo".to_string());
        let mut mgr = DeviceManager::new(backend, EventSourceAdapter::new(producer), preferred, Duration::from_secs(5));
        mgr.poll(Instant::now());
        assert_eq!(mgr.state(), &ConnectionState::Connected("Foo Keys".to_string()));
    }

    #[test]
    fn test_select_port_falls_back_to_first() {
        let ports = vec!["Midi Through".to_string(), "Some Synth".to_string()];
        assert_eq!(select_port(&ports, &patterns()), Some(0));
        assert_eq!(select_port(&[], &patterns()), None);
    }

    #[test]
    fn test_connects_on_first_poll() {
        let mut mgr = manager(&["Midi Through", "Impact GX61"]);
        mgr.poll(Instant::now());
        assert_eq!(mgr.state(), &ConnectionState::Connected("Impact GX61".to_string()));
    }

    #[test]
    fn test_retries_with_fixed_backoff() {
        let mut mgr = manager(&[]);
        let t0 = Instant::now();
        mgr.poll(t0);
        assert_eq!(mgr.state(), &ConnectionState::Disconnected);

        // device appears, but the backoff has not elapsed yet
        mgr.backend.ports.push("Impact GX61".to_string());
        mgr.poll(t0 + Duration::from_secs(1));
        assert!(!mgr.is_connected());

        mgr.poll(t0 + Duration::from_secs(5));
        assert!(mgr.is_connected());
    }

    #[test]
    fn test_detects_disconnect_and_reconnects() {
        let mut mgr = manager(&["Impact GX61"]);
        let t0 = Instant::now();
        mgr.poll(t0);
        assert!(mgr.is_connected());

        mgr.backend.ports.clear();
        mgr.poll(t0 + Duration::from_secs(5));
        assert_eq!(mgr.state(), &ConnectionState::Disconnected);
        assert!(!mgr.backend().is_open());

        mgr.backend.ports.push("Impact GX61".to_string());
        mgr.poll(t0 + Duration::from_secs(10));
        assert!(mgr.is_connected());
        assert_eq!(mgr.backend().opens, 2);
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut mgr = manager(&["Impact GX61"]);
        let t0 = Instant::now();
        mgr.poll(t0);
        mgr.suspend();
        assert_eq!(mgr.state(), &ConnectionState::Suspended);
        assert!(!mgr.backend().is_open());

        mgr.poll(t0 + Duration::from_secs(60));
        assert_eq!(mgr.state(), &ConnectionState::Suspended);

        let t1 = t0 + Duration::from_secs(61);
        mgr.resume(t1);
        mgr.poll(t1);
        assert!(mgr.is_connected());
    }
}
