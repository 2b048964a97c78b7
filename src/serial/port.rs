//! Serial port lifecycle over the `serialport` crate.
//!
//! The controller can be unplugged and replugged at any time, possibly
//! coming back under another device name (`/dev/ttyACM0` vs `/dev/ttyACM1`).
//! [`SerialPortManager`] keeps the current device while it is enumerated,
//! otherwise opens the configured port, the last used port, or the first
//! available one, in that order.
//!
//! A read never takes much longer than the configured read timeout, even when
//! the device streams bytes that never form a line (wrong baud rate).

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{debug, info, warn};

use super::{Buffered, LineBuffer, LineSource, PortError};
use crate::config::SerialSettings;

enum ConnectionState {
    Disconnected,
    Connected {
        name: String,
        port: Box<dyn SerialPort>,
    },
}

enum ReadOutcome {
    Line(String),
    Idle,
    Lost(std::io::Error),
}

/// Serial device owner implementing [`LineSource`].
pub struct SerialPortManager {
    preferred: Option<String>,
    baud_rate: u32,
    timeout: Duration,
    state: ConnectionState,
    last_port: Option<String>,
    lines: LineBuffer,
}

impl SerialPortManager {
    /// Create a disconnected manager.
    pub fn new(settings: &SerialSettings) -> Self {
        Self {
            preferred: settings.port.clone(),
            baud_rate: settings.baud_rate,
            timeout: Duration::from_millis(settings.read_timeout_ms),
            state: ConnectionState::Disconnected,
            last_port: None,
            lines: LineBuffer::new(),
        }
    }

    /// Name of the open device.
    pub fn port_name(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Connected { name, .. } => Some(name),
            ConnectionState::Disconnected => None,
        }
    }

    fn connect(&mut self) -> Result<bool, PortError> {
        let available: Vec<String> = serialport::available_ports()
            .map_err(|e| PortError::Enumerate(e.to_string()))?
            .into_iter()
            .map(|p| p.port_name)
            .collect();

        if let ConnectionState::Connected { name, .. } = &self.state {
            if available.contains(name) {
                debug!("Keep current serial port ({})", name);
                return Ok(true);
            }
            info!("Serial port '{}' no longer present", name);
            self.disconnect();
        }

        let choice = [self.preferred.as_ref(), self.last_port.as_ref()]
            .into_iter()
            .flatten()
            .find(|name| available.contains(name))
            .or_else(|| available.first())
            .cloned();
        let Some(name) = choice else {
            return Ok(false);
        };

        let port = serialport::new(&name, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| PortError::Open {
                port: name.clone(),
                baud_rate: self.baud_rate,
                message: e.to_string(),
            })?;

        info!("Open serial port: {} at {} baud", name, self.baud_rate);
        self.lines.clear();
        self.last_port = Some(name.clone());
        self.state = ConnectionState::Connected { name, port };
        Ok(true)
    }

    fn disconnect(&mut self) {
        if let ConnectionState::Connected { name, .. } = &self.state {
            debug!("Serial port '{}' closed", name);
        }
        self.state = ConnectionState::Disconnected;
        self.lines.clear();
    }

    /// Read until a complete line is buffered, the port times out, or one
    /// read timeout has elapsed while bytes kept trickling in without a
    /// terminator.
    fn read_outcome(&mut self) -> Result<ReadOutcome, PortError> {
        let ConnectionState::Connected { port, .. } = &mut self.state else {
            return Err(PortError::NotConnected);
        };
        let deadline = Instant::now() + self.timeout;
        let mut buffer = [0u8; 64];
        let mut read_once = false;
        loop {
            match self.lines.next_line() {
                Buffered::Line(line) => return Ok(ReadOutcome::Line(line)),
                Buffered::Overflow(dropped) => {
                    warn!("Discarding {} bytes without line terminator", dropped);
                    return Ok(ReadOutcome::Idle);
                }
                Buffered::Partial => {}
            }
            if read_once && Instant::now() >= deadline {
                return Ok(ReadOutcome::Idle);
            }
            match port.read(&mut buffer) {
                Ok(0) => {
                    return Ok(ReadOutcome::Lost(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "Unexpected EOF",
                    )))
                }
                Ok(n) => {
                    self.lines.extend(&buffer[..n]);
                    read_once = true;
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(ReadOutcome::Idle)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Ok(ReadOutcome::Lost(e)),
            }
        }
    }
}

impl LineSource for SerialPortManager {
    fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    fn try_connect(&mut self) -> bool {
        match self.connect() {
            Ok(connected) => connected,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, PortError> {
        match self.read_outcome()? {
            ReadOutcome::Line(line) => Ok(Some(line)),
            ReadOutcome::Idle => Ok(None),
            ReadOutcome::Lost(source) => {
                let port = self.port_name().unwrap_or_default().to_string();
                self.disconnect();
                Err(PortError::ConnectionLost { port, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_starts_disconnected() {
        let manager = SerialPortManager::new(&SerialSettings::default());
        assert!(!manager.is_connected());
        assert_eq!(manager.port_name(), None);
    }

    #[test]
    fn test_read_without_connection() {
        let mut manager = SerialPortManager::new(&SerialSettings::default());
        assert!(matches!(manager.read_line(), Err(PortError::NotConnected)));
    }

    /// Manager already connected to the slave end of a pseudo terminal.
    #[cfg(unix)]
    fn connected_pty(timeout: Duration) -> (serialport::TTYPort, SerialPortManager) {
        let (master, mut slave) = serialport::TTYPort::pair().unwrap();
        slave.set_timeout(timeout).unwrap();
        let mut manager = SerialPortManager::new(&SerialSettings::default());
        manager.timeout = timeout;
        manager.state = ConnectionState::Connected {
            name: "pty".to_string(),
            port: Box::new(slave),
        };
        (master, manager)
    }

    #[cfg(unix)]
    #[test]
    fn test_pty_timeout_is_not_an_error() {
        let (_master, mut manager) = connected_pty(Duration::from_millis(20));
        assert!(matches!(manager.read_line(), Ok(None)));
        assert!(manager.is_connected());
        assert_eq!(manager.port_name(), Some("pty"));
    }

    #[cfg(unix)]
    #[test]
    fn test_pty_lines_are_handed_out_one_per_call() {
        use std::io::Write;

        let (mut master, mut manager) = connected_pty(Duration::from_millis(100));
        master
            .write_all(b"Photo: 1\nPhoto: 2\nLost Photo: 1\n")
            .unwrap();
        master.flush().unwrap();

        assert_eq!(manager.read_line().unwrap().as_deref(), Some("Photo: 1"));
        assert_eq!(manager.read_line().unwrap().as_deref(), Some("Photo: 2"));
        assert_eq!(manager.read_line().unwrap().as_deref(), Some("Lost Photo: 1"));
        assert_eq!(manager.read_line().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_pty_overlong_line_is_skipped() {
        use std::io::Write;

        let (mut master, mut manager) = connected_pty(Duration::from_millis(100));
        let mut bytes = vec![b'a'; 300];
        bytes.extend_from_slice(b"\nPhoto: 3\n");
        master.write_all(&bytes).unwrap();
        master.flush().unwrap();

        assert_eq!(manager.read_line().unwrap(), None);
        assert_eq!(manager.read_line().unwrap().as_deref(), Some("Photo: 3"));
        assert!(manager.is_connected());
    }

    #[cfg(unix)]
    #[test]
    fn test_pty_unterminated_stream_does_not_block() {
        use std::io::Write;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::thread;

        let (mut master, mut manager) = connected_pty(Duration::from_millis(20));
        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    let _ = master.write(&[b'a'; 32]);
                    thread::sleep(Duration::from_millis(1));
                }
            })
        };

        for _ in 0..3 {
            let started = Instant::now();
            let outcome = manager.read_line();
            assert!(
                started.elapsed() < Duration::from_millis(500),
                "read_line took {:?}",
                started.elapsed()
            );
            assert!(matches!(outcome, Ok(None)));
        }

        stop.store(true, Ordering::SeqCst);
        writer.join().unwrap();
        assert!(manager.is_connected());
    }

    #[cfg(unix)]
    #[test]
    fn test_pty_hangup_reports_connection_lost() {
        let (master, mut manager) = connected_pty(Duration::from_millis(50));
        drop(master);

        match manager.read_line() {
            Err(PortError::ConnectionLost { port, .. }) => assert_eq!(port, "pty"),
            other => panic!("expected ConnectionLost, got {:?}", other),
        }
        assert!(!manager.is_connected());
        assert_eq!(manager.port_name(), None);
        assert!(matches!(manager.read_line(), Err(PortError::NotConnected)));
    }
}
