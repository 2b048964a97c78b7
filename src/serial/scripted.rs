//! Scripted line source
//!
//! Replays a queue of lines, timeouts and disconnects without hardware.
//! Used by tests and when the binary runs without a serial device.

use std::collections::VecDeque;
use std::io;

use super::{LineSource, PortError};

/// One scripted read outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// A complete line arrives.
    Line(String),
    /// Nothing arrives within the timeout.
    Timeout,
    /// The device disappears.
    Disconnect,
}

/// In-memory [`LineSource`].
#[derive(Debug, Clone)]
pub struct ScriptedPort {
    steps: VecDeque<ScriptStep>,
    present: bool,
    connected: bool,
    connects: usize,
}

impl Default for ScriptedPort {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPort {
    /// Empty script with a device present.
    pub fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            present: true,
            connected: false,
            connects: 0,
        }
    }

    /// Source that never finds a device.
    pub fn offline() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    /// Queue a line, builder style.
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.push(ScriptStep::Line(line.into()));
        self
    }

    /// Queue a timeout, builder style.
    pub fn timeout(mut self) -> Self {
        self.push(ScriptStep::Timeout);
        self
    }

    /// Queue a disconnect, builder style.
    pub fn disconnect(mut self) -> Self {
        self.push(ScriptStep::Disconnect);
        self
    }

    /// Append a step to the script.
    pub fn push(&mut self, step: ScriptStep) {
        self.steps.push_back(step);
    }

    /// Plug or unplug the simulated device.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
        if !present {
            self.connected = false;
        }
    }

    /// Number of successful connections so far.
    pub fn connects(&self) -> usize {
        self.connects
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl LineSource for ScriptedPort {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn try_connect(&mut self) -> bool {
        if self.present && !self.connected {
            self.connected = true;
            self.connects += 1;
        }
        self.connected
    }

    fn read_line(&mut self) -> Result<Option<String>, PortError> {
        if !self.connected {
            return Err(PortError::NotConnected);
        }
        match self.steps.pop_front() {
            Some(ScriptStep::Line(line)) => Ok(Some(line)),
            Some(ScriptStep::Timeout) | None => Ok(None),
            Some(ScriptStep::Disconnect) => {
                self.connected = false;
                Err(PortError::ConnectionLost {
                    port: "scripted".to_string(),
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_replays_in_order() {
        let mut port = ScriptedPort::new().line("Photo: 1").timeout().disconnect();
        assert!(matches!(port.read_line(), Err(PortError::NotConnected)));
        assert!(port.try_connect());
        assert_eq!(port.read_line().unwrap().as_deref(), Some("Photo: 1"));
        assert_eq!(port.read_line().unwrap(), None);
        assert!(matches!(port.read_line(), Err(PortError::ConnectionLost { .. })));
        assert!(!port.is_connected());
        assert!(port.try_connect());
        assert_eq!(port.connects(), 2);
    }

    #[test]
    fn test_offline_never_connects() {
        let mut port = ScriptedPort::offline();
        assert!(!port.try_connect());
    }
}
