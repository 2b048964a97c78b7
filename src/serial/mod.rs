//! Serial link to the sensor controller.
//!
//! The core only sees the [`LineSource`] trait: poll for a connection, poll
//! for a line, never block. [`SerialPortManager`] implements it over a real
//! device (feature `instrument_serial`); [`ScriptedPort`] replays a fixed
//! script for tests and offline runs.

#[cfg(feature = "instrument_serial")]
pub mod port;
pub mod scripted;

#[cfg(feature = "instrument_serial")]
pub use port::SerialPortManager;
pub use scripted::{ScriptStep, ScriptedPort};

use thiserror::Error;

/// Serial failures. A read timeout is not one of them: it is `Ok(None)`.
#[derive(Error, Debug)]
pub enum PortError {
    /// No device is open.
    #[error("Serial port not connected")]
    NotConnected,

    /// A read failed or hit end of stream. The port is closed afterwards.
    #[error("Lost connection to serial port '{port}': {source}")]
    ConnectionLost {
        /// Device name.
        port: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A device was found but could not be opened.
    #[error("Failed to open serial port '{port}' at {baud_rate} baud: {message}")]
    Open {
        /// Device name.
        port: String,
        /// Requested baud rate.
        baud_rate: u32,
        /// Driver message.
        message: String,
    },

    /// Listing available devices failed.
    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(String),
}

/// Non-blocking source of text lines from the controller.
pub trait LineSource {
    /// Whether a device is currently open.
    fn is_connected(&self) -> bool;

    /// Make sure a device is open: keep the current one if it is still
    /// present, otherwise open an available one. Finding no device is not an
    /// error. Returns whether a device is open afterwards.
    fn try_connect(&mut self) -> bool;

    /// Next complete line without its terminator, `Ok(None)` when nothing
    /// arrived within the read timeout. On [`PortError::ConnectionLost`] the
    /// device has been closed and [`try_connect`](Self::try_connect) must be
    /// called again.
    fn read_line(&mut self) -> Result<Option<String>, PortError>;
}

/// Longest line kept while waiting for its terminator.
pub const MAX_LINE_LEN: usize = 256;

/// What [`LineBuffer::next_line`] found in the buffered bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Buffered {
    /// A complete line, terminator removed.
    Line(String),
    /// An overlong line was dropped; carries the number of bytes discarded.
    Overflow(usize),
    /// No complete line yet.
    Partial,
}

/// Bytes received but not yet handed out as lines.
///
/// A line longer than [`MAX_LINE_LEN`] is dropped as a whole: once the limit
/// is hit, everything up to and including the next `\n` is discarded, so the
/// tail of the garbage never shows up as a line of its own.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Forget everything, e.g. after a reconnect.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.discarding = false;
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Hand out the next complete line, if any.
    pub fn next_line(&mut self) -> Buffered {
        if self.discarding {
            match newline(&self.pending) {
                Some(end) => {
                    self.pending.drain(..=end);
                    self.discarding = false;
                }
                None => {
                    self.pending.clear();
                    return Buffered::Partial;
                }
            }
        }

        match newline(&self.pending) {
            Some(end) if end <= MAX_LINE_LEN => match take_line(&mut self.pending) {
                Some(line) => Buffered::Line(line),
                None => Buffered::Partial,
            },
            Some(end) => {
                self.pending.drain(..=end);
                Buffered::Overflow(end)
            }
            None if self.pending.len() > MAX_LINE_LEN => {
                let dropped = self.pending.len();
                self.pending.clear();
                self.discarding = true;
                Buffered::Overflow(dropped)
            }
            None => Buffered::Partial,
        }
    }
}

fn newline(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == b'\n')
}

/// Split the first complete line off `pending`, dropping `\r\n`.
pub fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.iter().position(|&b| b == b'\n')?;
    let raw: Vec<u8> = pending.drain(..=end).collect();
    let line = String::from_utf8_lossy(&raw);
    Some(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}
