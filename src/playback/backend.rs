//! Video backend seam.
//!
//! The playback engine never touches a decoder directly. It asks a
//! [`VideoBackend`] to open a source by identifier and then drives the
//! returned [`VideoStream`] one frame at a time. Dropping a stream must
//! release every resource it holds.

use std::path::PathBuf;

use thiserror::Error;

use super::frame::Frame;

/// Failure to open or decode a video source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The identifier does not resolve to a file.
    #[error("video file not found: {}", .0.display())]
    Missing(PathBuf),

    /// The decoder could not be started.
    #[error("failed to open video '{id}': {message}")]
    OpenFailed {
        /// Video identifier.
        id: String,
        /// Decoder message.
        message: String,
    },

    /// Stream properties could not be read.
    #[error("failed to probe '{}': {message}", path.display())]
    Probe {
        /// Resolved file path.
        path: PathBuf,
        /// ffprobe message.
        message: String,
    },

    /// Reading a frame failed, or the stream has no frames.
    #[error("decode error: {0}")]
    Decode(String),

    /// Positioning the stream failed.
    #[error("seek to frame {frame} failed: {message}")]
    Seek {
        /// Requested frame.
        frame: u64,
        /// Decoder message.
        message: String,
    },

    /// Talking to the decoder process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens video sources by identifier.
pub trait VideoBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Open `video_id`, positioned at frame 0.
    fn open(&self, video_id: &str) -> Result<Box<dyn VideoStream>, SourceError>;
}

/// An open, sequentially decoded video.
pub trait VideoStream {
    /// Frame width and height in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Total frames, if the container reports it.
    fn frame_count(&self) -> Option<u64>;

    /// Position the stream so the next [`read_frame`](Self::read_frame)
    /// returns frame `frame`.
    fn seek(&mut self, frame: u64) -> Result<(), SourceError>;

    /// Decode the next frame. `Ok(None)` means end of stream.
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}
