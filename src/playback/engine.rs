//! Video playback engine.
//!
//! Owns at most one open source and the frame currently presented to the
//! renderer. The render loop calls [`PlaybackEngine::advance_frame`] once per
//! tick and draws whatever it returns; the engine never draws itself.
//!
//! ## Source switching
//!
//! [`open`](PlaybackEngine::open) fully opens and positions the new source
//! before the old one is dropped, so a tick never sees a half-replaced source.
//! With `preserve_cursor` the new source starts at the frame index the old one
//! had reached, which makes sensor-driven switches between videos of equal
//! length continue at the same moment instead of restarting.
//!
//! ## Looping
//!
//! After presenting the last frame of a looping source the stream is rewound
//! immediately, so the next tick reads frame 0 and no blank frame appears.
//! If a stream ends before the frame count it reported (or reports none),
//! the tick that hits end of stream presents one blank frame and rewinds.
//! A stream that ends before its first frame is dropped as undecodable.

use tracing::{debug, info, warn};

use super::backend::{SourceError, VideoBackend, VideoStream};
use super::frame::Frame;

/// Cursor value reported while no source is open.
pub const CLOSED_CURSOR: i64 = -1;

/// Coarse engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Nothing open, presenting blank.
    Closed,
    /// A source is open and producing frames.
    Playing,
    /// A non-looping source reached its end and is held open, presenting blank.
    Ended,
}

struct OpenSource {
    video_id: String,
    stream: Box<dyn VideoStream>,
    cursor: u64,
    looping: bool,
    ended: bool,
}

enum Step {
    Frame(Frame),
    Blank,
    Failed(SourceError),
}

impl OpenSource {
    fn step(&mut self) -> Step {
        match self.stream.read_frame() {
            Ok(Some(frame)) => {
                self.cursor += 1;
                if self.stream.frame_count() == Some(self.cursor) {
                    if let Err(err) = self.wrap_or_end() {
                        return Step::Failed(err);
                    }
                }
                Step::Frame(frame)
            }
            Ok(None) if self.cursor == 0 => Step::Failed(SourceError::Decode(format!(
                "'{}' produced no frames",
                self.video_id
            ))),
            Ok(None) => match self.wrap_or_end() {
                Ok(()) => Step::Blank,
                Err(err) => Step::Failed(err),
            },
            Err(err) => Step::Failed(err),
        }
    }

    fn wrap_or_end(&mut self) -> Result<(), SourceError> {
        if self.looping {
            self.stream.seek(0)?;
            self.cursor = 0;
            debug!("Looping '{}'", self.video_id);
        } else {
            self.ended = true;
            info!("Video '{}' ended", self.video_id);
        }
        Ok(())
    }
}

/// Decode/seek/loop/blank logic for the active source.
pub struct PlaybackEngine<B> {
    backend: B,
    source: Option<OpenSource>,
    blank: Frame,
    presented: Frame,
    presented_count: u64,
}

impl<B: VideoBackend> PlaybackEngine<B> {
    /// Create a closed engine. `blank_size` sizes the blank frame until a
    /// source has been opened.
    pub fn new(backend: B, blank_size: (u32, u32)) -> Self {
        let blank = Frame::blank(blank_size.0, blank_size.1);
        Self {
            backend,
            source: None,
            presented: blank.clone(),
            blank,
            presented_count: 0,
        }
    }

    /// The backend sources are opened with.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Whether a source is open.
    pub fn status(&self) -> PlaybackStatus {
        match &self.source {
            None => PlaybackStatus::Closed,
            Some(source) if source.ended => PlaybackStatus::Ended,
            Some(_) => PlaybackStatus::Playing,
        }
    }

    /// Identifier of the open source.
    pub fn video_id(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.video_id.as_str())
    }

    /// Whether the open source restarts at its end.
    pub fn is_looping(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.looping)
    }

    /// Index of the next frame to read, [`CLOSED_CURSOR`] when closed.
    pub fn cursor(&self) -> i64 {
        self.source
            .as_ref()
            .map_or(CLOSED_CURSOR, |s| i64::try_from(s.cursor).unwrap_or(i64::MAX))
    }

    /// Frame most recently presented.
    pub fn presented(&self) -> &Frame {
        &self.presented
    }

    /// Number of frames presented so far, blank ones included. Renderers use
    /// it to notice a new frame.
    pub fn presented_count(&self) -> u64 {
        self.presented_count
    }

    /// Replace the current source with `video_id`.
    ///
    /// On failure the previous source is released as well and the engine is
    /// left closed, presenting blank. The error is returned for reporting;
    /// it is never fatal.
    pub fn open(
        &mut self,
        video_id: &str,
        looping: bool,
        preserve_cursor: bool,
    ) -> Result<(), SourceError> {
        let target = if preserve_cursor {
            self.source.as_ref().map_or(0, |s| s.cursor)
        } else {
            0
        };
        info!(
            "Opening video '{}' via {} (looping: {}, start frame: {})",
            video_id,
            self.backend.name(),
            looping,
            target
        );

        let opened = self.backend.open(video_id).and_then(|mut stream| {
            let cursor = position(stream.as_mut(), target)?;
            Ok((stream, cursor))
        });
        let (stream, cursor) = match opened {
            Ok(opened) => opened,
            Err(err) => {
                warn!("Could not open video '{}': {}", video_id, err);
                self.close();
                return Err(err);
            }
        };

        let (width, height) = stream.dimensions();
        if (width, height) != (self.blank.width(), self.blank.height()) {
            self.blank = Frame::blank(width, height);
        }

        // The previous stream is dropped only now, after the new one is ready.
        self.source = Some(OpenSource {
            video_id: video_id.to_string(),
            stream,
            cursor,
            looping,
            ended: false,
        });
        Ok(())
    }

    /// Pull exactly one frame from the open source and present it.
    pub fn advance_frame(&mut self) -> &Frame {
        let step = match self.source.as_mut() {
            Some(source) if !source.ended => source.step(),
            _ => Step::Blank,
        };
        match step {
            Step::Frame(frame) => self.present(frame),
            Step::Blank => self.present_blank(),
            Step::Failed(err) => {
                if let Some(source) = self.source.take() {
                    warn!("Dropping video '{}': {}", source.video_id, err);
                }
                self.present_blank();
            }
        }
        &self.presented
    }

    /// Present a blank frame, then release the source. Safe to call when
    /// already closed.
    pub fn close(&mut self) {
        self.present_blank();
        if let Some(source) = self.source.take() {
            info!("Closed video '{}'", source.video_id);
        }
    }

    fn present(&mut self, frame: Frame) {
        self.presented = frame;
        self.presented_count += 1;
    }

    fn present_blank(&mut self) {
        self.present(self.blank.clone());
    }
}

/// Seek a freshly opened stream to `target`, clamping to 0 when the target is
/// past the end. Returns the frame the stream is positioned at.
fn position(stream: &mut dyn VideoStream, target: u64) -> Result<u64, SourceError> {
    let target = match stream.frame_count() {
        Some(count) if target >= count => {
            debug!("Start frame {} beyond {} frames, starting at 0", target, count);
            0
        }
        _ => target,
    };
    if target == 0 {
        return Ok(0);
    }
    match stream.seek(target) {
        Ok(()) => Ok(target),
        Err(err) => {
            warn!("Seek to frame {} failed ({}), starting at 0", target, err);
            stream.seek(0)?;
            Ok(0)
        }
    }
}
