//! In-memory video backend
//!
//! Provides clips with a fixed number of generated frames for testing the
//! playback engine and running the installation without video files.
//! Every frame carries its own index in its first eight bytes (little
//! endian, rest black), see [`frame_index`].

use std::collections::HashMap;
use std::path::PathBuf;

use super::backend::{SourceError, VideoBackend, VideoStream};
use super::frame::{rgb_len, Frame};

/// Shape of a synthetic clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipSpec {
    /// Number of decodable frames.
    pub frames: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Whether the clip reports its length up front, like most containers do.
    pub reports_length: bool,
}

impl ClipSpec {
    /// A clip that reports its length.
    pub fn new(frames: u64, width: u32, height: u32) -> Self {
        Self {
            frames,
            width,
            height,
            reports_length: true,
        }
    }

    /// Clip whose length is only discovered by reading to the end.
    pub fn without_length(mut self) -> Self {
        self.reports_length = false;
        self
    }
}

/// Backend serving registered clips by identifier.
#[derive(Debug, Clone, Default)]
pub struct SyntheticBackend {
    clips: HashMap<String, ClipSpec>,
}

impl SyntheticBackend {
    /// Backend with no clips.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip, builder style.
    pub fn with_clip(mut self, video_id: impl Into<String>, spec: ClipSpec) -> Self {
        self.insert(video_id, spec);
        self
    }

    /// Add or replace a clip.
    pub fn insert(&mut self, video_id: impl Into<String>, spec: ClipSpec) {
        self.clips.insert(video_id.into(), spec);
    }
}

impl VideoBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&self, video_id: &str) -> Result<Box<dyn VideoStream>, SourceError> {
        let spec = self
            .clips
            .get(video_id)
            .copied()
            .ok_or_else(|| SourceError::Missing(PathBuf::from(video_id)))?;
        if rgb_len(spec.width, spec.height) < 8 {
            return Err(SourceError::OpenFailed {
                id: video_id.to_string(),
                message: "clip too small to carry a frame index".to_string(),
            });
        }
        Ok(Box::new(SyntheticStream { spec, position: 0 }))
    }
}

struct SyntheticStream {
    spec: ClipSpec,
    position: u64,
}

impl VideoStream for SyntheticStream {
    fn dimensions(&self) -> (u32, u32) {
        (self.spec.width, self.spec.height)
    }

    fn frame_count(&self) -> Option<u64> {
        self.spec.reports_length.then_some(self.spec.frames)
    }

    fn seek(&mut self, frame: u64) -> Result<(), SourceError> {
        if frame > self.spec.frames {
            return Err(SourceError::Seek {
                frame,
                message: format!("clip has {} frames", self.spec.frames),
            });
        }
        self.position = frame;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.position >= self.spec.frames {
            return Ok(None);
        }
        let mut pixels = vec![0u8; rgb_len(self.spec.width, self.spec.height)];
        pixels[..8].copy_from_slice(&self.position.to_le_bytes());
        self.position += 1;
        Frame::from_rgb(self.spec.width, self.spec.height, pixels)
            .map(Some)
            .ok_or_else(|| SourceError::Decode("frame size mismatch".to_string()))
    }
}

/// Index stamped into a synthetic frame, `None` for a blank frame.
pub fn frame_index(frame: &Frame) -> Option<u64> {
    if frame.is_blank() {
        return None;
    }
    let bytes: [u8; 8] = frame.pixels().get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}
