//! Decoded frames.

use std::sync::Arc;

/// Packed RGB24 image handed to the renderer.
///
/// Pixel data is shared, so cloning a frame to keep it as "currently
/// presented" does not copy the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Frame {
    /// Wrap RGB24 pixel data. Returns `None` if the buffer size does not match.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == rgb_len(width, height)).then(|| Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Solid white frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![u8::MAX; rgb_len(width, height)].into(),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major RGB24 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// True if every byte is white.
    pub fn is_blank(&self) -> bool {
        self.pixels.iter().all(|&b| b == u8::MAX)
    }
}

/// Byte length of an RGB24 image.
pub fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_white() {
        let frame = Frame::blank(4, 2);
        assert_eq!(frame.pixels().len(), 24);
        assert!(frame.is_blank());
    }

    #[test]
    fn test_from_rgb_checks_size() {
        assert!(Frame::from_rgb(2, 2, vec![0; 12]).is_some());
        assert!(Frame::from_rgb(2, 2, vec![0; 11]).is_none());
    }
}
