//! Decoded RGBA8 frame.
//!
//! **Why**: Buffer slots, the LRU cache and the render step all share decoded
//! images; `Frame` is immutable after decode and passed around as `Arc<Frame>`.
//!
//! JPG and PNG are the only formats the comparison pipeline writes, so every
//! frame is normalised to 8-bit RGBA (4 bytes/pixel) at decode time.

use std::path::PathBuf;
use thiserror::Error;

/// Frame loading / construction errors
#[derive(Debug, Error)]
pub enum FrameError {
    /// File does not exist on disk
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// File exists but could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Decoder rejected the data
    #[error("image error: {0}")]
    Image(String),
    /// Pixel buffer does not match the declared resolution
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    /// Locator carries no path (empty base path)
    #[error("no filename set")]
    NoFilename,
}

impl FrameError {
    /// True when the failure means "the file is not there"
    pub fn is_not_found(&self) -> bool {
        match self {
            FrameError::NotFound(_) | FrameError::NoFilename => true,
            FrameError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Single decoded image (RGBA8, row-major, no padding)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Frame {
    /// Create frame filled with a dark green placeholder
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, [0, 100, 0, 255])
    }

    /// Create frame filled with one RGBA colour
    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let mut pixels = vec![0u8; width * height * 4];
        for px in pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Self { width, height, pixels }
    }

    /// Wrap an existing RGBA8 buffer
    pub fn from_rgba8(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width * height * 4;
        if pixels.len() != expected {
            return Err(FrameError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    /// (width, height)
    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGBA8 bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory footprint of pixel data in bytes
    pub fn mem(&self) -> usize {
        self.pixels.len()
    }

    /// RGBA at (x, y). Out-of-range coordinates are clamped to the edge.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        if self.width == 0 || self.height == 0 {
            return [0, 0, 0, 0];
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let idx = (y * self.width + x) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Nearest-neighbour sample at (x, y) of a `target_w` x `target_h` grid.
    ///
    /// Used when a mask and its base image differ in resolution.
    pub fn sample_scaled(&self, x: usize, y: usize, target_w: usize, target_h: usize) -> [u8; 4] {
        if target_w == self.width && target_h == self.height {
            return self.pixel(x, y);
        }
        let sx = if target_w == 0 { 0 } else { x * self.width / target_w };
        let sy = if target_h == 0 { 0 } else { y * self.height / target_h };
        self.pixel(sx, sy)
    }
}
