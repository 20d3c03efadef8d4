//! Image loader (JPG / PNG via the `image` crate)
//!
//! Runs on worker threads. Missing files are reported as
//! `FrameError::NotFound` before the decoder is touched so the UI can name
//! the missing path instead of a decoder message.

use log::debug;
use std::path::Path;

use super::frame::{Frame, FrameError};

/// Image loader
pub struct Loader;

impl Loader {
    /// Load complete image file into an RGBA8 Frame
    pub fn load(path: &Path) -> Result<Frame, FrameError> {
        if path.as_os_str().is_empty() {
            return Err(FrameError::NoFilename);
        }
        if !path.exists() {
            return Err(FrameError::NotFound(path.to_path_buf()));
        }

        debug!("Loading image: {}", path.display());

        let reader = image::ImageReader::open(path).map_err(|e| FrameError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let reader = reader
            .with_guessed_format()
            .map_err(|e| FrameError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
        let img = reader
            .decode()
            .map_err(|e| FrameError::Image(format!("{}: {}", path.display(), e)))?;

        let width = img.width() as usize;
        let height = img.height() as usize;
        let pixels = img.to_rgba8().into_raw();

        Frame::from_rgba8(width, height, pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Loader::load(&dir.path().join("0001.jpg")).unwrap_err();
        assert!(matches!(err, FrameError::NotFound(_)));
    }

    #[test]
    fn test_empty_path() {
        let err = Loader::load(Path::new("")).unwrap_err();
        assert!(matches!(err, FrameError::NoFilename));
    }

    #[test]
    fn test_load_png_as_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0007.png");
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 40]));
        img.save(&path).unwrap();

        let frame = Loader::load(&path).unwrap();
        assert_eq!(frame.resolution(), (3, 2));
        assert_eq!(frame.pixel(2, 1), [10, 20, 30, 40]);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let err = Loader::load(&path).unwrap_err();
        assert!(!err.is_not_found());
    }
}
