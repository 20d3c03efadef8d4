//! Path resolver: (base path, frame number, variant) -> image locator.
//!
//! The only on-disk convention the viewer relies on:
//!
//! ```text
//! <base><frame zero-padded to 4 digits>.<ext>
//! /results/cam03/orig/0007.jpg
//! /results/cam03/alpha/1234.png
//! ```
//!
//! `resolve()` is pure and total. A bad base path still produces a locator;
//! the failure surfaces later through the normal load-failure path. An empty
//! base path produces an *empty* locator, which buffer slots never swap in.

use std::fmt;
use std::path::Path;

use crate::entities::VariantKind;

/// Minimum width of the frame number in file names
pub const FRAME_PADDING: usize = 4;

/// Opaque, deterministic identifier of one image file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageLocator {
    path: String,
    frame: i32,
    kind: VariantKind,
}

impl ImageLocator {
    /// Normalised file path ('/' separators, no scheme)
    pub fn path(&self) -> &Path {
        Path::new(&self.path)
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Frame number this locator was resolved for
    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    /// True when the base path was empty (nothing to load)
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Display for ImageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<no {} path>", self.kind)
        } else {
            f.write_str(&self.path)
        }
    }
}

/// Strip `file://` schemes and convert separators to '/'
pub fn normalize_base(base: &str) -> String {
    let trimmed = base.trim();
    let without_scheme = trimmed
        .strip_prefix("file://")
        .unwrap_or(trimmed);
    let mut normalized = without_scheme.replace('\\', "/");

    // "file:///C:/renders" leaves "/C:/renders": drop the slash before a drive letter
    let bytes = normalized.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        normalized.remove(0);
    }
    normalized
}

/// Zero-padded frame number, e.g. 7 -> "0007"
pub fn pad_frame(frame: i32) -> String {
    format!("{:0width$}", frame, width = FRAME_PADDING)
}

/// Resolve the locator for one frame of one variant
pub fn resolve(base_path: &str, frame: i32, kind: VariantKind) -> ImageLocator {
    let base = normalize_base(base_path);
    let path = if base.is_empty() {
        String::new()
    } else {
        format!("{}{}.{}", base, pad_frame(frame), kind.extension())
    };
    ImageLocator { path, frame, kind }
}

/// Parse the padded frame digits back out of a locator's file name
pub fn frame_number(locator: &ImageLocator) -> Option<i32> {
    let stem = locator.path().file_stem()?.to_str()?;
    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    stem[digits_start..].parse().ok()
}
