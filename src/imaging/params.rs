//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They sit between the
//! high-level [`operations`](super::operations) module (which decides which
//! renditions an upload gets) and the [`backend`](super::backend) (which does
//! the pixel work), so a mock backend can stand in during tests.
//!
//! ## Types
//!
//! - [`CanonicalFormat`]: the three accepted formats, with their MIME type and stored extension.
//! - [`Quality`]: Lossy encoding quality (1–100, default 85). Clamped on construction.
//! - [`VariantSpec`]: Configured maxima for one variant key; `0` on an axis means "auto".
//! - [`RenderParams`]: Full specification for one output file: size, format, quality, metadata.

use super::backend::Dimensions;
use serde::{Deserialize, Serialize};

/// Formats accepted on ingest. The stored file always uses the same format
/// as the sniffed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalFormat {
    Jpeg,
    Png,
    Gif,
}

impl CanonicalFormat {
    pub const ALL: [CanonicalFormat; 3] = [Self::Jpeg, Self::Png, Self::Gif];

    /// Map a sniffed MIME type. Anything outside the three accepted types is `None`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Map a file extension, case-insensitively. `jpeg` is folded into `jpg`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match normalize_extension(ext).as_str() {
            "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }

    /// Whether the format carries EXIF/ICC segments we can re-attach.
    pub fn supports_metadata(self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }
}

/// Lowercase, trim and fold `jpeg` into `jpg`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext == "jpeg" { "jpg".to_string() } else { ext }
}

/// Quality setting for lossy image encoding (1-100).
///
/// Only constructible through [`Quality::new`], so the value always fits the
/// JPEG encoder's `u8` quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        // Clamped to 1..=100, the cast cannot truncate
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u32 {
        u32::from(self.0)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Maxima for one variant key.
///
/// `0` on an axis means "derive from the other axis"; `0` on both keeps the
/// source size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariantSpec {
    pub width: u32,
    pub height: u32,
}

impl VariantSpec {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Parameters for rendering one output file from a decoded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    /// Exact output size. Equal to the source size means "no resize".
    pub target: Dimensions,
    pub format: CanonicalFormat,
    pub quality: Quality,
    /// Re-attach the source's EXIF (orientation reset) and ICC profile.
    pub keep_metadata: bool,
}
