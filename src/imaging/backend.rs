//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the ingest
//! pipeline needs: a cheap header read, a full decode, and a render
//! (optional resize + encode).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests substitute the recording `MockBackend` below.

use super::params::RenderParams;
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// A decoded first frame with orientation already applied to the pixels.
///
/// `exif` is the raw TIFF-structured EXIF block from the source with its
/// orientation tag rewritten to "normal"; `icc_profile` is the embedded
/// colour profile. Both are only written back when metadata is kept.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: DynamicImage,
    pub exif: Option<Vec<u8>>,
    pub icc_profile: Option<Vec<u8>>,
}

impl SourceImage {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.pixels.width(), self.pixels.height())
    }
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Read dimensions from the file header without decoding pixels.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the first frame and bake the embedded orientation into the pixels.
    fn decode(&self, path: &Path) -> Result<SourceImage, BackendError>;

    /// Resize (when `params.target` differs from the source) and encode.
    fn render(&self, source: &SourceImage, params: &RenderParams) -> Result<Vec<u8>, BackendError>;
}
