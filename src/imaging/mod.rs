//! Image processing in pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Decode** | `image` decoders, first frame, EXIF orientation applied |
//! | **Resize** | Lanczos3, contain-fit, never upscaled |
//! | **Encode** | JPEG q85 / PNG / GIF in the upload's own format |
//! | **Metadata** | orientation reset + `img-parts` re-attachment, or stripped |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
mod exif;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, SourceImage};
pub use calculations::calculate_contain_dimensions;
pub use operations::{
    EncodedImage, Transcoded, VariantPlan, get_dimensions, plan_variants, transcode,
};
pub use params::{CanonicalFormat, Quality, RenderParams, VariantSpec, normalize_extension};
pub use rust_backend::RustBackend;
