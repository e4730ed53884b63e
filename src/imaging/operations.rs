//! High-level image operations.
//!
//! These functions combine calculations with backend execution: decode the
//! upload once, plan every variant from the decoded size, then render the
//! original and each variant in turn.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::calculate_contain_dimensions;
use super::params::{CanonicalFormat, Quality, RenderParams, VariantSpec};
use std::collections::BTreeMap;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// One planned variant: its key and the exact output size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPlan {
    pub key: String,
    pub target: Dimensions,
}

/// Plan every configured variant against the decoded source size.
pub fn plan_variants(source: Dimensions, variants: &BTreeMap<String, VariantSpec>) -> Vec<VariantPlan> {
    variants
        .iter()
        .map(|(key, spec)| VariantPlan {
            key: key.clone(),
            target: calculate_contain_dimensions(source.as_tuple(), (spec.width, spec.height))
                .into(),
        })
        .collect()
}

/// An encoded rendition ready to be written.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Output of [`transcode`]: the canonical original plus one rendition per variant key.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub format: CanonicalFormat,
    pub original: EncodedImage,
    pub variants: Vec<(String, EncodedImage)>,
}

/// Decode `source` and render the original and every variant.
///
/// The first failing step aborts the remaining renders.
pub fn transcode(
    backend: &impl ImageBackend,
    source: &Path,
    format: CanonicalFormat,
    variants: &BTreeMap<String, VariantSpec>,
    strip_metadata: bool,
) -> Result<Transcoded> {
    let decoded = backend.decode(source)?;
    let dims = decoded.dimensions();
    let quality = Quality::default();
    let keep_metadata = !strip_metadata;

    let original = EncodedImage {
        bytes: backend.render(
            &decoded,
            &RenderParams {
                target: dims,
                format,
                quality,
                keep_metadata,
            },
        )?,
        width: dims.width,
        height: dims.height,
    };

    let mut rendered = Vec::with_capacity(variants.len());
    for VariantPlan { key, target } in plan_variants(dims, variants) {
        let bytes = backend.render(
            &decoded,
            &RenderParams {
                target,
                format,
                quality,
                keep_metadata,
            },
        )?;
        tracing::debug!(
            variant = %key,
            width = target.width,
            height = target.height,
            bytes = bytes.len(),
            "rendered variant"
        );
        rendered.push((
            key,
            EncodedImage {
                bytes,
                width: target.width,
                height: target.height,
            },
        ));
    }

    Ok(Transcoded {
        format,
        original,
        variants: rendered,
    })
}
