//! Gallery configuration module.
//!
//! Handles loading and validating `gallery.toml` and turning its `[policy]`
//! table into the immutable [`Policy`] value every upload is checked against.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! upload_root = "uploads"              # Owner directories live under here
//! index_file = ".gallery-index.json"   # Asset index, relative to upload_root
//!
//! [policy]
//! allowed_extensions = "jpg,png,gif"   # Canonical extensions accepted
//! max_filesize_kb = 10240              # 0 = unlimited
//! strip_exif = true                    # Drop EXIF/ICC after baking orientation
//!
//! [policy.variants.sm]
//! width = 400                          # 0 = auto (keep aspect)
//! height = 400                         # both 0 = keep source size
//!
//! [policy.variants.md]
//! width = 1024
//! height = 1024
//!
//! [policy.variants.lg]
//! width = 2048
//! height = 2048
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. A
//! `[policy.variants]` table, when present, replaces the default variant set
//! as a whole. Unknown keys are rejected to catch typos early.

use crate::imaging::{CanonicalFormat, VariantSpec, normalize_extension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration loaded from `gallery.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Root directory for all stored files.
    pub upload_root: PathBuf,
    /// Asset index file name, relative to `upload_root`.
    pub index_file: String,
    /// Upload policy.
    pub policy: PolicyConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            index_file: ".gallery-index.json".to_string(),
            policy: PolicyConfig::default(),
        }
    }
}

impl GalleryConfig {
    /// Location of the asset index.
    pub fn index_path(&self) -> PathBuf {
        self.upload_root.join(&self.index_file)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut components = Path::new(&self.index_file).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(ConfigError::Validation(
                "index_file must be a plain file name".into(),
            ));
        }
        if self.index_file.chars().all(|c| c.is_ascii_digit()) {
            // Would collide with an owner directory
            return Err(ConfigError::Validation(
                "index_file must not be a bare number".into(),
            ));
        }
        self.policy.to_policy().map(|_| ())
    }
}

/// The `[policy]` table as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Comma-separated canonical extensions, e.g. `"jpg,png,gif"`.
    pub allowed_extensions: String,
    /// Maximum upload size in KiB. `0` disables the limit.
    pub max_filesize_kb: u64,
    /// Remove EXIF/ICC metadata from stored files.
    pub strip_exif: bool,
    /// Variant key → maxima.
    pub variants: BTreeMap<String, VariantSpec>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: "jpg,png,gif".to_string(),
            max_filesize_kb: 10 * 1024,
            strip_exif: true,
            variants: default_variants(),
        }
    }
}

fn default_variants() -> BTreeMap<String, VariantSpec> {
    BTreeMap::from([
        ("sm".to_string(), VariantSpec::new(400, 400)),
        ("md".to_string(), VariantSpec::new(1024, 1024)),
        ("lg".to_string(), VariantSpec::new(2048, 2048)),
    ])
}

impl PolicyConfig {
    /// Validate and convert into the runtime [`Policy`].
    pub fn to_policy(&self) -> Result<Policy, ConfigError> {
        let mut allowed = BTreeSet::new();
        for raw in self.allowed_extensions.split(',') {
            let ext = normalize_extension(raw);
            if ext.is_empty() {
                continue;
            }
            if CanonicalFormat::from_extension(&ext).is_none() {
                return Err(ConfigError::Validation(format!(
                    "policy.allowed_extensions: unsupported extension '{ext}' (expected jpg, png or gif)"
                )));
            }
            allowed.insert(ext);
        }
        if allowed.is_empty() {
            return Err(ConfigError::Validation(
                "policy.allowed_extensions must list at least one extension".into(),
            ));
        }

        if self.variants.is_empty() {
            return Err(ConfigError::Validation(
                "policy.variants must define at least one variant".into(),
            ));
        }
        for key in self.variants.keys() {
            if !is_valid_variant_key(key) {
                return Err(ConfigError::Validation(format!(
                    "policy.variants: invalid key '{key}' (use letters, digits, '-' or '_')"
                )));
            }
        }

        Ok(Policy {
            max_bytes: self.max_filesize_kb.saturating_mul(1024),
            allowed_extensions: allowed,
            strip_metadata: self.strip_exif,
            variants: self.variants.clone(),
        })
    }
}

/// Variant keys become part of stored file names.
fn is_valid_variant_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 32
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Upload policy, immutable for the duration of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Byte cap on the claimed upload size. `0` = unlimited.
    pub max_bytes: u64,
    /// Normalized canonical extensions (`jpg`, `png`, `gif`).
    pub allowed_extensions: BTreeSet<String>,
    /// Drop EXIF/ICC from every stored file.
    pub strip_metadata: bool,
    /// Variant key → maxima. Every asset gets exactly this set.
    pub variants: BTreeMap<String, VariantSpec>,
}

impl Policy {
    pub fn allows(&self, format: CanonicalFormat) -> bool {
        self.allowed_extensions.contains(format.extension())
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_bytes: PolicyConfig::default().max_filesize_kb * 1024,
            allowed_extensions: CanonicalFormat::ALL
                .iter()
                .map(|f| f.extension().to_string())
                .collect(),
            strip_metadata: true,
            variants: default_variants(),
        }
    }
}

/// Load config from a `gallery.toml` path.
///
/// A missing file yields the stock defaults. Unknown keys are rejected and
/// the result is validated.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    if !path.exists() {
        return Ok(GalleryConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<GalleryConfig, ConfigError> {
    let config: GalleryConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `gallery.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Gallery ingest configuration
# ============================
#
# Every key is optional; the values below are the defaults.

# Directory under which one sub-directory per owner is created.
upload_root = "uploads"

# Asset index (JSON), stored inside upload_root.
index_file = ".gallery-index.json"

[policy]
# Canonical extensions accepted after sniffing the file's bytes.
# Only jpg, png and gif are supported; "jpeg" is read as "jpg".
allowed_extensions = "jpg,png,gif"

# Upload size cap in KiB, checked before the file is read. 0 = unlimited.
max_filesize_kb = 10240

# Remove EXIF, XMP and ICC data from stored files. Orientation is always
# applied to the pixels first.
strip_exif = true

# Downscaled variants, written next to the original as {token}_{key}.{ext}.
# Images are fitted inside width x height and never upscaled.
# 0 on one axis = follow the aspect ratio; 0 on both = keep source size.
# Defining this table replaces the whole default set.
[policy.variants.sm]
width = 400
height = 400

[policy.variants.md]
width = 1024
height = 1024

[policy.variants.lg]
width = 2048
height = 2048
"##
}
