//! Upload validation.
//!
//! Everything here is read-only: an upload is checked against the
//! [`Policy`] before a single byte of it is hashed, decoded or written.
//!
//! ## Check order
//!
//! 1. Transport status reported by whatever received the upload.
//! 2. Claimed size (empty, or over `max_bytes`), before any file I/O.
//! 3. MIME type sniffed from the leading bytes; only JPEG, PNG and GIF map
//!    to a canonical extension.
//! 4. Canonical extension against the policy allow-list.
//! 5. Claimed filename extension against the canonical one (`jpeg` = `jpg`).
//!    A mismatch is rejected, never silently corrected.
//! 6. Header read of the dimensions.

use crate::config::Policy;
use crate::imaging::{CanonicalFormat, Dimensions, ImageBackend, get_dimensions, normalize_extension};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Bytes read for format sniffing. Enough for every signature `image` knows.
const SNIFF_LEN: u64 = 64;

/// Outcome of the transfer, as reported by the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    #[default]
    Ok,
    /// The transport's own size limit was hit.
    SizeExceeded,
    /// Only part of the file arrived.
    Partial,
    /// No file was sent.
    NoFile,
    /// The receiving side could not store the temporary file.
    ServerStorage,
}

impl TransportStatus {
    /// Map the conventional numeric upload status codes.
    ///
    /// `0` ok, `1`/`2` size limit, `3` partial, `4` no file, `6`/`7`/`8`
    /// temporary storage failures. Unknown codes count as storage failures.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 | 2 => Self::SizeExceeded,
            3 => Self::Partial,
            4 => Self::NoFile,
            _ => Self::ServerStorage,
        }
    }
}

/// One uploaded file waiting to be ingested. The caller owns `temp_path`;
/// it is only ever read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub temp_path: PathBuf,
    pub claimed_filename: String,
    pub claimed_size: i64,
    pub status: TransportStatus,
}

impl UploadRequest {
    /// A successfully transferred upload.
    pub fn new(
        temp_path: impl Into<PathBuf>,
        claimed_filename: impl Into<String>,
        claimed_size: i64,
    ) -> Self {
        Self {
            temp_path: temp_path.into(),
            claimed_filename: claimed_filename.into(),
            claimed_size,
            status: TransportStatus::Ok,
        }
    }

    pub fn with_status(mut self, status: TransportStatus) -> Self {
        self.status = status;
        self
    }
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("The uploaded file exceeds the maximum size allowed by the server")]
    TransportSizeExceeded,
    #[error("The file was only partially uploaded")]
    PartialUpload,
    #[error("No file was uploaded")]
    NoFile,
    #[error("The server could not store the uploaded file")]
    ServerStorage,
    #[error("The uploaded file is empty")]
    Empty,
    #[error("The uploaded file is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },
    #[error("The uploaded file could not be read: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("File type .{0} is not allowed")]
    DisallowedExtension(String),
    #[error("File extension .{claimed} does not match the detected type .{detected}")]
    ExtensionMismatch { claimed: String, detected: String },
    #[error("Could not read image dimensions: {0}")]
    Dimensions(String),
}

/// An upload that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub source: PathBuf,
    pub format: CanonicalFormat,
    /// Header dimensions, before orientation is applied.
    pub dimensions: Dimensions,
    pub byte_size: u64,
    /// Base name of the claimed filename, safe to display and persist.
    pub original_filename: String,
}

/// Check an upload against `policy`.
pub fn validate(
    backend: &impl ImageBackend,
    request: &UploadRequest,
    policy: &Policy,
) -> Result<ValidatedUpload, ValidationError> {
    match request.status {
        TransportStatus::Ok => {}
        TransportStatus::SizeExceeded => return Err(ValidationError::TransportSizeExceeded),
        TransportStatus::Partial => return Err(ValidationError::PartialUpload),
        TransportStatus::NoFile => return Err(ValidationError::NoFile),
        TransportStatus::ServerStorage => return Err(ValidationError::ServerStorage),
    }

    if request.claimed_size <= 0 {
        return Err(ValidationError::Empty);
    }
    let size = request.claimed_size as u64;
    if policy.max_bytes > 0 && size > policy.max_bytes {
        return Err(ValidationError::TooLarge {
            size,
            max: policy.max_bytes,
        });
    }

    let format = sniff_format(&request.temp_path)?;

    if !policy.allows(format) {
        return Err(ValidationError::DisallowedExtension(
            format.extension().to_string(),
        ));
    }

    let claimed = claimed_extension(&request.claimed_filename);
    if !claimed.is_empty() && claimed != format.extension() {
        return Err(ValidationError::ExtensionMismatch {
            claimed,
            detected: format.extension().to_string(),
        });
    }

    let (width, height) = get_dimensions(backend, &request.temp_path)
        .map_err(|e| ValidationError::Dimensions(e.to_string()))?;

    Ok(ValidatedUpload {
        source: request.temp_path.clone(),
        format,
        dimensions: Dimensions::new(width, height),
        byte_size: size,
        original_filename: display_filename(&request.claimed_filename, format),
    })
}

/// Detect the format from the file's leading bytes.
pub fn sniff_format(path: &Path) -> Result<CanonicalFormat, ValidationError> {
    let mut header = Vec::with_capacity(SNIFF_LEN as usize);
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut header)?;

    let detected = image::guess_format(&header)
        .map_err(|_| ValidationError::UnsupportedType("application/octet-stream".to_string()))?;
    let mime = detected.to_mime_type();
    CanonicalFormat::from_mime(mime).ok_or_else(|| ValidationError::UnsupportedType(mime.to_string()))
}

/// Normalized extension of the claimed filename, or empty.
fn claimed_extension(filename: &str) -> String {
    base_name(filename)
        .rsplit_once('.')
        .map(|(_, ext)| normalize_extension(ext))
        .unwrap_or_default()
}

/// Strip any directory part, accepting both separators.
fn base_name(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim()
}

/// The claimed base name, or a generic name when nothing usable was sent.
fn display_filename(filename: &str, format: CanonicalFormat) -> String {
    let name: String = base_name(filename)
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect();
    if name.is_empty() || name == "." || name == ".." {
        format!("upload.{}", format.extension())
    } else {
        name
    }
}
