//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects. Logs go to stderr, so stdout carries
//! only these lines.
//!
//! # Output Format
//!
//! ## Upload
//!
//! ```text
//! Uploaded holiday.jpg → asset 4
//! Rejected photo.jpg (validation): File extension .jpg does not match the detected type .png
//! ```
//!
//! ## List
//!
//! ```text
//! Owner 12 (2 images)
//! 001 holiday.jpg [cover]
//!     Asset: 4
//!     Stored: 12/3f9c….jpg, 2000x1000, 812.4 KB
//!     lg: 1000x500, 201.7 KB
//!     md: 600x300, 74.0 KB
//! ```

use crate::pipeline::UploadOutcome;
use crate::registry::{AssetId, ImageAsset, OwnerId};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

pub fn format_upload_outcome(filename: &str, outcome: &UploadOutcome) -> Vec<String> {
    match (outcome.ok, outcome.asset_id) {
        (true, Some(id)) => vec![format!("Uploaded {filename} → asset {id}")],
        _ => {
            let kind = outcome
                .kind
                .map(|k| format!(" ({k})"))
                .unwrap_or_default();
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            vec![format!("Rejected {filename}{kind}: {error}")]
        }
    }
}

pub fn print_upload_outcome(filename: &str, outcome: &UploadOutcome) {
    for line in format_upload_outcome(filename, outcome) {
        println!("{}", line);
    }
}

pub fn format_asset_list(owner: OwnerId, assets: &[ImageAsset]) -> Vec<String> {
    let mut lines = Vec::new();
    let noun = if assets.len() == 1 { "image" } else { "images" };
    lines.push(format!("Owner {owner} ({} {noun})", assets.len()));

    for (i, asset) in assets.iter().enumerate() {
        let fields = &asset.fields;
        let cover = if fields.is_cover { " [cover]" } else { "" };
        lines.push(format!(
            "{} {}{cover}",
            format_index(i + 1),
            fields.original_filename
        ));
        lines.push(format!("{}Asset: {}", indent(1), asset.id));
        lines.push(format!(
            "{}Stored: {}, {}x{}, {}",
            indent(1),
            fields.stored_path,
            fields.width,
            fields.height,
            format_size(fields.byte_size)
        ));
        for variant in &asset.variants {
            lines.push(format!(
                "{}{}: {}x{}, {}",
                indent(1),
                variant.variant_key,
                variant.width,
                variant.height,
                format_size(variant.byte_size)
            ));
        }
    }
    lines
}

pub fn print_asset_list(owner: OwnerId, assets: &[ImageAsset]) {
    for line in format_asset_list(owner, assets) {
        println!("{}", line);
    }
}

pub fn format_delete_result(owner: OwnerId, id: AssetId, deleted: bool) -> Vec<String> {
    if deleted {
        vec![format!("Deleted asset {id} of owner {owner}")]
    } else {
        vec![format!("Asset {id} not found for owner {owner}")]
    }
}

pub fn print_delete_result(owner: OwnerId, id: AssetId, deleted: bool) {
    for line in format_delete_result(owner, id, deleted) {
        println!("{}", line);
    }
}

pub fn format_purge_result(owner: OwnerId, files: usize) -> Vec<String> {
    vec![format!("Purged owner {owner}: {files} files released")]
}

pub fn print_purge_result(owner: OwnerId, files: usize) {
    for line in format_purge_result(owner, files) {
        println!("{}", line);
    }
}
