//! The ingestion pipeline.
//!
//! ```text
//! validate → hash → dedupe → decode + transcode → write files → register
//! ```
//!
//! Every step before "write files" is read-only, so a failure there leaves
//! nothing to clean up. Transcoding happens entirely in memory. Once files are
//! on disk, a registration failure rolls them back before the error is
//! returned: for every failed upload, no new file and no new row remain.
//!
//! [`Gallery`] bundles the three collaborators (file store, registrar, image
//! backend). It holds no per-request state; the [`Policy`] is passed into
//! every call.

use crate::config::Policy;
use crate::digest::{ContentHash, hash_file};
use crate::imaging::{BackendError, ImageBackend, RustBackend, Transcoded, transcode};
use crate::prune;
use crate::registry::{
    AssetId, AssetRegistrar, AssetStatus, ImageVariant, NewAsset, OwnerId, RegistryError,
};
use crate::storage::{FileStore, StorageError, WrittenAsset, rollback, write_asset};
use crate::upload::{UploadRequest, ValidatedUpload, ValidationError, validate};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Where ingested files live, as recorded on every asset.
pub const STORAGE_TARGET: &str = "local";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("This image has already been uploaded ({hash})")]
    Duplicate { hash: ContentHash },
    #[error("Could not store the image: {0}")]
    Storage(#[from] StorageError),
    #[error("Could not process the image: {0}")]
    Transcode(#[from] BackendError),
    #[error("Could not register the image: {0}")]
    Registration(#[from] RegistryError),
}

/// Coarse classification of an [`IngestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Duplicate,
    Storage,
    Transcode,
    Registration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::Duplicate => "duplicate",
            Self::Storage => "storage",
            Self::Transcode => "transcode",
            Self::Registration => "registration",
        };
        f.write_str(name)
    }
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Transcode(_) => ErrorKind::Transcode,
            Self::Registration(_) => ErrorKind::Registration,
        }
    }
}

/// Flat result of [`Gallery::upload_for_owner`], ready to hand to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<AssetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl UploadOutcome {
    pub fn accepted(asset_id: AssetId) -> Self {
        Self {
            ok: true,
            asset_id: Some(asset_id),
            error: None,
            kind: None,
        }
    }

    pub fn rejected(error: &IngestError) -> Self {
        Self {
            ok: false,
            asset_id: None,
            error: Some(error.to_string()),
            kind: Some(error.kind()),
        }
    }
}

/// Ingestion and deletion service.
///
/// `Sync` whenever its collaborators are, so independent uploads may run on
/// separate threads against one instance.
pub struct Gallery<S, R, B = RustBackend> {
    store: S,
    registrar: R,
    backend: B,
}

impl<S: FileStore, R: AssetRegistrar> Gallery<S, R> {
    pub fn new(store: S, registrar: R) -> Self {
        Self::with_backend(store, registrar, RustBackend::new())
    }
}

impl<S: FileStore, R: AssetRegistrar, B: ImageBackend> Gallery<S, R, B> {
    pub fn with_backend(store: S, registrar: R, backend: B) -> Self {
        Self {
            store,
            registrar,
            backend,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    /// Run the whole pipeline for one upload.
    pub fn ingest(
        &self,
        owner: OwnerId,
        request: &UploadRequest,
        policy: &Policy,
    ) -> Result<AssetId, IngestError> {
        let validated = validate(&self.backend, request, policy)?;
        tracing::debug!(
            owner,
            format = validated.format.mime_type(),
            width = validated.dimensions.width,
            height = validated.dimensions.height,
            "upload validated"
        );

        // The upload vanished or broke after validation; still the client's file
        let hash = hash_file(&validated.source).map_err(ValidationError::Unreadable)?;
        if self.registrar.has_hash(owner, &hash)? {
            return Err(IngestError::Duplicate { hash });
        }

        let transcoded = transcode(
            &self.backend,
            &validated.source,
            validated.format,
            &policy.variants,
            policy.strip_metadata,
        )?;
        let sort_order = self.registrar.next_sort_order(owner)?;

        let variant_bytes: Vec<(&str, &[u8])> = transcoded
            .variants
            .iter()
            .map(|(key, image)| (key.as_str(), image.bytes.as_slice()))
            .collect();
        let written = write_asset(
            &self.store,
            owner,
            validated.format.extension(),
            &transcoded.original.bytes,
            &variant_bytes,
        )?;

        let (asset, variants) =
            build_records(owner, &validated, &hash, sort_order, &transcoded, &written);
        match self.registrar.insert_asset_with_variants(asset, variants) {
            Ok(id) => {
                tracing::info!(owner, asset = id, hash = %hash, "image ingested");
                Ok(id)
            }
            Err(e) => {
                rollback(&self.store, &written.paths());
                match e {
                    RegistryError::DuplicateHash { hash, .. } => {
                        Err(IngestError::Duplicate { hash })
                    }
                    other => Err(IngestError::Registration(other)),
                }
            }
        }
    }

    /// [`ingest`](Self::ingest), flattened into an [`UploadOutcome`].
    pub fn upload_for_owner(
        &self,
        owner: OwnerId,
        request: &UploadRequest,
        policy: &Policy,
    ) -> UploadOutcome {
        match self.ingest(owner, request, policy) {
            Ok(id) => UploadOutcome::accepted(id),
            Err(e) => {
                tracing::warn!(
                    owner,
                    filename = %request.claimed_filename,
                    kind = %e.kind(),
                    error = %e,
                    "upload rejected"
                );
                UploadOutcome::rejected(&e)
            }
        }
    }

    /// Delete one asset and its files. `false` when there is no such asset
    /// or the registry could not be updated.
    pub fn delete_image_for_owner(&self, owner: OwnerId, id: AssetId) -> bool {
        prune::delete_one(&self.store, &self.registrar, owner, id).unwrap_or_else(|e| {
            tracing::error!(owner, asset = id, error = %e, "delete failed");
            false
        })
    }

    /// Delete every asset of an owner. Returns how many stored files the
    /// removed rows referenced.
    pub fn delete_all_for_owner(&self, owner: OwnerId) -> Result<usize, RegistryError> {
        prune::delete_all(&self.store, &self.registrar, owner).inspect_err(|e| {
            tracing::error!(owner, error = %e, "purge failed");
        })
    }
}

fn build_records(
    owner: OwnerId,
    validated: &ValidatedUpload,
    hash: &ContentHash,
    sort_order: i64,
    transcoded: &Transcoded,
    written: &WrittenAsset,
) -> (NewAsset, Vec<ImageVariant>) {
    let format = validated.format;
    let asset = NewAsset {
        owner_id: owner,
        storage_target: STORAGE_TARGET.to_string(),
        original_filename: validated.original_filename.clone(),
        stored_filename: written.original.filename.clone(),
        stored_path: written.original.relative_path.clone(),
        mime_type: format.mime_type().to_string(),
        extension: format.extension().to_string(),
        byte_size: written.original.byte_size,
        width: transcoded.original.width,
        height: transcoded.original.height,
        hash_sha256: hash.clone(),
        status: AssetStatus::Active,
        sort_order,
        is_cover: sort_order == 0,
        is_preview: false,
        include_in_gallery: true,
        alt_text: String::new(),
        title_text: String::new(),
        caption: String::new(),
        credit: String::new(),
        license: String::new(),
        focal_x: 0.5,
        focal_y: 0.5,
    };

    let variants = transcoded
        .variants
        .iter()
        .zip(&written.variants)
        .map(|((key, image), (_, file))| ImageVariant {
            variant_key: key.clone(),
            stored_filename: file.filename.clone(),
            stored_path: file.relative_path.clone(),
            mime_type: format.mime_type().to_string(),
            extension: format.extension().to_string(),
            byte_size: file.byte_size,
            width: image.width,
            height: image.height,
        })
        .collect();

    (asset, variants)
}
