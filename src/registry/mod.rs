//! Asset registry: the persistent record of every ingested image.
//!
//! The pipeline only talks to the [`AssetRegistrar`] trait. Two
//! implementations ship with the crate:
//!
//! | Registrar | Storage | Used by |
//! |---|---|---|
//! | [`MemoryRegistrar`] | mutex-guarded table | embedding, tests |
//! | [`JsonRegistrar`] | versioned JSON index under the upload root | the CLI |
//!
//! Both enforce hash uniqueness per owner at insert time. That check is the
//! final authority on duplicates: the pipeline's earlier `has_hash` lookup
//! only avoids wasted transcoding.

mod json;
mod memory;

pub use json::JsonRegistrar;
pub use memory::MemoryRegistrar;

use crate::digest::ContentHash;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type OwnerId = u64;
pub type AssetId = u64;

/// Version of the serialized [`AssetTable`]. Bump when the layout changes.
pub const TABLE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Index version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("Owner {owner} already has an image with hash {hash}")]
    DuplicateHash { owner: OwnerId, hash: ContentHash },
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Active,
    Hidden,
}

/// One stored rendition of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub variant_key: String,
    pub stored_filename: String,
    pub stored_path: String,
    pub mime_type: String,
    pub extension: String,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
}

/// Everything about an asset except its id, as handed to the registrar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAsset {
    pub owner_id: OwnerId,
    pub storage_target: String,
    pub original_filename: String,
    pub stored_filename: String,
    pub stored_path: String,
    pub mime_type: String,
    pub extension: String,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
    pub hash_sha256: ContentHash,
    pub status: AssetStatus,
    pub sort_order: i64,
    pub is_cover: bool,
    pub is_preview: bool,
    pub include_in_gallery: bool,
    pub alt_text: String,
    pub title_text: String,
    pub caption: String,
    pub credit: String,
    pub license: String,
    pub focal_x: f32,
    pub focal_y: f32,
}

/// A registered asset with its variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub id: AssetId,
    #[serde(flatten)]
    pub fields: NewAsset,
    pub variants: Vec<ImageVariant>,
}

impl ImageAsset {
    /// Stored paths of the original and every variant.
    pub fn stored_paths(&self) -> Vec<String> {
        std::iter::once(self.fields.stored_path.clone())
            .chain(self.variants.iter().map(|v| v.stored_path.clone()))
            .collect()
    }
}

/// Persistence seam for assets.
///
/// `insert_asset_with_variants` must be atomic: the asset and all of its
/// variants become visible together, or not at all.
pub trait AssetRegistrar: Sync {
    fn has_hash(&self, owner: OwnerId, hash: &ContentHash) -> Result<bool, RegistryError>;

    /// One past the owner's highest sort order, or 0 for a new owner.
    fn next_sort_order(&self, owner: OwnerId) -> Result<i64, RegistryError>;

    /// Fails with [`RegistryError::DuplicateHash`] if the owner already has
    /// an asset with the same hash.
    fn insert_asset_with_variants(
        &self,
        asset: NewAsset,
        variants: Vec<ImageVariant>,
    ) -> Result<AssetId, RegistryError>;

    /// Remove one asset. `None` if the owner has no asset with that id,
    /// otherwise the stored paths the removed rows referenced.
    fn delete_asset(
        &self,
        owner: OwnerId,
        id: AssetId,
    ) -> Result<Option<Vec<String>>, RegistryError>;

    /// Remove every asset of the owner, returning all referenced paths.
    fn delete_all_for_owner(&self, owner: OwnerId) -> Result<Vec<String>, RegistryError>;

    /// The owner's assets in sort order.
    fn assets_for_owner(&self, owner: OwnerId) -> Result<Vec<ImageAsset>, RegistryError>;
}

/// The registry's whole state; shared by both registrars and serialized
/// as-is by [`JsonRegistrar`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetTable {
    pub version: u32,
    pub next_id: AssetId,
    pub assets: Vec<ImageAsset>,
}

impl Default for AssetTable {
    fn default() -> Self {
        Self {
            version: TABLE_VERSION,
            next_id: 1,
            assets: Vec::new(),
        }
    }
}

impl AssetTable {
    pub fn has_hash(&self, owner: OwnerId, hash: &ContentHash) -> bool {
        self.assets
            .iter()
            .any(|a| a.fields.owner_id == owner && a.fields.hash_sha256 == *hash)
    }

    pub fn next_sort_order(&self, owner: OwnerId) -> i64 {
        self.assets
            .iter()
            .filter(|a| a.fields.owner_id == owner)
            .map(|a| a.fields.sort_order + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn insert(
        &mut self,
        asset: NewAsset,
        variants: Vec<ImageVariant>,
    ) -> Result<AssetId, RegistryError> {
        if self.has_hash(asset.owner_id, &asset.hash_sha256) {
            return Err(RegistryError::DuplicateHash {
                owner: asset.owner_id,
                hash: asset.hash_sha256,
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.assets.push(ImageAsset {
            id,
            fields: asset,
            variants,
        });
        Ok(id)
    }

    pub fn delete(&mut self, owner: OwnerId, id: AssetId) -> Option<Vec<String>> {
        let index = self
            .assets
            .iter()
            .position(|a| a.id == id && a.fields.owner_id == owner)?;
        Some(self.assets.remove(index).stored_paths())
    }

    pub fn delete_owner(&mut self, owner: OwnerId) -> Vec<String> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.assets)
            .into_iter()
            .partition(|a| a.fields.owner_id == owner);
        self.assets = kept;
        removed.iter().flat_map(ImageAsset::stored_paths).collect()
    }

    pub fn for_owner(&self, owner: OwnerId) -> Vec<ImageAsset> {
        let mut assets: Vec<ImageAsset> = self
            .assets
            .iter()
            .filter(|a| a.fields.owner_id == owner)
            .cloned()
            .collect();
        assets.sort_by_key(|a| (a.fields.sort_order, a.id));
        assets
    }
}
