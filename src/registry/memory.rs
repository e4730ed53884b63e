use super::{AssetId, AssetRegistrar, AssetTable, ImageAsset, ImageVariant, NewAsset, OwnerId, RegistryError};
use crate::digest::ContentHash;
use std::sync::{Mutex, MutexGuard};

/// In-process registrar. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryRegistrar {
    table: Mutex<AssetTable>,
}

impl MemoryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, AssetTable>, RegistryError> {
        self.table
            .lock()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".to_string()))
    }
}

impl AssetRegistrar for MemoryRegistrar {
    fn has_hash(&self, owner: OwnerId, hash: &ContentHash) -> Result<bool, RegistryError> {
        Ok(self.lock()?.has_hash(owner, hash))
    }

    fn next_sort_order(&self, owner: OwnerId) -> Result<i64, RegistryError> {
        Ok(self.lock()?.next_sort_order(owner))
    }

    fn insert_asset_with_variants(
        &self,
        asset: NewAsset,
        variants: Vec<ImageVariant>,
    ) -> Result<AssetId, RegistryError> {
        self.lock()?.insert(asset, variants)
    }

    fn delete_asset(
        &self,
        owner: OwnerId,
        id: AssetId,
    ) -> Result<Option<Vec<String>>, RegistryError> {
        Ok(self.lock()?.delete(owner, id))
    }

    fn delete_all_for_owner(&self, owner: OwnerId) -> Result<Vec<String>, RegistryError> {
        Ok(self.lock()?.delete_owner(owner))
    }

    fn assets_for_owner(&self, owner: OwnerId) -> Result<Vec<ImageAsset>, RegistryError> {
        Ok(self.lock()?.for_owner(owner))
    }
}
