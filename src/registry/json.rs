//! JSON-file registrar.
//!
//! The whole [`AssetTable`] lives in one pretty-printed JSON file (by default
//! `{upload_root}/.gallery-index.json`). Every mutation is load, modify, save
//! under a process-local lock; the save goes through a sibling temp file and
//! a rename so a crash never leaves a half-written index behind.
//!
//! A missing file is an empty registry. A file with a different `version`
//! is refused rather than guessed at.

use super::{
    AssetId, AssetRegistrar, AssetTable, ImageAsset, ImageVariant, NewAsset, OwnerId,
    RegistryError, TABLE_VERSION,
};
use crate::digest::ContentHash;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct JsonRegistrar {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonRegistrar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, RegistryError> {
        self.lock
            .lock()
            .map_err(|_| RegistryError::Unavailable("index lock poisoned".to_string()))
    }

    fn load(&self) -> Result<AssetTable, RegistryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AssetTable::default()),
            Err(e) => return Err(e.into()),
        };
        let table: AssetTable = serde_json::from_str(&content)?;
        if table.version != TABLE_VERSION {
            return Err(RegistryError::Version {
                found: table.version,
                expected: TABLE_VERSION,
            });
        }
        Ok(table)
    }

    fn save(&self, table: &AssetTable) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp: OsString = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_string_pretty(table)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load, apply `f`, and save only if `f` succeeded.
    fn modify<T>(
        &self,
        f: impl FnOnce(&mut AssetTable) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _guard = self.guard()?;
        let mut table = self.load()?;
        let value = f(&mut table)?;
        self.save(&table)?;
        Ok(value)
    }

    fn read<T>(&self, f: impl FnOnce(&AssetTable) -> T) -> Result<T, RegistryError> {
        let _guard = self.guard()?;
        Ok(f(&self.load()?))
    }
}

impl AssetRegistrar for JsonRegistrar {
    fn has_hash(&self, owner: OwnerId, hash: &ContentHash) -> Result<bool, RegistryError> {
        self.read(|t| t.has_hash(owner, hash))
    }

    fn next_sort_order(&self, owner: OwnerId) -> Result<i64, RegistryError> {
        self.read(|t| t.next_sort_order(owner))
    }

    fn insert_asset_with_variants(
        &self,
        asset: NewAsset,
        variants: Vec<ImageVariant>,
    ) -> Result<AssetId, RegistryError> {
        self.modify(|t| t.insert(asset, variants))
    }

    fn delete_asset(
        &self,
        owner: OwnerId,
        id: AssetId,
    ) -> Result<Option<Vec<String>>, RegistryError> {
        let _guard = self.guard()?;
        let mut table = self.load()?;
        let removed = table.delete(owner, id);
        if removed.is_some() {
            self.save(&table)?;
        }
        Ok(removed)
    }

    fn delete_all_for_owner(&self, owner: OwnerId) -> Result<Vec<String>, RegistryError> {
        self.modify(|t| Ok(t.delete_owner(owner)))
    }

    fn assets_for_owner(&self, owner: OwnerId) -> Result<Vec<ImageAsset>, RegistryError> {
        self.read(|t| t.for_owner(owner))
    }
}
