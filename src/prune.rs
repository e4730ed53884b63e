//! Asset deletion.
//!
//! Rows go first, then the files the removed rows named, then the owner
//! directory if nothing is left in it. Once the rows are gone the deletion
//! has happened: file removal is best effort, and failures are logged rather
//! than returned. Paths read back from the registry are re-checked before
//! anything is removed.

use crate::registry::{AssetId, AssetRegistrar, OwnerId, RegistryError};
use crate::storage::{FileStore, checked_relative, owner_dir};
use std::io;
use std::path::Path;

/// Delete one asset. `Ok(false)` when the owner has no such asset.
pub fn delete_one(
    store: &impl FileStore,
    registrar: &impl AssetRegistrar,
    owner: OwnerId,
    id: AssetId,
) -> Result<bool, RegistryError> {
    let Some(paths) = registrar.delete_asset(owner, id)? else {
        tracing::debug!(owner, asset = id, "asset not found");
        return Ok(false);
    };
    remove_files(store, &paths);
    remove_owner_dir_if_empty(store, owner);
    tracing::info!(owner, asset = id, files = paths.len(), "deleted asset");
    Ok(true)
}

/// Delete every asset of an owner. Returns the number of stored paths the
/// removed rows referenced.
pub fn delete_all(
    store: &impl FileStore,
    registrar: &impl AssetRegistrar,
    owner: OwnerId,
) -> Result<usize, RegistryError> {
    let paths = registrar.delete_all_for_owner(owner)?;
    remove_files(store, &paths);
    remove_owner_dir_if_empty(store, owner);
    tracing::info!(owner, files = paths.len(), "deleted all assets");
    Ok(paths.len())
}

fn remove_files(store: &impl FileStore, paths: &[String]) {
    for path in paths {
        let relative = match checked_relative(path) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping unsafe stored path");
                continue;
            }
        };
        match store.remove_file(&relative) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "file already absent");
            }
            Err(e) => tracing::warn!(path = %path, error = %e, "could not remove file"),
        }
    }
}

fn remove_owner_dir_if_empty(store: &impl FileStore, owner: OwnerId) {
    let dir = owner_dir(owner);
    match store.remove_dir_if_empty(Path::new(&dir)) {
        Ok(true) => tracing::debug!(owner, "removed empty owner directory"),
        Ok(false) => {}
        Err(e) => tracing::warn!(owner, error = %e, "could not remove owner directory"),
    }
}
