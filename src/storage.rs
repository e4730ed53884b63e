//! Transactional file writing under the upload root.
//!
//! ## Layout
//!
//! ```text
//! {root}/{owner}/{token}.{ext}          original
//! {root}/{owner}/{token}_{key}.{ext}    one per variant key
//! ```
//!
//! `token` is 16 random bytes, hex-encoded, fresh for every attempt. Paths
//! recorded in the registry are relative to the root and always use `/`.
//!
//! [`write_asset`] either leaves every file of an attempt on disk or none of
//! them: on the first failed write it deletes whatever it already wrote and
//! returns the original error. The pipeline calls [`rollback`] itself when a
//! later step (registration) fails.

use crate::registry::OwnerId;
use rand::RngCore;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Refusing unsafe storage path: {0:?}")]
    UnsafePath(String),
}

/// Validate a registry path: relative, non-empty, only normal components.
pub fn checked_relative(path: &str) -> Result<PathBuf, StorageError> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && !path.contains('\\')
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(candidate.to_path_buf())
    } else {
        Err(StorageError::UnsafePath(path.to_string()))
    }
}

/// Filesystem operations used by the writer and the pruner.
///
/// Every path is relative to the store's root and has already passed
/// [`checked_relative`].
pub trait FileStore: Sync {
    fn create_dir_all(&self, relative: &Path) -> io::Result<()>;

    /// Write a new file. Fails if the file already exists; on any other
    /// failure nothing is left at `relative`.
    fn write_new(&self, relative: &Path, bytes: &[u8]) -> io::Result<()>;

    fn remove_file(&self, relative: &Path) -> io::Result<()>;

    /// Remove a directory only if it has no entries. `Ok(false)` when it is
    /// missing or not empty.
    fn remove_dir_if_empty(&self, relative: &Path) -> io::Result<bool>;
}

/// Local disk store rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStore for LocalStore {
    fn create_dir_all(&self, relative: &Path) -> io::Result<()> {
        std::fs::create_dir_all(self.root.join(relative))
    }

    fn write_new(&self, relative: &Path, bytes: &[u8]) -> io::Result<()> {
        create_and_fill(&self.root.join(relative), |file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
    }

    fn remove_file(&self, relative: &Path) -> io::Result<()> {
        std::fs::remove_file(self.root.join(relative))
    }

    fn remove_dir_if_empty(&self, relative: &Path) -> io::Result<bool> {
        let dir = self.root.join(relative);
        let mut entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if entries.next().is_some() {
            return Ok(false);
        }
        std::fs::remove_dir(&dir)?;
        Ok(true)
    }
}

/// Create `path` exclusively and run `fill` on it. If `fill` fails, the
/// partially written file is removed before the error is returned.
fn create_and_fill(
    path: &Path,
    fill: impl FnOnce(&mut std::fs::File) -> io::Result<()>,
) -> io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    if let Err(e) = fill(&mut file) {
        drop(file);
        if let Err(cleanup) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %cleanup, "could not remove partial file");
        }
        return Err(e);
    }
    Ok(())
}

/// Relative directory holding every file of an owner.
pub fn owner_dir(owner: OwnerId) -> String {
    owner.to_string()
}

/// Fresh per-attempt token: 16 random bytes as 32 hex characters.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One file written by [`write_asset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// `{owner}/{filename}`, relative to the store root.
    pub relative_path: String,
    pub filename: String,
    pub byte_size: u64,
}

/// Every file of one successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenAsset {
    pub token: String,
    pub original: WrittenFile,
    /// In the order they were written.
    pub variants: Vec<(String, WrittenFile)>,
}

impl WrittenAsset {
    /// All relative paths, original first.
    pub fn paths(&self) -> Vec<String> {
        std::iter::once(&self.original)
            .chain(self.variants.iter().map(|(_, f)| f))
            .map(|f| f.relative_path.clone())
            .collect()
    }
}

/// Write the original and every variant under one fresh token.
///
/// The original goes first, then variants in the given order. If any write
/// fails, the files already written are removed before the error is returned.
pub fn write_asset(
    store: &impl FileStore,
    owner: OwnerId,
    extension: &str,
    original: &[u8],
    variants: &[(&str, &[u8])],
) -> Result<WrittenAsset, StorageError> {
    let dir = owner_dir(owner);
    store
        .create_dir_all(Path::new(&dir))
        .map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;

    let token = generate_token();
    let mut written: Vec<String> = Vec::with_capacity(variants.len() + 1);

    match write_all(store, &dir, &token, extension, original, variants, &mut written) {
        Ok((original, variants)) => {
            tracing::debug!(owner, token = %token, files = written.len(), "wrote asset files");
            Ok(WrittenAsset {
                token,
                original,
                variants,
            })
        }
        Err(e) => {
            rollback(store, &written);
            Err(e)
        }
    }
}

fn write_all(
    store: &impl FileStore,
    dir: &str,
    token: &str,
    extension: &str,
    original: &[u8],
    variants: &[(&str, &[u8])],
    written: &mut Vec<String>,
) -> Result<(WrittenFile, Vec<(String, WrittenFile)>), StorageError> {
    let original = write_one(store, dir, format!("{token}.{extension}"), original, written)?;
    let mut files = Vec::with_capacity(variants.len());
    for (key, bytes) in variants {
        let file = write_one(store, dir, format!("{token}_{key}.{extension}"), bytes, written)?;
        files.push((key.to_string(), file));
    }
    Ok((original, files))
}

fn write_one(
    store: &impl FileStore,
    dir: &str,
    filename: String,
    bytes: &[u8],
    written: &mut Vec<String>,
) -> Result<WrittenFile, StorageError> {
    let relative_path = format!("{dir}/{filename}");
    let checked = checked_relative(&relative_path)?;
    store
        .write_new(&checked, bytes)
        .map_err(|source| StorageError::Write {
            path: relative_path.clone(),
            source,
        })?;
    written.push(relative_path.clone());
    Ok(WrittenFile {
        relative_path,
        filename,
        byte_size: bytes.len() as u64,
    })
}

/// Best-effort removal of files written by a failed attempt.
///
/// Failures are logged and swallowed; the caller reports its own error.
pub fn rollback(store: &impl FileStore, paths: &[String]) {
    for path in paths {
        let removed = checked_relative(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
            .and_then(|p| store.remove_file(&p));
        match removed {
            Ok(()) => tracing::debug!(path = %path, "rolled back"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path, error = %e, "rollback could not remove file"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_helpers::files_under;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Local store whose n-th write (0-based) fails.
    pub struct FlakyStore {
        pub inner: LocalStore,
        pub fail_write_at: usize,
        writes: AtomicUsize,
    }

    impl FlakyStore {
        pub fn new(root: &Path, fail_write_at: usize) -> Self {
            Self {
                inner: LocalStore::new(root),
                fail_write_at,
                writes: AtomicUsize::new(0),
            }
        }
    }

    impl FileStore for FlakyStore {
        fn create_dir_all(&self, relative: &Path) -> io::Result<()> {
            self.inner.create_dir_all(relative)
        }

        fn write_new(&self, relative: &Path, bytes: &[u8]) -> io::Result<()> {
            if self.writes.fetch_add(1, Ordering::SeqCst) == self.fail_write_at {
                return Err(io::Error::other("disk full"));
            }
            self.inner.write_new(relative, bytes)
        }

        fn remove_file(&self, relative: &Path) -> io::Result<()> {
            self.inner.remove_file(relative)
        }

        fn remove_dir_if_empty(&self, relative: &Path) -> io::Result<bool> {
            self.inner.remove_dir_if_empty(relative)
        }
    }

    #[test]
    fn writes_original_and_variants_under_one_token() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let asset = write_asset(
            &store,
            7,
            "jpg",
            b"original",
            &[("lg", b"large".as_slice()), ("sm", b"s".as_slice())],
        )
        .unwrap();

        assert_eq!(asset.token.len(), 32);
        assert_eq!(asset.original.relative_path, format!("7/{}.jpg", asset.token));
        assert_eq!(asset.original.byte_size, 8);
        assert_eq!(asset.variants[0].1.filename, format!("{}_lg.jpg", asset.token));
        assert_eq!(asset.variants[1].1.relative_path, format!("7/{}_sm.jpg", asset.token));
        assert_eq!(files_under(tmp.path()).len(), 3);
        assert_eq!(
            std::fs::read(tmp.path().join(&asset.original.relative_path)).unwrap(),
            b"original"
        );
    }

    #[test]
    fn tokens_are_fresh_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn failed_write_removes_earlier_files() {
        let tmp = TempDir::new().unwrap();
        let store = FlakyStore::new(tmp.path(), 2);

        let result = write_asset(
            &store,
            1,
            "png",
            b"original",
            &[("lg", b"l".as_slice()), ("md", b"m".as_slice()), ("sm", b"s".as_slice())],
        );

        assert!(matches!(result, Err(StorageError::Write { .. })));
        assert!(files_under(tmp.path()).is_empty());
    }

    /// Local store that creates the file, writes part of it, then fails.
    struct TruncatingStore {
        inner: LocalStore,
        fail_on: &'static str,
    }

    impl FileStore for TruncatingStore {
        fn create_dir_all(&self, relative: &Path) -> io::Result<()> {
            self.inner.create_dir_all(relative)
        }

        fn write_new(&self, relative: &Path, bytes: &[u8]) -> io::Result<()> {
            if !relative.to_string_lossy().ends_with(self.fail_on) {
                return self.inner.write_new(relative, bytes);
            }
            create_and_fill(&self.inner.root().join(relative), |file| {
                file.write_all(&bytes[..bytes.len() / 2])?;
                Err(io::Error::other("File too large"))
            })
        }

        fn remove_file(&self, relative: &Path) -> io::Result<()> {
            self.inner.remove_file(relative)
        }

        fn remove_dir_if_empty(&self, relative: &Path) -> io::Result<bool> {
            self.inner.remove_dir_if_empty(relative)
        }
    }

    #[test]
    fn write_failing_midway_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let store = TruncatingStore {
            inner: LocalStore::new(tmp.path()),
            fail_on: "_lg.jpg",
        };
        let large = vec![0xAB; 400 * 1024];

        let result = write_asset(
            &store,
            1,
            "jpg",
            b"small-original",
            &[("lg", large.as_slice())],
        );

        assert!(matches!(result, Err(StorageError::Write { .. })));
        assert!(files_under(tmp.path()).is_empty());
    }

    #[test]
    fn create_and_fill_removes_file_on_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("partial.bin");

        let err = create_and_fill(&path, |file| {
            file.write_all(b"half")?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());
    }

    #[test]
    fn create_and_fill_keeps_existing_file_on_collision() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("taken.bin");
        std::fs::write(&path, b"someone else").unwrap();

        let err = create_and_fill(&path, |file| file.write_all(b"mine")).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"someone else");
    }

    #[test]
    fn unwritable_root_is_a_create_dir_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("root");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = write_asset(&LocalStore::new(&blocker), 1, "gif", b"x", &[]);
        assert!(matches!(result, Err(StorageError::CreateDir { .. })));
    }

    #[test]
    fn write_new_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.write_new(Path::new("a"), b"first").unwrap();

        let err = store.write_new(Path::new("a"), b"second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(tmp.path().join("a")).unwrap(), b"first");
    }

    #[test]
    fn rollback_ignores_missing_files() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.create_dir_all(Path::new("3")).unwrap();
        store.write_new(Path::new("3/a.jpg"), b"a").unwrap();

        rollback(&store, &["3/a.jpg".to_string(), "3/gone.jpg".to_string()]);
        assert!(files_under(tmp.path()).is_empty());
    }

    #[test]
    fn rollback_skips_unsafe_paths() {
        let tmp = TempDir::new().unwrap();
        let outside = tmp.path().join("outside.txt");
        std::fs::write(&outside, b"keep").unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir(&root).unwrap();

        rollback(&LocalStore::new(&root), &["../outside.txt".to_string()]);
        assert!(outside.exists());
    }

    #[test]
    fn checked_relative_rejects_escapes() {
        assert!(checked_relative("1/abc.jpg").is_ok());
        for bad in ["", "/etc/passwd", "../x", "1/../../x", "./x", r"1\..\x"] {
            assert!(
                matches!(checked_relative(bad), Err(StorageError::UnsafePath(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn remove_dir_if_empty_leaves_populated_dirs() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.create_dir_all(Path::new("5")).unwrap();
        store.write_new(Path::new("5/keep.png"), b"k").unwrap();

        assert!(!store.remove_dir_if_empty(Path::new("5")).unwrap());
        store.remove_file(Path::new("5/keep.png")).unwrap();
        assert!(store.remove_dir_if_empty(Path::new("5")).unwrap());
        assert!(!store.remove_dir_if_empty(Path::new("5")).unwrap());
    }
}
