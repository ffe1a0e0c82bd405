//! Uniform fetch capability implemented by every backend.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{Protocol, StorageResult};

/// A constructed backend client able to stage remote objects locally.
///
/// Providers are immutable once built and shared across callers, so `fetch`
/// takes `&self` and may run concurrently.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Protocol this provider was constructed for.
    fn protocol(&self) -> Protocol;

    /// Stage the object(s) at `bucket`/`path` into `dest_dir`.
    ///
    /// Object stores treat `path` as a prefix and mirror every object under
    /// it. HTTP(S) fetches a single resource. Returns the local files written,
    /// in the order they were written.
    ///
    /// Returns `StorageError::ObjectNotFound` when nothing exists at the
    /// location. Files written before a failure are left in place.
    async fn fetch(&self, bucket: &str, path: &str, dest_dir: &Path)
        -> StorageResult<Vec<PathBuf>>;
}

/// Local path for an object key listed under `prefix`.
///
/// The key relative to the prefix is mirrored under `dest_dir`; a key equal
/// to the prefix itself lands under its file name. Returns `None` for
/// directory markers, keys that would escape `dest_dir` and sibling keys that
/// merely share the prefix text (`models/v10/..` under `models/v1`).
pub(crate) fn local_path_for_key(dest_dir: &Path, prefix: &str, key: &str) -> Option<PathBuf> {
    if key.ends_with('/') {
        return None;
    }

    let relative = match key.strip_prefix(prefix) {
        Some("") => key.rsplit('/').next().unwrap_or(key),
        Some(rest) if prefix.is_empty() || prefix.ends_with('/') => rest,
        Some(rest) => rest.strip_prefix('/')?,
        None => return None,
    };

    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(dest_dir.join(relative))
}
