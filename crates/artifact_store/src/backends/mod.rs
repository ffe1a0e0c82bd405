//! Provider implementations, one per backend family.

pub mod gcs;
pub mod http;
pub mod s3;

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{
    fs,
    provider::local_path_for_key,
    uri::locator_string,
    Protocol,
    StorageError,
    StorageResult,
};

/// Mirror the listed object `keys` under `prefix` into `dest_dir`, in listing
/// order, using `download(key, target)` for each object.
///
/// Keys that do not map under the prefix are skipped. Writing nothing is
/// `ObjectNotFound`. The first failed download ends the walk; files already
/// written stay in place.
pub(crate) async fn mirror_prefix<F, Fut>(
    protocol: Protocol,
    bucket: &str,
    prefix: &str,
    keys: Vec<String>,
    dest_dir: &Path,
    mut download: F,
) -> StorageResult<Vec<PathBuf>>
where
    F: FnMut(String, PathBuf) -> Fut,
    Fut: Future<Output = StorageResult<u64>>,
{
    let mut written = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(target) = local_path_for_key(dest_dir, prefix, &key) else {
            warn!(%protocol, bucket, key = %key, prefix, "Skipping object outside prefix");
            continue;
        };
        let size_bytes = download(key.clone(), target.clone()).await?;
        debug!(
            %protocol,
            bucket,
            key = %key,
            target = %target.display(),
            size_bytes,
            "Downloaded object"
        );
        written.push(target);
    }

    if written.is_empty() {
        return Err(StorageError::not_found(locator_string(
            protocol, bucket, prefix,
        )));
    }

    info!(%protocol, bucket, prefix, objects = written.len(), "Fetched objects");
    Ok(written)
}

/// Write a byte stream to `path`, creating parent directories.
///
/// Chunk errors are transport failures against `locator`; everything on the
/// local side is a `LocalIo` failure. Returns the number of bytes written.
pub(crate) async fn write_stream<S, E>(path: &Path, stream: S, locator: &str) -> StorageResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<anyhow::Error>,
{
    let mut file = fs::create(path).await?;
    let mut size_bytes = 0u64;

    futures::pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| StorageError::transport(locator, e))?;
        size_bytes += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| StorageError::local_io(path, e))?;
    }

    file.flush()
        .await
        .map_err(|e| StorageError::local_io(path, e))?;
    Ok(size_bytes)
}
