//! HTTP and HTTPS provider backed by `reqwest`.

use std::{
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use tracing::{debug, info};

use super::write_stream;
use crate::{
    archive::{self, ArchiveKind},
    uri::locator_string,
    Protocol,
    Provider,
    StorageError,
    StorageResult,
};

/// File name used when the URL path has no usable last segment.
const DEFAULT_FILE_NAME: &str = "index";

/// Plain HTTP(S) provider. The same implementation serves both protocols;
/// the scheme used for requests comes from `protocol`.
pub struct HttpProvider {
    client: Client,
    protocol: Protocol,
}

impl HttpProvider {
    /// Create a provider with a default client (no custom TLS or auth).
    pub fn new(protocol: Protocol) -> StorageResult<Self> {
        Self::with_client(protocol, Client::new())
    }

    /// Fails unless `protocol` is `Http` or `Https`.
    pub fn with_client(protocol: Protocol, client: Client) -> StorageResult<Self> {
        if !matches!(protocol, Protocol::Http | Protocol::Https) {
            return Err(StorageError::construction(
                protocol,
                anyhow!("{protocol} is not served over HTTP"),
            ));
        }
        Ok(Self { client, protocol })
    }

    /// Last non-empty segment of the URL path, query and fragment excluded.
    fn file_name(path: &str) -> &str {
        path.split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn fetch(
        &self,
        host: &str,
        path: &str,
        dest_dir: &Path,
    ) -> StorageResult<Vec<PathBuf>> {
        let url = locator_string(self.protocol, host, path);
        debug!(url = %url, dest = %dest_dir.display(), "Fetching over HTTP");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::transport(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(&url));
        }
        if !status.is_success() {
            return Err(StorageError::transport(
                &url,
                anyhow!("unexpected HTTP status {}", status),
            ));
        }

        let archive_kind = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(ArchiveKind::from_content_type);

        if let Some(kind) = archive_kind {
            let staged = dest_dir.join(format!(".{}.download", Self::file_name(path)));
            if let Err(err) = write_stream(&staged, response.bytes_stream(), &url).await {
                let _ = tokio::fs::remove_file(&staged).await;
                return Err(err);
            }

            let dest = dest_dir.to_path_buf();
            let archive_path = staged.clone();
            let unpacked = tokio::task::spawn_blocking(move || {
                let file = std::fs::File::open(&archive_path)?;
                archive::unpack(kind, BufReader::new(file), &dest)
            })
            .await;

            tokio::fs::remove_file(&staged)
                .await
                .map_err(|e| StorageError::local_io(&staged, e))?;
            let written = unpacked
                .map_err(|e| StorageError::local_io(dest_dir, std::io::Error::other(e)))?
                .map_err(|e| StorageError::local_io(dest_dir, e))?;

            info!(url = %url, ?kind, files = written.len(), "Unpacked HTTP archive");
            return Ok(written);
        }

        let target = dest_dir.join(Self::file_name(path));
        let size_bytes = write_stream(&target, response.bytes_stream(), &url).await?;

        info!(
            url = %url,
            target = %target.display(),
            size_bytes,
            "Fetched HTTP object"
        );
        Ok(vec![target])
    }
}
