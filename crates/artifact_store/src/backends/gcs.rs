//! Google Cloud Storage provider backed by `google-cloud-storage`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use google_cloud_storage::{
    client::{
        google_cloud_auth::credentials::CredentialsFile,
        Client as GcsClient,
        ClientConfig,
    },
    http::{
        objects::{download::Range, get::GetObjectRequest, list::ListObjectsRequest},
        Error as GcsError,
    },
};
use tracing::debug;

use super::{mirror_prefix, write_stream};
use crate::{
    config::GcsConfig,
    uri::locator_string,
    Protocol,
    Provider,
    StorageError,
    StorageResult,
};

/// GCS provider. One client serves every bucket.
pub struct GcsProvider {
    client: GcsClient,
    authenticated: bool,
}

impl GcsProvider {
    /// Build the GCS client.
    ///
    /// With a credentials path configured, the client authenticates with the
    /// key file at that path; otherwise requests are sent unauthenticated.
    pub async fn new(config: &GcsConfig) -> StorageResult<Self> {
        let client_config = match &config.credentials_path {
            Some(path) => {
                let path = path.to_string_lossy().into_owned();
                let credentials = CredentialsFile::new_from_file(path)
                    .await
                    .map_err(|e| StorageError::construction(Protocol::Gcs, e))?;
                ClientConfig::default()
                    .with_credentials(credentials)
                    .await
                    .map_err(|e| StorageError::construction(Protocol::Gcs, e))?
            }
            None => ClientConfig::default().anonymous(),
        };

        debug!(
            authenticated = config.is_authenticated(),
            "Created GCS provider"
        );

        Ok(Self {
            client: GcsClient::new(client_config),
            authenticated: config.is_authenticated(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// All object names under `prefix`, in listing order.
    async fn list_names(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<String>> {
        let locator = locator_string(Protocol::Gcs, bucket, prefix);
        let mut names = Vec::new();
        let mut page_token = None;

        loop {
            let request = ListObjectsRequest {
                bucket: bucket.to_string(),
                prefix: Some(prefix.to_string()),
                page_token: page_token.take(),
                ..Default::default()
            };
            let response = self
                .client
                .list_objects(&request)
                .await
                .map_err(|e| map_gcs_error(&locator, e))?;

            names.extend(response.items.unwrap_or_default().into_iter().map(|o| o.name));

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(names)
    }

    async fn download(&self, bucket: &str, name: &str, target: &Path) -> StorageResult<u64> {
        let locator = locator_string(Protocol::Gcs, bucket, name);
        let request = GetObjectRequest {
            bucket: bucket.to_string(),
            object: name.to_string(),
            ..Default::default()
        };
        let stream = self
            .client
            .download_streamed_object(&request, &Range::default())
            .await
            .map_err(|e| map_gcs_error(&locator, e))?;

        write_stream(target, stream, &locator).await
    }
}

/// 404 responses are missing objects; everything else is transport.
fn map_gcs_error(locator: &str, err: GcsError) -> StorageError {
    if let GcsError::Response(response) = &err {
        if response.code == 404 {
            return StorageError::not_found(locator);
        }
    }
    StorageError::transport(locator, err)
}

#[async_trait]
impl Provider for GcsProvider {
    fn protocol(&self) -> Protocol {
        Protocol::Gcs
    }

    async fn fetch(
        &self,
        bucket: &str,
        path: &str,
        dest_dir: &Path,
    ) -> StorageResult<Vec<PathBuf>> {
        let keys = self.list_names(bucket, path).await?;
        mirror_prefix(
            Protocol::Gcs,
            bucket,
            path,
            keys,
            dest_dir,
            move |key, target| async move { self.download(bucket, &key, &target).await },
        )
        .await
    }
}
