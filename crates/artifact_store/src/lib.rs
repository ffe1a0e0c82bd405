//! Multi-backend artifact storage providers.
//!
//! This crate resolves artifact locators (`gs://`, `s3://`, `https://`,
//! `http://`) to a storage backend, builds the backend client once with the
//! right credentials, and stages remote objects into a local directory.
//!
//! # Architecture
//!
//! - [`ArtifactLocator`] classifies a locator into protocol, bucket and path.
//! - [`StorageConfig`] carries credential and addressing settings, resolved
//!   once from the environment or a YAML file.
//! - [`ProviderRegistry`] lazily constructs and caches one [`Provider`] per
//!   [`Protocol`].
//! - [`fs`] holds the local helpers used while staging files.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use artifact_store::{ProviderRegistry, StorageConfig};
//!
//! # async fn example() -> Result<(), artifact_store::StorageError> {
//! let registry = ProviderRegistry::new(StorageConfig::from_env());
//!
//! let files = registry
//!     .fetch("s3://my-bucket/models/v1", Path::new("/mnt/models"))
//!     .await?;
//! println!("staged {} files", files.len());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod backends;
mod config;
mod error;
pub mod fs;
mod protocol;
mod provider;
mod registry;
mod uri;

pub use backends::{
    gcs::GcsProvider,
    http::HttpProvider,
    s3::{S3Addressing, S3Provider},
};
pub use config::{
    GcsConfig,
    S3Config,
    StorageConfig,
    AWS_ANONYMOUS_CREDENTIAL_ENV_KEY,
    AWS_ENDPOINT_URL_ENV_KEY,
    AWS_REGION_ENV_KEY,
    GCS_CREDENTIAL_ENV_KEY,
    S3_USE_VIRTUAL_BUCKET_ENV_KEY,
};
pub use error::{StorageError, StorageResult};
pub use protocol::Protocol;
pub use provider::Provider;
pub use registry::{BackendFactory, ProviderFactory, ProviderRegistry};
pub use uri::ArtifactLocator;
