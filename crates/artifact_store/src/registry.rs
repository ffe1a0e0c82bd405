//! Registry that lazily builds and caches one provider per protocol.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    backends::{gcs::GcsProvider, http::HttpProvider, s3::S3Provider},
    ArtifactLocator,
    Protocol,
    Provider,
    StorageConfig,
    StorageError,
    StorageResult,
};

/// Builds a provider for a protocol from resolved configuration.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn build(
        &self,
        protocol: Protocol,
        config: &StorageConfig,
    ) -> StorageResult<Arc<dyn Provider>>;
}

/// Factory that constructs the real SDK-backed providers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackendFactory;

#[async_trait]
impl ProviderFactory for BackendFactory {
    async fn build(
        &self,
        protocol: Protocol,
        config: &StorageConfig,
    ) -> StorageResult<Arc<dyn Provider>> {
        let provider: Arc<dyn Provider> = match protocol {
            Protocol::Gcs => Arc::new(GcsProvider::new(&config.gcs).await?),
            Protocol::S3 => Arc::new(S3Provider::new(&config.s3).await?),
            Protocol::Https | Protocol::Http => Arc::new(HttpProvider::new(protocol)?),
        };
        Ok(provider)
    }
}

/// Cache of constructed providers keyed by protocol.
///
/// Entries are added on first use and never evicted; credentials are taken
/// to be static for the registry's lifetime. Each protocol has its own slot:
/// racing first-use callers for one protocol wait on a single construction,
/// while lookups for other protocols proceed. A failed or cancelled
/// construction leaves the slot empty and the next call tries again.
pub struct ProviderRegistry {
    config: StorageConfig,
    factory: Arc<dyn ProviderFactory>,
    providers: Mutex<HashMap<Protocol, Arc<OnceCell<Arc<dyn Provider>>>>>,
}

impl ProviderRegistry {
    /// Registry building real backends from `config`.
    pub fn new(config: StorageConfig) -> Self {
        Self::with_factory(config, Arc::new(BackendFactory))
    }

    pub fn with_factory(config: StorageConfig, factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            config,
            factory,
            providers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Return the cached provider for `protocol`, building it on first use.
    pub async fn get_provider(&self, protocol: Protocol) -> StorageResult<Arc<dyn Provider>> {
        // The map lock only guards slot lookup; construction runs outside it.
        let slot = self
            .providers
            .lock()
            .await
            .entry(protocol)
            .or_default()
            .clone();

        let provider = slot
            .get_or_try_init(|| async {
                debug!(%protocol, "Constructing storage provider");
                let provider = self.factory.build(protocol, &self.config).await?;
                info!(%protocol, "Storage provider registered");
                Ok::<_, StorageError>(provider)
            })
            .await?;
        Ok(provider.clone())
    }

    /// Like [`get_provider`](Self::get_provider), but gives up with
    /// `StorageError::Cancelled` if `cancel` fires during construction.
    pub async fn get_provider_with_cancel(
        &self,
        protocol: Protocol,
        cancel: &CancellationToken,
    ) -> StorageResult<Arc<dyn Provider>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StorageError::Cancelled { protocol }),
            result = self.get_provider(protocol) => result,
        }
    }

    /// Look up a provider by URI scheme.
    ///
    /// An unrecognised scheme yields `Ok(None)` rather than an error;
    /// callers must check for the absent value.
    pub async fn provider_for_scheme(
        &self,
        scheme: &str,
    ) -> StorageResult<Option<Arc<dyn Provider>>> {
        match Protocol::from_scheme(scheme) {
            Some(protocol) => self.get_provider(protocol).await.map(Some),
            None => {
                debug!(scheme, "No storage provider for scheme");
                Ok(None)
            }
        }
    }

    /// Protocols with a constructed provider.
    pub async fn cached_protocols(&self) -> Vec<Protocol> {
        self.providers
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(protocol, _)| *protocol)
            .collect()
    }

    /// Classify `locator`, resolve its provider and stage it into `dest_dir`.
    pub async fn fetch(&self, locator: &str, dest_dir: &Path) -> StorageResult<Vec<PathBuf>> {
        let locator = ArtifactLocator::parse(locator)?;
        let provider = self.get_provider(locator.protocol).await?;
        provider
            .fetch(&locator.bucket, &locator.path, dest_dir)
            .await
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("config", &self.config)
            .field("providers", &"<hidden>")
            .finish()
    }
}
