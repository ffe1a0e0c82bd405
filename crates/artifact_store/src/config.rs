//! Backend credential and addressing configuration.
//!
//! Built once at startup, either from the process environment or from a
//! YAML file, and handed to the [`ProviderRegistry`](crate::ProviderRegistry).

use std::{env, path::PathBuf};

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::StorageResult;

/// Credentials file for GCS; resolved into `GcsConfig::credentials_path`.
pub const GCS_CREDENTIAL_ENV_KEY: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// AWS region for S3 requests.
pub const AWS_REGION_ENV_KEY: &str = "AWS_DEFAULT_REGION";
/// Set to `false` to force path-style S3 addressing.
pub const S3_USE_VIRTUAL_BUCKET_ENV_KEY: &str = "S3_USER_VIRTUAL_BUCKET";
/// Endpoint override for S3-compatible stores (MinIO, Ceph, ...).
pub const AWS_ENDPOINT_URL_ENV_KEY: &str = "AWS_ENDPOINT_URL";
/// Set to `true` to send unsigned S3 requests.
pub const AWS_ANONYMOUS_CREDENTIAL_ENV_KEY: &str = "AWS_ANONYMOUS_CREDENTIAL";

/// Google Cloud Storage settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsConfig {
    /// Credentials file loaded by the GCS client. When absent the client is
    /// anonymous.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

impl GcsConfig {
    pub fn is_authenticated(&self) -> bool {
        self.credentials_path.is_some()
    }
}

/// Amazon S3 (and S3-compatible) settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub region: Option<String>,

    /// Virtual-hosted (`bucket.host/key`) when true, path-style
    /// (`host/bucket/key`) when false.
    #[serde(default = "default_use_virtual_bucket")]
    pub use_virtual_bucket: bool,

    #[serde(default)]
    pub endpoint: Option<String>,

    /// Skip the credential chain and send unsigned requests.
    #[serde(default)]
    pub anonymous: bool,
}

fn default_use_virtual_bucket() -> bool {
    true
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: None,
            use_virtual_bucket: default_use_virtual_bucket(),
            endpoint: None,
            anonymous: false,
        }
    }
}

/// Configuration for every backend the registry can construct.
///
/// HTTP and HTTPS need no credential material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub gcs: GcsConfig,

    #[serde(default)]
    pub s3: S3Config,
}

impl StorageConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    ///
    /// Never fails: absent or unrecognised values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let gcs = GcsConfig {
            credentials_path: lookup(GCS_CREDENTIAL_ENV_KEY).map(PathBuf::from),
        };

        // Only an explicit "false" turns virtual hosting off.
        let use_virtual_bucket = !lookup(S3_USE_VIRTUAL_BUCKET_ENV_KEY)
            .is_some_and(|v| v.eq_ignore_ascii_case("false"));
        let anonymous = lookup(AWS_ANONYMOUS_CREDENTIAL_ENV_KEY)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let s3 = S3Config {
            region: lookup(AWS_REGION_ENV_KEY),
            use_virtual_bucket,
            endpoint: lookup(AWS_ENDPOINT_URL_ENV_KEY),
            anonymous,
        };

        Self { gcs, s3 }
    }

    /// Load configuration from a YAML file.
    pub fn from_path(path: &str) -> StorageResult<Self> {
        let config: StorageConfig = Figment::new().merge(Yaml::file(path)).extract()?;
        Ok(config)
    }

    /// Load configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> StorageResult<Self> {
        let config: StorageConfig = Figment::new().merge(Yaml::string(yaml)).extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = StorageConfig::from_lookup(|_| None);
        assert_eq!(config, StorageConfig::default());
        assert!(config.s3.use_virtual_bucket);
        assert!(!config.s3.anonymous);
        assert!(!config.gcs.is_authenticated());
    }

    #[test]
    fn test_virtual_bucket_disabled_case_insensitively() {
        for value in ["false", "FALSE", "False"] {
            let config =
                StorageConfig::from_lookup(lookup_from(&[(S3_USE_VIRTUAL_BUCKET_ENV_KEY, value)]));
            assert!(!config.s3.use_virtual_bucket, "{value}");
        }
    }

    #[test]
    fn test_virtual_bucket_stays_on_for_other_values() {
        for value in ["true", "0", "no", ""] {
            let config =
                StorageConfig::from_lookup(lookup_from(&[(S3_USE_VIRTUAL_BUCKET_ENV_KEY, value)]));
            assert!(config.s3.use_virtual_bucket, "{value}");
        }
    }

    #[test]
    fn test_anonymous_and_endpoint() {
        let config = StorageConfig::from_lookup(lookup_from(&[
            (AWS_ANONYMOUS_CREDENTIAL_ENV_KEY, "TRUE"),
            (AWS_ENDPOINT_URL_ENV_KEY, "http://minio:9000"),
            (AWS_REGION_ENV_KEY, "us-west-2"),
        ]));
        assert!(config.s3.anonymous);
        assert_eq!(config.s3.endpoint.as_deref(), Some("http://minio:9000"));
        assert_eq!(config.s3.region.as_deref(), Some("us-west-2"));

        let config =
            StorageConfig::from_lookup(lookup_from(&[(AWS_ANONYMOUS_CREDENTIAL_ENV_KEY, "yes")]));
        assert!(!config.s3.anonymous);
    }

    #[test]
    fn test_gcs_credentials_are_not_validated() {
        let config =
            StorageConfig::from_lookup(lookup_from(&[(GCS_CREDENTIAL_ENV_KEY, "::not a path::")]));
        assert!(config.gcs.is_authenticated());
    }

    #[test]
    fn test_from_yaml_str() {
        let config = StorageConfig::from_yaml_str(
            r#"
s3:
  region: eu-central-1
  use_virtual_bucket: false
  endpoint: http://localhost:9000
"#,
        )
        .unwrap();
        assert_eq!(config.s3.region.as_deref(), Some("eu-central-1"));
        assert!(!config.s3.use_virtual_bucket);
        assert!(!config.s3.anonymous);
        assert_eq!(config.gcs, GcsConfig::default());
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("storage.yaml");
        std::fs::write(&path, "gcs:\n  credentials_path: /secrets/key.json\n").unwrap();

        let config = StorageConfig::from_path(path.to_str().unwrap()).unwrap();
        assert_eq!(
            config.gcs.credentials_path,
            Some(PathBuf::from("/secrets/key.json"))
        );
        assert!(config.s3.use_virtual_bucket);
    }
}
