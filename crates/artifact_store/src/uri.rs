//! Artifact locator parsing.
//!
//! Supports `gs://bucket/key`, `s3://bucket/key`, `https://host/path` and
//! `http://host/path` locators.

use std::{fmt, str::FromStr};

use strum::IntoEnumIterator;

use crate::{Protocol, StorageError, StorageResult};

/// A locator split into its backend, bucket (or host) and object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactLocator {
    pub protocol: Protocol,
    /// Bucket name for object stores, `host[:port]` for HTTP(S).
    pub bucket: String,
    /// Object key or URL path, without the leading `/`. May be empty.
    pub path: String,
}

impl ArtifactLocator {
    /// Classify a locator by its scheme prefix.
    ///
    /// `s3://my-bucket/models/v1/model.bin` → `(S3, "my-bucket",
    /// "models/v1/model.bin")`
    pub fn parse(locator: &str) -> StorageResult<Self> {
        let (protocol, remainder) = Protocol::iter()
            .find_map(|p| locator.strip_prefix(p.prefix()).map(|rest| (p, rest)))
            .ok_or_else(|| StorageError::unsupported_scheme(locator))?;

        let (bucket, path) = remainder.split_once('/').unwrap_or((remainder, ""));

        Ok(Self {
            protocol,
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }
}

impl FromStr for ArtifactLocator {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ArtifactLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&locator_string(self.protocol, &self.bucket, &self.path))
    }
}

/// Render a `(protocol, bucket, path)` triple back into locator form.
///
/// The `/` separator is omitted when `path` is empty.
pub(crate) fn locator_string(protocol: Protocol, bucket: &str, path: &str) -> String {
    if path.is_empty() {
        format!("{}{}", protocol.prefix(), bucket)
    } else {
        format!("{}{}/{}", protocol.prefix(), bucket, path)
    }
}
