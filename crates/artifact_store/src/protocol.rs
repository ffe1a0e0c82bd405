//! Storage backend families.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

/// Backend family an artifact locator refers to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    Gcs,
    S3,
    Https,
    Http,
}

impl Protocol {
    /// Locator prefix that selects this protocol.
    pub fn prefix(&self) -> &'static str {
        match self {
            Protocol::Gcs => "gs://",
            Protocol::S3 => "s3://",
            Protocol::Https => "https://",
            Protocol::Http => "http://",
        }
    }

    /// URI scheme without the `://` separator.
    pub fn scheme(&self) -> &'static str {
        self.prefix().trim_end_matches("://")
    }

    /// Map a URI scheme (`gs`, `s3`, `https`, `http`) to a protocol.
    ///
    /// Matching is case-insensitive. Returns `None` for anything else.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "gs" => Some(Protocol::Gcs),
            "s3" => Some(Protocol::S3),
            "https" => Some(Protocol::Https),
            "http" => Some(Protocol::Http),
            _ => None,
        }
    }
}
