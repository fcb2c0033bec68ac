use serde::{Deserialize, Serialize};

use crate::CoreError;

const REMOTE_SCHEMES: &[&str] = &["http://", "https://"];

/// Whether a URI points at hosted storage. Anything else is treated as a
/// device-local file that still has to be uploaded.
pub fn is_remote_uri(uri: &str) -> bool {
    let lower = uri.trim_start().to_ascii_lowercase();
    REMOTE_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

/// A pointer to a photo or file.
///
/// Only `Remote` references are ever recorded for server-side deletion.
/// `Local` may become `Remote` once uploaded; the reverse is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "uri", rename_all = "snake_case")]
pub enum AssetRef {
    Local(String),
    Remote(String),
}

impl AssetRef {
    /// Classify a bare URI by its scheme.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        let uri = uri.into().trim().to_string();
        if is_remote_uri(&uri) {
            Self::Remote(uri)
        } else {
            Self::Local(uri)
        }
    }

    pub fn uri(&self) -> &str {
        match self {
            Self::Local(uri) | Self::Remote(uri) => uri,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Remote(url) => Some(url),
            Self::Local(_) => None,
        }
    }

    /// Record a successful upload. Promoting an already-remote reference to a
    /// different URL is refused.
    pub fn promote(self, url: impl Into<String>) -> Result<Self, CoreError> {
        let url = url.into();
        if !is_remote_uri(&url) {
            return Err(CoreError::AssetDemotion(url));
        }
        match self {
            Self::Local(_) => Ok(Self::Remote(url)),
            Self::Remote(existing) if existing == url => Ok(Self::Remote(existing)),
            Self::Remote(existing) => Err(CoreError::AssetDemotion(existing)),
        }
    }
}
