use crate::error::{Result, VintageError};
use serde::Deserialize;
use std::path::Path;

pub mod http;
pub use http::HttpRemote;

/// The subset of a published `package.json` the update check needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageMetadata {
    pub version: String,
}

impl PackageMetadata {
    pub fn from_bytes(url: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            VintageError::network(url, format!("response is not package metadata: {e}"))
        })
    }
}

/// Network access used by the update pipeline.
pub trait RemoteSource: Send + Sync {
    /// GET a JSON document with at least a `version` field.
    fn fetch_metadata(&self, url: &str) -> Result<PackageMetadata>;

    /// GET `url` and write the body to `dest`, flushed to disk. Returns bytes written.
    fn download(&self, url: &str, dest: &Path) -> Result<u64>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_with_extra_fields() {
        let body = br#"{"name":"vintage-cli","version":"0.3.1","bin":{"vintage":"bin/vintage.js"}}"#;
        let meta = PackageMetadata::from_bytes("https://example.com", body).unwrap();
        assert_eq!(meta.version, "0.3.1");
    }

    #[test]
    fn metadata_without_version_is_a_network_error() {
        let err = PackageMetadata::from_bytes("https://example.com", b"{\"name\":\"x\"}").unwrap_err();
        assert!(matches!(err, VintageError::Network { .. }));
    }
}
