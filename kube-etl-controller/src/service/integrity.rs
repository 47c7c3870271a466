//! Manifest integrity check
//!
//! Compares every file listed in a manifest against the hash the object
//! store computed for it. Not part of the pipeline loop.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::repository::ObjectStore;

/// One file listed in a batch manifest
#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "FileName")]
    pub file_name: String,
    #[serde(rename = "SHA256")]
    pub sha256: String,
}

/// Returns true iff every manifest entry matches its stored content hash
#[allow(dead_code)]
pub async fn check_manifest(store: &dyn ObjectStore, manifest_key: &str) -> Result<bool> {
    let body = store.get(manifest_key).await?;
    let entries: Vec<ManifestEntry> = serde_json::from_slice(&body)
        .with_context(|| format!("Failed to parse manifest {}", manifest_key))?;

    for entry in &entries {
        let stored = store.content_hash(&entry.file_name).await?;

        let matches = stored
            .as_deref()
            .is_some_and(|hash| hash.eq_ignore_ascii_case(&entry.sha256));

        if !matches {
            warn!(
                "Hash mismatch for {}: manifest={}, stored={:?}",
                entry.file_name, entry.sha256, stored
            );
            return Ok(false);
        }
    }

    Ok(true)
}
