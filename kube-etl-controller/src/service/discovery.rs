//! Batch discovery
//!
//! Lists the ingest prefix, picks the oldest timestamped folder and
//! classifies it as a bulk or delta batch.

use kube_etl_core::domain::batch::{Batch, IngestMode, is_timestamp_name};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::repository::ObjectStore;

/// Reasons discovery could not produce a batch
///
/// Both are retryable: the pipeline backs off and lists again.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list batch folders: {0:#}")]
    Listing(anyhow::Error),

    #[error("malformed batch {batch}: {reason}")]
    MalformedBatch { batch: String, reason: String },
}

/// Finds the next batch to ingest
pub struct BatchDiscovery {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl BatchDiscovery {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: String) -> Self {
        Self { store, prefix }
    }

    /// Returns the oldest pending batch, or `None` when there is nothing to do
    pub async fn discover(&self) -> Result<Option<Batch>, DiscoveryError> {
        let keys = self
            .store
            .list(&self.prefix)
            .await
            .map_err(DiscoveryError::Listing)?;

        debug!("Found {} key(s) under {}", keys.len(), self.prefix);

        select_batch(&self.prefix, &keys)
    }
}

/// Picks and classifies the oldest timestamped folder in a listing
pub fn select_batch(prefix: &str, keys: &[String]) -> Result<Option<Batch>, DiscoveryError> {
    let folders: BTreeSet<&str> = keys
        .iter()
        .filter_map(|key| key.strip_prefix(prefix)?.split_once('/'))
        .map(|(folder, _)| folder)
        .filter(|folder| is_timestamp_name(folder))
        .collect();

    // Timestamp names sort oldest first
    let Some(name) = folders.first() else {
        return Ok(None);
    };

    let folder = format!("{}{}/", prefix, name);
    let files: Vec<String> = keys
        .iter()
        .filter(|key| key.starts_with(&folder))
        .cloned()
        .collect();

    let mode = classify(name, &folder, &files)?;

    Ok(Some(Batch::new(prefix, *name, mode, files)))
}

/// Derives the ingest mode from the `.txt` marker at the folder's top level
fn classify(name: &str, folder: &str, files: &[String]) -> Result<IngestMode, DiscoveryError> {
    let malformed = |reason: String| DiscoveryError::MalformedBatch {
        batch: name.to_string(),
        reason,
    };

    let mut modes = BTreeSet::new();

    for key in files {
        let Some(relative) = key.strip_prefix(folder) else {
            continue;
        };
        if relative.contains('/') {
            continue;
        }
        let Some(stem) = relative.strip_suffix(".txt") else {
            continue;
        };

        let mode = IngestMode::from_marker(stem)
            .ok_or_else(|| malformed(format!("unknown marker file '{}'", relative)))?;
        modes.insert(mode.as_str());
    }

    match modes.len() {
        0 => Err(malformed("no bulk.txt or delta.txt marker".to_string())),
        1 => Ok(if modes.contains("bulk") {
            IngestMode::Bulk
        } else {
            IngestMode::Delta
        }),
        _ => Err(malformed("conflicting bulk and delta markers".to_string())),
    }
}
