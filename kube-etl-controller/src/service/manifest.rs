//! Manifest gate
//!
//! A batch is only ready once its uploader has written `manifest.json`
//! into the batch folder.

use anyhow::Result;
use kube_etl_core::domain::batch::Batch;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::repository::ObjectStore;

pub struct ManifestGate {
    store: Arc<dyn ObjectStore>,
    interval: Duration,
}

impl ManifestGate {
    pub fn new(store: Arc<dyn ObjectStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Checks once whether the batch's manifest object exists
    ///
    /// Only an exact key match counts; `manifest.json.tmp` does not.
    pub async fn is_ready(&self, batch: &Batch) -> Result<bool> {
        let manifest_key = batch.manifest_key();
        let keys = self.store.list(&manifest_key).await?;
        Ok(keys.iter().any(|key| *key == manifest_key))
    }

    /// Waits until the manifest exists
    ///
    /// There is no timeout: a batch that never gets a manifest blocks here.
    pub async fn await_manifest(&self, batch: &Batch) {
        info!(
            "New {} ingest detected in folder {} - waiting for manifest file...",
            batch.mode, batch.name
        );

        loop {
            match self.is_ready(batch).await {
                Ok(true) => {
                    info!("Manifest found for batch {}", batch.name);
                    return;
                }
                Ok(false) => debug!("No manifest yet for batch {}", batch.name),
                Err(e) => warn!("Failed to check manifest of {}: {:#}", batch.name, e),
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
