//! Pipeline loop
//!
//! Top-level state machine of the controller. One batch cycle runs at a time:
//!
//! Discovering -> AwaitingManifest -> TearingDownOldJobs -> RunningStages
//! -> CleaningUp -> PersistingRecord -> Discovering
//!
//! Protocol errors move the cycle to the error state, which holds the
//! controller until it is restarted (or returns, in test mode). A failed
//! cleanup goes back to discovery without writing a record, so the batch
//! may be processed again.

use anyhow::Result;
use chrono::{DateTime, Utc};
use kube_etl_core::domain::batch::Batch;
use kube_etl_core::domain::record::CompletionRecord;
use kube_etl_core::domain::timer::RunTimer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::repository::{ClusterClient, ObjectStore, RecordStore};
use crate::service::{BatchDiscovery, DiscoveryError, JobOrchestrator, ManifestGate};

/// States of one batch cycle
#[derive(Debug)]
enum CycleState {
    Discovering,
    AwaitingManifest(Batch),
    TearingDownOldJobs(Batch),
    RunningStages(Batch),
    CleaningUp(Batch),
    PersistingRecord {
        batch: Batch,
        finished_at: DateTime<Utc>,
    },
    Error(PipelineError),
}

/// How a batch cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// Nothing to ingest
    NoBatch,
    /// Listing failed or the oldest batch is malformed; retry later
    DiscoveryFailed(DiscoveryError),
    /// Batch ingested, cleaned up and recorded
    Completed(CompletionRecord),
    /// Batch ingested but its files could not be deleted
    CleanupFailed(PipelineError),
    /// Protocol error; the controller must halt
    Halted(PipelineError),
}

pub struct PipelineLoop {
    discovery: BatchDiscovery,
    gate: ManifestGate,
    orchestrator: JobOrchestrator,
    store: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    timer: RunTimer,
    poll_interval: Duration,
    terminal_errors: bool,
}

impl PipelineLoop {
    pub fn new(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        cluster: Arc<dyn ClusterClient>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            discovery: BatchDiscovery::new(store.clone(), config.bucket_prefix.clone()),
            gate: ManifestGate::new(store.clone(), config.poll_interval),
            orchestrator: JobOrchestrator::new(cluster, config),
            store,
            records,
            timer: RunTimer::new(),
            poll_interval: config.poll_interval,
            terminal_errors: config.error_state_is_terminal(),
        }
    }

    /// Runs batch cycles until the controller reaches its error state
    ///
    /// In production the error state never returns, so neither does this.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting pipeline loop (poll interval: {:?})",
            self.poll_interval
        );

        loop {
            match self.run_cycle().await {
                CycleOutcome::NoBatch => {
                    debug!("No batch found");
                    tokio::time::sleep(self.poll_interval).await;
                }
                CycleOutcome::DiscoveryFailed(e) => {
                    warn!("{}", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
                CycleOutcome::Completed(record) => {
                    info!("Batch {} complete", record.ingest);
                }
                CycleOutcome::CleanupFailed(e) => {
                    error!("{}; restarting discovery without a completion record", e);
                    tokio::time::sleep(self.poll_interval).await;
                }
                CycleOutcome::Halted(e) => {
                    self.enter_error_state().await;
                    return Err(e.into());
                }
            }
        }
    }

    /// Runs one cycle from discovery until it returns to discovery or fails
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let mut state = CycleState::Discovering;

        loop {
            debug!("Cycle state: {:?}", state);

            state = match state {
                CycleState::Discovering => match self.discovery.discover().await {
                    Ok(Some(batch)) => {
                        self.timer.set_files(batch.files.clone());
                        CycleState::AwaitingManifest(batch)
                    }
                    Ok(None) => return CycleOutcome::NoBatch,
                    Err(e) => return CycleOutcome::DiscoveryFailed(e),
                },

                CycleState::AwaitingManifest(batch) => {
                    self.gate.await_manifest(&batch).await;
                    CycleState::TearingDownOldJobs(batch)
                }

                CycleState::TearingDownOldJobs(batch) => {
                    match self.orchestrator.teardown_stale_jobs(batch.mode).await {
                        Ok(_) => CycleState::RunningStages(batch),
                        Err(e) => CycleState::Error(e),
                    }
                }

                CycleState::RunningStages(batch) => {
                    match self.orchestrator.run_stages(&batch, &mut self.timer).await {
                        Ok(()) if self.timer.is_complete() => CycleState::CleaningUp(batch),
                        Ok(()) => CycleState::Error(PipelineError::IncompleteRun(batch.name)),
                        Err(e) => CycleState::Error(e),
                    }
                }

                CycleState::CleaningUp(batch) => {
                    let keys = cleanup_keys(&batch, self.timer.files());
                    info!("Deleting {} object(s) of batch {}", keys.len(), batch.name);

                    match self.store.delete(&keys).await {
                        Ok(()) => CycleState::PersistingRecord {
                            batch,
                            finished_at: Utc::now(),
                        },
                        Err(error) => {
                            return CycleOutcome::CleanupFailed(PipelineError::Cleanup {
                                batch: batch.name,
                                error,
                            });
                        }
                    }
                }

                CycleState::PersistingRecord { batch, finished_at } => {
                    match CompletionRecord::from_run(&batch.name, batch.mode, &self.timer, finished_at)
                    {
                        Some(record) => {
                            self.persist(&record).await;
                            self.timer.reset();
                            return CycleOutcome::Completed(record);
                        }
                        None => CycleState::Error(PipelineError::IncompleteRun(batch.name)),
                    }
                }

                CycleState::Error(e) => {
                    error!("Entering error state: {}", e);
                    return CycleOutcome::Halted(e);
                }
            };
        }
    }

    /// Hands the record to the durable store
    ///
    /// A failed write is logged only; the batch is already gone from the
    /// object store and is not retried.
    async fn persist(&self, record: &CompletionRecord) {
        match serde_json::to_string_pretty(record) {
            Ok(json) => info!("Completion record: {}", json),
            Err(e) => warn!("Failed to render completion record: {}", e),
        }

        if let Err(e) = self.records.append(record).await {
            error!(
                "Failed to persist completion record for {}: {:#}",
                record.ingest, e
            );
        }
    }

    /// Holds the controller after a protocol error
    ///
    /// Returns immediately when errors are terminal (test mode); otherwise
    /// idles forever until the process is restarted.
    async fn enter_error_state(&self) {
        if self.terminal_errors {
            return;
        }

        loop {
            tokio::time::sleep(self.poll_interval).await;
            warn!("Controller is in error state; restart required to resume ingestion");
        }
    }
}

/// Keys to delete once a batch is ingested
///
/// The files captured at discovery plus the manifest, which usually
/// arrives after discovery and would otherwise leave the folder behind.
fn cleanup_keys(batch: &Batch, files: &[String]) -> Vec<String> {
    let mut keys = files.to_vec();
    let manifest = batch.manifest_key();
    if !keys.contains(&manifest) {
        keys.push(manifest);
    }
    keys
}
