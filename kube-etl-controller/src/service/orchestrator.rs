//! Job orchestrator
//!
//! Drives the two stage jobs of a batch through their lifecycle:
//! - Tear down stale jobs of the batch's mode
//! - Run graph and index concurrently (bulk) or graph then index (delta)
//! - Per job: wait for pods, create the job, wait for completion, give
//!   deployment automation time to start a rolling update, then wait for
//!   the pods to come back as fresh instances
//!
//! Stale-job deletion is fire-and-forget: the old jobs are only known to
//! be gone once the delete command exits, the cluster never confirms it.

use chrono::Utc;
use kube_etl_core::domain::batch::{Batch, IngestMode};
use kube_etl_core::domain::stage::{Backend, StageJob};
use kube_etl_core::domain::timer::{RunTimer, StageClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PipelineError;
use crate::repository::ClusterClient;
use crate::service::ClusterProbe;

pub struct JobOrchestrator {
    cluster: Arc<dyn ClusterClient>,
    probe: ClusterProbe,
    rollout_grace: Duration,
    graph_pods: Vec<String>,
    index_pods: Vec<String>,
}

impl JobOrchestrator {
    pub fn new(cluster: Arc<dyn ClusterClient>, config: &Config) -> Self {
        let probe = ClusterProbe::new(cluster.clone(), config.poll_interval);
        Self {
            cluster,
            probe,
            rollout_grace: config.rollout_grace,
            graph_pods: config.graph_pods.clone(),
            index_pods: config.index_pods.clone(),
        }
    }

    /// Builds the stage job of `backend` for a batch
    pub fn stage_job(&self, backend: Backend, batch: &Batch) -> StageJob {
        let pods = match backend {
            Backend::Graph => self.graph_pods.clone(),
            Backend::Index => self.index_pods.clone(),
        };
        StageJob::new(backend, batch.mode, &batch.name, pods)
    }

    /// Deletes any existing jobs of `mode`
    ///
    /// Only a failed job listing is an error. The delete itself is not
    /// checked beyond logging, and nothing to delete is a no-op.
    pub async fn teardown_stale_jobs(&self, mode: IngestMode) -> Result<Vec<String>, PipelineError> {
        let jobs = self
            .cluster
            .list_jobs()
            .await
            .map_err(PipelineError::ClusterQuery)?;

        let stale = select_stale_jobs(&jobs, mode);
        if stale.is_empty() {
            info!("No stale {} jobs to delete", mode);
            return Ok(stale);
        }

        info!("Deleting jobs {}", stale.join(" & "));
        if let Err(e) = self.cluster.delete_jobs(&stale).await {
            warn!("Failed to delete stale jobs {:?}: {:#}", stale, e);
        }

        Ok(stale)
    }

    /// Runs both stages of a batch, recording their timings into `timer`
    pub async fn run_stages(&self, batch: &Batch, timer: &mut RunTimer) -> Result<(), PipelineError> {
        let graph = self.stage_job(Backend::Graph, batch);
        let index = self.stage_job(Backend::Index, batch);
        let (graph_clock, index_clock) = timer.stage_clocks_mut();

        match batch.mode {
            IngestMode::Bulk => {
                // First failure drops the sibling future, cancelling its waits
                tokio::try_join!(
                    self.run_stage(&graph, graph_clock),
                    self.run_stage(&index, index_clock)
                )?;
            }
            IngestMode::Delta => {
                self.run_stage(&graph, graph_clock).await?;
                self.run_stage(&index, index_clock).await?;
            }
        }

        Ok(())
    }

    /// Runs the full per-job protocol for one stage
    async fn run_stage(&self, job: &StageJob, clock: &mut StageClock) -> Result<(), PipelineError> {
        self.probe.wait_for_pods_ready(&job.dependent_pods).await;

        let started_at = clock.start();
        self.cluster
            .create_job_from(&job.job_name, &job.template_name)
            .await
            .map_err(|error| PipelineError::JobCreate {
                job: job.job_name.clone(),
                error,
            })?;

        info!("{} triggered", job.job_name);

        self.probe.wait_for_job_complete(&job.job_name).await;
        info!(
            "{} complete, waiting {:?} for the rolling update",
            job.job_name, self.rollout_grace
        );

        tokio::time::sleep(self.rollout_grace).await;

        self.probe
            .wait_for_rollout(&job.dependent_pods, started_at)
            .await;
        clock.finish();

        info!(
            "{} pods ready ({}s since trigger)",
            job.job_name,
            (Utc::now() - started_at).num_seconds()
        );

        Ok(())
    }
}

/// Picks the existing graph and index jobs of `mode` to delete
///
/// At most one job per backend is selected: the first listed match.
pub fn select_stale_jobs(jobs: &[String], mode: IngestMode) -> Vec<String> {
    let fragment = format!("-{}-", mode.as_str());

    [Backend::Graph, Backend::Index]
        .iter()
        .filter_map(|backend| {
            let prefix = backend.template_name(mode);
            jobs.iter()
                .find(|job| job.starts_with(&prefix) && job.contains(&fragment))
                .cloned()
        })
        .collect()
}
