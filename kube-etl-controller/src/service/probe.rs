//! Cluster probe
//!
//! Point-in-time readiness checks against the cluster and the polling
//! loops built on them. Query errors, non-zero exits and unparsable
//! responses all count as "not ready yet"; nothing here ever gives up.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::repository::ClusterClient;

#[derive(Clone)]
pub struct ClusterProbe {
    cluster: Arc<dyn ClusterClient>,
    interval: Duration,
}

impl ClusterProbe {
    pub fn new(cluster: Arc<dyn ClusterClient>, interval: Duration) -> Self {
        Self { cluster, interval }
    }

    /// True iff the pod reports ready
    pub async fn pod_ready(&self, pod: &str) -> bool {
        match self.cluster.get_pod(pod).await {
            Ok(status) => status.is_ready(),
            Err(e) => {
                debug!("Pod {} not queryable yet: {:#}", pod, e);
                false
            }
        }
    }

    /// True iff the job reports complete
    pub async fn job_complete(&self, job: &str) -> bool {
        match self.cluster.get_job(job).await {
            Ok(status) => status.is_complete(),
            Err(e) => {
                debug!("Job {} not queryable yet: {:#}", job, e);
                false
            }
        }
    }

    /// True iff the pod is ready and started strictly after `after`
    pub async fn pod_rolled_after(&self, pod: &str, after: DateTime<Utc>) -> bool {
        match self.cluster.get_pod(pod).await {
            Ok(status) => {
                let rolled = status.is_ready()
                    && status.started_at().is_some_and(|started| started > after);
                if !rolled {
                    debug!(
                        "Pod {} not rolled yet (started {:?})",
                        status.metadata.name,
                        status.started_at()
                    );
                }
                rolled
            }
            Err(e) => {
                debug!("Pod {} not queryable yet: {:#}", pod, e);
                false
            }
        }
    }

    /// Waits until every pod reports ready
    pub async fn wait_for_pods_ready(&self, pods: &[String]) {
        for pod in pods {
            self.poll_until(|| self.pod_ready(pod)).await;
            debug!("Pod {} ready", pod);
        }
    }

    /// Waits until the job reports complete
    pub async fn wait_for_job_complete(&self, job: &str) {
        self.poll_until(|| self.job_complete(job)).await;
        debug!("Job {} complete", job);
    }

    /// Waits until every pod has been replaced by a ready instance started after `after`
    pub async fn wait_for_rollout(&self, pods: &[String], after: DateTime<Utc>) {
        for pod in pods {
            self.poll_until(|| self.pod_rolled_after(pod, after)).await;
            debug!("Pod {} rolled after {}", pod, after);
        }
    }

    async fn poll_until<F, Fut>(&self, check: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = bool>,
    {
        while !check().await {
            tokio::time::sleep(self.interval).await;
        }
    }
}
