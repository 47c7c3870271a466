//! Cluster repository
//!
//! Drives the cluster control plane by shelling out to kubectl:
//! - Listing and inspecting jobs
//! - Inspecting pods
//! - Deleting stale jobs
//! - Creating jobs from their cronjob templates
//!
//! Every command runs against the configured namespace/context. Queries
//! fail on a non-zero exit, any stderr output, or an unparsable response.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Config;

/// Repository trait for cluster control-plane operations
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Lists the names of all jobs in the namespace
    async fn list_jobs(&self) -> Result<Vec<String>>;

    /// Fetches a single job
    async fn get_job(&self, name: &str) -> Result<KubeJob>;

    /// Fetches a single pod
    async fn get_pod(&self, name: &str) -> Result<KubePod>;

    /// Deletes the named jobs in one command
    async fn delete_jobs(&self, names: &[String]) -> Result<()>;

    /// Creates job `name` from the cronjob `template`
    ///
    /// Fails if the command exits non-zero.
    async fn create_job_from(&self, name: &str, template: &str) -> Result<()>;
}

// =============================================================================
// Resource views
// =============================================================================

/// The subset of a kube Job the controller reads
#[derive(Debug, Clone, Deserialize)]
pub struct KubeJob {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: JobStatus,
}

impl KubeJob {
    /// True iff the job reports a `Complete` condition or a succeeded pod
    pub fn is_complete(&self) -> bool {
        self.status.succeeded.unwrap_or(0) >= 1
            || has_true_condition(&self.status.conditions, "Complete")
    }
}

/// The subset of a kube Pod the controller reads
#[derive(Debug, Clone, Deserialize)]
pub struct KubePod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PodStatus,
}

impl KubePod {
    /// True iff the pod's `Ready` condition is `"True"`
    pub fn is_ready(&self) -> bool {
        has_true_condition(&self.status.conditions, "Ready")
    }

    /// When the pod's current containers started running
    ///
    /// Uses the latest container start, falling back to the pod start time.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.status
            .container_statuses
            .iter()
            .filter_map(|c| c.state.running.as_ref()?.started_at)
            .max()
            .or(self.status.start_time)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatus {
    pub succeeded: Option<i32>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerStatus {
    #[serde(default)]
    pub state: ContainerState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerState {
    pub running: Option<RunningState>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningState {
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    items: Vec<KubeJob>,
}

fn has_true_condition(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.condition_type == condition_type && c.status == "True")
}

// =============================================================================
// kubectl implementation
// =============================================================================

/// Captured result of one kubectl invocation
struct CommandOutput {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

/// kubectl implementation of ClusterClient
pub struct KubectlClient {
    bin: String,
    base_args: Vec<String>,
}

impl KubectlClient {
    /// Creates a new kubectl client
    ///
    /// # Arguments
    /// * `bin` - kubectl binary to invoke
    /// * `namespace` - Namespace every command runs in
    /// * `context` - Optional kube context
    /// * `token` - Optional service account token
    pub fn new(
        bin: String,
        namespace: String,
        context: Option<String>,
        token: Option<String>,
    ) -> Self {
        let mut base_args = Vec::new();

        if let Some(context) = context {
            base_args.push("--context".to_string());
            base_args.push(context);
        }

        base_args.push("--namespace".to_string());
        base_args.push(namespace);

        if let Some(token) = token {
            base_args.push("--token".to_string());
            base_args.push(token);
        }

        Self { bin, base_args }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.kubectl_bin.clone(),
            config.kube_namespace.clone(),
            config.kube_context.clone(),
            config.kube_token.clone(),
        )
    }

    /// Runs kubectl with the base arguments followed by `args`
    async fn exec(&self, args: &[&str]) -> Result<CommandOutput> {
        // Base args are not logged, they may carry the token
        debug!("kubectl {}", args.join(" "));

        let output = Command::new(&self.bin)
            .args(&self.base_args)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute '{} {}'", self.bin, args.join(" ")))?;

        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Runs a read-only query and returns stdout
    async fn query(&self, args: &[&str]) -> Result<String> {
        let output = self.exec(args).await?;

        if !output.success || !output.stderr.trim().is_empty() {
            anyhow::bail!(
                "kubectl {} failed: exit_code={}, stderr='{}'",
                args.join(" "),
                output.exit_code,
                output.stderr.trim()
            );
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl ClusterClient for KubectlClient {
    async fn list_jobs(&self) -> Result<Vec<String>> {
        let stdout = self.query(&["get", "jobs", "-o", "json"]).await?;
        let list: JobList = serde_json::from_str(&stdout).context("Failed to parse job list")?;

        Ok(list.items.into_iter().map(|job| job.metadata.name).collect())
    }

    async fn get_job(&self, name: &str) -> Result<KubeJob> {
        let stdout = self.query(&["get", "jobs", name, "-o", "json"]).await?;
        serde_json::from_str(&stdout).with_context(|| format!("Failed to parse job {}", name))
    }

    async fn get_pod(&self, name: &str) -> Result<KubePod> {
        let stdout = self.query(&["get", "pods", name, "-o", "json"]).await?;
        serde_json::from_str(&stdout).with_context(|| format!("Failed to parse pod {}", name))
    }

    async fn delete_jobs(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        let mut args = vec!["delete", "jobs"];
        args.extend(names.iter().map(String::as_str));

        let output = self.exec(&args).await?;
        if !output.success {
            anyhow::bail!(
                "kubectl delete jobs exited with {}: {}",
                output.exit_code,
                output.stderr.trim()
            );
        }

        Ok(())
    }

    async fn create_job_from(&self, name: &str, template: &str) -> Result<()> {
        let from = format!("cronjob/{}", template);
        let output = self
            .exec(&["create", "job", name, "--from", from.as_str()])
            .await?;

        if !output.success {
            anyhow::bail!(
                "{} exits with non zero code {}: {}",
                name,
                output.exit_code,
                output.stderr.trim()
            );
        }

        if !output.stderr.trim().is_empty() {
            warn!("kubectl create job {} stderr: {}", name, output.stderr.trim());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pod_ready_condition() {
        let pod: KubePod = serde_json::from_value(json!({
            "metadata": { "name": "neo4j-0" },
            "status": {
                "conditions": [
                    { "type": "Initialized", "status": "True" },
                    { "type": "Ready", "status": "True" }
                ]
            }
        }))
        .unwrap();
        assert!(pod.is_ready());

        let pod: KubePod = serde_json::from_value(json!({
            "metadata": { "name": "neo4j-0" },
            "status": { "conditions": [ { "type": "Ready", "status": "False" } ] }
        }))
        .unwrap();
        assert!(!pod.is_ready());
    }

    #[test]
    fn test_pod_without_status_is_not_ready() {
        let pod: KubePod = serde_json::from_value(json!({
            "metadata": { "name": "neo4j-0" }
        }))
        .unwrap();
        assert!(!pod.is_ready());
        assert!(pod.started_at().is_none());
    }

    #[test]
    fn test_pod_started_at_prefers_latest_container() {
        let pod: KubePod = serde_json::from_value(json!({
            "metadata": { "name": "elasticsearch-0" },
            "status": {
                "startTime": "2024-06-01T00:00:00Z",
                "containerStatuses": [
                    { "state": { "running": { "startedAt": "2024-06-01T01:00:00Z" } } },
                    { "state": { "running": { "startedAt": "2024-06-01T02:00:00Z" } } },
                    { "state": { "waiting": { "reason": "CrashLoopBackOff" } } }
                ]
            }
        }))
        .unwrap();

        let expected: DateTime<Utc> = "2024-06-01T02:00:00Z".parse().unwrap();
        assert_eq!(pod.started_at(), Some(expected));
    }

    #[test]
    fn test_pod_started_at_falls_back_to_start_time() {
        let pod: KubePod = serde_json::from_value(json!({
            "metadata": { "name": "elasticsearch-0" },
            "status": { "startTime": "2024-06-01T00:00:00Z" }
        }))
        .unwrap();

        let expected: DateTime<Utc> = "2024-06-01T00:00:00Z".parse().unwrap();
        assert_eq!(pod.started_at(), Some(expected));
    }

    #[test]
    fn test_job_completion() {
        let running: KubeJob = serde_json::from_value(json!({
            "metadata": { "name": "graph-bulk-1" },
            "status": { "active": 1 }
        }))
        .unwrap();
        assert!(!running.is_complete());

        let by_condition: KubeJob = serde_json::from_value(json!({
            "metadata": { "name": "graph-bulk-1" },
            "status": { "conditions": [ { "type": "Complete", "status": "True" } ] }
        }))
        .unwrap();
        assert!(by_condition.is_complete());

        let by_count: KubeJob = serde_json::from_value(json!({
            "metadata": { "name": "graph-bulk-1" },
            "status": { "succeeded": 1 }
        }))
        .unwrap();
        assert!(by_count.is_complete());

        let failed: KubeJob = serde_json::from_value(json!({
            "metadata": { "name": "graph-bulk-1" },
            "status": { "failed": 1, "conditions": [ { "type": "Failed", "status": "True" } ] }
        }))
        .unwrap();
        assert!(!failed.is_complete());
    }

    #[test]
    fn test_job_list_parsing() {
        let list: JobList = serde_json::from_value(json!({
            "apiVersion": "v1",
            "items": [
                { "metadata": { "name": "graph-delta-1" }, "status": {} },
                { "metadata": { "name": "index-delta-1" } }
            ]
        }))
        .unwrap();

        let names: Vec<String> = list.items.into_iter().map(|j| j.metadata.name).collect();
        assert_eq!(names, vec!["graph-delta-1", "index-delta-1"]);
    }

    #[test]
    fn test_base_args_order() {
        let client = KubectlClient::new(
            "kubectl".to_string(),
            "dacc-entitysearch".to_string(),
            Some("acp-notprod_DACC".to_string()),
            Some("secret".to_string()),
        );

        assert_eq!(
            client.base_args,
            vec![
                "--context",
                "acp-notprod_DACC",
                "--namespace",
                "dacc-entitysearch",
                "--token",
                "secret"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let client = KubectlClient::new(
            "/nonexistent/kubectl".to_string(),
            "default".to_string(),
            None,
            None,
        );

        assert!(client.list_jobs().await.is_err());
        assert!(client.create_job_from("graph-bulk-1", "graph-bulk").await.is_err());
    }
}
