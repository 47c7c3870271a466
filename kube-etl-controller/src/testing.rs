//! In-memory fakes of the repositories, shared by unit tests

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube_etl_core::domain::record::CompletionRecord;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::repository::{ClusterClient, KubeJob, KubePod, ObjectStore, RecordStore};

// =============================================================================
// Object store
// =============================================================================

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, Option<String>)>>,
    deletes: Mutex<Vec<Vec<String>>>,
    pub fail_list: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl MemoryObjectStore {
    pub fn with_keys(keys: &[&str]) -> Self {
        let store = Self::default();
        for key in keys {
            store.put(key, Vec::new(), None);
        }
        store
    }

    pub fn put(&self, key: &str, body: Vec<u8>, hash: Option<&str>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (body, hash.map(str::to_string)));
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Every batched delete call, in order
    pub fn deletes(&self) -> Vec<Vec<String>> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if self.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("listing unavailable");
        }
        Ok(self
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(body, _)| body.clone())
            .ok_or_else(|| anyhow::anyhow!("no such key {}", key))
    }

    async fn content_hash(&self, key: &str) -> Result<Option<String>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, hash)| hash.clone())
            .ok_or_else(|| anyhow::anyhow!("no such key {}", key))
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        self.deletes.lock().unwrap().push(keys.to_vec());
        if self.fail_delete.load(Ordering::SeqCst) {
            anyhow::bail!("access denied");
        }
        let mut objects = self.objects.lock().unwrap();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}

// =============================================================================
// Cluster
// =============================================================================

/// One observed cluster call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    ListJobs,
    GetJob { name: String, complete: bool },
    GetPod(String),
    DeleteJobs(Vec<String>),
    CreateJob { name: String, template: String },
}

/// Scriptable cluster that records every call
///
/// Created jobs complete immediately unless `complete_after_creates` holds
/// them back until that many jobs exist. Pods are ready and report a start
/// time of "now" unless overridden.
pub struct FakeCluster {
    jobs: Mutex<Vec<String>>,
    created: Mutex<Vec<String>>,
    calls: Mutex<Vec<ClusterCall>>,
    failing_creates: Mutex<HashSet<String>>,
    complete_after_creates: Mutex<usize>,
    pod_started_at: Mutex<Option<DateTime<Utc>>>,
    pub fail_list: AtomicBool,
    pub fail_pod_queries: AtomicBool,
    pub pods_ready: AtomicBool,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            failing_creates: Mutex::new(HashSet::new()),
            complete_after_creates: Mutex::new(0),
            pod_started_at: Mutex::new(None),
            fail_list: AtomicBool::new(false),
            fail_pod_queries: AtomicBool::new(false),
            pods_ready: AtomicBool::new(true),
        }
    }
}

impl FakeCluster {
    pub fn with_jobs(jobs: &[&str]) -> Self {
        let cluster = Self::default();
        *cluster.jobs.lock().unwrap() = jobs.iter().map(|j| j.to_string()).collect();
        cluster
    }

    pub fn fail_create(&self, job: &str) {
        self.failing_creates.lock().unwrap().insert(job.to_string());
    }

    pub fn complete_after_creates(&self, count: usize) {
        *self.complete_after_creates.lock().unwrap() = count;
    }

    pub fn pin_pod_start(&self, started_at: DateTime<Utc>) {
        *self.pod_started_at.lock().unwrap() = Some(started_at);
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn jobs(&self) -> Vec<String> {
        self.jobs.lock().unwrap().clone()
    }

    /// Position of the first call matching `predicate`
    pub fn position(&self, predicate: impl Fn(&ClusterCall) -> bool) -> Option<usize> {
        self.calls().iter().position(predicate)
    }

    /// Position of the last call matching `predicate`
    pub fn last_position(&self, predicate: impl Fn(&ClusterCall) -> bool) -> Option<usize> {
        self.calls().iter().rposition(predicate)
    }

    fn record(&self, call: ClusterCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_jobs(&self) -> Result<Vec<String>> {
        self.record(ClusterCall::ListJobs);
        if self.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("the server is currently unable to handle the request");
        }
        Ok(self.jobs())
    }

    async fn get_job(&self, name: &str) -> Result<KubeJob> {
        let created = self.created.lock().unwrap().clone();
        let gate = *self.complete_after_creates.lock().unwrap();
        let complete = created.iter().any(|c| c == name) && created.len() >= gate;

        self.record(ClusterCall::GetJob {
            name: name.to_string(),
            complete,
        });

        let status = if complete {
            json!({ "conditions": [ { "type": "Complete", "status": "True" } ] })
        } else {
            json!({ "active": 1 })
        };

        Ok(serde_json::from_value(json!({
            "metadata": { "name": name },
            "status": status
        }))?)
    }

    async fn get_pod(&self, name: &str) -> Result<KubePod> {
        self.record(ClusterCall::GetPod(name.to_string()));
        if self.fail_pod_queries.load(Ordering::SeqCst) {
            anyhow::bail!("pods \"{}\" not found", name);
        }

        let ready = if self.pods_ready.load(Ordering::SeqCst) {
            "True"
        } else {
            "False"
        };
        let started_at = self.pod_started_at.lock().unwrap().unwrap_or_else(Utc::now);

        Ok(serde_json::from_value(json!({
            "metadata": { "name": name },
            "status": {
                "conditions": [ { "type": "Ready", "status": ready } ],
                "startTime": started_at.to_rfc3339()
            }
        }))?)
    }

    async fn delete_jobs(&self, names: &[String]) -> Result<()> {
        self.record(ClusterCall::DeleteJobs(names.to_vec()));
        self.jobs.lock().unwrap().retain(|job| !names.contains(job));
        Ok(())
    }

    async fn create_job_from(&self, name: &str, template: &str) -> Result<()> {
        self.record(ClusterCall::CreateJob {
            name: name.to_string(),
            template: template.to_string(),
        });
        if self.failing_creates.lock().unwrap().contains(name) {
            anyhow::bail!("{} exits with non zero code 1", name);
        }
        self.created.lock().unwrap().push(name.to_string());
        self.jobs.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

// =============================================================================
// Record store
// =============================================================================

#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<CompletionRecord>>,
    pub fail_append: AtomicBool,
}

impl MemoryRecordStore {
    pub fn records(&self) -> Vec<CompletionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn append(&self, record: &CompletionRecord) -> Result<()> {
        if self.fail_append.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
