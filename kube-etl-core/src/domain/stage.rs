//! Stage job domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::batch::IngestMode;

/// Backend pipeline a stage job feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Graph database stage
    Graph,
    /// Search index stage
    Index,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Graph => "graph",
            Backend::Index => "index",
        }
    }

    /// Job template this backend runs for `mode`, e.g. `graph-delta`
    pub fn template_name(&self, mode: IngestMode) -> String {
        format!("{}-{}", self.as_str(), mode.as_str())
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend pipeline's execution for the current batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageJob {
    pub backend: Backend,

    /// `{backend}-{mode}-{batch}`
    pub job_name: String,

    /// `{backend}-{mode}`
    pub template_name: String,

    /// Pods whose readiness gates this stage
    pub dependent_pods: Vec<String>,
}

impl StageJob {
    pub fn new(
        backend: Backend,
        mode: IngestMode,
        batch_name: &str,
        dependent_pods: Vec<String>,
    ) -> Self {
        let template_name = backend.template_name(mode);
        Self {
            backend,
            job_name: format!("{}-{}", template_name, batch_name),
            template_name,
            dependent_pods,
        }
    }
}
