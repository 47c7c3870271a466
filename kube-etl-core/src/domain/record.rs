//! Completion record written once per processed batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::IngestMode;
use super::stage::Backend;
use super::timer::RunTimer;

/// Format of the human-readable load date, e.g. `Sat Jun 2024 12:30`
pub const READABLE_DATE_FORMAT: &str = "%a %b %Y %H:%M";

/// Timing telemetry for one finished batch cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: Uuid,
    pub ingest: String,
    #[serde(rename = "type")]
    pub ingest_type: IngestMode,
    pub load_date: DateTime<Utc>,
    pub readable_date: String,
    pub graph_job_duration_secs: i64,
    pub index_job_duration_secs: i64,
    /// Measured from the graph stage start to `finished_at`, not to the
    /// index stage end.
    pub total_job_duration_secs: i64,
}

impl CompletionRecord {
    /// Builds the record for a finished cycle
    ///
    /// Returns `None` unless both stages have start and end timestamps.
    pub fn from_run(
        ingest: &str,
        mode: IngestMode,
        timer: &RunTimer,
        finished_at: DateTime<Utc>,
    ) -> Option<Self> {
        let graph = timer.clock(Backend::Graph);
        let index = timer.clock(Backend::Index);

        let graph_duration = graph.duration()?;
        let index_duration = index.duration()?;
        let total = finished_at - graph.started_at()?;

        Some(Self {
            id: Uuid::new_v4(),
            ingest: ingest.to_string(),
            ingest_type: mode,
            load_date: finished_at,
            readable_date: finished_at.format(READABLE_DATE_FORMAT).to_string(),
            graph_job_duration_secs: graph_duration.num_seconds(),
            index_job_duration_secs: index_duration.num_seconds(),
            total_job_duration_secs: total.num_seconds(),
        })
    }
}
