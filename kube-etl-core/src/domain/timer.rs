//! Run timer
//!
//! Tracks when each stage of the current batch cycle started and finished,
//! together with the batch's file list which must outlive the batch value.
//!
//! Each stage owns a separate [`StageClock`]. Concurrent stages borrow their
//! clocks through [`RunTimer::stage_clocks_mut`], so graph and index writes
//! can never touch the same fields.

use chrono::{DateTime, Utc};

use super::stage::Backend;

/// Start and end of a single stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageClock {
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl StageClock {
    /// Records the stage start as now and returns the recorded instant
    ///
    /// Clears any end left over from an earlier run of the same stage.
    pub fn start(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.started_at = Some(now);
        self.finished_at = None;
        now
    }

    /// Records the stage end as now
    pub fn finish(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.finished_at = Some(now);
        now
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_complete(&self) -> bool {
        self.started_at.is_some() && self.finished_at.is_some()
    }

    /// Elapsed time between start and end, if both are recorded
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    fn reset(&mut self) {
        self.started_at = None;
        self.finished_at = None;
    }
}

/// Timer for one batch cycle
#[derive(Debug, Clone, Default)]
pub struct RunTimer {
    graph: StageClock,
    index: StageClock,
    files: Vec<String>,
}

impl RunTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches the file list of the batch being processed
    pub fn set_files(&mut self, files: Vec<String>) {
        self.files = files;
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn clock(&self, backend: Backend) -> &StageClock {
        match backend {
            Backend::Graph => &self.graph,
            Backend::Index => &self.index,
        }
    }

    pub fn clock_mut(&mut self, backend: Backend) -> &mut StageClock {
        match backend {
            Backend::Graph => &mut self.graph,
            Backend::Index => &mut self.index,
        }
    }

    /// Borrows the graph and index clocks at the same time
    pub fn stage_clocks_mut(&mut self) -> (&mut StageClock, &mut StageClock) {
        (&mut self.graph, &mut self.index)
    }

    /// True iff both stages have a start and an end recorded
    pub fn is_complete(&self) -> bool {
        self.graph.is_complete() && self.index.is_complete()
    }

    /// Clears all four timestamps and the cached file list
    pub fn reset(&mut self) {
        self.graph.reset();
        self.index.reset();
        self.files.clear();
    }
}
