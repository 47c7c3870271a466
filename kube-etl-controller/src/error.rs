//! Error types for the pipeline controller

use thiserror::Error;

/// Errors that abort a batch cycle
///
/// All but `Cleanup` send the controller to its error state.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Listing current jobs failed during stale-job teardown
    #[error("failed to query cluster jobs: {0:#}")]
    ClusterQuery(anyhow::Error),

    /// The job-creation command exited non-zero
    #[error("failed to create job {job}: {error:#}")]
    JobCreate { job: String, error: anyhow::Error },

    /// Stages finished without recording all four timestamps
    #[error("batch {0} finished without complete stage timings")]
    IncompleteRun(String),

    /// Deleting the consumed batch files failed
    #[error("failed to delete files of batch {batch}: {error:#}")]
    Cleanup { batch: String, error: anyhow::Error },
}
