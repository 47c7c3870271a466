//! Repository layer
//!
//! Repositories are stateless clients for the systems the controller drives
//! but does not own: the object store holding batches, the cluster control
//! plane running stage jobs, and the durable store of completion records.
//! They carry no business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod cluster;
mod objects;
mod records;

// Re-export traits
pub use cluster::ClusterClient;
pub use objects::ObjectStore;
pub use records::RecordStore;

// Re-export implementations
pub use cluster::KubectlClient;
pub use objects::S3ObjectStore;
pub use records::PgRecordStore;

// Re-export cluster resource views
pub use cluster::{KubeJob, KubePod};
