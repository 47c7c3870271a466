//! Service layer
//!
//! Services contain the controller's business logic. They drive the
//! repositories to discover batches, gate them on their manifest, probe the
//! cluster and orchestrate the stage jobs of a batch cycle.

mod discovery;
mod integrity;
mod manifest;
mod orchestrator;
mod probe;

pub use discovery::{BatchDiscovery, DiscoveryError};
#[allow(unused_imports)]
pub use integrity::{ManifestEntry, check_manifest};
pub use manifest::ManifestGate;
pub use orchestrator::JobOrchestrator;
pub use probe::ClusterProbe;
