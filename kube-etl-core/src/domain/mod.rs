//! Core domain types
//!
//! These types describe one ingest cycle: the batch discovered in the
//! object store, the two stage jobs launched for it, the timer that
//! tracks them, and the record persisted once the cycle completes.

pub mod batch;
pub mod record;
pub mod stage;
pub mod timer;
