//! Scheduler layer for the controller
//!
//! This layer runs the pipeline loop: it discovers batches, drives each one
//! through its cycle and decides what happens after success or failure.

pub mod pipeline;

pub use pipeline::PipelineLoop;
