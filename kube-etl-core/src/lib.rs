//! Kube ETL Core
//!
//! Core types for the kube-etl ingestion controller.
//!
//! This crate contains the domain types shared by discovery, orchestration
//! and persistence: batches, stage jobs, the run timer and the completion
//! record written once per processed batch.

pub mod domain;
