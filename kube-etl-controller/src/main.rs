//! Kube ETL Controller
//!
//! A long-running controller that ingests batches uploaded to an object
//! store into a graph database and a search index.
//!
//! Architecture:
//! - Configuration: Load settings from environment
//! - Repositories: Object store (S3), cluster (kubectl), record store (Postgres)
//! - Services: Discovery, manifest gate, cluster probe, job orchestration
//! - Scheduler: The pipeline loop state machine
//!
//! The controller waits for the oldest timestamped batch folder to receive
//! its manifest, replaces the stage jobs of the batch's mode, waits for the
//! jobs and the rolling update they trigger, deletes the batch and records
//! how long everything took.

mod config;
mod db;
mod error;
mod repository;
mod scheduler;
mod service;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repository::{KubectlClient, PgRecordStore, S3ObjectStore};
use crate::scheduler::PipelineLoop;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kube_etl_controller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Kube ETL Controller");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: environment={:?}, bucket={}, prefix={}, namespace={}",
        config.environment, config.bucket, config.bucket_prefix, config.kube_namespace
    );

    let store = Arc::new(S3ObjectStore::from_env(config.bucket.clone()).await);
    let cluster = Arc::new(KubectlClient::from_config(&config));

    info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    let records = Arc::new(PgRecordStore::new(pool));

    info!(
        "Poll interval: {:?}, rollout grace: {:?}",
        config.poll_interval, config.rollout_grace
    );

    let mut pipeline = PipelineLoop::new(&config, store, cluster, records);
    if let Err(e) = pipeline.run().await {
        error!("Pipeline halted: {:#}", e);
        return Err(e);
    }

    Ok(())
}
