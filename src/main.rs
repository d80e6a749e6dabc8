// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitness Hub daily sync
//!
//! Stores one snapshot per user of the steps, calories and distance each
//! linked provider reports. Runs for today (UTC) unless a `YYYY-MM-DD` date
//! is given as the first argument.

use std::sync::Arc;

use fitness_hub::{
    config::Config,
    db::{CredentialStore, FirestoreStore, MemoryStore},
    time_utils, FitnessHub,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    let config = Config::from_env()?;

    let date = match std::env::args().nth(1) {
        Some(arg) => time_utils::parse_date(&arg)?,
        None => chrono::Utc::now().date_naive(),
    };

    let store: Arc<dyn CredentialStore> = match config.gcp_project_id.as_deref() {
        Some(project_id) => Arc::new(FirestoreStore::new(project_id).await?),
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let hub = FitnessHub::new(&config, store)?;

    tracing::info!(date = %date, "Starting daily sync");
    let report = hub.daily_sync().run(date).await?;

    if report.failed > 0 {
        tracing::warn!(failed = report.failed, "Some users were not synced");
    }

    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fitness_hub=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
