// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily snapshot job: store every user's per-provider values for one day.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{DailySummary, Metric, MetricQuery, UserId};
use crate::services::aggregator::Aggregator;
use crate::time_utils;

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Users visited
    pub users: usize,
    /// Snapshots written
    pub stored: usize,
    /// Users skipped because of an error
    pub failed: usize,
}

pub struct DailySync {
    store: Arc<dyn CredentialStore>,
    aggregator: Aggregator,
}

impl DailySync {
    pub fn new(store: Arc<dyn CredentialStore>, aggregator: Aggregator) -> Self {
        Self { store, aggregator }
    }

    pub async fn run(&self, date: NaiveDate) -> Result<SyncReport> {
        let user_ids = self.store.list_user_ids().await?;
        let mut report = SyncReport {
            users: user_ids.len(),
            ..Default::default()
        };

        for user_id in user_ids {
            let outcome = match self.sync_user(user_id, date).await {
                Ok(summary) => self.store.put_daily_summary(&summary).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => report.stored += 1,
                Err(e) => {
                    tracing::error!(user_id, date = %date, error = %e, "Daily sync failed for user");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            date = %date,
            users = report.users,
            stored = report.stored,
            failed = report.failed,
            "Daily sync finished"
        );

        Ok(report)
    }

    async fn sync_user(&self, user_id: UserId, date: NaiveDate) -> Result<DailySummary> {
        let mut summary = DailySummary::new(user_id, time_utils::format_date(date));

        for metric in Metric::ALL {
            match self
                .aggregator
                .get_metric(MetricQuery::new(metric, user_id, date))
                .await
            {
                Ok(results) => summary.record(metric, &results),
                Err(AppError::NoDataAvailable) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }
}
