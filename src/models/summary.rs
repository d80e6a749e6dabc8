// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily per-platform snapshot written by the sync job.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Metric, PlatformResult, UserId};

/// Values reported by one platform for one day. Absent metrics had no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl MetricValues {
    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Steps => self.steps = Some(value),
            Metric::Calories => self.calories = Some(value),
            Metric::Distance => self.distance = Some(value),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Steps => self.steps,
            Metric::Calories => self.calories,
            Metric::Distance => self.distance,
        }
    }
}

/// Stored snapshot for a (user, date) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub user_id: UserId,
    /// Calendar date (YYYY-MM-DD)
    pub date: String,
    /// Values keyed by platform name
    #[serde(default)]
    pub platforms: BTreeMap<String, MetricValues>,
}

impl DailySummary {
    pub fn new(user_id: UserId, date: String) -> Self {
        Self {
            user_id,
            date,
            platforms: BTreeMap::new(),
        }
    }

    /// Fold one aggregation result set into the snapshot.
    pub fn record(&mut self, metric: Metric, results: &[PlatformResult]) {
        for result in results {
            self.platforms
                .entry(result.platform.clone())
                .or_default()
                .set(metric, result.value);
        }
    }
}
