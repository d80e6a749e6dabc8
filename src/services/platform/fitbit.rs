// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API adapter.
//!
//! Daily values come from the activity summary endpoint; period distance
//! from the activity time series endpoint. No `Accept-Language` header is
//! sent, so Fitbit reports metric units (km).

use chrono::NaiveDate;
use serde::Deserialize;

use super::PlatformContext;
use crate::error::{AppError, Result};
use crate::models::{Period, UserId};
use crate::time_utils;

#[derive(Debug, Default, Deserialize)]
struct DailyActivity {
    #[serde(default)]
    summary: ActivitySummary,
    #[serde(default)]
    errors: Vec<FitbitError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivitySummary {
    #[serde(default)]
    steps: i64,
    #[serde(default)]
    calories_out: i64,
    #[serde(default)]
    distances: Vec<ActivityDistance>,
}

#[derive(Debug, Deserialize)]
struct ActivityDistance {
    #[serde(default)]
    activity: String,
    #[serde(default)]
    distance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FitbitError {
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// One entry of an activity time series.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesEntry {
    #[serde(default)]
    date_time: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct DistanceSeries {
    #[serde(rename = "activities-distance", default)]
    entries: Vec<SeriesEntry>,
}

impl ActivitySummary {
    /// The `total` entry, else the first one reported.
    fn total_distance(&self) -> f64 {
        self.distances
            .iter()
            .find(|d| d.activity == "total")
            .or_else(|| self.distances.first())
            .map(|d| d.distance)
            .unwrap_or(0.0)
    }
}

pub struct FitbitPlatform {
    ctx: PlatformContext,
}

impl FitbitPlatform {
    pub fn new(ctx: PlatformContext) -> Self {
        Self { ctx }
    }

    pub fn name(&self) -> &'static str {
        self.ctx.name()
    }

    pub async fn get_steps(&self, user_id: UserId, date: NaiveDate) -> Result<i64> {
        Ok(self.daily_activity(user_id, date).await?.summary.steps)
    }

    pub async fn get_calories(&self, user_id: UserId, date: NaiveDate) -> Result<i64> {
        Ok(self.daily_activity(user_id, date).await?.summary.calories_out)
    }

    pub async fn get_distance(&self, user_id: UserId, date: NaiveDate) -> Result<f64> {
        Ok(self
            .daily_activity(user_id, date)
            .await?
            .summary
            .total_distance())
    }

    /// Sum of the daily distance series over `period`.
    pub async fn get_distance_over_period(
        &self,
        user_id: UserId,
        date: NaiveDate,
        period: Period,
    ) -> Result<f64> {
        let access_token = self.ctx.access_token(user_id).await?;
        let url = format!(
            "{}/user/-/activities/distance/date/{}/{}.json",
            self.ctx.provider().api_base,
            time_utils::format_date(date),
            period
        );

        let series: DistanceSeries = self.ctx.get_json(&url, &[], &access_token).await?;
        Ok(sum_series(self.name(), &series.entries))
    }

    async fn daily_activity(&self, user_id: UserId, date: NaiveDate) -> Result<DailyActivity> {
        let access_token = self.ctx.access_token(user_id).await?;
        let url = format!(
            "{}/user/-/activities/date/{}.json",
            self.ctx.provider().api_base,
            time_utils::format_date(date)
        );

        let activity: DailyActivity = self.ctx.get_json(&url, &[], &access_token).await?;

        if !activity.errors.is_empty() {
            for error in &activity.errors {
                tracing::error!(
                    user_id,
                    error_type = %error.error_type,
                    message = %error.message,
                    "Fitbit daily activity request failed"
                );
            }
            return Err(AppError::provider_api(
                self.name(),
                "failed to request daily activity",
            ));
        }

        Ok(activity)
    }
}

/// Add up series values, skipping (and logging) any that do not parse.
fn sum_series(provider: &str, entries: &[SeriesEntry]) -> f64 {
    entries
        .iter()
        .filter_map(|entry| match entry.value.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::error!(
                    provider,
                    date = %entry.date_time,
                    value = %entry.value,
                    "Bad value in activity series"
                );
                None
            }
        })
        .sum()
}
