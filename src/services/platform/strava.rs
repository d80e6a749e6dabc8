// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava adapter.
//!
//! Strava has no daily summary, so each value is totalled from the
//! athlete's activities that started on the requested UTC day. Steps are
//! not tracked and always report 0.

use chrono::NaiveDate;
use serde::Deserialize;

use super::PlatformContext;
use crate::error::{AppError, Result};
use crate::models::{Period, UserId};
use crate::time_utils;

/// Kilojoules per kilocalorie.
const KJ_PER_KCAL: f64 = 4.184;

const SECONDS_PER_DAY: i64 = 86_400;

/// Strava's maximum page size; a single day never needs a second page.
const ACTIVITIES_PER_PAGE: u32 = 200;

/// Activity list entry (subset of fields).
#[derive(Debug, Deserialize)]
struct ActivitySummary {
    /// Meters
    #[serde(default)]
    distance: f64,
    /// Absent for activities without power data
    #[serde(default)]
    kilojoules: f64,
}

/// Totals over one day's activities.
#[derive(Debug, Default, PartialEq)]
struct DailyTotals {
    distance_km: f64,
    calories: i64,
}

impl DailyTotals {
    fn from_activities(activities: &[ActivitySummary]) -> Self {
        let meters: f64 = activities.iter().map(|a| a.distance).sum();
        let kilojoules: f64 = activities.iter().map(|a| a.kilojoules).sum();
        Self {
            distance_km: meters / 1000.0,
            calories: (kilojoules / KJ_PER_KCAL).round() as i64,
        }
    }
}

pub struct StravaPlatform {
    ctx: PlatformContext,
}

impl StravaPlatform {
    pub fn new(ctx: PlatformContext) -> Self {
        Self { ctx }
    }

    pub fn name(&self) -> &'static str {
        self.ctx.name()
    }

    pub async fn get_steps(&self, _user_id: UserId, _date: NaiveDate) -> Result<i64> {
        Ok(0)
    }

    pub async fn get_calories(&self, user_id: UserId, date: NaiveDate) -> Result<i64> {
        Ok(self.daily_totals(user_id, date).await?.calories)
    }

    pub async fn get_distance(&self, user_id: UserId, date: NaiveDate) -> Result<f64> {
        Ok(self.daily_totals(user_id, date).await?.distance_km)
    }

    pub async fn get_distance_over_period(
        &self,
        _user_id: UserId,
        _date: NaiveDate,
        period: Period,
    ) -> Result<f64> {
        Err(AppError::UnsupportedPeriod(format!(
            "{} (not available from {})",
            period,
            self.name()
        )))
    }

    async fn daily_totals(&self, user_id: UserId, date: NaiveDate) -> Result<DailyTotals> {
        let access_token = self.ctx.access_token(user_id).await?;
        let url = format!("{}/athlete/activities", self.ctx.provider().api_base);

        let after = time_utils::start_of_day_utc(date).timestamp();
        let before = after + SECONDS_PER_DAY;

        let activities: Vec<ActivitySummary> = self
            .ctx
            .get_json(
                &url,
                &[
                    ("before", before.to_string()),
                    ("after", after.to_string()),
                    ("per_page", ACTIVITIES_PER_PAGE.to_string()),
                ],
                &access_token,
            )
            .await?;

        tracing::debug!(
            user_id,
            date = %date,
            activities = activities.len(),
            "Fetched Strava activities"
        );

        Ok(DailyTotals::from_activities(&activities))
    }
}
