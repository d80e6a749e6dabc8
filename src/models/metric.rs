// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Metric kinds, query periods and per-platform results.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::UserId;

/// Fitness metric that can be aggregated across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Step count
    Steps,
    /// Kilocalories burned
    Calories,
    /// Kilometres travelled
    Distance,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Steps, Metric::Calories, Metric::Distance];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Steps => "steps",
            Metric::Calories => "calories",
            Metric::Distance => "distance",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steps" => Ok(Metric::Steps),
            "calories" => Ok(Metric::Calories),
            "distance" => Ok(Metric::Distance),
            other => Err(AppError::BadRequest(format!("unknown metric '{}'", other))),
        }
    }
}

/// Range accepted by period queries.
///
/// Each period maps to a fixed duration rather than a calendar span: `1w`
/// equals `7d`, `1m` equals `30d`, and `6m` is an approximation
/// (23,330,000,000 ms, a little under 270 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    OneDay,
    SevenDays,
    ThirtyDays,
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::SevenDays => "7d",
            Period::ThirtyDays => "30d",
            Period::OneWeek => "1w",
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::SixMonths => "6m",
        }
    }

    pub fn duration_millis(self) -> i64 {
        match self {
            Period::OneDay => 86_400_000,
            Period::SevenDays => 608_400_000,
            Period::ThirtyDays => 2_592_000_000,
            Period::OneWeek => 608_400_000,
            Period::OneMonth => 2_592_000_000,
            Period::ThreeMonths => 7_776_000_000,
            Period::SixMonths => 23_330_000_000,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Period::OneDay),
            "7d" => Ok(Period::SevenDays),
            "30d" => Ok(Period::ThirtyDays),
            "1w" => Ok(Period::OneWeek),
            "1m" => Ok(Period::OneMonth),
            "3m" => Ok(Period::ThreeMonths),
            "6m" => Ok(Period::SixMonths),
            other => Err(AppError::UnsupportedPeriod(other.to_string())),
        }
    }
}

/// One platform's contribution to an aggregated metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: String,
    pub value: f64,
}

impl PlatformResult {
    pub fn new(platform: impl Into<String>, value: f64) -> Self {
        Self {
            platform: platform.into(),
            value,
        }
    }
}

/// Parameters of a `GetMetric` call.
#[derive(Debug, Clone)]
pub struct MetricQuery {
    pub metric: Metric,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub largest_only: bool,
    /// Only meaningful for [`Metric::Distance`].
    pub period: Option<Period>,
}

impl MetricQuery {
    pub fn new(metric: Metric, user_id: UserId, date: NaiveDate) -> Self {
        Self {
            metric,
            user_id,
            date,
            largest_only: false,
            period: None,
        }
    }

    pub fn largest_only(mut self, largest_only: bool) -> Self {
        self.largest_only = largest_only;
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }
}
