// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Fit adapter, backed by the `dataset:aggregate` endpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{day_start_millis, PlatformContext};
use crate::error::{AppError, Result};
use crate::models::{Period, UserId};

const STEPS_SOURCE: &str =
    "derived:com.google.step_count.delta:com.google.android.gms:estimated_steps";
const CALORIES_SOURCE: &str =
    "derived:com.google.calories.expended:com.google.android.gms:merge_calories_expended";
const DISTANCE_SOURCE: &str =
    "derived:com.google.distance.delta:com.google.android.gms:merge_distance_delta";

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Which field of a data point carries the value.
#[derive(Debug, Clone, Copy)]
enum ValueField {
    Int,
    Fp,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateRequest<'a> {
    aggregate_by: [DataSourceRef<'a>; 1],
    bucket_by_time: BucketByTime,
    start_time_millis: i64,
    end_time_millis: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceRef<'a> {
    data_source_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BucketByTime {
    duration_millis: i64,
}

#[derive(Debug, Default, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    bucket: Vec<Bucket>,
    #[serde(default)]
    error: Option<GoogleError>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    #[serde(default)]
    dataset: Vec<Dataset>,
}

#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(default)]
    point: Vec<Point>,
}

#[derive(Debug, Deserialize)]
struct Point {
    #[serde(default)]
    value: Vec<PointValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointValue {
    #[serde(default)]
    int_val: Option<i64>,
    #[serde(default)]
    fp_val: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl AggregateResponse {
    /// Sum the first value of every point in every bucket.
    fn total(&self, field: ValueField) -> f64 {
        self.bucket
            .iter()
            .flat_map(|b| &b.dataset)
            .flat_map(|d| &d.point)
            .filter_map(|p| p.value.first())
            .map(|v| match field {
                ValueField::Int => v.int_val.map(|i| i as f64).unwrap_or(0.0),
                ValueField::Fp => v.fp_val.unwrap_or(0.0),
            })
            .sum()
    }
}

pub struct GooglePlatform {
    ctx: PlatformContext,
}

impl GooglePlatform {
    pub fn new(ctx: PlatformContext) -> Self {
        Self { ctx }
    }

    pub fn name(&self) -> &'static str {
        self.ctx.name()
    }

    pub async fn get_steps(&self, user_id: UserId, date: NaiveDate) -> Result<i64> {
        let total = self
            .aggregate(user_id, STEPS_SOURCE, ValueField::Int, date, MILLIS_PER_DAY)
            .await?;
        Ok(total.trunc() as i64)
    }

    pub async fn get_calories(&self, user_id: UserId, date: NaiveDate) -> Result<i64> {
        let total = self
            .aggregate(user_id, CALORIES_SOURCE, ValueField::Fp, date, MILLIS_PER_DAY)
            .await?;
        Ok(total.trunc() as i64)
    }

    pub async fn get_distance(&self, user_id: UserId, date: NaiveDate) -> Result<f64> {
        let meters = self
            .aggregate(user_id, DISTANCE_SOURCE, ValueField::Fp, date, MILLIS_PER_DAY)
            .await?;
        Ok(meters / 1000.0)
    }

    pub async fn get_distance_over_period(
        &self,
        user_id: UserId,
        date: NaiveDate,
        period: Period,
    ) -> Result<f64> {
        let meters = self
            .aggregate(
                user_id,
                DISTANCE_SOURCE,
                ValueField::Fp,
                date,
                period.duration_millis(),
            )
            .await?;
        Ok(meters / 1000.0)
    }

    /// One bucket spanning `duration_millis` from the start of `date`.
    async fn aggregate(
        &self,
        user_id: UserId,
        data_source_id: &str,
        field: ValueField,
        date: NaiveDate,
        duration_millis: i64,
    ) -> Result<f64> {
        let access_token = self.ctx.access_token(user_id).await?;
        let url = format!("{}/users/me/dataset:aggregate", self.ctx.provider().api_base);

        let start_time_millis = day_start_millis(date);
        let request = AggregateRequest {
            aggregate_by: [DataSourceRef { data_source_id }],
            bucket_by_time: BucketByTime { duration_millis },
            start_time_millis,
            end_time_millis: start_time_millis + duration_millis,
        };

        let response: AggregateResponse = self.ctx.post_json(&url, &request, &access_token).await?;

        if let Some(error) = response.error.as_ref() {
            tracing::error!(
                user_id,
                code = error.code,
                message = %error.message,
                "Google Fit returned an error"
            );
            return Err(AppError::provider_api(self.name(), error.message.clone()));
        }

        Ok(response.total(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = AggregateRequest {
            aggregate_by: [DataSourceRef {
                data_source_id: STEPS_SOURCE,
            }],
            bucket_by_time: BucketByTime {
                duration_millis: MILLIS_PER_DAY,
            },
            start_time_millis: 1_705_276_800_000,
            end_time_millis: 1_705_363_200_000,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "aggregateBy": [{"dataSourceId": STEPS_SOURCE}],
                "bucketByTime": {"durationMillis": 86_400_000},
                "startTimeMillis": 1_705_276_800_000i64,
                "endTimeMillis": 1_705_363_200_000i64
            })
        );
    }

    #[test]
    fn test_total_sums_first_values() {
        let response: AggregateResponse = serde_json::from_value(json!({
            "bucket": [
                {"dataset": [{"point": [
                    {"value": [{"fpVal": 1200.5}]},
                    {"value": [{"fpVal": 800.0}, {"fpVal": 99.0}]},
                    {"value": []}
                ]}]},
                {"dataset": [{"point": []}]},
                {"dataset": []}
            ]
        }))
        .unwrap();
        assert_eq!(response.total(ValueField::Fp), 2000.5);
        assert_eq!(response.total(ValueField::Int), 0.0);
    }

    #[test]
    fn test_empty_response_is_zero() {
        let response: AggregateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.total(ValueField::Int), 0.0);
    }

    #[test]
    fn test_error_object() {
        let response: AggregateResponse = serde_json::from_value(json!({
            "error": {"code": 403, "message": "insufficient permissions"}
        }))
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, 403);
        assert_eq!(error.message, "insufficient permissions");
    }
}
