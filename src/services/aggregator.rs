// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fan-out of one metric query across every provider linked to a user.
//!
//! A provider misbehaving never fails the whole query; only when no provider
//! produced a value does the caller get an error. Internal failures (corrupt
//! credential record, unreachable database) are different: they fail the
//! request outright. Provider calls run
//! concurrently (bounded) and each is capped by a timeout. Dropping the
//! returned future cancels the calls still in flight.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use crate::db::CredentialStore;
use crate::error::{AppError, ErrorCategory, Result};
use crate::models::{Metric, MetricQuery, PlatformResult};
use crate::services::platform::{Platform, PlatformTable};

#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn CredentialStore>,
    platforms: Arc<PlatformTable>,
    max_concurrency: usize,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        platforms: Arc<PlatformTable>,
        max_concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            platforms,
            max_concurrency: max_concurrency.max(1),
            timeout,
        }
    }

    /// Collect `query.metric` from every linked provider.
    ///
    /// Results follow the order of the user's linked providers. With
    /// `largest_only`, only the largest value is returned.
    pub async fn get_metric(&self, query: MetricQuery) -> Result<Vec<PlatformResult>> {
        if query.period.is_some() && query.metric != Metric::Distance {
            return Err(AppError::BadRequest(format!(
                "period is only supported for {}",
                Metric::Distance
            )));
        }

        let linked = self.store.get_linked_providers(query.user_id).await?;

        let platforms: Vec<&Platform> = linked
            .iter()
            .filter_map(|name| {
                let platform = self.platforms.get(name);
                if platform.is_none() {
                    tracing::warn!(
                        user_id = query.user_id,
                        provider = %name,
                        "Linked provider is not configured, skipping"
                    );
                }
                platform
            })
            .collect();

        let query = &query;
        let outcomes: Vec<(&'static str, Result<f64>)> = stream::iter(platforms)
            .map(|platform| async move {
                let call = tokio::time::timeout(self.timeout, platform.get_metric(query));
                let outcome = match call.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(AppError::Timeout {
                        provider: platform.name().to_string(),
                    }),
                };
                (platform.name(), outcome)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut fatal = None;
        for (provider, outcome) in outcomes {
            match outcome {
                Ok(value) => results.push(PlatformResult::new(provider, value)),
                Err(e) => {
                    let _span = tracing::info_span!(
                        "provider_call",
                        user_id = query.user_id,
                        provider,
                        date = %query.date,
                        metric = %query.metric
                    )
                    .entered();
                    e.log();
                    if fatal.is_none() && e.category() == ErrorCategory::Internal {
                        fatal = Some(e);
                    }
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        if results.is_empty() {
            tracing::warn!(
                user_id = query.user_id,
                date = %query.date,
                metric = %query.metric,
                linked = linked.len(),
                "No provider returned data"
            );
            return Err(AppError::NoDataAvailable);
        }

        if query.largest_only {
            results = select_largest(results);
        }

        Ok(results)
    }
}

/// Reduce to the single largest result.
///
/// Scans left to right and advances on `>=`, so among equal maxima the last
/// one wins.
pub fn select_largest(results: Vec<PlatformResult>) -> Vec<PlatformResult> {
    let mut largest: Option<PlatformResult> = None;
    for result in results {
        let advance = largest
            .as_ref()
            .map_or(true, |current| result.value >= current.value);
        if advance {
            largest = Some(result);
        }
    }
    largest.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(values: &[(&str, f64)]) -> Vec<PlatformResult> {
        values
            .iter()
            .map(|(name, value)| PlatformResult::new(*name, *value))
            .collect()
    }

    #[test]
    fn test_select_largest_last_max_wins() {
        let selected = select_largest(results(&[("A", 5.0), ("B", 9.0), ("C", 9.0)]));
        assert_eq!(selected, results(&[("C", 9.0)]));
    }

    #[test]
    fn test_select_largest_single_and_empty() {
        assert_eq!(
            select_largest(results(&[("fitbit", 500.0)])),
            results(&[("fitbit", 500.0)])
        );
        assert!(select_largest(Vec::new()).is_empty());
    }

    #[test]
    fn test_select_largest_first_is_max() {
        let selected = select_largest(results(&[("fitbit", 500.0), ("strava", 300.0)]));
        assert_eq!(selected, results(&[("fitbit", 500.0)]));
    }
}
