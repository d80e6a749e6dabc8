// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-provider activity adapters.
//!
//! Every adapter answers the same questions (steps, calories, distance for a
//! day, and optionally distance over a period) for one provider. The set of
//! providers is closed, so dispatch is an enum rather than a trait object.
//!
//! Before each call the adapter goes through [`PlatformContext::access_token`],
//! which refreshes the stored credential when it has expired and writes the
//! new one back.

pub mod fitbit;
pub mod google;
pub mod strava;

pub use fitbit::FitbitPlatform;
pub use google::GooglePlatform;
pub use strava::StravaPlatform;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{Metric, MetricQuery, OAuthCredential, Period, UserId};
use crate::services::registry::{ProviderConfig, ProviderKind, ProviderRegistry};
use crate::services::token::TokenClient;
use crate::time_utils;

// ─── Shared Context ──────────────────────────────────────────────────────────

/// What every adapter needs: HTTP, credentials, and its provider settings.
pub struct PlatformContext {
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    tokens: TokenClient,
    provider: ProviderConfig,
    /// Per-user refresh locks so concurrent calls refresh at most once
    refresh_locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl PlatformContext {
    pub fn new(provider: ProviderConfig, tokens: TokenClient, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            http: tokens.http().clone(),
            store,
            tokens,
            provider,
            refresh_locks: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Load the user's credential for this provider, refreshing and
    /// persisting it first if the access token has expired.
    pub async fn access_token(&self, user_id: UserId) -> Result<String> {
        let lock = self
            .refresh_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.load_fresh_token(user_id).await
        };

        // Only the map still holds the lock once no other call is waiting on it.
        drop(lock);
        self.refresh_locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn load_fresh_token(&self, user_id: UserId) -> Result<String> {
        let credential = self.load_credential(user_id).await?;
        let (credential, changed) = self
            .tokens
            .refresh_if_needed(&credential, &self.provider)
            .await?;

        if changed {
            self.store
                .put_credential(user_id, self.name(), &credential.encode()?)
                .await?;

            tracing::info!(
                user_id,
                provider = self.name(),
                expiry = ?credential.expiry,
                "Updated access token"
            );
        }

        Ok(credential.access_token)
    }

    async fn load_credential(&self, user_id: UserId) -> Result<OAuthCredential> {
        let encoded = self
            .store
            .get_credential(user_id, self.name())
            .await?
            .ok_or_else(|| AppError::CredentialNotFound {
                user_id,
                provider: self.name().to_string(),
            })?;

        OAuthCredential::decode(&encoded)
    }

    // ─── HTTP Helpers ────────────────────────────────────────────────────────

    /// GET `url` with the user's access token and parse the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        access_token: &str,
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        self.check_response_json(response).await
    }

    /// POST a JSON body to `url` with the user's access token.
    pub(crate) async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        access_token: &str,
    ) -> Result<T> {
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        self.check_response_json(response).await
    }

    fn request_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout {
                provider: self.name().to_string(),
            }
        } else {
            AppError::provider_api(self.name(), e.to_string())
        }
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!(provider = self.name(), "Provider rate limit hit (429)");
                return Err(AppError::provider_api(self.name(), "rate limit exceeded"));
            }

            if status.as_u16() == 401 {
                return Err(AppError::provider_api(self.name(), "access token rejected"));
            }

            return Err(AppError::provider_api(
                self.name(),
                format!("HTTP {}: {}", status, body),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::provider_api(self.name(), format!("JSON parse error: {}", e)))
    }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// One provider's adapter.
pub enum Platform {
    Fitbit(FitbitPlatform),
    Google(GooglePlatform),
    Strava(StravaPlatform),
}

impl Platform {
    /// Build the adapter matching the context's provider.
    pub fn new(ctx: PlatformContext) -> Self {
        match ctx.provider().kind {
            ProviderKind::Fitbit => Platform::Fitbit(FitbitPlatform::new(ctx)),
            ProviderKind::Google => Platform::Google(GooglePlatform::new(ctx)),
            ProviderKind::Strava => Platform::Strava(StravaPlatform::new(ctx)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Fitbit(p) => p.name(),
            Platform::Google(p) => p.name(),
            Platform::Strava(p) => p.name(),
        }
    }

    pub async fn get_steps(&self, user_id: UserId, date: NaiveDate) -> Result<i64> {
        match self {
            Platform::Fitbit(p) => p.get_steps(user_id, date).await,
            Platform::Google(p) => p.get_steps(user_id, date).await,
            Platform::Strava(p) => p.get_steps(user_id, date).await,
        }
    }

    pub async fn get_calories(&self, user_id: UserId, date: NaiveDate) -> Result<i64> {
        match self {
            Platform::Fitbit(p) => p.get_calories(user_id, date).await,
            Platform::Google(p) => p.get_calories(user_id, date).await,
            Platform::Strava(p) => p.get_calories(user_id, date).await,
        }
    }

    /// Distance in kilometres.
    pub async fn get_distance(&self, user_id: UserId, date: NaiveDate) -> Result<f64> {
        match self {
            Platform::Fitbit(p) => p.get_distance(user_id, date).await,
            Platform::Google(p) => p.get_distance(user_id, date).await,
            Platform::Strava(p) => p.get_distance(user_id, date).await,
        }
    }

    /// Distance in kilometres over `period` starting at `date`.
    pub async fn get_distance_over_period(
        &self,
        user_id: UserId,
        date: NaiveDate,
        period: Period,
    ) -> Result<f64> {
        match self {
            Platform::Fitbit(p) => p.get_distance_over_period(user_id, date, period).await,
            Platform::Google(p) => p.get_distance_over_period(user_id, date, period).await,
            Platform::Strava(p) => p.get_distance_over_period(user_id, date, period).await,
        }
    }

    /// Answer one query with a single numeric value.
    pub async fn get_metric(&self, query: &MetricQuery) -> Result<f64> {
        match (query.metric, query.period) {
            (Metric::Steps, _) => Ok(self.get_steps(query.user_id, query.date).await? as f64),
            (Metric::Calories, _) => Ok(self.get_calories(query.user_id, query.date).await? as f64),
            (Metric::Distance, None) => self.get_distance(query.user_id, query.date).await,
            (Metric::Distance, Some(period)) => {
                self.get_distance_over_period(query.user_id, query.date, period)
                    .await
            }
        }
    }
}

/// Name → adapter table, built once from the registry.
#[derive(Default)]
pub struct PlatformTable {
    platforms: BTreeMap<&'static str, Platform>,
}

impl PlatformTable {
    pub fn from_registry(
        registry: &ProviderRegistry,
        tokens: &TokenClient,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let platforms = registry
            .iter()
            .map(|provider| {
                let ctx = PlatformContext::new(provider.clone(), tokens.clone(), store.clone());
                (provider.name(), Platform::new(ctx))
            })
            .collect();
        Self { platforms }
    }

    pub fn get(&self, name: &str) -> Option<&Platform> {
        self.platforms.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.platforms.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

/// Unix milliseconds at the start of `date` (UTC).
pub(crate) fn day_start_millis(date: NaiveDate) -> i64 {
    time_utils::start_of_day_utc(date).timestamp_millis()
}
