// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Fitness Hub: link Fitbit, Google Fit and Strava accounts and query daily
//! activity across all of them.
//!
//! This crate provides the OAuth2 credential lifecycle (authorization,
//! code exchange, refresh) and a fan-out aggregator that collects steps,
//! calories and distance from every provider linked to a user.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use db::CredentialStore;
use error::Result;
use models::{MetricQuery, PlatformResult, UserId};
use services::{
    Aggregator, AuthorizationRequest, AuthorizationService, AuthorizationStateStore,
    BeginAuthorization, CompletedAuthorization, DailySync, PlatformTable, ProviderRegistry,
    TokenClient,
};

/// Entry point for callers (HTTP layer, jobs).
pub struct FitnessHub {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn CredentialStore>,
    authorization: AuthorizationService,
    aggregator: Aggregator,
}

impl FitnessHub {
    /// Build the hub with production provider endpoints.
    pub fn new(config: &Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::with_registry(config, ProviderRegistry::from_config(config), store)
    }

    /// Build the hub around an explicit registry (e.g. pointed at mock servers).
    pub fn with_registry(
        config: &Config,
        registry: ProviderRegistry,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let registry = Arc::new(registry);
        let tokens = TokenClient::new(config.client_timeout)?;

        let states = Arc::new(AuthorizationStateStore::new(
            registry.clone(),
            config.auth_state_ttl,
        ));
        let platforms = Arc::new(PlatformTable::from_registry(
            &registry,
            &tokens,
            store.clone(),
        ));

        // A provider call may be a token refresh followed by the data request.
        let provider_call_timeout = config.client_timeout * 2;

        let aggregator = Aggregator::new(
            store.clone(),
            platforms,
            config.max_concurrent_provider_calls,
            provider_call_timeout,
        );
        let authorization = AuthorizationService::new(registry.clone(), states, tokens, store.clone());

        tracing::info!(
            providers = ?registry.names().collect::<Vec<_>>(),
            "Fitness hub ready"
        );

        Ok(Self {
            registry,
            store,
            authorization,
            aggregator,
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Start a login (or account link) with `provider`.
    pub fn begin_authorization(
        &self,
        provider: &str,
        relying_client_id: u64,
        callback_url: &str,
        existing_user_id: Option<UserId>,
    ) -> Result<BeginAuthorization> {
        self.authorization.begin_authorization(AuthorizationRequest {
            provider: provider.to_string(),
            relying_client_id,
            callback_url: callback_url.to_string(),
            existing_user_id,
        })
    }

    /// Finish a login from the provider callback's `state` and `code`.
    pub async fn complete_authorization(
        &self,
        state_token: &str,
        code: &str,
    ) -> Result<CompletedAuthorization> {
        self.authorization
            .complete_authorization(state_token, code)
            .await
    }

    /// Persist a completed authorization and return the owning user.
    pub async fn link_account(&self, completed: &CompletedAuthorization) -> Result<UserId> {
        self.authorization.link_account(completed).await
    }

    /// Whether `user_id` linked an account through `relying_client_id`.
    pub async fn is_user_in_client(&self, user_id: UserId, relying_client_id: u64) -> Result<bool> {
        self.store.is_user_in_client(user_id, relying_client_id).await
    }

    pub async fn get_metric(&self, query: MetricQuery) -> Result<Vec<PlatformResult>> {
        self.aggregator.get_metric(query).await
    }

    /// Pending authorizations still waiting for a callback.
    pub fn pending_authorizations(&self) -> usize {
        self.authorization.states().len()
    }

    /// Sweep expired authorization states every `every`.
    pub fn spawn_state_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        self.authorization.states().spawn_sweeper(every)
    }

    pub fn daily_sync(&self) -> DailySync {
        DailySync::new(self.store.clone(), self.aggregator.clone())
    }
}
