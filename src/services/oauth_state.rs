// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pending OAuth2 authorization requests, keyed by an unguessable state token.
//!
//! Each entry is consumed at most once: `consume` removes it atomically, so a
//! replayed or duplicated callback finds nothing. Entries older than the TTL
//! are treated as absent and swept on every `begin` (and optionally by a
//! background task).

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{AppError, Result};
use crate::models::UserId;
use crate::services::registry::{ProviderConfig, ProviderKind, ProviderRegistry};

/// Random bytes appended to the provider tag in each state token.
const STATE_RANDOM_BYTES: usize = 30;

/// Shortest interval accepted by the background sweeper.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Input to [`AuthorizationStateStore::begin`].
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub provider: String,
    pub relying_client_id: u64,
    /// Where the relying client wants the result delivered
    pub callback_url: String,
    /// Set when linking another provider to an existing user
    pub existing_user_id: Option<UserId>,
}

/// A login attempt waiting for its provider callback.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state_token: String,
    pub provider: ProviderKind,
    pub relying_client_id: u64,
    pub existing_user_id: Option<UserId>,
    pub callback_url: String,
    pub authorization_url: String,
    created_at: Instant,
}

impl PendingAuthorization {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// In-memory store of pending authorizations.
pub struct AuthorizationStateStore {
    registry: Arc<ProviderRegistry>,
    pending: DashMap<String, PendingAuthorization>,
    ttl: Duration,
    rng: SystemRandom,
}

impl AuthorizationStateStore {
    pub fn new(registry: Arc<ProviderRegistry>, ttl: Duration) -> Self {
        Self {
            registry,
            pending: DashMap::new(),
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Record a new login attempt and build the provider authorization URL.
    pub fn begin(&self, request: AuthorizationRequest) -> Result<PendingAuthorization> {
        let provider = self
            .registry
            .get(&request.provider)
            .ok_or_else(|| AppError::UnsupportedProvider(request.provider.clone()))?;

        self.purge_expired();

        let state_token = self.new_state_token(provider.name())?;
        let authorization_url = authorization_url(provider, &state_token);

        let pending = PendingAuthorization {
            state_token: state_token.clone(),
            provider: provider.kind,
            relying_client_id: request.relying_client_id,
            existing_user_id: request.existing_user_id,
            callback_url: request.callback_url,
            authorization_url,
            created_at: Instant::now(),
        };

        self.pending.insert(state_token, pending.clone());

        tracing::debug!(
            provider = %pending.provider,
            relying_client_id = pending.relying_client_id,
            "Authorization state created"
        );

        Ok(pending)
    }

    /// Take the pending authorization for `state_token`, removing it.
    pub fn consume(&self, state_token: &str) -> Result<PendingAuthorization> {
        let (_, pending) = self
            .pending
            .remove(state_token)
            .ok_or(AppError::StateNotFound)?;

        if pending.is_expired(self.ttl) {
            tracing::warn!(provider = %pending.provider, "Authorization state expired");
            return Err(AppError::StateNotFound);
        }

        Ok(pending)
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, pending| !pending.is_expired(self.ttl));
        let removed = before.saturating_sub(self.pending.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged expired authorization states");
        }
        removed
    }

    /// Periodically purge expired entries until the store is dropped.
    ///
    /// Intervals shorter than 10ms (including zero) are raised to 10ms.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        let every = every.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.purge_expired();
                    }
                    None => break,
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Provider name bytes followed by random bytes, base64 encoded.
    fn new_state_token(&self, provider: &str) -> Result<String> {
        let mut random = [0u8; STATE_RANDOM_BYTES];
        self.rng.fill(&mut random).map_err(|_| {
            AppError::Internal(anyhow::anyhow!("System random generator unavailable"))
        })?;

        let mut raw = provider.as_bytes().to_vec();
        raw.extend_from_slice(&random);
        Ok(BASE64.encode(raw))
    }
}

/// Provider consent URL carrying `state_token` as the OAuth2 `state`.
pub fn authorization_url(provider: &ProviderConfig, state_token: &str) -> String {
    let separator = if provider.auth_url.contains('?') { '&' } else { '?' };

    let mut url = format!(
        "{}{}response_type=code&\
         client_id={}&\
         redirect_uri={}&\
         scope={}&\
         state={}",
        provider.auth_url,
        separator,
        urlencoding::encode(&provider.client_id),
        urlencoding::encode(&provider.redirect_url),
        urlencoding::encode(&provider.scopes.join(" ")),
        urlencoding::encode(state_token),
    );

    if provider.offline_access {
        url.push_str("&access_type=offline");
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn store(ttl: Duration) -> AuthorizationStateStore {
        let registry = Arc::new(ProviderRegistry::from_config(&Config::test_default()));
        AuthorizationStateStore::new(registry, ttl)
    }

    fn request(provider: &str) -> AuthorizationRequest {
        AuthorizationRequest {
            provider: provider.to_string(),
            relying_client_id: 42,
            callback_url: "https://client.example.com/done".to_string(),
            existing_user_id: None,
        }
    }

    #[test]
    fn test_state_token_shape() {
        let store = store(Duration::from_secs(60));
        let pending = store.begin(request("fitbit")).unwrap();

        let raw = BASE64.decode(&pending.state_token).unwrap();
        assert_eq!(raw.len(), "fitbit".len() + STATE_RANDOM_BYTES);
        assert!(raw.starts_with(b"fitbit"));
    }

    #[test]
    fn test_state_tokens_are_unique() {
        let store = store(Duration::from_secs(60));
        let a = store.begin(request("strava")).unwrap();
        let b = store.begin(request("strava")).unwrap();
        assert_ne!(a.state_token, b.state_token);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_consume_once() {
        let store = store(Duration::from_secs(60));
        let pending = store.begin(request("google")).unwrap();

        let consumed = store.consume(&pending.state_token).unwrap();
        assert_eq!(consumed.provider, ProviderKind::Google);
        assert_eq!(consumed.relying_client_id, 42);
        assert_eq!(consumed.callback_url, "https://client.example.com/done");

        assert!(matches!(
            store.consume(&pending.state_token),
            Err(AppError::StateNotFound)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_provider() {
        let store = store(Duration::from_secs(60));
        assert!(matches!(
            store.begin(request("garmin")),
            Err(AppError::UnsupportedProvider(name)) if name == "garmin"
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_token() {
        let store = store(Duration::from_secs(60));
        assert!(matches!(
            store.consume("bm90LWEtdG9rZW4="),
            Err(AppError::StateNotFound)
        ));
    }

    #[test]
    fn test_expired_state_is_not_found() {
        let store = store(Duration::from_millis(1));
        let pending = store.begin(request("fitbit")).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert!(matches!(
            store.consume(&pending.state_token),
            Err(AppError::StateNotFound)
        ));
    }

    #[test]
    fn test_purge_expired() {
        let store = store(Duration::from_millis(1));
        store.begin(request("fitbit")).unwrap();
        store.begin(request("strava")).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(store.purge_expired(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_accepts_zero_interval() {
        let store = Arc::new(store(Duration::from_millis(1)));
        store.begin(request("fitbit")).unwrap();

        let sweeper = store.spawn_sweeper(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!sweeper.is_finished());
        assert!(store.is_empty());
        sweeper.abort();
    }

    #[test]
    fn test_authorization_url_offline_only_for_google() {
        let store = store(Duration::from_secs(60));

        let google = store.begin(request("google")).unwrap();
        assert!(google
            .authorization_url
            .starts_with("https://accounts.google.com/o/oauth2/auth?response_type=code"));
        assert!(google.authorization_url.contains("access_type=offline"));
        assert!(google
            .authorization_url
            .contains(&format!("state={}", urlencoding::encode(&google.state_token))));

        let fitbit = store.begin(request("fitbit")).unwrap();
        assert!(!fitbit.authorization_url.contains("access_type"));
        assert!(fitbit
            .authorization_url
            .contains("scope=activity%20profile%20settings%20heartrate"));
        assert!(fitbit
            .authorization_url
            .contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fcallback"));
    }

    #[test]
    fn test_concurrent_consume_is_at_most_once() {
        let store = Arc::new(store(Duration::from_secs(60)));
        let token = store.begin(request("strava")).unwrap().state_token;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let token = token.clone();
                std::thread::spawn(move || store.consume(&token).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }
}
