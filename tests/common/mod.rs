// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use fitness_hub::config::Config;
use fitness_hub::db::{CredentialStore, FirestoreStore, MemoryStore};
use fitness_hub::models::{OAuthCredential, UserId};
use fitness_hub::services::{ProviderConfig, ProviderRegistry};
use fitness_hub::FitnessHub;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Registry with every provider pointed at `base_url`.
#[allow(dead_code)]
pub fn mock_registry(config: &Config, base_url: &str) -> ProviderRegistry {
    let real = ProviderRegistry::from_config(config);
    let mut registry = ProviderRegistry::default();
    for provider in real.iter() {
        registry.insert(provider.clone().with_base_url(base_url));
    }
    registry
}

/// Hub backed by `store`, talking to the mock server at `base_url`.
#[allow(dead_code)]
pub fn test_hub(base_url: &str, store: Arc<MemoryStore>) -> FitnessHub {
    test_hub_with_config(&Config::test_default(), base_url, store)
}

#[allow(dead_code)]
pub fn test_hub_with_config(config: &Config, base_url: &str, store: Arc<MemoryStore>) -> FitnessHub {
    let registry = mock_registry(config, base_url);
    FitnessHub::with_registry(config, registry, store).expect("Failed to build hub")
}

/// Provider config for unit-level token tests.
#[allow(dead_code)]
pub fn provider(name: &str, base_url: &str) -> ProviderConfig {
    mock_registry(&Config::test_default(), base_url)
        .get(name)
        .expect("provider configured")
        .clone()
}

/// Config whose outbound requests give up after `timeout`.
#[allow(dead_code)]
pub fn config_with_timeout(timeout: Duration) -> Config {
    Config {
        client_timeout: timeout,
        ..Config::test_default()
    }
}

/// Credential valid for another hour.
#[allow(dead_code)]
pub fn valid_credential(access_token: &str) -> OAuthCredential {
    OAuthCredential {
        token_type: "Bearer".to_string(),
        access_token: access_token.to_string(),
        refresh_token: format!("{}-refresh", access_token),
        expiry: Some((Utc::now() + chrono::Duration::hours(1)).with_timezone(&utc_offset())),
    }
}

/// Credential that expired an hour ago.
#[allow(dead_code)]
pub fn expired_credential(access_token: &str, refresh_token: &str) -> OAuthCredential {
    OAuthCredential {
        token_type: "Bearer".to_string(),
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expiry: Some((Utc::now() - chrono::Duration::hours(1)).with_timezone(&utc_offset())),
    }
}

fn utc_offset() -> FixedOffset {
    FixedOffset::east_opt(0).expect("zero offset is valid")
}

/// Store `credential` for (user, provider).
#[allow(dead_code)]
pub async fn link(store: &MemoryStore, user_id: UserId, provider: &str, credential: &OAuthCredential) {
    store
        .put_credential(user_id, provider, &credential.encode().unwrap())
        .await
        .unwrap();
}

/// Decode what the store holds for (user, provider).
#[allow(dead_code)]
pub async fn stored_credential(store: &MemoryStore, user_id: UserId, provider: &str) -> OAuthCredential {
    let encoded = store
        .get_credential(user_id, provider)
        .await
        .unwrap()
        .expect("credential stored");
    OAuthCredential::decode(&encoded).unwrap()
}
