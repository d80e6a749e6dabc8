// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Authorization state lifetime tests.
//!
//! Pending authorizations expire after the configured TTL and are swept
//! in the background.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use fitness_hub::config::Config;
use fitness_hub::db::MemoryStore;
use fitness_hub::error::AppError;

mod common;
use common::test_hub_with_config;

fn short_ttl_config(ttl: Duration) -> Config {
    Config {
        auth_state_ttl: ttl,
        ..Config::test_default()
    }
}

#[tokio::test]
async fn test_expired_state_is_rejected() {
    let config = short_ttl_config(Duration::from_millis(50));
    let hub = test_hub_with_config(&config, "http://127.0.0.1:9", Arc::new(MemoryStore::new()));

    let begin = hub
        .begin_authorization("fitbit", 1, "https://client.example.com", None)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let result = hub.complete_authorization(&begin.state_token, "code").await;
    assert!(matches!(result, Err(AppError::StateNotFound)));
}

#[tokio::test]
async fn test_sweeper_drops_expired_states() {
    let config = short_ttl_config(Duration::from_millis(20));
    let hub = test_hub_with_config(&config, "http://127.0.0.1:9", Arc::new(MemoryStore::new()));

    for provider in ["fitbit", "google", "strava"] {
        hub.begin_authorization(provider, 1, "https://client.example.com", None)
            .unwrap();
    }
    assert_eq!(hub.pending_authorizations(), 3);

    let sweeper = hub.spawn_state_sweeper(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(hub.pending_authorizations(), 0);
    sweeper.abort();
}

#[tokio::test]
async fn test_state_token_carries_provider_tag() {
    let hub = test_hub_with_config(
        &Config::test_default(),
        "http://127.0.0.1:9",
        Arc::new(MemoryStore::new()),
    );

    let begin = hub
        .begin_authorization("strava", 1, "https://client.example.com", None)
        .unwrap();
    let raw = STANDARD.decode(&begin.state_token).unwrap();

    assert!(raw.starts_with(b"strava"));
    assert!(raw.len() >= "strava".len() + 30);
    assert!(begin
        .authorization_url
        .starts_with("http://127.0.0.1:9/oauth/authorize?response_type=code"));
    assert!(begin.authorization_url.contains("client_id=strava_client_id"));
}
