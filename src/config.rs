//! Application configuration loaded from environment variables.
//!
//! Read once at startup; the provider registry is derived from it and never
//! changes afterwards.

use std::env;
use std::time::Duration;

/// Client credentials issued by one provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth2 redirect URL shared by every provider
    pub callback_url: String,
    /// Timeout applied to every outbound provider request
    pub client_timeout: Duration,
    /// How long a pending authorization may wait for its callback
    pub auth_state_ttl: Duration,
    /// Upper bound on concurrent provider calls per aggregation
    pub max_concurrent_provider_calls: usize,
    /// GCP project for Firestore; `None` keeps credentials in memory
    pub gcp_project_id: Option<String>,

    // --- Provider apps (None when not configured) ---
    pub fitbit: Option<ProviderCredentials>,
    pub google: Option<ProviderCredentials>,
    pub strava: Option<ProviderCredentials>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            callback_url: env::var("CALLBACK_URL")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CALLBACK_URL"))?,
            client_timeout: Duration::from_secs(parse_or("CLIENT_TIMEOUT_SECS", 10)?),
            auth_state_ttl: Duration::from_secs(parse_or("AUTH_STATE_TTL_SECS", 600)?),
            max_concurrent_provider_calls: parse_or("MAX_CONCURRENT_PROVIDER_CALLS", 8)?,
            gcp_project_id: env::var("GCP_PROJECT_ID").ok().filter(|v| !v.is_empty()),
            fitbit: provider_from_env("FITBIT")?,
            google: provider_from_env("GOOGLE")?,
            strava: provider_from_env("STRAVA")?,
        };

        if config.fitbit.is_none() && config.google.is_none() && config.strava.is_none() {
            return Err(ConfigError::NoProviders);
        }

        Ok(config)
    }

    /// Config with every provider populated, for tests.
    pub fn test_default() -> Self {
        let creds = |name: &str| {
            Some(ProviderCredentials {
                client_id: format!("{}_client_id", name),
                client_secret: format!("{}_client_secret", name),
            })
        };

        Self {
            callback_url: "http://localhost:8080/callback".to_string(),
            client_timeout: Duration::from_secs(5),
            auth_state_ttl: Duration::from_secs(600),
            max_concurrent_provider_calls: 8,
            gcp_project_id: None,
            fitbit: creds("fitbit"),
            google: creds("google"),
            strava: creds("strava"),
        }
    }
}

fn provider_from_env(prefix: &'static str) -> Result<Option<ProviderCredentials>, ConfigError> {
    let id = env::var(format!("{}_CLIENT_ID", prefix)).ok();
    let secret = env::var(format!("{}_CLIENT_SECRET", prefix)).ok();

    match (id, secret) {
        (Some(client_id), Some(client_secret)) => Ok(Some(ProviderCredentials {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        })),
        (None, None) => Ok(None),
        _ => Err(ConfigError::Incomplete(prefix)),
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Provider {0} needs both CLIENT_ID and CLIENT_SECRET")]
    Incomplete(&'static str),

    #[error("No fitness provider is configured")]
    NoProviders,
}
