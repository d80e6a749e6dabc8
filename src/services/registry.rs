// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Static per-provider OAuth2 configuration, built once from [`Config`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::{Config, ProviderCredentials};
use crate::error::AppError;

/// Providers this crate knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    Fitbit,
    Google,
    Strava,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Fitbit, ProviderKind::Google, ProviderKind::Strava];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Fitbit => "fitbit",
            ProviderKind::Google => "google",
            ProviderKind::Strava => "strava",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fitbit" => Ok(ProviderKind::Fitbit),
            "google" => Ok(ProviderKind::Google),
            "strava" => Ok(ProviderKind::Strava),
            other => Err(AppError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// How client credentials are presented to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// HTTP Basic `Authorization` header
    Header,
    /// `client_id` / `client_secret` form fields
    Params,
}

/// Immutable OAuth2 and API settings for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    /// REST API root used by the platform adapter
    pub api_base: String,
    /// Profile endpoint used to find the provider-native user id (Google)
    pub profile_url: Option<String>,
    /// Request refresh-capable consent (`access_type=offline`)
    pub offline_access: bool,
    pub auth_style: AuthStyle,
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Production endpoints for `kind`.
    pub fn new(kind: ProviderKind, creds: &ProviderCredentials, redirect_url: &str) -> Self {
        let base = |scopes: &[&str],
                    auth_url: &str,
                    token_url: &str,
                    api_base: &str,
                    auth_style: AuthStyle| Self {
            kind,
            client_id: creds.client_id.clone(),
            client_secret: creds.client_secret.clone(),
            redirect_url: redirect_url.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
            api_base: api_base.to_string(),
            profile_url: None,
            offline_access: false,
            auth_style,
        };

        match kind {
            ProviderKind::Fitbit => base(
                &["activity", "profile", "settings", "heartrate"],
                "https://www.fitbit.com/oauth2/authorize",
                "https://api.fitbit.com/oauth2/token",
                "https://api.fitbit.com/1",
                AuthStyle::Header,
            ),
            ProviderKind::Google => Self {
                profile_url: Some(
                    "https://www.googleapis.com/gmail/v1/users/me/profile".to_string(),
                ),
                offline_access: true,
                ..base(
                    &[
                        "https://www.googleapis.com/auth/fitness.activity.read",
                        "https://www.googleapis.com/auth/fitness.location.read",
                        "https://www.googleapis.com/auth/gmail.readonly",
                    ],
                    "https://accounts.google.com/o/oauth2/auth",
                    "https://oauth2.googleapis.com/token",
                    "https://www.googleapis.com/fitness/v1",
                    AuthStyle::Params,
                )
            },
            ProviderKind::Strava => base(
                // Strava takes a single comma-separated scope value.
                &["read,read_all,profile:read_all,activity:read_all"],
                "https://www.strava.com/oauth/authorize",
                "https://www.strava.com/api/v3/oauth/token",
                "https://www.strava.com/api/v3",
                AuthStyle::Params,
            ),
        }
    }

    /// Point every endpoint at `base_url` (used with mock servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        self.auth_url = format!("{}/oauth/authorize", base_url);
        self.token_url = format!("{}/oauth/token", base_url);
        self.api_base = base_url.to_string();
        if self.profile_url.is_some() {
            self.profile_url = Some(format!("{}/profile", base_url));
        }
        self
    }
}

/// Name → configuration lookup for every configured provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, ProviderConfig>,
}

impl ProviderRegistry {
    /// Build the registry from the providers present in `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        for kind in ProviderKind::ALL {
            let creds = match kind {
                ProviderKind::Fitbit => config.fitbit.as_ref(),
                ProviderKind::Google => config.google.as_ref(),
                ProviderKind::Strava => config.strava.as_ref(),
            };
            match creds {
                Some(creds) => {
                    registry.insert(ProviderConfig::new(kind, creds, &config.callback_url))
                }
                None => tracing::warn!(provider = %kind, "Provider not configured, skipping"),
            }
        }
        registry
    }

    pub fn insert(&mut self, provider: ProviderConfig) {
        self.providers.insert(provider.name(), provider);
    }

    /// Look up a provider. `None` means the provider is unsupported.
    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
