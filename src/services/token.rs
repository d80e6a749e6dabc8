// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth2 token endpoint calls: code exchange and on-demand refresh.
//!
//! Handles:
//! - Authorization code exchange, per-provider client authentication
//! - Provider-native user id extraction from the token response
//! - Refresh of expired access tokens, signalling when storage must be updated

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::OAuthCredential;
use crate::services::registry::{AuthStyle, ProviderConfig, ProviderKind};

/// Token endpoint response, common fields plus whatever else the provider sends.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

impl TokenResponse {
    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        // Whole seconds only; the stored layout has no fractional part.
        let expires_at = match self.expires_in.filter(|s| *s > 0) {
            Some(secs) => Some(now.timestamp() + secs),
            None => self.expires_at,
        };
        expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.fixed_offset())
    }
}

/// Google profile response, used only to learn the account email.
#[derive(Debug, Deserialize)]
struct GoogleProfile {
    #[serde(rename = "emailAddress")]
    email_address: String,
}

/// Result of a successful code exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub credential: OAuthCredential,
    /// The user's id on the provider side (Fitbit user id, Strava athlete id, Google email)
    pub provider_user_id: String,
}

/// Client for provider token endpoints.
#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
}

impl TokenClient {
    /// Create a client whose requests all time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Shared HTTP client, reused by the platform adapters.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ─── Code Exchange ───────────────────────────────────────────────────────

    /// Exchange an authorization code for tokens and the provider-native user id.
    pub async fn exchange_code(&self, provider: &ProviderConfig, code: &str) -> Result<TokenGrant> {
        let exchange_err = |message: String| AppError::TokenExchange {
            provider: provider.name().to_string(),
            message,
        };

        let response = self
            .request_token(
                provider,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", provider.redirect_url.as_str()),
                ],
                exchange_err,
            )
            .await?;

        let provider_user_id = self.provider_user_id(provider, &response).await?;
        let credential = to_credential(&response, Utc::now(), None);

        tracing::info!(
            provider = provider.name(),
            provider_user_id = %provider_user_id,
            "Authorization code exchanged"
        );

        Ok(TokenGrant {
            credential,
            provider_user_id,
        })
    }

    /// Pull the provider-native user id out of a token response.
    async fn provider_user_id(
        &self,
        provider: &ProviderConfig,
        response: &TokenResponse,
    ) -> Result<String> {
        let missing = |what: &str| AppError::TokenExchange {
            provider: provider.name().to_string(),
            message: format!("token response has no {}", what),
        };

        match provider.kind {
            ProviderKind::Fitbit => response
                .extra
                .get("user_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| missing("user_id")),
            ProviderKind::Strava => response
                .extra
                .get("athlete")
                .and_then(|athlete| athlete.get("id"))
                .and_then(format_native_id)
                .ok_or_else(|| missing("athlete id")),
            ProviderKind::Google => self.google_email(provider, &response.access_token).await,
        }
    }

    /// Google returns no user id with its tokens; ask the profile endpoint.
    async fn google_email(&self, provider: &ProviderConfig, access_token: &str) -> Result<String> {
        let url = provider.profile_url.as_deref().ok_or_else(|| AppError::TokenExchange {
            provider: provider.name().to_string(),
            message: "no profile endpoint configured".to_string(),
        })?;

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::TokenExchange {
                provider: provider.name().to_string(),
                message: format!("profile request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::TokenExchange {
                provider: provider.name().to_string(),
                message: format!("profile request returned {}", status),
            });
        }

        let profile: GoogleProfile = response.json().await.map_err(|e| AppError::TokenExchange {
            provider: provider.name().to_string(),
            message: format!("failed to parse profile: {}", e),
        })?;

        Ok(profile.email_address)
    }

    // ─── Refresh ─────────────────────────────────────────────────────────────

    /// Return a usable credential, refreshing it if the access token expired.
    ///
    /// The flag is `true` only when the access token changed, which is the
    /// caller's cue to persist the new credential.
    pub async fn refresh_if_needed(
        &self,
        credential: &OAuthCredential,
        provider: &ProviderConfig,
    ) -> Result<(OAuthCredential, bool)> {
        let now = Utc::now();
        if credential.is_valid_at(now) {
            return Ok((credential.clone(), false));
        }

        let refresh_err = |message: String| AppError::TokenRefresh {
            provider: provider.name().to_string(),
            message,
        };

        if credential.refresh_token.is_empty() {
            return Err(refresh_err("access token expired and no refresh token stored".to_string()));
        }

        let response = self
            .request_token(
                provider,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", credential.refresh_token.as_str()),
                ],
                refresh_err,
            )
            .await?;

        let refreshed = to_credential(&response, now, Some(credential));
        let changed = refreshed.access_token != credential.access_token;

        Ok((refreshed, changed))
    }

    // ─── Token Endpoint ──────────────────────────────────────────────────────

    async fn request_token<F>(
        &self,
        provider: &ProviderConfig,
        params: &[(&str, &str)],
        to_error: F,
    ) -> Result<TokenResponse>
    where
        F: Fn(String) -> AppError,
    {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        let mut request = self.http.post(&provider.token_url);

        match provider.auth_style {
            AuthStyle::Header => {
                request = request.basic_auth(&provider.client_id, Some(&provider.client_secret));
            }
            AuthStyle::Params => {
                form.push(("client_id", provider.client_id.as_str()));
                form.push(("client_secret", provider.client_secret.as_str()));
            }
        }

        let response = request.form(&form).send().await.map_err(|e| {
            if e.is_timeout() {
                to_error("token endpoint timed out".to_string())
            } else {
                to_error(format!("request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                provider = provider.name(),
                status = %status,
                body = %body,
                "Token endpoint rejected request"
            );
            return Err(to_error(format!("token endpoint returned {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| to_error(format!("failed to parse token response: {}", e)))
    }
}

/// Build a credential from a token response, carrying forward fields the
/// provider left out of a refresh response.
fn to_credential(
    response: &TokenResponse,
    now: DateTime<Utc>,
    previous: Option<&OAuthCredential>,
) -> OAuthCredential {
    let refresh_token = response
        .refresh_token
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| previous.map(|p| p.refresh_token.clone()))
        .unwrap_or_default();

    let token_type = response
        .token_type
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| previous.map(|p| p.token_type.clone()))
        .unwrap_or_else(|| "Bearer".to_string());

    OAuthCredential {
        token_type,
        access_token: response.access_token.clone(),
        refresh_token,
        expiry: response.expiry(now),
    }
}

/// Render a JSON id as its canonical text. Integral floats lose the fraction.
fn format_native_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                Some(v.to_string())
            } else if let Some(v) = n.as_i64() {
                Some(v.to_string())
            } else {
                let v = n.as_f64()?;
                if v.is_finite() && v.fract() == 0.0 {
                    Some(format!("{:.0}", v))
                } else {
                    Some(v.to_string())
                }
            }
        }
        _ => None,
    }
}
