// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login and callback flow for linking a provider account.
//!
//! Handles:
//! - Starting an authorization (state token + provider consent URL)
//! - Completing it from the provider callback (state check + code exchange)
//! - Binding the resulting identity and credential to an internal user

use std::sync::Arc;

use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::models::{OAuthCredential, UserId};
use crate::services::oauth_state::{AuthorizationRequest, AuthorizationStateStore};
use crate::services::registry::{ProviderKind, ProviderRegistry};
use crate::services::token::TokenClient;

/// What the caller needs to redirect the user to the provider.
#[derive(Debug, Clone)]
pub struct BeginAuthorization {
    pub state_token: String,
    pub authorization_url: String,
}

/// A finished provider callback.
#[derive(Debug, Clone)]
pub struct CompletedAuthorization {
    pub provider: ProviderKind,
    pub relying_client_id: u64,
    pub existing_user_id: Option<UserId>,
    pub callback_url: String,
    pub credential: OAuthCredential,
    pub provider_user_id: String,
}

pub struct AuthorizationService {
    registry: Arc<ProviderRegistry>,
    states: Arc<AuthorizationStateStore>,
    tokens: TokenClient,
    store: Arc<dyn CredentialStore>,
}

impl AuthorizationService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        states: Arc<AuthorizationStateStore>,
        tokens: TokenClient,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            registry,
            states,
            tokens,
            store,
        }
    }

    pub fn states(&self) -> &Arc<AuthorizationStateStore> {
        &self.states
    }

    pub fn begin_authorization(&self, request: AuthorizationRequest) -> Result<BeginAuthorization> {
        let pending = self.states.begin(request)?;

        tracing::info!(
            provider = %pending.provider,
            relying_client_id = pending.relying_client_id,
            linking = pending.existing_user_id.is_some(),
            "Authorization started"
        );

        Ok(BeginAuthorization {
            state_token: pending.state_token,
            authorization_url: pending.authorization_url,
        })
    }

    /// Handle the provider callback.
    ///
    /// The state is consumed before the code is exchanged, so it cannot be
    /// replayed even if the exchange fails.
    pub async fn complete_authorization(
        &self,
        state_token: &str,
        code: &str,
    ) -> Result<CompletedAuthorization> {
        let pending = self.states.consume(state_token)?;

        if code.is_empty() {
            return Err(AppError::BadRequest(
                "Missing authorization code".to_string(),
            ));
        }

        let provider = self
            .registry
            .get(pending.provider.as_str())
            .ok_or_else(|| AppError::UnsupportedProvider(pending.provider.to_string()))?;

        let grant = self.tokens.exchange_code(provider, code).await?;

        Ok(CompletedAuthorization {
            provider: pending.provider,
            relying_client_id: pending.relying_client_id,
            existing_user_id: pending.existing_user_id,
            callback_url: pending.callback_url,
            credential: grant.credential,
            provider_user_id: grant.provider_user_id,
        })
    }

    /// Resolve the internal user for a completed authorization, store its
    /// credential and add the user to the relying client's userbase.
    pub async fn link_account(&self, completed: &CompletedAuthorization) -> Result<UserId> {
        let provider = completed.provider.as_str();

        let user_id = match completed.existing_user_id {
            Some(user_id) => {
                self.store
                    .link_provider_identity(user_id, provider, &completed.provider_user_id)
                    .await?;
                user_id
            }
            None => {
                self.store
                    .get_or_create_user_by_provider_identity(provider, &completed.provider_user_id)
                    .await?
            }
        };

        self.store
            .put_credential(user_id, provider, &completed.credential.encode()?)
            .await?;
        self.store
            .add_user_to_client(user_id, completed.relying_client_id)
            .await?;

        tracing::info!(
            user_id,
            provider,
            relying_client_id = completed.relying_client_id,
            "Provider account linked"
        );

        Ok(user_id)
    }
}
