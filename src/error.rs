// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent caller-facing messages.

/// Application error type shared by every service in the crate.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("Unsupported period: {0}")]
    UnsupportedPeriod(String),

    #[error("Request unexpected, does not match any known authorization request")]
    StateNotFound,

    #[error("Could not get data from any platform, try again later")]
    NoDataAvailable,

    #[error("{provider} API error: {message}")]
    ProviderApi { provider: String, message: String },

    #[error("{provider} token exchange failed: {message}")]
    TokenExchange { provider: String, message: String },

    #[error("{provider} token refresh failed: {message}")]
    TokenRefresh { provider: String, message: String },

    #[error("{provider} request timed out")]
    Timeout { provider: String },

    #[error("No {provider} credentials stored for user {user_id}")]
    CredentialNotFound { user_id: u64, provider: String },

    #[error("Connection type '{0}' unsupported")]
    UnsupportedConnectionKind(String),

    #[error("Corrupt credential record: {0}")]
    CorruptCredential(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Coarse classification used for logging and for what callers get to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or unsupported input from the caller.
    ClientInput,
    /// Expected but adverse outcome (replayed state, no data).
    Adverse,
    /// A single provider misbehaved.
    Upstream,
    /// Persistence failure or corrupted data.
    Internal,
}

impl AppError {
    /// Generic message returned in place of internal details.
    pub const TRY_AGAIN_LATER: &'static str = "Something went wrong. Try again later...";

    pub fn provider_api(provider: &str, message: impl Into<String>) -> Self {
        AppError::ProviderApi {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::BadRequest(_)
            | AppError::UnsupportedProvider(_)
            | AppError::UnsupportedPeriod(_) => ErrorCategory::ClientInput,
            AppError::StateNotFound | AppError::NoDataAvailable => ErrorCategory::Adverse,
            AppError::ProviderApi { .. }
            | AppError::TokenExchange { .. }
            | AppError::TokenRefresh { .. }
            | AppError::Timeout { .. } => ErrorCategory::Upstream,
            AppError::CredentialNotFound { .. }
            | AppError::UnsupportedConnectionKind(_)
            | AppError::CorruptCredential(_)
            | AppError::Database(_)
            | AppError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Message that is safe to hand back to a relying client.
    pub fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::Internal => Self::TRY_AGAIN_LATER.to_string(),
            _ => self.to_string(),
        }
    }

    /// Log the error at the level its category calls for.
    pub fn log(&self) {
        match self.category() {
            ErrorCategory::ClientInput => tracing::debug!(error = %self, "Rejected request"),
            ErrorCategory::Adverse => tracing::warn!(error = %self, "Request could not be served"),
            ErrorCategory::Upstream => tracing::error!(error = %self, "Provider failure"),
            ErrorCategory::Internal => tracing::error!(error = %self, "Internal error"),
        }
    }
}

/// Result type alias for services
pub type Result<T> = std::result::Result<T, AppError>;
