//! Persistence layer: the credential store interface and its backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{DailySummary, UserId};

/// Collection names as constants.
pub mod collections {
    /// Encoded credentials, keyed by `{user_id}_{provider}`
    pub const CREDENTIALS: &str = "credentials";
    /// Provider identity → user mapping, keyed by `{provider}_{provider_user_id}`
    pub const IDENTITIES: &str = "identities";
    /// Sequence documents for id allocation
    pub const COUNTERS: &str = "counters";
    /// Relying client → user membership, keyed by `{client_id}_{user_id}`
    pub const USERBASE: &str = "userbase";
    /// Daily snapshots, keyed by `{user_id}_{date}`
    pub const DAILY_SUMMARIES: &str = "daily_summaries";
}

/// Storage the core relies on for users and their provider credentials.
///
/// Credentials are handled as encoded connection strings; decoding happens in
/// the services so a corrupt record surfaces as a core error.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Encoded credential for (user, provider), if one was ever stored.
    async fn get_credential(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<String>, AppError>;

    /// Create or overwrite the credential for (user, provider).
    async fn put_credential(
        &self,
        user_id: UserId,
        provider: &str,
        connection: &str,
    ) -> Result<(), AppError>;

    /// Names of every provider the user has a credential for.
    async fn get_linked_providers(&self, user_id: UserId) -> Result<Vec<String>, AppError>;

    /// Resolve the user owning a provider identity, creating one if needed.
    async fn get_or_create_user_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<UserId, AppError>;

    /// Attach a provider identity to an existing user.
    async fn link_provider_identity(
        &self,
        user_id: UserId,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<(), AppError>;

    /// Record that `user_id` linked an account through the relying client.
    /// Recording the same pair again is a no-op.
    async fn add_user_to_client(&self, user_id: UserId, client_id: u64) -> Result<(), AppError>;

    /// Whether `user_id` is in the relying client's userbase.
    async fn is_user_in_client(&self, user_id: UserId, client_id: u64) -> Result<bool, AppError>;

    /// Every user with at least one linked identity.
    async fn list_user_ids(&self) -> Result<Vec<UserId>, AppError>;

    /// Store (or replace) a daily snapshot.
    async fn put_daily_summary(&self, summary: &DailySummary) -> Result<(), AppError>;
}
