// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed credential store.
//!
//! Collections:
//! - Credentials (encoded connection strings per user and provider)
//! - Identities (provider account → internal user id)
//! - Counters (user id sequence)
//! - Userbase (which relying client each user linked through)
//! - Daily summaries (snapshots written by the sync job)

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{collections, CredentialStore};
use crate::error::AppError;
use crate::models::{DailySummary, UserId};

/// Counter document holding the last allocated user id.
const USER_SEQUENCE: &str = "users";

/// Commit attempts for a user id allocation before giving up.
const USER_ALLOCATION_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialDoc {
    user_id: UserId,
    provider: String,
    /// Encoded connection string
    connection: String,
    /// Last write (RFC 3339)
    updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdentityDoc {
    provider: String,
    provider_user_id: String,
    user_id: UserId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CounterDoc {
    value: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserbaseDoc {
    client_id: u64,
    user_id: UserId,
    added_at: String,
}

fn credential_doc_id(user_id: UserId, provider: &str) -> String {
    format!("{}_{}", user_id, provider)
}

fn identity_doc_id(provider: &str, provider_user_id: &str) -> String {
    // Emails and other native ids may contain '/', which Firestore ids cannot.
    format!("{}_{}", provider, urlencoding::encode(provider_user_id))
}

fn userbase_doc_id(client_id: u64, user_id: UserId) -> String {
    format!("{}_{}", client_id, user_id)
}

async fn read_identity(
    db: &firestore::FirestoreDb,
    provider: &str,
    provider_user_id: &str,
) -> Result<Option<IdentityDoc>, AppError> {
    db.fluent()
        .select()
        .by_id_in(collections::IDENTITIES)
        .obj()
        .one(&identity_doc_id(provider, provider_user_id))
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Emulator connection with a dummy token.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation fails with a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<IdentityDoc>, AppError> {
        read_identity(self.get_client()?, provider, provider_user_id).await
    }

    async fn set_identity(&self, identity: &IdentityDoc) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::IDENTITIES)
            .document_id(identity_doc_id(&identity.provider, &identity.provider_user_id))
            .object(identity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Allocate a user id and bind it to the identity, retrying when a
    /// concurrent allocation wins the commit.
    async fn create_user_for_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<UserId, AppError> {
        let mut attempt = 1;
        loop {
            match self.try_create_user_for_identity(provider, provider_user_id).await {
                Err(AppError::Database(e)) if attempt < USER_ALLOCATION_ATTEMPTS => {
                    tracing::warn!(provider, attempt, error = %e, "User allocation conflict, retrying");
                    tokio::time::sleep(Duration::from_millis(25 * u64::from(attempt))).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// One allocation attempt in a single transaction.
    ///
    /// The identity re-check and the counter read go through the transaction,
    /// so a concurrent allocation that touched either document makes this
    /// commit fail instead of handing out the same id twice.
    async fn try_create_user_for_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<UserId, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let tx_db = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        // Another request may have created the identity since the first lookup.
        if let Some(existing) = read_identity(&tx_db, provider, provider_user_id).await? {
            let _ = transaction.rollback().await;
            return Ok(existing.user_id);
        }

        let counter: Option<CounterDoc> = tx_db
            .fluent()
            .select()
            .by_id_in(collections::COUNTERS)
            .obj()
            .one(USER_SEQUENCE)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read user sequence in transaction: {}", e))
            })?;

        let user_id = counter.unwrap_or_default().value + 1;

        client
            .fluent()
            .update()
            .in_col(collections::COUNTERS)
            .document_id(USER_SEQUENCE)
            .object(&CounterDoc { value: user_id })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add counter to transaction: {}", e))
            })?;

        let identity = IdentityDoc {
            provider: provider.to_string(),
            provider_user_id: provider_user_id.to_string(),
            user_id,
        };

        client
            .fluent()
            .update()
            .in_col(collections::IDENTITIES)
            .document_id(identity_doc_id(provider, provider_user_id))
            .object(&identity)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add identity to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id, provider, "New user created");
        Ok(user_id)
    }
}

#[async_trait]
impl CredentialStore for FirestoreStore {
    async fn get_credential(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<String>, AppError> {
        let doc: Option<CredentialDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(&credential_doc_id(user_id, provider))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(doc.map(|d| d.connection))
    }

    async fn put_credential(
        &self,
        user_id: UserId,
        provider: &str,
        connection: &str,
    ) -> Result<(), AppError> {
        let doc = CredentialDoc {
            user_id,
            provider: provider.to_string(),
            connection: connection.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(credential_doc_id(user_id, provider))
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_linked_providers(&self, user_id: UserId) -> Result<Vec<String>, AppError> {
        let docs: Vec<CredentialDoc> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::CREDENTIALS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let providers: BTreeSet<String> = docs.into_iter().map(|d| d.provider).collect();
        Ok(providers.into_iter().collect())
    }

    async fn get_or_create_user_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<UserId, AppError> {
        if let Some(identity) = self.get_identity(provider, provider_user_id).await? {
            return Ok(identity.user_id);
        }
        self.create_user_for_identity(provider, provider_user_id)
            .await
    }

    async fn link_provider_identity(
        &self,
        user_id: UserId,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<(), AppError> {
        match self.get_identity(provider, provider_user_id).await? {
            Some(identity) if identity.user_id != user_id => Err(AppError::BadRequest(format!(
                "{} account already linked to another user",
                provider
            ))),
            Some(_) => Ok(()),
            None => {
                self.set_identity(&IdentityDoc {
                    provider: provider.to_string(),
                    provider_user_id: provider_user_id.to_string(),
                    user_id,
                })
                .await
            }
        }
    }

    async fn add_user_to_client(&self, user_id: UserId, client_id: u64) -> Result<(), AppError> {
        let doc = UserbaseDoc {
            client_id,
            user_id,
            added_at: chrono::Utc::now().to_rfc3339(),
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERBASE)
            .document_id(userbase_doc_id(client_id, user_id))
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn is_user_in_client(&self, user_id: UserId, client_id: u64) -> Result<bool, AppError> {
        let doc: Option<UserbaseDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERBASE)
            .obj()
            .one(&userbase_doc_id(client_id, user_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(doc.is_some())
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>, AppError> {
        let docs: Vec<IdentityDoc> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::IDENTITIES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let ids: BTreeSet<UserId> = docs.into_iter().map(|d| d.user_id).collect();
        Ok(ids.into_iter().collect())
    }

    async fn put_daily_summary(&self, summary: &DailySummary) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::DAILY_SUMMARIES)
            .document_id(format!("{}_{}", summary.user_id, summary.date))
            .object(summary)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
