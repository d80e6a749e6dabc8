// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store.
//!
//! Used when no Firestore project is configured, and by the tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::{DailySummary, UserId};

/// DashMap-backed store. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct MemoryStore {
    credentials: DashMap<(UserId, String), String>,
    identities: DashMap<(String, String), UserId>,
    /// (relying client, user) pairs
    userbase: DashSet<(u64, UserId)>,
    summaries: DashMap<(UserId, String), DailySummary>,
    last_user_id: AtomicU64,
    credential_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put_credential` calls so far.
    pub fn credential_writes(&self) -> usize {
        self.credential_writes.load(Ordering::SeqCst)
    }

    pub fn daily_summary(&self, user_id: UserId, date: &str) -> Option<DailySummary> {
        self.summaries
            .get(&(user_id, date.to_string()))
            .map(|entry| entry.value().clone())
    }

    fn allocate_user_id(&self) -> UserId {
        self.last_user_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_credential(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> Result<Option<String>, AppError> {
        Ok(self
            .credentials
            .get(&(user_id, provider.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn put_credential(
        &self,
        user_id: UserId,
        provider: &str,
        connection: &str,
    ) -> Result<(), AppError> {
        self.credentials
            .insert((user_id, provider.to_string()), connection.to_string());
        self.credential_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_linked_providers(&self, user_id: UserId) -> Result<Vec<String>, AppError> {
        let providers: BTreeSet<String> = self
            .credentials
            .iter()
            .filter(|entry| entry.key().0 == user_id)
            .map(|entry| entry.key().1.clone())
            .collect();
        Ok(providers.into_iter().collect())
    }

    async fn get_or_create_user_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<UserId, AppError> {
        let key = (provider.to_string(), provider_user_id.to_string());
        let user_id = *self
            .identities
            .entry(key)
            .or_insert_with(|| self.allocate_user_id());
        Ok(user_id)
    }

    async fn link_provider_identity(
        &self,
        user_id: UserId,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<(), AppError> {
        let key = (provider.to_string(), provider_user_id.to_string());
        match self.identities.entry(key) {
            Entry::Occupied(entry) if *entry.get() != user_id => Err(AppError::BadRequest(
                format!("{} account already linked to another user", provider),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(user_id);
                // Keep freshly allocated ids clear of externally chosen ones.
                self.last_user_id.fetch_max(user_id, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    async fn add_user_to_client(&self, user_id: UserId, client_id: u64) -> Result<(), AppError> {
        self.userbase.insert((client_id, user_id));
        Ok(())
    }

    async fn is_user_in_client(&self, user_id: UserId, client_id: u64) -> Result<bool, AppError> {
        Ok(self.userbase.contains(&(client_id, user_id)))
    }

    async fn list_user_ids(&self) -> Result<Vec<UserId>, AppError> {
        let ids: BTreeSet<UserId> = self
            .identities
            .iter()
            .map(|entry| *entry.value())
            .chain(self.credentials.iter().map(|entry| entry.key().0))
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn put_daily_summary(&self, summary: &DailySummary) -> Result<(), AppError> {
        self.summaries
            .insert((summary.user_id, summary.date.clone()), summary.clone());
        Ok(())
    }
}
