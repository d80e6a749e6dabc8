// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod metric;
pub mod summary;

pub use credential::{Connection, ConnectionKind, OAuthCredential};
pub use metric::{Metric, MetricQuery, Period, PlatformResult};
pub use summary::{DailySummary, MetricValues};

/// Internal user identifier, shared by every provider linked to the user.
pub type UserId = u64;
