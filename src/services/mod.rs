// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregator;
pub mod authorization;
pub mod oauth_state;
pub mod platform;
pub mod registry;
pub mod sync;
pub mod token;

pub use aggregator::{select_largest, Aggregator};
pub use authorization::{AuthorizationService, BeginAuthorization, CompletedAuthorization};
pub use oauth_state::{AuthorizationRequest, AuthorizationStateStore, PendingAuthorization};
pub use platform::{Platform, PlatformContext, PlatformTable};
pub use registry::{AuthStyle, ProviderConfig, ProviderKind, ProviderRegistry};
pub use sync::{DailySync, SyncReport};
pub use token::{TokenClient, TokenGrant};
