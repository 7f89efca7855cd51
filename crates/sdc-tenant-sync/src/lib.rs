// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Users-to-tenants sync
//!
//! Gives every identity-service user a same-named tenant holding a fixed role
//! set, and disables the tenants of disabled users.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sdc_tenant_sync::{Credentials, KeystoneClient, Reconciler, SyncConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let credentials = Credentials::resolve(None, None).ok_or("missing credentials")?;
//! let client = KeystoneClient::new(&credentials)?;
//! client.verify().await?;
//!
//! let report = Reconciler::new(Arc::new(client), SyncConfig::default()).run().await?;
//! for action in &report.actions {
//!     println!("{}", action);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod keystone;
pub mod mock;
pub mod reconciler;
pub mod types;

pub use config::{Credentials, SyncConfig};
pub use error::{IdentityError, Result, SyncError};
pub use identity::IdentityService;
pub use keystone::KeystoneClient;
pub use reconciler::{Reconciler, SyncAction, SyncReport, sync_users_to_tenants};
pub use types::{Role, Tenant, User};
