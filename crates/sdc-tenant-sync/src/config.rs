// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reconciler configuration and admin credentials.

use std::time::Duration;

/// Roles granted to every enabled user in their own tenant.
pub const DEFAULT_ROLES: &[&str] = &["_member_", "heat_stack_owner"];

/// Administrative accounts that never get a personal tenant.
pub const DEFAULT_IGNORED_USERS: &[&str] = &["admin", "heat", "keystone"];

/// Token variables, in precedence order.
pub const TOKEN_ENV_VARS: &[&str] = &["OS_SERVICE_TOKEN", "SERVICE_TOKEN"];

/// Endpoint variables, in precedence order.
pub const ENDPOINT_ENV_VARS: &[&str] = &["OS_SERVICE_ENDPOINT", "SERVICE_ENDPOINT"];

/// Reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Role names to grant; every name must resolve.
    pub roles: Vec<String>,
    /// User names excluded from reconciliation.
    pub ignored_users: Vec<String>,
    /// Record actions without issuing mutating calls.
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            roles: DEFAULT_ROLES.iter().map(|s| s.to_string()).collect(),
            ignored_users: DEFAULT_IGNORED_USERS.iter().map(|s| s.to_string()).collect(),
            dry_run: false,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the role set.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Ignore additional user names on top of the defaults.
    pub fn with_ignored_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for user in users {
            let user = user.into();
            if !self.ignored_users.contains(&user) {
                self.ignored_users.push(user);
            }
        }
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_ignored(&self, user_name: &str) -> bool {
        self.ignored_users.iter().any(|u| u == user_name)
    }
}

/// Admin token and identity endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Credentials {
    /// Resolve credentials from flags, falling back to the environment.
    ///
    /// Returns `None` when either value is missing or empty.
    pub fn resolve(flag_token: Option<String>, flag_endpoint: Option<String>) -> Option<Self> {
        Self::resolve_with(flag_token, flag_endpoint, |name| std::env::var(name).ok())
    }

    /// Resolve with a custom variable lookup.
    pub fn resolve_with<F>(
        flag_token: Option<String>,
        flag_endpoint: Option<String>,
        lookup: F,
    ) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first_set = |flag: Option<String>, vars: &[&str]| {
            flag.filter(|v| !v.is_empty()).or_else(|| {
                vars.iter()
                    .filter_map(|name| lookup(*name))
                    .find(|v| !v.is_empty())
            })
        };

        Some(Self {
            token: first_set(flag_token, TOKEN_ENV_VARS)?,
            endpoint: first_set(flag_endpoint, ENDPOINT_ENV_VARS)?,
            timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
