// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Users-to-tenants reconciliation.
//!
//! One full pass per run:
//!
//! 1. List tenants, roles and users.
//! 2. Resolve the configured role names; every name must match.
//! 3. Drop ignored users; at least one user must remain.
//! 4. Enabled users get a same-named enabled tenant holding every configured
//!    role. Disabled users' tenants are disabled and stripped of those roles.
//!
//! The first failing call aborts the pass.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::identity::IdentityService;
use crate::types::{Role, Tenant, User};

/// One mutating action performed (or, in dry-run, planned) by a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    CreateTenant {
        tenant: String,
    },
    GrantRole {
        role: String,
        user: String,
        tenant: String,
    },
    RevokeRole {
        role: String,
        user: String,
        tenant: String,
    },
    DisableTenant {
        tenant: String,
    },
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::CreateTenant { tenant } => write!(f, "creating tenant {}", tenant),
            SyncAction::GrantRole { role, user, tenant } => {
                write!(f, "grant {} to user {} in tenant {}", role, user, tenant)
            }
            SyncAction::RevokeRole { role, user, tenant } => {
                write!(f, "revoke role {} from user {} in tenant {}", role, user, tenant)
            }
            SyncAction::DisableTenant { tenant } => write!(f, "disable tenant {}", tenant),
        }
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Users considered, in service order.
    pub users: Vec<String>,
    /// Actions in the order they were applied.
    pub actions: Vec<SyncAction>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn is_converged(&self) -> bool {
        self.actions.is_empty()
    }

    fn record(&mut self, action: SyncAction) {
        let prefix = if self.dry_run { "(dry-run) " } else { "" };
        info!("## {}{}", prefix, action);
        self.actions.push(action);
    }
}

/// Reconciles identity-service users with per-user tenants.
pub struct Reconciler {
    identity: Arc<dyn IdentityService>,
    config: SyncConfig,
}

impl Reconciler {
    pub fn new(identity: Arc<dyn IdentityService>, config: SyncConfig) -> Self {
        Self { identity, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one full pass.
    pub async fn run(&self) -> Result<SyncReport> {
        let tenants = self.identity.list_tenants().await?;
        let roles = self.roles_to_grant().await?;
        let users = self.users_to_sync().await?;

        let mut report = SyncReport {
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        for user in &users {
            info!("# syncing user {}", user.name);
            report.users.push(user.name.clone());

            let tenant = tenants.iter().find(|t| t.name == user.name);
            if user.enabled {
                self.sync_enabled(user, tenant, &roles, &mut report).await?;
            } else if let Some(tenant) = tenant {
                self.sync_disabled(user, tenant, &roles, &mut report)
                    .await?;
            }
        }

        Ok(report)
    }

    /// Resolve configured role names, failing if any has no match.
    async fn roles_to_grant(&self) -> Result<Vec<Role>> {
        let available = self.identity.list_roles().await?;

        let missing: Vec<String> = self
            .config
            .roles
            .iter()
            .filter(|name| !available.iter().any(|r| &r.name == *name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SyncError::MissingRoles(missing));
        }

        Ok(available
            .into_iter()
            .filter(|r| self.config.roles.contains(&r.name))
            .collect())
    }

    async fn users_to_sync(&self) -> Result<Vec<User>> {
        let users: Vec<User> = self
            .identity
            .list_users()
            .await?
            .into_iter()
            .filter(|u| !self.config.is_ignored(&u.name))
            .collect();

        if users.is_empty() {
            return Err(SyncError::NoUsers);
        }
        Ok(users)
    }

    async fn sync_enabled(
        &self,
        user: &User,
        tenant: Option<&Tenant>,
        roles: &[Role],
        report: &mut SyncReport,
    ) -> Result<()> {
        let (tenant_id, tenant_name, held) = match tenant {
            Some(tenant) => {
                let held = self.identity.roles_for_user(&user.id, &tenant.id).await?;
                (tenant.id.clone(), tenant.name.clone(), held)
            }
            None => {
                report.record(SyncAction::CreateTenant {
                    tenant: user.name.clone(),
                });
                if self.config.dry_run {
                    (String::new(), user.name.clone(), Vec::new())
                } else {
                    let created = self
                        .identity
                        .create_tenant(&user.name, &format!("Tenant for user {}", user.name), true)
                        .await?;
                    let held = self.identity.roles_for_user(&user.id, &created.id).await?;
                    (created.id, created.name, held)
                }
            }
        };

        for role in roles.iter().filter(|r| !held.iter().any(|h| h.id == r.id)) {
            report.record(SyncAction::GrantRole {
                role: role.name.clone(),
                user: user.name.clone(),
                tenant: tenant_name.clone(),
            });
            if !self.config.dry_run {
                self.identity
                    .grant_role(&user.id, &role.id, &tenant_id)
                    .await?;
            }
        }

        Ok(())
    }

    async fn sync_disabled(
        &self,
        user: &User,
        tenant: &Tenant,
        roles: &[Role],
        report: &mut SyncReport,
    ) -> Result<()> {
        if tenant.enabled {
            report.record(SyncAction::DisableTenant {
                tenant: tenant.name.clone(),
            });
            if !self.config.dry_run {
                self.identity.set_tenant_enabled(&tenant.id, false).await?;
            }
        }

        let held = self.identity.roles_for_user(&user.id, &tenant.id).await?;
        for role in roles.iter().filter(|r| held.iter().any(|h| h.id == r.id)) {
            report.record(SyncAction::RevokeRole {
                role: role.name.clone(),
                user: user.name.clone(),
                tenant: tenant.name.clone(),
            });
            if !self.config.dry_run {
                self.identity
                    .revoke_role(&user.id, &role.id, &tenant.id)
                    .await?;
            }
        }

        Ok(())
    }
}

/// Run one pass with the given identity service and configuration.
pub async fn sync_users_to_tenants(
    identity: Arc<dyn IdentityService>,
    config: SyncConfig,
) -> Result<SyncReport> {
    Reconciler::new(identity, config).run().await
}
