// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity-service seam used by the reconciler.

use async_trait::async_trait;

use crate::error::IdentityResult;
use crate::types::{Role, Tenant, User};

/// Administrative operations on users, tenants and role grants.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn list_users(&self) -> IdentityResult<Vec<User>>;

    async fn list_tenants(&self) -> IdentityResult<Vec<Tenant>>;

    async fn list_roles(&self) -> IdentityResult<Vec<Role>>;

    async fn create_tenant(
        &self,
        name: &str,
        description: &str,
        enabled: bool,
    ) -> IdentityResult<Tenant>;

    /// Roles the user currently holds in the tenant.
    async fn roles_for_user(&self, user_id: &str, tenant_id: &str) -> IdentityResult<Vec<Role>>;

    async fn grant_role(
        &self,
        user_id: &str,
        role_id: &str,
        tenant_id: &str,
    ) -> IdentityResult<()>;

    async fn revoke_role(
        &self,
        user_id: &str,
        role_id: &str,
        tenant_id: &str,
    ) -> IdentityResult<()>;

    async fn set_tenant_enabled(&self, tenant_id: &str, enabled: bool) -> IdentityResult<()>;
}
