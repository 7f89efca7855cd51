// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory identity service for testing.
//!
//! Ids are derived from names (`u-alice`, `t-alice`, `r-_member_`) so
//! fixtures can refer to entities by name.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{IdentityError, IdentityResult};
use crate::identity::IdentityService;
use crate::types::{Role, Tenant, User};

fn user_id(name: &str) -> String {
    format!("u-{}", name)
}

fn tenant_id(name: &str) -> String {
    format!("t-{}", name)
}

fn role_id(name: &str) -> String {
    format!("r-{}", name)
}

#[derive(Debug, Default)]
struct MockState {
    users: Vec<User>,
    tenants: Vec<Tenant>,
    roles: Vec<Role>,
    /// (user id, tenant id) -> role ids
    grants: HashMap<(String, String), BTreeSet<String>>,
    unauthorized: bool,
    fail_revokes: bool,
    mutations: usize,
}

/// Builder for [`MockIdentity`] fixtures.
#[derive(Debug, Default)]
pub struct MockIdentityBuilder {
    state: MockState,
}

impl MockIdentityBuilder {
    pub fn user(mut self, name: &str, enabled: bool) -> Self {
        self.state.users.push(User {
            id: user_id(name),
            name: name.to_string(),
            enabled,
        });
        self
    }

    pub fn tenant(mut self, name: &str, enabled: bool) -> Self {
        self.state.tenants.push(Tenant {
            id: tenant_id(name),
            name: name.to_string(),
            description: None,
            enabled,
        });
        self
    }

    pub fn role(mut self, name: &str) -> Self {
        self.state.roles.push(Role {
            id: role_id(name),
            name: name.to_string(),
        });
        self
    }

    /// Pre-existing grant of `role` to `user` in `tenant`.
    pub fn grant(mut self, user: &str, tenant: &str, role: &str) -> Self {
        self.state
            .grants
            .entry((user_id(user), tenant_id(tenant)))
            .or_default()
            .insert(role_id(role));
        self
    }

    /// Reject every call as unauthorized.
    pub fn unauthorized(mut self) -> Self {
        self.state.unauthorized = true;
        self
    }

    /// Fail every revoke call.
    pub fn fail_revokes(mut self) -> Self {
        self.state.fail_revokes = true;
        self
    }

    pub fn build(self) -> MockIdentity {
        MockIdentity {
            state: Arc::new(Mutex::new(self.state)),
        }
    }
}

/// Mock identity service. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockIdentity {
    state: Arc<Mutex<MockState>>,
}

impl MockIdentity {
    pub fn builder() -> MockIdentityBuilder {
        MockIdentityBuilder::default()
    }

    pub async fn tenant(&self, name: &str) -> Option<Tenant> {
        self.state
            .lock()
            .await
            .tenants
            .iter()
            .find(|t| t.name == name)
            .cloned()
    }

    /// Names of the roles `user` holds in `tenant`, sorted.
    pub async fn roles_held(&self, user: &str, tenant: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let Some(tenant) = state.tenants.iter().find(|t| t.name == tenant) else {
            return Vec::new();
        };
        let held = state
            .grants
            .get(&(user_id(user), tenant.id.clone()))
            .cloned()
            .unwrap_or_default();

        let mut names: Vec<String> = state
            .roles
            .iter()
            .filter(|r| held.contains(&r.id))
            .map(|r| r.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of mutating calls received.
    pub async fn mutations(&self) -> usize {
        self.state.lock().await.mutations
    }

    async fn lock(&self) -> IdentityResult<tokio::sync::MutexGuard<'_, MockState>> {
        let state = self.state.lock().await;
        if state.unauthorized {
            return Err(IdentityError::Unauthorized);
        }
        Ok(state)
    }
}

fn not_found(what: &str, id: &str) -> IdentityError {
    IdentityError::Api {
        status: 404,
        message: format!("Could not find {}: {}", what, id),
    }
}

#[async_trait]
impl IdentityService for MockIdentity {
    async fn list_users(&self) -> IdentityResult<Vec<User>> {
        Ok(self.lock().await?.users.clone())
    }

    async fn list_tenants(&self) -> IdentityResult<Vec<Tenant>> {
        Ok(self.lock().await?.tenants.clone())
    }

    async fn list_roles(&self) -> IdentityResult<Vec<Role>> {
        Ok(self.lock().await?.roles.clone())
    }

    async fn create_tenant(
        &self,
        name: &str,
        description: &str,
        enabled: bool,
    ) -> IdentityResult<Tenant> {
        let mut state = self.lock().await?;
        if state.tenants.iter().any(|t| t.name == name) {
            return Err(IdentityError::Api {
                status: 409,
                message: format!("Conflict occurred attempting to store tenant - {}", name),
            });
        }

        let tenant = Tenant {
            id: tenant_id(name),
            name: name.to_string(),
            description: Some(description.to_string()),
            enabled,
        };
        state.tenants.push(tenant.clone());
        state.mutations += 1;
        Ok(tenant)
    }

    async fn roles_for_user(&self, user_id: &str, tenant_id: &str) -> IdentityResult<Vec<Role>> {
        let state = self.lock().await?;
        let held = state
            .grants
            .get(&(user_id.to_string(), tenant_id.to_string()))
            .cloned()
            .unwrap_or_default();
        Ok(state
            .roles
            .iter()
            .filter(|r| held.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn grant_role(
        &self,
        user_id: &str,
        role_id: &str,
        tenant_id: &str,
    ) -> IdentityResult<()> {
        let mut state = self.lock().await?;
        if !state.tenants.iter().any(|t| t.id == tenant_id) {
            return Err(not_found("tenant", tenant_id));
        }
        state
            .grants
            .entry((user_id.to_string(), tenant_id.to_string()))
            .or_default()
            .insert(role_id.to_string());
        state.mutations += 1;
        Ok(())
    }

    async fn revoke_role(
        &self,
        user_id: &str,
        role_id: &str,
        tenant_id: &str,
    ) -> IdentityResult<()> {
        let mut state = self.lock().await?;
        if state.fail_revokes {
            return Err(IdentityError::Api {
                status: 500,
                message: "revoke failed".to_string(),
            });
        }
        let removed = state
            .grants
            .get_mut(&(user_id.to_string(), tenant_id.to_string()))
            .is_some_and(|held| held.remove(role_id));
        if !removed {
            return Err(not_found("role grant", role_id));
        }
        state.mutations += 1;
        Ok(())
    }

    async fn set_tenant_enabled(&self, tenant_id: &str, enabled: bool) -> IdentityResult<()> {
        let mut state = self.lock().await?;
        let tenant = state
            .tenants
            .iter_mut()
            .find(|t| t.id == tenant_id)
            .ok_or_else(|| not_found("tenant", tenant_id))?;
        tenant.enabled = enabled;
        state.mutations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_and_revoke_round() {
        let identity = MockIdentity::builder()
            .user("alice", true)
            .tenant("alice", true)
            .role("r1")
            .build();

        identity.grant_role("u-alice", "r-r1", "t-alice").await.unwrap();
        assert_eq!(identity.roles_held("alice", "alice").await, vec!["r1"]);

        identity.revoke_role("u-alice", "r-r1", "t-alice").await.unwrap();
        assert!(identity.roles_held("alice", "alice").await.is_empty());
        assert!(identity.revoke_role("u-alice", "r-r1", "t-alice").await.is_err());
        assert_eq!(identity.mutations().await, 2);
    }

    #[tokio::test]
    async fn test_unauthorized_rejects_reads() {
        let identity = MockIdentity::builder().unauthorized().build();
        assert!(matches!(
            identity.list_tenants().await,
            Err(IdentityError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_tenant_conflicts() {
        let identity = MockIdentity::builder().tenant("alice", true).build();
        let err = identity.create_tenant("alice", "", true).await.unwrap_err();
        assert!(matches!(err, IdentityError::Api { status: 409, .. }));
    }
}
