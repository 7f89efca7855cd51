// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Keystone v2.0 admin API client.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use url::Url;

use crate::config::Credentials;
use crate::error::{IdentityError, IdentityResult};
use crate::identity::IdentityService;
use crate::types::{Role, Tenant, User};

const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Deserialize)]
struct UsersBody {
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct TenantsBody {
    tenants: Vec<Tenant>,
}

#[derive(Debug, Deserialize)]
struct TenantBody {
    tenant: Tenant,
}

#[derive(Debug, Deserialize)]
struct RolesBody {
    roles: Vec<Role>,
}

/// Keystone error bodies look like `{"error": {"message": ..., "code": ...}}`.
fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| text.to_string())
}

/// Identity service over the Keystone v2.0 admin API, authenticated with a
/// service token.
pub struct KeystoneClient {
    http: reqwest::Client,
    endpoint: Url,
    token: String,
}

impl KeystoneClient {
    pub fn new(credentials: &Credentials) -> IdentityResult<Self> {
        let mut raw = credentials.endpoint.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let endpoint = Url::parse(&raw).map_err(|e| IdentityError::InvalidEndpoint {
            url: credentials.endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(credentials.timeout)
                .build()?,
            endpoint,
            token: credentials.token.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Check the token by listing tenants.
    pub async fn verify(&self) -> IdentityResult<()> {
        self.list_tenants().await.map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> IdentityResult<RequestBuilder> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|e| IdentityError::InvalidEndpoint {
                url: format!("{}{}", self.endpoint, path),
                reason: e.to_string(),
            })?;
        Ok(self
            .http
            .request(method, url)
            .header(AUTH_HEADER, &self.token))
    }

    async fn send(&self, request: RequestBuilder) -> IdentityResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::Unauthorized);
        }

        let text = response.text().await.unwrap_or_default();
        Err(IdentityError::Api {
            status: status.as_u16(),
            message: error_message(&text),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> IdentityResult<T> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(format!("{}: {}", path, e)))
    }

    fn role_path(user_id: &str, role_id: &str, tenant_id: &str) -> String {
        format!(
            "tenants/{}/users/{}/roles/OS-KSADM/{}",
            tenant_id, user_id, role_id
        )
    }
}

#[async_trait]
impl IdentityService for KeystoneClient {
    #[instrument(skip(self))]
    async fn list_users(&self) -> IdentityResult<Vec<User>> {
        let body: UsersBody = self.get_json("users").await?;
        debug!(count = body.users.len(), "Listed users");
        Ok(body.users)
    }

    #[instrument(skip(self))]
    async fn list_tenants(&self) -> IdentityResult<Vec<Tenant>> {
        let body: TenantsBody = self.get_json("tenants").await?;
        debug!(count = body.tenants.len(), "Listed tenants");
        Ok(body.tenants)
    }

    #[instrument(skip(self))]
    async fn list_roles(&self) -> IdentityResult<Vec<Role>> {
        let body: RolesBody = self.get_json("OS-KSADM/roles").await?;
        Ok(body.roles)
    }

    #[instrument(skip(self, description))]
    async fn create_tenant(
        &self,
        name: &str,
        description: &str,
        enabled: bool,
    ) -> IdentityResult<Tenant> {
        let request = self.request(Method::POST, "tenants")?.json(&json!({
            "tenant": {
                "name": name,
                "description": description,
                "enabled": enabled,
            }
        }));
        let body: TenantBody = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(format!("tenants: {}", e)))?;
        Ok(body.tenant)
    }

    #[instrument(skip(self))]
    async fn roles_for_user(&self, user_id: &str, tenant_id: &str) -> IdentityResult<Vec<Role>> {
        let body: RolesBody = self
            .get_json(&format!("tenants/{}/users/{}/roles", tenant_id, user_id))
            .await?;
        Ok(body.roles)
    }

    #[instrument(skip(self))]
    async fn grant_role(
        &self,
        user_id: &str,
        role_id: &str,
        tenant_id: &str,
    ) -> IdentityResult<()> {
        let path = Self::role_path(user_id, role_id, tenant_id);
        self.send(self.request(Method::PUT, &path)?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke_role(
        &self,
        user_id: &str,
        role_id: &str,
        tenant_id: &str,
    ) -> IdentityResult<()> {
        let path = Self::role_path(user_id, role_id, tenant_id);
        self.send(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_tenant_enabled(&self, tenant_id: &str, enabled: bool) -> IdentityResult<()> {
        let request = self
            .request(Method::POST, &format!("tenants/{}", tenant_id))?
            .json(&json!({
                "tenant": {
                    "id": tenant_id,
                    "enabled": enabled,
                }
            }));
        self.send(request).await?;
        Ok(())
    }
}
