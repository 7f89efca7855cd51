// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Override configuration for the resource adapters.
//!
//! The override file is read once at process start and is immutable
//! afterwards; adapters receive it as an `Arc<PluginConfig>`.
//!
//! ```toml
//! [endpoints]
//! sapi = "http://10.0.0.10"
//!
//! [owner]
//! uuid = "930896af-bf8c-48d4-885c-6573a94b1853"
//!
//! [network]
//! nic_tag = "external"
//!
//! [resources]
//! kvm = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Environment variable naming the override file.
pub const CONFIG_PATH_ENV: &str = "SDC_PLUGIN_CONFIG";

/// Process-wide override configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Forced service endpoints.
    pub endpoints: EndpointOverrides,
    /// Forced owner identity.
    pub owner: OwnerOverride,
    /// Forced network settings.
    pub network: NetworkOverride,
    /// NIC tag sets used by the IP attributes.
    pub attributes: AttributeConfig,
    /// Which resource types get registered.
    pub resources: ResourceToggles,
    /// HTTP client settings.
    pub http: HttpConfig,
}

/// Endpoint overrides. A value set here wins over the resource property.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointOverrides {
    pub sapi: Option<String>,
    pub vmapi: Option<String>,
    pub napi: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OwnerOverride {
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkOverride {
    pub nic_tag: Option<String>,
}

/// NIC tags that classify addresses as external or internal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttributeConfig {
    pub external_nic_tags: Vec<String>,
    pub internal_nic_tags: Vec<String>,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            external_nic_tags: vec!["external".to_string()],
            internal_nic_tags: vec!["internal".to_string(), "customer".to_string()],
        }
    }
}

/// Registration toggles, one per resource variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceToggles {
    pub smart_machine: bool,
    pub kvm: bool,
    pub network: bool,
    pub managed_network: bool,
}

impl Default for ResourceToggles {
    fn default() -> Self {
        Self {
            smart_machine: true,
            kvm: true,
            network: true,
            managed_network: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PluginConfig {
    /// Create a configuration with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an override file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse override file contents.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load the file named by `SDC_PLUGIN_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Owner identity after applying the override.
    pub fn owner<'a>(&'a self, declared: &'a str) -> &'a str {
        self.owner.uuid.as_deref().unwrap_or(declared)
    }

    /// NIC tag after applying the override.
    pub fn nic_tag<'a>(&'a self, declared: &'a str) -> &'a str {
        self.network.nic_tag.as_deref().unwrap_or(declared)
    }

    /// Service endpoints after applying the overrides.
    pub fn endpoints(&self, declared_sapi: &str) -> Endpoints {
        Endpoints {
            sapi: self
                .endpoints
                .sapi
                .clone()
                .unwrap_or_else(|| declared_sapi.to_string()),
            vmapi: self.endpoints.vmapi.clone(),
            napi: self.endpoints.napi.clone(),
        }
    }

    pub fn with_owner(mut self, uuid: impl Into<String>) -> Self {
        self.owner.uuid = Some(uuid.into());
        self
    }

    pub fn with_nic_tag(mut self, tag: impl Into<String>) -> Self {
        self.network.nic_tag = Some(tag.into());
        self
    }

    pub fn with_sapi(mut self, url: impl Into<String>) -> Self {
        self.endpoints.sapi = Some(url.into());
        self
    }
}

/// Endpoints a DataCenter handle is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub sapi: String,
    /// VMAPI base URL; discovered through SAPI when `None`.
    pub vmapi: Option<String>,
    /// NAPI base URL; discovered through SAPI when `None`.
    pub napi: Option<String>,
}
