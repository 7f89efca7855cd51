// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource lifecycle adapter.
//!
//! One adapter type serves every registered variant. It issues single remote
//! calls and answers completion polls; waiting, backoff and timeouts belong to
//! the host that drives it.
//!
//! ```text
//! machine: absent -> pending -> running <-> stopped -> destroyed
//! network: absent -> pending -> present -> absent
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::attributes::{self, Attribute};
use crate::config::PluginConfig;
use crate::datacenter::{DataCenter, DataCenterFactory};
use crate::error::{ResourceError, Result};
use crate::routes::{parse_list, parse_routes};
use crate::schema::Properties;
use crate::types::{
    Allocation, Brand, MachineRequest, MachineState, NetworkRequest, NetworkState,
    RERUN_USER_SCRIPT_KEY, USER_SCRIPT_KEY,
};
use crate::variant::{CreationCall, ResourceKind, Variant, props};

/// Token returned by [`ResourceAdapter::update`]; the completion check
/// compares it against remote metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateToken(pub String);

/// Lifecycle status derived from a fresh fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceStatus {
    Machine(MachineState),
    Network(NetworkState),
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Machine(state) => state.as_str(),
            ResourceStatus::Network(state) => state.as_str(),
        }
    }
}

/// Lifecycle adapter for one resource of a stack.
pub struct ResourceAdapter {
    variant: &'static Variant,
    config: Arc<PluginConfig>,
    factory: Arc<dyn DataCenterFactory>,
    properties: Properties,
    stack_name: String,
    resource_id: Option<String>,
}

impl ResourceAdapter {
    /// Create an adapter for a resource that has not been created yet.
    pub fn new(
        variant: &'static Variant,
        config: Arc<PluginConfig>,
        factory: Arc<dyn DataCenterFactory>,
        properties: Properties,
        stack_name: impl Into<String>,
    ) -> Self {
        Self {
            variant,
            config,
            factory,
            properties,
            stack_name: stack_name.into(),
            resource_id: None,
        }
    }

    /// Attach the remote identifier of an existing resource.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn variant(&self) -> &'static Variant {
        self.variant
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    fn kind(&self) -> ResourceKind {
        self.variant.kind()
    }

    /// Build a fresh client handle from the current properties.
    async fn datacenter(&self) -> Result<Arc<dyn DataCenter>> {
        let endpoints = self
            .config
            .endpoints(self.properties.str(props::SAPI_ENDPOINT));
        Ok(self.factory.connect(&endpoints).await?)
    }

    fn require_id(&self) -> Result<&str> {
        self.resource_id
            .as_deref()
            .ok_or(ResourceError::MissingResourceId)
    }

    fn not_found(&self, id: &str) -> ResourceError {
        ResourceError::NotFound {
            kind: self.kind().as_str(),
            id: id.to_string(),
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Issue the remote creation call and record the remote identifier.
    ///
    /// Not idempotent: every call creates a new remote resource.
    #[instrument(skip(self), fields(resource_type = self.variant.type_name))]
    pub async fn create(&mut self) -> Result<String> {
        let id = match self.variant.creation {
            CreationCall::SmartMachine => self.create_machine(Brand::Joyent).await?,
            CreationCall::KvmMachine => self.create_machine(Brand::Kvm).await?,
            CreationCall::Network => {
                let allocation = Allocation::Range {
                    subnet: self.properties.str(props::SUBNET).to_string(),
                    provision_start_ip: self.properties.str(props::PROVISION_START_IP).to_string(),
                    provision_end_ip: self.properties.str(props::PROVISION_END_IP).to_string(),
                };
                self.create_network(allocation).await?
            }
            CreationCall::ManagedNetwork => {
                let prefix_len = effective_prefix(
                    self.properties.int(props::NETMASK).unwrap_or(24),
                    self.properties.int(props::OWNER_COUNT).unwrap_or(1),
                )?;
                self.create_network(Allocation::Sized { prefix_len }).await?
            }
        };

        info!(resource_id = %id, "Resource created");
        self.resource_id = Some(id.clone());
        Ok(id)
    }

    async fn create_machine(&self, brand: Brand) -> Result<String> {
        let alias = match self.properties.str(props::INSTANCE_ALIAS) {
            "" => synthesize_alias(&self.stack_name),
            alias => alias.to_string(),
        };
        let user_uuid = self.properties.str(props::USER_UUID);

        let request = MachineRequest {
            brand,
            owner_uuid: self.config.owner(user_uuid).to_string(),
            networks: parse_list(self.properties.str(props::NETWORKS)),
            package: self.properties.str(props::PACKAGE).to_string(),
            image: self.properties.str(props::IMAGE).to_string(),
            alias,
            user_script: self.properties.str(props::USER_SCRIPT).to_string(),
        };

        debug!(
            owner = %request.owner_uuid,
            networks = ?request.networks,
            package = %request.package,
            image = %request.image,
            alias = %request.alias,
            user_script_len = request.user_script.len(),
            "Trying to create a machine"
        );

        let dc = self.datacenter().await?;
        let machine = dc.create_machine(&request).await?;
        Ok(machine.uuid)
    }

    async fn create_network(&self, allocation: Allocation) -> Result<String> {
        let routes = parse_routes(self.properties.str(props::ROUTES))?;
        let gateway = match self.properties.str(props::GATEWAY) {
            "" => None,
            gateway => Some(gateway.to_string()),
        };
        let user_uuid = self.properties.str(props::USER_UUID);

        let request = NetworkRequest {
            name: self.properties.str(props::NAME).to_string(),
            owner_uuids: vec![self.config.owner(user_uuid).to_string()],
            allocation,
            gateway,
            resolvers: parse_list(self.properties.str(props::RESOLVERS)),
            routes,
            vlan_id: vlan_id(self.properties.int(props::VLAN_ID).unwrap_or(0))?,
            nic_tag: self
                .config
                .nic_tag(self.properties.str(props::NIC_TAG))
                .to_string(),
        };

        debug!(name = %request.name, allocation = ?request.allocation, "Trying to create a network");

        let dc = self.datacenter().await?;
        let network = dc.create_network(&request).await?;
        Ok(network.uuid)
    }

    /// Whether the created resource has reached its running/present state.
    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn poll_create(&self) -> Result<bool> {
        let id = self.require_id()?;
        debug!("Check create");
        let dc = self.datacenter().await?;

        match self.kind() {
            ResourceKind::Machine => {
                let machine = dc.get_machine(id).await?.ok_or_else(|| self.not_found(id))?;
                if machine.status() == MachineState::Failed {
                    return Err(ResourceError::ProvisioningFailed(id.to_string()));
                }
                Ok(machine.is_running())
            }
            ResourceKind::Network => Ok(dc.get_network(id).await?.is_some()),
        }
    }

    // =========================================================================
    // Suspend / Resume
    // =========================================================================

    /// Stop the machine. No-op for networks and for never-created resources.
    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn suspend(&self) -> Result<()> {
        let Some(id) = self.resource_id.as_deref() else {
            debug!("Suspend: resource_id is empty, nothing to do");
            return Ok(());
        };
        if self.kind() == ResourceKind::Network {
            return Ok(());
        }

        self.datacenter().await?.stop_machine(id).await?;
        info!("Suspend requested");
        Ok(())
    }

    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn poll_suspend(&self) -> Result<bool> {
        self.poll_machine_state(MachineState::Stopped).await
    }

    /// Start the machine. No-op for networks and for never-created resources.
    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn resume(&self) -> Result<()> {
        let Some(id) = self.resource_id.as_deref() else {
            debug!("Resume: resource_id is empty, nothing to do");
            return Ok(());
        };
        if self.kind() == ResourceKind::Network {
            return Ok(());
        }

        self.datacenter().await?.start_machine(id).await?;
        info!("Resume requested");
        Ok(())
    }

    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn poll_resume(&self) -> Result<bool> {
        self.poll_machine_state(MachineState::Running).await
    }

    async fn poll_machine_state(&self, expected: MachineState) -> Result<bool> {
        let Some(id) = self.resource_id.as_deref() else {
            return Ok(true);
        };
        if self.kind() == ResourceKind::Network {
            return Ok(true);
        }

        let dc = self.datacenter().await?;
        let machine = dc.get_machine(id).await?.ok_or_else(|| self.not_found(id))?;
        debug!(state = machine.status().as_str(), expected = expected.as_str(), "Check machine state");
        Ok(machine.status() == expected)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Delete the remote resource. No-op when it was never created.
    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn delete(&self) -> Result<()> {
        let Some(id) = self.resource_id.as_deref() else {
            debug!("Delete: resource_id is empty, nothing to do");
            return Ok(());
        };

        let dc = self.datacenter().await?;
        match self.kind() {
            ResourceKind::Machine => dc.delete_machine(id).await?,
            ResourceKind::Network => dc.delete_network(id).await?,
        }
        info!("Delete requested");
        Ok(())
    }

    /// Whether the remote resource is gone.
    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn poll_delete(&self) -> Result<bool> {
        let Some(id) = self.resource_id.as_deref() else {
            return Ok(true);
        };

        let dc = self.datacenter().await?;
        match self.kind() {
            ResourceKind::Machine => Ok(dc
                .get_machine(id)
                .await?
                .is_none_or(|machine| machine.is_destroyed())),
            ResourceKind::Network => Ok(dc.get_network(id).await?.is_none()),
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Apply in-place changes.
    ///
    /// Only the user script is mutable: a new script is merged into customer
    /// metadata together with the rerun flag. Returns `None` when nothing
    /// this adapter handles changed or the resource was never created.
    #[instrument(skip(self, changed), fields(resource_id = ?self.resource_id))]
    pub async fn update(&mut self, changed: &Properties) -> Result<Option<UpdateToken>> {
        if self.kind() != ResourceKind::Machine || !changed.contains(props::USER_SCRIPT) {
            debug!("No mutable property changed");
            return Ok(None);
        }

        let Some(id) = self.resource_id.clone() else {
            debug!("Update: resource_id is empty, nothing to do");
            return Ok(None);
        };
        let script = changed.str(props::USER_SCRIPT).to_string();
        let metadata = BTreeMap::from([
            (USER_SCRIPT_KEY.to_string(), script.clone()),
            (RERUN_USER_SCRIPT_KEY.to_string(), "true".to_string()),
        ]);

        self.datacenter()
            .await?
            .update_machine_metadata(&id, &metadata)
            .await?;
        self.properties
            .set(props::USER_SCRIPT, Value::String(script.clone()));

        info!(user_script_len = script.len(), "User script updated");
        Ok(Some(UpdateToken(script)))
    }

    /// Whether remote metadata carries the script named by `token`.
    #[instrument(skip(self, token), fields(resource_id = ?self.resource_id))]
    pub async fn poll_update(&self, token: &UpdateToken) -> Result<bool> {
        let id = self.require_id()?;
        let dc = self.datacenter().await?;
        let machine = dc.get_machine(id).await?.ok_or_else(|| self.not_found(id))?;
        Ok(machine.user_script() == Some(token.0.as_str()))
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Current lifecycle status. A never-created resource is absent
    /// (networks) or destroyed (machines), as is one the service no longer
    /// knows.
    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn status(&self) -> Result<ResourceStatus> {
        let kind = self.kind();
        let Some(id) = self.resource_id.as_deref() else {
            return Ok(match kind {
                ResourceKind::Machine => ResourceStatus::Machine(MachineState::Destroyed),
                ResourceKind::Network => ResourceStatus::Network(NetworkState::Absent),
            });
        };

        let dc = self.datacenter().await?;
        Ok(match kind {
            ResourceKind::Machine => ResourceStatus::Machine(
                dc.get_machine(id)
                    .await?
                    .map_or(MachineState::Destroyed, |machine| machine.status()),
            ),
            ResourceKind::Network => ResourceStatus::Network(match dc.get_network(id).await? {
                Some(_) => NetworkState::Present,
                None => NetworkState::Absent,
            }),
        })
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    /// Resolve a readable attribute.
    ///
    /// Unknown names, attributes the variant does not expose, never-created
    /// resources and remote objects that no longer exist all yield `None`.
    #[instrument(skip(self), fields(resource_id = ?self.resource_id))]
    pub async fn resolve_attribute(&self, name: &str) -> Result<Option<Value>> {
        let Some(attribute) = Attribute::from_name(name).filter(|a| self.variant.exposes(*a))
        else {
            debug!("Attribute not supported");
            return Ok(None);
        };
        let Some(id) = self.resource_id.as_deref() else {
            return Ok(None);
        };

        if attribute == Attribute::Id {
            return Ok(Some(Value::String(id.to_string())));
        }

        let dc = self.datacenter().await?;
        match self.kind() {
            ResourceKind::Machine => {
                let Some(machine) = dc.get_machine(id).await? else {
                    return Ok(None);
                };
                if !attribute.needs_nic_listing() {
                    return Ok(attributes::machine_value(attribute, &machine));
                }

                let tags = match attribute {
                    Attribute::ExternalIps => &self.config.attributes.external_nic_tags,
                    _ => &self.config.attributes.internal_nic_tags,
                };
                let joined = match dc.list_machine_nics(id).await {
                    Ok(nics) => attributes::join_tagged_ips(&nics, tags),
                    Err(e) => {
                        warn!(error = %e, attribute = attribute.name(), "NIC lookup failed");
                        String::new()
                    }
                };
                Ok(Some(Value::String(joined)))
            }
            ResourceKind::Network => Ok(dc
                .get_network(id)
                .await?
                .and_then(|network| attributes::network_value(attribute, &network))),
        }
    }
}

/// Alias for a machine whose template omits one: a random token scoped by
/// the stack name.
fn synthesize_alias(stack_name: &str) -> String {
    let token = Uuid::new_v4();
    if stack_name.is_empty() {
        token.to_string()
    } else {
        format!("{}-{}", token, stack_name)
    }
}

/// Highest usable 802.1Q VLAN id.
const MAX_VLAN_ID: i64 = 4094;

fn vlan_id(value: i64) -> Result<u32> {
    if !(0..=MAX_VLAN_ID).contains(&value) {
        return Err(ResourceError::InvalidProperty {
            name: props::VLAN_ID.to_string(),
            reason: format!("must be between 0 and {}, got {}", MAX_VLAN_ID, value),
        });
    }
    Ok(value as u32)
}

/// Largest prefix length not above `netmask` whose subnet holds
/// `owner_count` addresses after reserving network, gateway and broadcast.
pub fn effective_prefix(netmask: i64, owner_count: i64) -> Result<u8> {
    if !(8..=30).contains(&netmask) {
        return Err(ResourceError::InvalidProperty {
            name: props::NETMASK.to_string(),
            reason: "prefix length must be between 8 and 30".to_string(),
        });
    }
    if owner_count < 1 {
        return Err(ResourceError::InvalidProperty {
            name: props::OWNER_COUNT.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let needed = owner_count as u64;
    let mut prefix = netmask as u32;
    loop {
        let usable = (1u64 << (32 - prefix)) - 3;
        if usable >= needed {
            return Ok(prefix as u8);
        }
        if prefix == 8 {
            return Err(ResourceError::InvalidProperty {
                name: props::OWNER_COUNT.to_string(),
                reason: format!("{} addresses do not fit in a /8", owner_count),
            });
        }
        prefix -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_prefix_keeps_netmask_when_it_fits() {
        assert_eq!(effective_prefix(24, 1).unwrap(), 24);
        assert_eq!(effective_prefix(24, 253).unwrap(), 24);
        assert_eq!(effective_prefix(30, 1).unwrap(), 30);
    }

    #[test]
    fn test_effective_prefix_widens_for_owner_count() {
        assert_eq!(effective_prefix(24, 254).unwrap(), 23);
        assert_eq!(effective_prefix(28, 100).unwrap(), 25);
        assert_eq!(effective_prefix(30, 2).unwrap(), 29);
    }

    #[test]
    fn test_effective_prefix_rejects_bad_input() {
        assert!(effective_prefix(31, 1).is_err());
        assert!(effective_prefix(7, 1).is_err());
        assert!(effective_prefix(24, 0).is_err());
        assert!(effective_prefix(8, 1 << 25).is_err());
    }

    #[test]
    fn test_vlan_id_range() {
        assert_eq!(vlan_id(0).unwrap(), 0);
        assert_eq!(vlan_id(4094).unwrap(), 4094);
        assert!(matches!(
            vlan_id(-1),
            Err(ResourceError::InvalidProperty { ref name, .. }) if name == "vlan_id"
        ));
        assert!(vlan_id(4095).is_err());
        assert!(vlan_id(1 << 33).is_err());
    }

    #[test]
    fn test_synthesize_alias() {
        let alias = synthesize_alias("web-stack");
        assert!(alias.ends_with("-web-stack"));
        let token = alias.trim_end_matches("-web-stack");
        assert!(Uuid::parse_str(token).is_ok());

        assert!(Uuid::parse_str(&synthesize_alias("")).is_ok());
        assert_ne!(synthesize_alias("s"), synthesize_alias("s"));
    }
}
