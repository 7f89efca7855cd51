// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource variant descriptors.
//!
//! Each registered resource type is one static [`Variant`]: which remote
//! creation call it makes, its property table and its readable attributes.
//! All variants share the same [`ResourceAdapter`](crate::ResourceAdapter).

use serde::Serialize;

use crate::attributes::{Attribute, MACHINE_ATTRIBUTES, NETWORK_ATTRIBUTES};
use crate::config::PluginConfig;
use crate::schema::PropertySchema;

/// Property names.
pub mod props {
    pub const SAPI_ENDPOINT: &str = "sapi_endpoint";
    pub const USER_UUID: &str = "user_uuid";
    pub const INSTANCE_ALIAS: &str = "instance_alias";
    pub const PACKAGE: &str = "package";
    pub const IMAGE: &str = "image";
    pub const NETWORKS: &str = "networks";
    pub const USER_SCRIPT: &str = "user_script";

    pub const NAME: &str = "name";
    pub const SUBNET: &str = "subnet";
    pub const PROVISION_START_IP: &str = "provision_start_ip";
    pub const PROVISION_END_IP: &str = "provision_end_ip";
    pub const GATEWAY: &str = "gateway";
    pub const RESOLVERS: &str = "resolvers";
    pub const ROUTES: &str = "routes";
    pub const VLAN_ID: &str = "vlan_id";
    pub const NIC_TAG: &str = "nic_tag";
    pub const NETMASK: &str = "netmask";
    pub const OWNER_COUNT: &str = "owner_count";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Machine,
    Network,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Machine => "machine",
            ResourceKind::Network => "network",
        }
    }
}

/// Remote creation call a variant issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationCall {
    SmartMachine,
    KvmMachine,
    /// Explicit subnet and provisioning range.
    Network,
    /// Subnet sized from owner count and netmask.
    ManagedNetwork,
}

impl CreationCall {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CreationCall::SmartMachine | CreationCall::KvmMachine => ResourceKind::Machine,
            CreationCall::Network | CreationCall::ManagedNetwork => ResourceKind::Network,
        }
    }
}

/// Static descriptor of a registered resource type.
#[derive(Debug)]
pub struct Variant {
    pub type_name: &'static str,
    pub creation: CreationCall,
    pub schema: &'static [PropertySchema],
    pub attributes: &'static [Attribute],
}

const SAPI_ENDPOINT: PropertySchema =
    PropertySchema::string(props::SAPI_ENDPOINT, "The URL for the RESTful Service API.")
        .required();
const USER_UUID: PropertySchema =
    PropertySchema::string(props::USER_UUID, "UUID of the owning user.").required();

const MACHINE_SCHEMA: &[PropertySchema] = &[
    SAPI_ENDPOINT,
    USER_UUID,
    PropertySchema::string(props::INSTANCE_ALIAS, "The instance name.").default_str(""),
    PropertySchema::string(props::PACKAGE, "Package UUID to use.").required(),
    PropertySchema::string(props::IMAGE, "Image UUID to use.").required(),
    PropertySchema::string(props::NETWORKS, "Network UUID, or a comma-separated list.")
        .required(),
    PropertySchema::string(props::USER_SCRIPT, "The user script.")
        .default_str("")
        .update_allowed(),
];

const NETWORK_COMMON: [PropertySchema; 5] = [
    PropertySchema::string(props::GATEWAY, "Gateway address.").default_str(""),
    PropertySchema::string(props::RESOLVERS, "Comma-separated DNS resolvers.").default_str(""),
    PropertySchema::string(
        props::ROUTES,
        "Static routes as comma-separated <destination>:<gateway> pairs.",
    )
    .default_str(""),
    PropertySchema::integer(props::VLAN_ID, "VLAN id.").default_int(0),
    PropertySchema::string(props::NIC_TAG, "NIC tag the network is attached to.")
        .default_str("external"),
];

const NETWORK_SCHEMA: &[PropertySchema] = &[
    SAPI_ENDPOINT,
    USER_UUID,
    PropertySchema::string(props::NAME, "The network name.").required(),
    PropertySchema::string(props::SUBNET, "Subnet in CIDR notation.").required(),
    PropertySchema::string(props::PROVISION_START_IP, "First provisionable address.")
        .required(),
    PropertySchema::string(props::PROVISION_END_IP, "Last provisionable address.").required(),
    NETWORK_COMMON[0],
    NETWORK_COMMON[1],
    NETWORK_COMMON[2],
    NETWORK_COMMON[3],
    NETWORK_COMMON[4],
];

const MANAGED_NETWORK_SCHEMA: &[PropertySchema] = &[
    SAPI_ENDPOINT,
    USER_UUID,
    PropertySchema::string(props::NAME, "The network name.").required(),
    PropertySchema::integer(props::NETMASK, "Largest subnet prefix length to allocate.")
        .default_int(24),
    PropertySchema::integer(props::OWNER_COUNT, "Number of addresses the network must hold.")
        .default_int(1),
    NETWORK_COMMON[0],
    NETWORK_COMMON[1],
    NETWORK_COMMON[2],
    NETWORK_COMMON[3],
    NETWORK_COMMON[4],
];

pub static SMART_MACHINE: Variant = Variant {
    type_name: "SDC::Compute::SmartMachine",
    creation: CreationCall::SmartMachine,
    schema: MACHINE_SCHEMA,
    attributes: MACHINE_ATTRIBUTES,
};

pub static KVM_MACHINE: Variant = Variant {
    type_name: "SDC::Compute::KVM",
    creation: CreationCall::KvmMachine,
    schema: MACHINE_SCHEMA,
    attributes: MACHINE_ATTRIBUTES,
};

pub static NETWORK: Variant = Variant {
    type_name: "SDC::Network::Network",
    creation: CreationCall::Network,
    schema: NETWORK_SCHEMA,
    attributes: NETWORK_ATTRIBUTES,
};

pub static MANAGED_NETWORK: Variant = Variant {
    type_name: "SDC::Network::ManagedNetwork",
    creation: CreationCall::ManagedNetwork,
    schema: MANAGED_NETWORK_SCHEMA,
    attributes: NETWORK_ATTRIBUTES,
};

static ALL_VARIANTS: [&Variant; 4] = [&SMART_MACHINE, &KVM_MACHINE, &NETWORK, &MANAGED_NETWORK];

impl Variant {
    pub fn kind(&self) -> ResourceKind {
        self.creation.kind()
    }

    /// Look up a variant by resource type name, ignoring registration toggles.
    pub fn from_type_name(name: &str) -> Option<&'static Variant> {
        ALL_VARIANTS.iter().copied().find(|v| v.type_name == name)
    }

    /// Properties the host may change without replacing the resource.
    pub fn mutable_properties(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schema
            .iter()
            .filter(|p| p.update_allowed)
            .map(|p| p.name)
    }

    pub fn exposes(&self, attribute: Attribute) -> bool {
        self.attributes.contains(&attribute)
    }

    fn enabled(&self, config: &PluginConfig) -> bool {
        let toggles = &config.resources;
        match self.creation {
            CreationCall::SmartMachine => toggles.smart_machine,
            CreationCall::KvmMachine => toggles.kvm,
            CreationCall::Network => toggles.network,
            CreationCall::ManagedNetwork => toggles.managed_network,
        }
    }
}

/// Resource types registered under the given configuration.
pub fn resource_mapping(config: &PluginConfig) -> Vec<&'static Variant> {
    ALL_VARIANTS
        .iter()
        .copied()
        .filter(|v| v.enabled(config))
        .collect()
}
