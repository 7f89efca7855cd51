// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Enumerated resource attributes.
//!
//! Every attribute a stack may read is listed here with its extraction
//! function. Names that are not listed resolve to nothing.

use serde_json::Value;

use crate::types::{Machine, Network, Nic};

/// A readable attribute of a machine or network resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    // Machine
    Uuid,
    Alias,
    State,
    ImageUuid,
    BillingId,
    OwnerUuid,
    Brand,
    /// Address of the first network interface.
    NetworkIp,
    /// Addresses on externally tagged interfaces, comma-joined.
    ExternalIps,
    /// Addresses on internally/customer tagged interfaces, comma-joined.
    InternalIps,

    // Network
    /// Remote identifier of the network.
    Id,
    Name,
    Subnet,
    Gateway,
    VlanId,
    NicTag,
}

pub const MACHINE_ATTRIBUTES: &[Attribute] = &[
    Attribute::Uuid,
    Attribute::Alias,
    Attribute::State,
    Attribute::ImageUuid,
    Attribute::BillingId,
    Attribute::OwnerUuid,
    Attribute::Brand,
    Attribute::NetworkIp,
    Attribute::ExternalIps,
    Attribute::InternalIps,
];

pub const NETWORK_ATTRIBUTES: &[Attribute] = &[
    Attribute::Id,
    Attribute::Name,
    Attribute::Subnet,
    Attribute::Gateway,
    Attribute::VlanId,
    Attribute::NicTag,
];

impl Attribute {
    pub fn from_name(name: &str) -> Option<Self> {
        let attribute = match name {
            "uuid" => Attribute::Uuid,
            "alias" => Attribute::Alias,
            "state" => Attribute::State,
            "image_uuid" => Attribute::ImageUuid,
            "billing_id" => Attribute::BillingId,
            "owner_uuid" => Attribute::OwnerUuid,
            "brand" => Attribute::Brand,
            "network_ip" => Attribute::NetworkIp,
            "external_ips" => Attribute::ExternalIps,
            "internal_ips" => Attribute::InternalIps,
            "id" => Attribute::Id,
            "name" => Attribute::Name,
            "subnet" => Attribute::Subnet,
            "gateway" => Attribute::Gateway,
            "vlan_id" => Attribute::VlanId,
            "nic_tag" => Attribute::NicTag,
            _ => return None,
        };
        Some(attribute)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Uuid => "uuid",
            Attribute::Alias => "alias",
            Attribute::State => "state",
            Attribute::ImageUuid => "image_uuid",
            Attribute::BillingId => "billing_id",
            Attribute::OwnerUuid => "owner_uuid",
            Attribute::Brand => "brand",
            Attribute::NetworkIp => "network_ip",
            Attribute::ExternalIps => "external_ips",
            Attribute::InternalIps => "internal_ips",
            Attribute::Id => "id",
            Attribute::Name => "name",
            Attribute::Subnet => "subnet",
            Attribute::Gateway => "gateway",
            Attribute::VlanId => "vlan_id",
            Attribute::NicTag => "nic_tag",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Attribute::Uuid | Attribute::Id => "Remote identifier",
            Attribute::Alias => "Instance alias",
            Attribute::State => "Machine state as reported by VMAPI",
            Attribute::ImageUuid => "Image the machine was provisioned from",
            Attribute::BillingId => "Package UUID",
            Attribute::OwnerUuid => "Owner UUID",
            Attribute::Brand => "Machine brand",
            Attribute::NetworkIp => "IP address of the first network interface",
            Attribute::ExternalIps => "Comma-separated external IP addresses",
            Attribute::InternalIps => "Comma-separated internal IP addresses",
            Attribute::Name => "Network name",
            Attribute::Subnet => "Network subnet",
            Attribute::Gateway => "Network gateway",
            Attribute::VlanId => "VLAN id",
            Attribute::NicTag => "NIC tag",
        }
    }

    /// Whether the value comes from a separate NIC listing call.
    pub fn needs_nic_listing(&self) -> bool {
        matches!(self, Attribute::ExternalIps | Attribute::InternalIps)
    }
}

fn opt_str(value: &Option<String>) -> Option<Value> {
    value.as_ref().map(|s| Value::String(s.clone()))
}

/// Read an attribute straight off a machine object.
pub(crate) fn machine_value(attribute: Attribute, machine: &Machine) -> Option<Value> {
    match attribute {
        Attribute::Uuid => Some(Value::String(machine.uuid.clone())),
        Attribute::Alias => opt_str(&machine.alias),
        Attribute::State => Some(Value::String(machine.state.clone())),
        Attribute::ImageUuid => opt_str(&machine.image_uuid),
        Attribute::BillingId => opt_str(&machine.billing_id),
        Attribute::OwnerUuid => opt_str(&machine.owner_uuid),
        Attribute::Brand => opt_str(&machine.brand),
        Attribute::NetworkIp => machine.nics.first().and_then(|nic| opt_str(&nic.ip)),
        _ => None,
    }
}

/// Read an attribute straight off a network object.
pub(crate) fn network_value(attribute: Attribute, network: &Network) -> Option<Value> {
    match attribute {
        Attribute::Id => Some(Value::String(network.uuid.clone())),
        Attribute::Name => opt_str(&network.name),
        Attribute::Subnet => opt_str(&network.subnet),
        Attribute::Gateway => opt_str(&network.gateway),
        Attribute::VlanId => network.vlan_id.map(Value::from),
        Attribute::NicTag => opt_str(&network.nic_tag),
        _ => None,
    }
}

/// Comma-join the addresses of interfaces carrying one of `tags`.
pub fn join_tagged_ips(nics: &[Nic], tags: &[String]) -> String {
    nics.iter()
        .filter(|nic| {
            nic.nic_tag
                .as_deref()
                .is_some_and(|tag| tags.iter().any(|t| t == tag))
        })
        .filter_map(|nic| nic.ip.as_deref())
        .collect::<Vec<_>>()
        .join(",")
}
