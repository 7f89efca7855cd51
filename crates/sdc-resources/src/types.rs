// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Remote object types returned by VMAPI/NAPI and the requests sent to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Customer metadata key holding the provisioning script.
pub const USER_SCRIPT_KEY: &str = "user-script";

/// Customer metadata key asking the guest to rerun the provisioning script.
pub const RERUN_USER_SCRIPT_KEY: &str = "rerun-user-script";

/// Machine lifecycle status, derived from the VMAPI `state` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    /// Provisioning or transitioning between states.
    Pending,
    /// Machine is running.
    Running,
    /// Machine is stopped.
    Stopped,
    /// Machine has been destroyed.
    Destroyed,
    /// Provisioning failed.
    Failed,
}

impl From<&str> for MachineState {
    fn from(state: &str) -> Self {
        match state {
            "running" => MachineState::Running,
            "stopped" => MachineState::Stopped,
            "destroyed" => MachineState::Destroyed,
            "failed" => MachineState::Failed,
            _ => MachineState::Pending,
        }
    }
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineState::Pending => "pending",
            MachineState::Running => "running",
            MachineState::Stopped => "stopped",
            MachineState::Destroyed => "destroyed",
            MachineState::Failed => "failed",
        }
    }
}

/// Network lifecycle status. Only existence is observable.
///
/// NAPI creates networks synchronously, so `Pending` is never reported by a
/// fetch; it names the window between the create call and its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Pending,
    Present,
    Absent,
}

impl NetworkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkState::Pending => "pending",
            NetworkState::Present => "present",
            NetworkState::Absent => "absent",
        }
    }
}

/// Machine brand; selects the VMAPI provisioning shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    /// SmartOS zone.
    Joyent,
    /// Hardware virtual machine.
    Kvm,
}

impl Brand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Joyent => "joyent",
            Brand::Kvm => "kvm",
        }
    }
}

/// A network interface attached to a machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nic {
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub nic_tag: Option<String>,
    #[serde(default)]
    pub network_uuid: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

/// A machine as returned by VMAPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub uuid: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image_uuid: Option<String>,
    #[serde(default)]
    pub billing_id: Option<String>,
    #[serde(default)]
    pub owner_uuid: Option<String>,
    #[serde(default)]
    pub nics: Vec<Nic>,
    #[serde(default)]
    pub customer_metadata: serde_json::Map<String, Value>,
}

impl Machine {
    pub fn status(&self) -> MachineState {
        MachineState::from(self.state.as_str())
    }

    pub fn is_running(&self) -> bool {
        self.status() == MachineState::Running
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == MachineState::Stopped
    }

    pub fn is_destroyed(&self) -> bool {
        self.status() == MachineState::Destroyed
    }

    /// Current provisioning script from customer metadata.
    pub fn user_script(&self) -> Option<&str> {
        self.customer_metadata
            .get(USER_SCRIPT_KEY)
            .and_then(Value::as_str)
    }
}

/// A network as returned by NAPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub vlan_id: Option<u32>,
    #[serde(default)]
    pub nic_tag: Option<String>,
    #[serde(default)]
    pub owner_uuids: Vec<String>,
}

/// Machine creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineRequest {
    pub brand: Brand,
    pub owner_uuid: String,
    pub networks: Vec<String>,
    /// Package UUID (VMAPI `billing_id`).
    pub package: String,
    pub image: String,
    pub alias: String,
    pub user_script: String,
}

/// How the address range of a new network is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// Explicit subnet and provisioning range.
    Range {
        subnet: String,
        provision_start_ip: String,
        provision_end_ip: String,
    },
    /// Let the service allocate a subnet of the given prefix length.
    Sized { prefix_len: u8 },
}

/// Network creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRequest {
    pub name: String,
    pub owner_uuids: Vec<String>,
    pub allocation: Allocation,
    pub gateway: Option<String>,
    pub resolvers: Vec<String>,
    pub routes: BTreeMap<String, String>,
    pub vlan_id: u32,
    pub nic_tag: String,
}
