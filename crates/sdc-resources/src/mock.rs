// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory DataCenter for testing.
//!
//! Remote operations move machines into transitional states; tests call
//! [`MockDataCenter::settle`] to let the "service" finish them, which is
//! how completion polls are observed going from `false` to `true`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::Endpoints;
use crate::datacenter::{DataCenter, DataCenterFactory, DcResult};
use crate::error::DataCenterError;
use crate::types::{
    Allocation, Machine, MachineRequest, Network, NetworkRequest, Nic, USER_SCRIPT_KEY,
};

#[derive(Debug, Default)]
struct MockState {
    machines: HashMap<String, Machine>,
    networks: HashMap<String, Network>,
    machine_requests: Vec<MachineRequest>,
    network_requests: Vec<NetworkRequest>,
    last_endpoints: Option<Endpoints>,
    fail_nic_listing: bool,
    fail_next: Option<DataCenterError>,
    next_id: usize,
}

/// Mock DataCenter that is also its own factory.
///
/// Clones share state, so a test can keep one handle for inspection
/// while the adapter connects through another.
#[derive(Debug, Clone, Default)]
pub struct MockDataCenter {
    state: Arc<Mutex<MockState>>,
    calls: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

impl MockDataCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote operations issued.
    pub fn remote_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of handles built through the factory.
    pub fn connections(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Endpoints passed to the most recent `connect`.
    pub async fn last_endpoints(&self) -> Option<Endpoints> {
        self.state.lock().await.last_endpoints.clone()
    }

    pub async fn machine_requests(&self) -> Vec<MachineRequest> {
        self.state.lock().await.machine_requests.clone()
    }

    pub async fn network_requests(&self) -> Vec<NetworkRequest> {
        self.state.lock().await.network_requests.clone()
    }

    pub async fn machine(&self, uuid: &str) -> Option<Machine> {
        self.state.lock().await.machines.get(uuid).cloned()
    }

    /// Finish every in-flight transition.
    pub async fn settle(&self) {
        let mut state = self.state.lock().await;
        for machine in state.machines.values_mut() {
            let settled = match machine.state.as_str() {
                "provisioning" | "starting" => "running",
                "stopping" => "stopped",
                "destroying" => "destroyed",
                other => other,
            };
            machine.state = settled.to_string();
        }
    }

    pub async fn set_machine_state(&self, uuid: &str, new_state: &str) {
        if let Some(machine) = self.state.lock().await.machines.get_mut(uuid) {
            machine.state = new_state.to_string();
        }
    }

    pub async fn set_nics(&self, uuid: &str, nics: Vec<Nic>) {
        if let Some(machine) = self.state.lock().await.machines.get_mut(uuid) {
            machine.nics = nics;
        }
    }

    /// Forget a machine, as if the service purged it.
    pub async fn forget_machine(&self, uuid: &str) {
        self.state.lock().await.machines.remove(uuid);
    }

    pub async fn insert_network(&self, network: Network) {
        self.state
            .lock()
            .await
            .networks
            .insert(network.uuid.clone(), network);
    }

    pub async fn fail_nic_listing(&self, fail: bool) {
        self.state.lock().await.fail_nic_listing = fail;
    }

    /// Make the next remote operation fail with `error`.
    pub async fn fail_next(&self, error: DataCenterError) {
        self.state.lock().await.fail_next = Some(error);
    }

    async fn begin(&self) -> DcResult<tokio::sync::MutexGuard<'_, MockState>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        match state.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn not_found(uuid: &str) -> DataCenterError {
        DataCenterError::Api {
            status: 404,
            message: format!("{} not found", uuid),
        }
    }

    fn set_state(state: &mut MockState, uuid: &str, new_state: &str) -> DcResult<()> {
        let machine = state
            .machines
            .get_mut(uuid)
            .ok_or_else(|| Self::not_found(uuid))?;
        machine.state = new_state.to_string();
        Ok(())
    }
}

#[async_trait]
impl DataCenter for MockDataCenter {
    async fn create_machine(&self, request: &MachineRequest) -> DcResult<Machine> {
        let mut state = self.begin().await?;
        state.next_id += 1;
        let uuid = format!("vm-{}", state.next_id);

        let mut customer_metadata = serde_json::Map::new();
        if !request.user_script.is_empty() {
            customer_metadata.insert(
                USER_SCRIPT_KEY.to_string(),
                Value::String(request.user_script.clone()),
            );
        }

        let machine = Machine {
            uuid: uuid.clone(),
            alias: Some(request.alias.clone()),
            state: "provisioning".to_string(),
            brand: Some(request.brand.as_str().to_string()),
            image_uuid: Some(request.image.clone()),
            billing_id: Some(request.package.clone()),
            owner_uuid: Some(request.owner_uuid.clone()),
            nics: request
                .networks
                .iter()
                .enumerate()
                .map(|(i, network)| Nic {
                    ip: Some(format!("10.0.{}.{}", state.next_id, i + 10)),
                    nic_tag: Some(if i == 0 { "external" } else { "internal" }.to_string()),
                    network_uuid: Some(network.clone()),
                    primary: i == 0,
                    mac: None,
                })
                .collect(),
            customer_metadata,
        };

        state.machine_requests.push(request.clone());
        state.machines.insert(uuid, machine.clone());
        Ok(machine)
    }

    async fn get_machine(&self, uuid: &str) -> DcResult<Option<Machine>> {
        let state = self.begin().await?;
        Ok(state.machines.get(uuid).cloned())
    }

    async fn stop_machine(&self, uuid: &str) -> DcResult<()> {
        let mut state = self.begin().await?;
        Self::set_state(&mut state, uuid, "stopping")
    }

    async fn start_machine(&self, uuid: &str) -> DcResult<()> {
        let mut state = self.begin().await?;
        Self::set_state(&mut state, uuid, "starting")
    }

    async fn delete_machine(&self, uuid: &str) -> DcResult<()> {
        let mut state = self.begin().await?;
        Self::set_state(&mut state, uuid, "destroying")
    }

    async fn update_machine_metadata(
        &self,
        uuid: &str,
        metadata: &BTreeMap<String, String>,
    ) -> DcResult<()> {
        let mut state = self.begin().await?;
        let machine = state
            .machines
            .get_mut(uuid)
            .ok_or_else(|| Self::not_found(uuid))?;
        for (key, value) in metadata {
            machine
                .customer_metadata
                .insert(key.clone(), Value::String(value.clone()));
        }
        Ok(())
    }

    async fn list_machine_nics(&self, uuid: &str) -> DcResult<Vec<Nic>> {
        let state = self.begin().await?;
        if state.fail_nic_listing {
            return Err(DataCenterError::Api {
                status: 503,
                message: "napi unavailable".to_string(),
            });
        }
        state
            .machines
            .get(uuid)
            .map(|m| m.nics.clone())
            .ok_or_else(|| Self::not_found(uuid))
    }

    async fn create_network(&self, request: &NetworkRequest) -> DcResult<Network> {
        let mut state = self.begin().await?;
        state.next_id += 1;
        let uuid = format!("net-{}", state.next_id);

        let subnet = match &request.allocation {
            Allocation::Range { subnet, .. } => subnet.clone(),
            Allocation::Sized { prefix_len } => format!("10.{}.0.0/{}", state.next_id, prefix_len),
        };

        let network = Network {
            uuid: uuid.clone(),
            name: Some(request.name.clone()),
            subnet: Some(subnet),
            gateway: request.gateway.clone(),
            vlan_id: Some(request.vlan_id),
            nic_tag: Some(request.nic_tag.clone()),
            owner_uuids: request.owner_uuids.clone(),
        };

        state.network_requests.push(request.clone());
        state.networks.insert(uuid, network.clone());
        Ok(network)
    }

    async fn get_network(&self, uuid: &str) -> DcResult<Option<Network>> {
        let state = self.begin().await?;
        Ok(state.networks.get(uuid).cloned())
    }

    async fn delete_network(&self, uuid: &str) -> DcResult<()> {
        let mut state = self.begin().await?;
        state
            .networks
            .remove(uuid)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(uuid))
    }
}

#[async_trait]
impl DataCenterFactory for MockDataCenter {
    async fn connect(&self, endpoints: &Endpoints) -> DcResult<Arc<dyn DataCenter>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await.last_endpoints = Some(endpoints.clone());
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Brand;

    fn machine_request(brand: Brand) -> MachineRequest {
        MachineRequest {
            brand,
            owner_uuid: "owner".to_string(),
            networks: vec!["net".to_string()],
            package: "pkg".to_string(),
            image: "img".to_string(),
            alias: "alias".to_string(),
            user_script: String::new(),
        }
    }

    #[tokio::test]
    async fn test_machine_transitions_settle() {
        let dc = MockDataCenter::new();
        let machine = dc.create_machine(&machine_request(Brand::Joyent)).await.unwrap();
        assert_eq!(machine.state, "provisioning");

        dc.settle().await;
        assert!(dc.get_machine(&machine.uuid).await.unwrap().unwrap().is_running());

        dc.stop_machine(&machine.uuid).await.unwrap();
        dc.settle().await;
        assert!(dc.get_machine(&machine.uuid).await.unwrap().unwrap().is_stopped());
        assert_eq!(dc.remote_calls(), 4);
    }

    #[tokio::test]
    async fn test_fail_next_is_consumed() {
        let dc = MockDataCenter::new();
        dc.fail_next(DataCenterError::Api {
            status: 500,
            message: "boom".to_string(),
        })
        .await;

        assert!(dc.get_machine("vm-1").await.is_err());
        assert!(dc.get_machine("vm-1").await.unwrap().is_none());
    }
}
