// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Remote DataCenter client seam.
//!
//! The adapters never talk HTTP directly; they go through [`DataCenter`],
//! obtained fresh for every operation from a [`DataCenterFactory`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Endpoints;
use crate::error::DataCenterError;
use crate::types::{Machine, MachineRequest, Network, NetworkRequest, Nic};

/// Result type for remote calls.
pub type DcResult<T> = std::result::Result<T, DataCenterError>;

/// Administrative client for one data center.
///
/// `get_*` return `Ok(None)` when the service answers not-found; every
/// other failure is an error.
#[async_trait]
pub trait DataCenter: Send + Sync {
    /// Provision a machine. Returns the machine as first reported.
    async fn create_machine(&self, request: &MachineRequest) -> DcResult<Machine>;

    async fn get_machine(&self, uuid: &str) -> DcResult<Option<Machine>>;

    async fn stop_machine(&self, uuid: &str) -> DcResult<()>;

    async fn start_machine(&self, uuid: &str) -> DcResult<()>;

    async fn delete_machine(&self, uuid: &str) -> DcResult<()>;

    /// Merge keys into the machine's customer metadata.
    async fn update_machine_metadata(
        &self,
        uuid: &str,
        metadata: &BTreeMap<String, String>,
    ) -> DcResult<()>;

    /// List the network interfaces that belong to a machine.
    async fn list_machine_nics(&self, uuid: &str) -> DcResult<Vec<Nic>>;

    async fn create_network(&self, request: &NetworkRequest) -> DcResult<Network>;

    async fn get_network(&self, uuid: &str) -> DcResult<Option<Network>>;

    async fn delete_network(&self, uuid: &str) -> DcResult<()>;
}

/// Builds DataCenter handles from resolved endpoints.
#[async_trait]
pub trait DataCenterFactory: Send + Sync {
    async fn connect(&self, endpoints: &Endpoints) -> DcResult<Arc<dyn DataCenter>>;
}
