// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SmartDataCenter stack resources
//!
//! Lifecycle adapters that let a stack orchestrator create, suspend, resume,
//! update and delete SmartDataCenter machines and networks.
//!
//! # Architecture
//!
//! - Four resource types are registered, each a static [`Variant`] descriptor
//!   (`SDC::Compute::SmartMachine`, `SDC::Compute::KVM`,
//!   `SDC::Network::Network`, `SDC::Network::ManagedNetwork`).
//! - One [`ResourceAdapter`] drives all of them. Every operation is a single
//!   remote call; completion is observed by the host through `poll_*`.
//! - Remote access goes through the [`DataCenter`] trait. [`HttpDataCenter`]
//!   talks to VMAPI/NAPI, discovering them through SAPI when not overridden.
//! - A process-wide [`PluginConfig`] can force endpoints, owner and NIC tag.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sdc_resources::{
//!     HttpDataCenterFactory, PluginConfig, Properties, ResourceAdapter, Variant,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(PluginConfig::from_env()?);
//! let variant = Variant::from_type_name("SDC::Compute::SmartMachine").unwrap();
//! let properties = Properties::resolve(
//!     variant.schema,
//!     serde_json::from_value(serde_json::json!({
//!         "sapi_endpoint": "http://10.0.0.10",
//!         "user_uuid": "930896af-bf8c-48d4-885c-6573a94b1853",
//!         "package": "sdc_128",
//!         "image": "fd2cc906-8938-11e3-beab-4359c665ac99",
//!         "networks": "external",
//!     }))?,
//! )?;
//!
//! let factory = Arc::new(HttpDataCenterFactory::new(config.http.timeout()));
//! let mut adapter = ResourceAdapter::new(variant, config, factory, properties, "web");
//! let id = adapter.create().await?;
//! while !adapter.poll_create().await? {
//!     tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//! }
//! println!("machine {} is running", id);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod attributes;
pub mod client;
pub mod config;
pub mod datacenter;
pub mod error;
pub mod mock;
pub mod routes;
pub mod schema;
pub mod types;
pub mod variant;

pub use adapter::{ResourceAdapter, ResourceStatus, UpdateToken, effective_prefix};
pub use attributes::Attribute;
pub use client::{HttpDataCenter, HttpDataCenterFactory};
pub use config::{CONFIG_PATH_ENV, Endpoints, PluginConfig};
pub use datacenter::{DataCenter, DataCenterFactory};
pub use error::{DataCenterError, ResourceError, Result};
pub use schema::{Properties, PropertySchema, PropertyType};
pub use types::{Machine, MachineState, Network, NetworkState, Nic};
pub use variant::{ResourceKind, Variant, resource_mapping};
