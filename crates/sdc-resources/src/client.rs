// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP DataCenter client speaking to VMAPI and NAPI.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::Endpoints;
use crate::datacenter::{DataCenter, DataCenterFactory, DcResult};
use crate::error::DataCenterError;
use crate::types::{
    Allocation, Brand, Machine, MachineRequest, Network, NetworkRequest, Nic, USER_SCRIPT_KEY,
};

/// SAPI application metadata keys naming the service hosts.
const VMAPI_SERVICE_KEY: &str = "VMAPI_SERVICE";
const NAPI_SERVICE_KEY: &str = "NAPI_SERVICE";

/// DataCenter implementation over the VMAPI/NAPI REST services.
pub struct HttpDataCenter {
    http: reqwest::Client,
    vmapi: Url,
    napi: Url,
}

#[derive(Debug, Deserialize)]
struct SapiApplication {
    #[serde(default)]
    metadata: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CreateVmResponse {
    vm_uuid: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Parse a base URL, accepting bare host names and forcing a trailing slash
/// so relative joins keep any path prefix.
fn base_url(raw: &str) -> DcResult<Url> {
    let mut candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    if !candidate.ends_with('/') {
        candidate.push('/');
    }
    Url::parse(&candidate).map_err(|e| DataCenterError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn build_http(timeout: Duration) -> DcResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

impl HttpDataCenter {
    /// Create a client for known VMAPI and NAPI endpoints.
    pub fn new(vmapi: &str, napi: &str, timeout: Duration) -> DcResult<Self> {
        Ok(Self {
            http: build_http(timeout)?,
            vmapi: base_url(vmapi)?,
            napi: base_url(napi)?,
        })
    }

    /// Create a client, discovering any endpoint not given explicitly from
    /// the `sdc` application metadata in SAPI.
    #[instrument(skip(endpoints), fields(sapi = %endpoints.sapi))]
    pub async fn discover(endpoints: &Endpoints, timeout: Duration) -> DcResult<Self> {
        if let (Some(vmapi), Some(napi)) = (&endpoints.vmapi, &endpoints.napi) {
            return Self::new(vmapi, napi, timeout);
        }

        let http = build_http(timeout)?;
        let mut url = base_url(&endpoints.sapi)?.join("applications").map_err(|e| {
            DataCenterError::InvalidEndpoint {
                url: endpoints.sapi.clone(),
                reason: e.to_string(),
            }
        })?;
        url.query_pairs_mut().append_pair("name", "sdc");

        debug!("Discovering service endpoints");
        let response = check(http.get(url).send().await?).await?;
        let applications: Vec<SapiApplication> = response.json().await?;
        let metadata = applications
            .into_iter()
            .next()
            .map(|app| app.metadata)
            .ok_or_else(|| DataCenterError::Discovery("no 'sdc' application in SAPI".into()))?;

        let lookup = |explicit: &Option<String>, key: &str| -> DcResult<Url> {
            match explicit {
                Some(url) => base_url(url),
                None => metadata
                    .get(key)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        DataCenterError::Discovery(format!("SAPI metadata lacks {}", key))
                    })
                    .and_then(base_url),
            }
        };

        let vmapi = lookup(&endpoints.vmapi, VMAPI_SERVICE_KEY)?;
        let napi = lookup(&endpoints.napi, NAPI_SERVICE_KEY)?;
        info!(%vmapi, %napi, "Discovered service endpoints");

        Ok(Self { http, vmapi, napi })
    }

    pub fn vmapi_url(&self) -> &Url {
        &self.vmapi
    }

    pub fn napi_url(&self) -> &Url {
        &self.napi
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn join(base: &Url, path: &str) -> DcResult<Url> {
        base.join(path)
            .map_err(|e| DataCenterError::InvalidEndpoint {
                url: format!("{}{}", base, path),
                reason: e.to_string(),
            })
    }

    fn vm_url(&self, uuid: &str) -> DcResult<Url> {
        Self::join(&self.vmapi, &format!("vms/{}", uuid))
    }

    fn network_url(&self, uuid: &str) -> DcResult<Url> {
        Self::join(&self.napi, &format!("networks/{}", uuid))
    }

    /// GET a resource, mapping 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> DcResult<Option<T>> {
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response).await?.json().await?))
    }

    async fn vm_action(&self, uuid: &str, action: &str) -> DcResult<()> {
        let mut url = self.vm_url(uuid)?;
        url.query_pairs_mut().append_pair("action", action);
        check(self.http.post(url).send().await?).await?;
        Ok(())
    }

    fn machine_body(request: &MachineRequest) -> Value {
        let networks: Vec<Value> = request
            .networks
            .iter()
            .map(|uuid| json!({ "uuid": uuid }))
            .collect();

        let mut body = json!({
            "brand": request.brand.as_str(),
            "owner_uuid": request.owner_uuid,
            "billing_id": request.package,
            "alias": request.alias,
            "networks": networks,
        });

        match request.brand {
            Brand::Joyent => body["image_uuid"] = json!(request.image),
            Brand::Kvm => body["disks"] = json!([{ "image_uuid": request.image }]),
        }

        if !request.user_script.is_empty() {
            body["customer_metadata"] = json!({ USER_SCRIPT_KEY: request.user_script });
        }

        body
    }

    fn network_body(request: &NetworkRequest) -> Value {
        let mut body = json!({
            "name": request.name,
            "owner_uuids": request.owner_uuids,
            "vlan_id": request.vlan_id,
            "nic_tag": request.nic_tag,
        });

        match &request.allocation {
            Allocation::Range {
                subnet,
                provision_start_ip,
                provision_end_ip,
            } => {
                body["subnet"] = json!(subnet);
                body["provision_start_ip"] = json!(provision_start_ip);
                body["provision_end_ip"] = json!(provision_end_ip);
            }
            Allocation::Sized { prefix_len } => {
                body["subnet_alloc"] = json!(true);
                body["subnet_prefix"] = json!(prefix_len);
            }
        }

        if let Some(gateway) = &request.gateway {
            body["gateway"] = json!(gateway);
        }
        if !request.resolvers.is_empty() {
            body["resolvers"] = json!(request.resolvers);
        }
        if !request.routes.is_empty() {
            body["routes"] = json!(request.routes);
        }

        body
    }
}

/// Map non-success responses to `DataCenterError::Api`.
async fn check(response: Response) -> DcResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);

    Err(DataCenterError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl DataCenter for HttpDataCenter {
    #[instrument(skip(self, request), fields(brand = request.brand.as_str(), alias = %request.alias))]
    async fn create_machine(&self, request: &MachineRequest) -> DcResult<Machine> {
        info!(owner = %request.owner_uuid, "Creating machine");

        let url = Self::join(&self.vmapi, "vms")?;
        let response = check(
            self.http
                .post(url)
                .json(&Self::machine_body(request))
                .send()
                .await?,
        )
        .await?;
        let created: CreateVmResponse = response.json().await?;

        Ok(Machine {
            uuid: created.vm_uuid,
            alias: Some(request.alias.clone()),
            state: "provisioning".to_string(),
            brand: Some(request.brand.as_str().to_string()),
            image_uuid: Some(request.image.clone()),
            billing_id: Some(request.package.clone()),
            owner_uuid: Some(request.owner_uuid.clone()),
            nics: Vec::new(),
            customer_metadata: Default::default(),
        })
    }

    #[instrument(skip(self))]
    async fn get_machine(&self, uuid: &str) -> DcResult<Option<Machine>> {
        self.get_optional(self.vm_url(uuid)?).await
    }

    #[instrument(skip(self))]
    async fn stop_machine(&self, uuid: &str) -> DcResult<()> {
        info!("Stopping machine");
        self.vm_action(uuid, "stop").await
    }

    #[instrument(skip(self))]
    async fn start_machine(&self, uuid: &str) -> DcResult<()> {
        info!("Starting machine");
        self.vm_action(uuid, "start").await
    }

    #[instrument(skip(self))]
    async fn delete_machine(&self, uuid: &str) -> DcResult<()> {
        info!("Deleting machine");
        check(self.http.delete(self.vm_url(uuid)?).send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self, metadata), fields(keys = metadata.len()))]
    async fn update_machine_metadata(
        &self,
        uuid: &str,
        metadata: &BTreeMap<String, String>,
    ) -> DcResult<()> {
        debug!("Merging customer metadata");
        let url = Self::join(&self.vmapi, &format!("vms/{}/customer_metadata", uuid))?;
        check(self.http.post(url).json(metadata).send().await?).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_machine_nics(&self, uuid: &str) -> DcResult<Vec<Nic>> {
        let mut url = Self::join(&self.napi, "nics")?;
        url.query_pairs_mut()
            .append_pair("belongs_to_uuid", uuid)
            .append_pair("belongs_to_type", "zone");
        Ok(check(self.http.get(url).send().await?).await?.json().await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn create_network(&self, request: &NetworkRequest) -> DcResult<Network> {
        info!(nic_tag = %request.nic_tag, "Creating network");
        let url = Self::join(&self.napi, "networks")?;
        let response = check(
            self.http
                .post(url)
                .json(&Self::network_body(request))
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    async fn get_network(&self, uuid: &str) -> DcResult<Option<Network>> {
        self.get_optional(self.network_url(uuid)?).await
    }

    #[instrument(skip(self))]
    async fn delete_network(&self, uuid: &str) -> DcResult<()> {
        info!("Deleting network");
        check(self.http.delete(self.network_url(uuid)?).send().await?).await?;
        Ok(())
    }
}

/// Factory building a fresh [`HttpDataCenter`] for every operation.
#[derive(Debug, Clone)]
pub struct HttpDataCenterFactory {
    timeout: Duration,
}

impl HttpDataCenterFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpDataCenterFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl DataCenterFactory for HttpDataCenterFactory {
    async fn connect(&self, endpoints: &Endpoints) -> DcResult<Arc<dyn DataCenter>> {
        let dc = HttpDataCenter::discover(endpoints, self.timeout).await?;
        Ok(Arc::new(dc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(base_url("vmapi.coal.local").unwrap().as_str(), "http://vmapi.coal.local/");
        assert_eq!(
            base_url("http://10.0.0.1:8080/api").unwrap().as_str(),
            "http://10.0.0.1:8080/api/"
        );
        assert!(matches!(
            base_url("http://"),
            Err(DataCenterError::InvalidEndpoint { .. })
        ));
    }

    fn machine_request(brand: Brand, script: &str) -> MachineRequest {
        MachineRequest {
            brand,
            owner_uuid: "owner-1".to_string(),
            networks: vec!["net-1".to_string(), "net-2".to_string()],
            package: "pkg-1".to_string(),
            image: "img-1".to_string(),
            alias: "web".to_string(),
            user_script: script.to_string(),
        }
    }

    #[test]
    fn test_smart_machine_body() {
        let body = HttpDataCenter::machine_body(&machine_request(Brand::Joyent, "#!/bin/sh"));
        assert_eq!(body["brand"], "joyent");
        assert_eq!(body["image_uuid"], "img-1");
        assert_eq!(body["billing_id"], "pkg-1");
        assert_eq!(body["networks"][1]["uuid"], "net-2");
        assert_eq!(body["customer_metadata"]["user-script"], "#!/bin/sh");
        assert!(body.get("disks").is_none());
    }

    #[test]
    fn test_kvm_body_uses_disks() {
        let body = HttpDataCenter::machine_body(&machine_request(Brand::Kvm, ""));
        assert_eq!(body["brand"], "kvm");
        assert_eq!(body["disks"][0]["image_uuid"], "img-1");
        assert!(body.get("image_uuid").is_none());
        assert!(body.get("customer_metadata").is_none());
    }

    #[test]
    fn test_sized_network_body() {
        let request = NetworkRequest {
            name: "private".to_string(),
            owner_uuids: vec!["owner-1".to_string()],
            allocation: Allocation::Sized { prefix_len: 27 },
            gateway: None,
            resolvers: vec![],
            routes: BTreeMap::from([("10.1.0.0/16".to_string(), "10.0.0.1".to_string())]),
            vlan_id: 4,
            nic_tag: "internal".to_string(),
        };

        let body = HttpDataCenter::network_body(&request);
        assert_eq!(body["subnet_alloc"], true);
        assert_eq!(body["subnet_prefix"], 27);
        assert_eq!(body["routes"]["10.1.0.0/16"], "10.0.0.1");
        assert!(body.get("subnet").is_none());
        assert!(body.get("gateway").is_none());
        assert!(body.get("resolvers").is_none());
    }
}
