// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP DataCenter tests against mocked VMAPI, NAPI and SAPI services.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sdc_resources::types::{Allocation, Brand, MachineRequest, NetworkRequest};
use sdc_resources::{DataCenter, DataCenterError, Endpoints, HttpDataCenter};

const TIMEOUT: Duration = Duration::from_secs(5);

fn client(server: &MockServer) -> HttpDataCenter {
    HttpDataCenter::new(&server.uri(), &server.uri(), TIMEOUT).unwrap()
}

fn machine_request() -> MachineRequest {
    MachineRequest {
        brand: Brand::Joyent,
        owner_uuid: "owner-1".to_string(),
        networks: vec!["net-ext".to_string()],
        package: "pkg-1".to_string(),
        image: "img-1".to_string(),
        alias: "web-1".to_string(),
        user_script: "#!/bin/sh\ntouch /ready".to_string(),
    }
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
async fn test_discover_reads_sapi_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/applications"))
        .and(query_param("name", "sdc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "name": "sdc",
            "metadata": {
                "VMAPI_SERVICE": "vmapi.coal.example",
                "NAPI_SERVICE": "http://napi.coal.example:8080"
            }
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let endpoints = Endpoints {
        sapi: server.uri(),
        vmapi: None,
        napi: None,
    };
    let dc = HttpDataCenter::discover(&endpoints, TIMEOUT).await.unwrap();

    assert_eq!(dc.vmapi_url().as_str(), "http://vmapi.coal.example/");
    assert_eq!(dc.napi_url().as_str(), "http://napi.coal.example:8080/");
}

#[tokio::test]
async fn test_discover_explicit_endpoint_wins() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/applications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "metadata": {"VMAPI_SERVICE": "vmapi.local", "NAPI_SERVICE": "napi.local"}
        }])))
        .mount(&server)
        .await;

    let endpoints = Endpoints {
        sapi: server.uri(),
        vmapi: Some("http://forced-vmapi".to_string()),
        napi: None,
    };
    let dc = HttpDataCenter::discover(&endpoints, TIMEOUT).await.unwrap();

    assert_eq!(dc.vmapi_url().as_str(), "http://forced-vmapi/");
    assert_eq!(dc.napi_url().as_str(), "http://napi.local/");
}

#[tokio::test]
async fn test_discover_skips_sapi_when_both_forced() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let endpoints = Endpoints {
        sapi: server.uri(),
        vmapi: Some("vmapi.local".to_string()),
        napi: Some("napi.local".to_string()),
    };
    assert!(HttpDataCenter::discover(&endpoints, TIMEOUT).await.is_ok());
}

#[tokio::test]
async fn test_discover_missing_application() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/applications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let endpoints = Endpoints {
        sapi: server.uri(),
        vmapi: None,
        napi: None,
    };
    let err = HttpDataCenter::discover(&endpoints, TIMEOUT)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DataCenterError::Discovery(_)));
}

#[tokio::test]
async fn test_discover_missing_metadata_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/applications"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"metadata": {"VMAPI_SERVICE": "vmapi.local"}}])),
        )
        .mount(&server)
        .await;

    let endpoints = Endpoints {
        sapi: server.uri(),
        vmapi: None,
        napi: None,
    };
    let err = HttpDataCenter::discover(&endpoints, TIMEOUT)
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("NAPI_SERVICE"));
}

// ============================================================================
// Machines
// ============================================================================

#[tokio::test]
async fn test_create_machine_posts_vm_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vms"))
        .and(body_partial_json(json!({
            "brand": "joyent",
            "owner_uuid": "owner-1",
            "billing_id": "pkg-1",
            "image_uuid": "img-1",
            "alias": "web-1",
            "networks": [{"uuid": "net-ext"}],
            "customer_metadata": {"user-script": "#!/bin/sh\ntouch /ready"}
        })))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({"vm_uuid": "vm-abc", "job_uuid": "j"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let machine = client(&server)
        .create_machine(&machine_request())
        .await
        .unwrap();
    assert_eq!(machine.uuid, "vm-abc");
    assert_eq!(machine.alias.as_deref(), Some("web-1"));
}

#[tokio::test]
async fn test_get_machine_parses_vm() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vms/vm-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "vm-abc",
            "alias": "web-1",
            "state": "running",
            "brand": "joyent",
            "nics": [{"ip": "10.88.88.5", "nic_tag": "external", "primary": true}],
            "customer_metadata": {"user-script": "echo"}
        })))
        .mount(&server)
        .await;

    let machine = client(&server).get_machine("vm-abc").await.unwrap().unwrap();
    assert!(machine.is_running());
    assert_eq!(machine.nics[0].ip.as_deref(), Some("10.88.88.5"));
    assert_eq!(machine.user_script(), Some("echo"));
}

#[tokio::test]
async fn test_get_machine_not_found_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vms/gone"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"code": "ResourceNotFound", "message": "VM not found"})),
        )
        .mount(&server)
        .await;

    assert!(client(&server).get_machine("gone").await.unwrap().is_none());
}

#[tokio::test]
async fn test_api_error_carries_status_and_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/vms/vm-abc"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"code": "InternalError", "message": "moray down"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).get_machine("vm-abc").await.unwrap_err();
    match err {
        DataCenterError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "moray down");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_api_error_falls_back_to_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vms/vm-abc"))
        .respond_with(ResponseTemplate::new(409).set_body_string("VM already stopped"))
        .mount(&server)
        .await;

    let err = client(&server).stop_machine("vm-abc").await.unwrap_err();
    assert!(matches!(
        err,
        DataCenterError::Api { status: 409, ref message } if message == "VM already stopped"
    ));
}

#[tokio::test]
async fn test_stop_and_start_use_action_query() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vms/vm-abc"))
        .and(query_param("action", "stop"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vms/vm-abc"))
        .and(query_param("action", "start"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let dc = client(&server);
    dc.stop_machine("vm-abc").await.unwrap();
    dc.start_machine("vm-abc").await.unwrap();
}

#[tokio::test]
async fn test_delete_machine() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/vms/vm-abc"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"job_uuid": "j"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_machine("vm-abc").await.unwrap();
}

#[tokio::test]
async fn test_update_metadata_merges_keys() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/vms/vm-abc/customer_metadata"))
        .and(body_json(json!({
            "rerun-user-script": "true",
            "user-script": "new script"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = BTreeMap::from([
        ("user-script".to_string(), "new script".to_string()),
        ("rerun-user-script".to_string(), "true".to_string()),
    ]);
    client(&server)
        .update_machine_metadata("vm-abc", &metadata)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_machine_nics_queries_napi() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/nics"))
        .and(query_param("belongs_to_uuid", "vm-abc"))
        .and(query_param("belongs_to_type", "zone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"ip": "10.88.88.5", "nic_tag": "external", "mac": "90:b8:d0:00:00:01"},
            {"ip": "192.168.1.5", "nic_tag": "internal"}
        ])))
        .mount(&server)
        .await;

    let nics = client(&server).list_machine_nics("vm-abc").await.unwrap();
    assert_eq!(nics.len(), 2);
    assert_eq!(nics[1].nic_tag.as_deref(), Some("internal"));
}

// ============================================================================
// Networks
// ============================================================================

#[tokio::test]
async fn test_create_range_network() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/networks"))
        .and(body_partial_json(json!({
            "name": "backend",
            "owner_uuids": ["owner-1"],
            "subnet": "10.10.0.0/24",
            "provision_start_ip": "10.10.0.10",
            "provision_end_ip": "10.10.0.250",
            "gateway": "10.10.0.1",
            "resolvers": ["8.8.8.8"],
            "vlan_id": 12,
            "nic_tag": "internal"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "net-1",
            "name": "backend",
            "subnet": "10.10.0.0/24",
            "vlan_id": 12,
            "nic_tag": "internal",
            "owner_uuids": ["owner-1"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = NetworkRequest {
        name: "backend".to_string(),
        owner_uuids: vec!["owner-1".to_string()],
        allocation: Allocation::Range {
            subnet: "10.10.0.0/24".to_string(),
            provision_start_ip: "10.10.0.10".to_string(),
            provision_end_ip: "10.10.0.250".to_string(),
        },
        gateway: Some("10.10.0.1".to_string()),
        resolvers: vec!["8.8.8.8".to_string()],
        routes: BTreeMap::new(),
        vlan_id: 12,
        nic_tag: "internal".to_string(),
    };

    let network = client(&server).create_network(&request).await.unwrap();
    assert_eq!(network.uuid, "net-1");
    assert_eq!(network.vlan_id, Some(12));
}

#[tokio::test]
async fn test_get_and_delete_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/networks/net-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": "net-1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/networks/net-2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/networks/net-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dc = client(&server);
    assert!(dc.get_network("net-1").await.unwrap().is_some());
    assert!(dc.get_network("net-2").await.unwrap().is_none());
    dc.delete_network("net-1").await.unwrap();
}
