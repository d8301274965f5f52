#![allow(clippy::unwrap_used)]
// `OpnRemote` against a mocked appliance API.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opnmirror_api::{ApiCredentials, OpnClient};
use opnmirror_core::{
    CoreError, EntityKind, OpnRemote, PortSpec, Protocol, RemoteState, VlanSpec, VlanTag,
};

async fn setup() -> (MockServer, OpnRemote) {
    let server = MockServer::start().await;
    let client = OpnClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        ApiCredentials::new("key", SecretString::from("secret".to_owned())),
    );
    (server, OpnRemote::new(client))
}

#[tokio::test]
async fn test_connection_reports_version_and_interfaces() {
    let (server, remote) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/core/system/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "product_name": "OPNsense",
            "product_version": "24.7.1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/interfaces/interface/getInterfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "interfaces": {
                "lan": { "if": "igc1", "descr": "LAN", "ipaddr": "192.168.1.1", "subnet": "24", "enable": "1" },
                "wan": { "if": "igc0", "descr": "WAN", "ipaddr": "dhcp", "enable": "1" }
            }
        })))
        .mount(&server)
        .await;

    let info = remote.test_connection().await.unwrap();
    assert_eq!(info.product_version, "24.7.1");
    assert_eq!(info.interfaces.len(), 2);
    let lan = info.interfaces.iter().find(|i| i.name == "lan").unwrap();
    assert_eq!(lan.subnet_bits, Some(24));
    let wan = info.interfaces.iter().find(|i| i.name == "wan").unwrap();
    assert_eq!(wan.ip_address, None);
}

#[tokio::test]
async fn port_forwards_come_from_nat_port_forward_rows() {
    let (server, remote) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/firewall/nat/searchRule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                { "uuid": "n-1", "type": "port_forward", "interface": "wan", "protocol": "TCP",
                  "source_port": "8000-8010", "target": "10.0.0.5", "target_port": "", "disabled": "0" },
                { "uuid": "n-2", "type": "outbound", "interface": "wan" }
            ],
            "total": 2
        })))
        .mount(&server)
        .await;

    let forwards = remote.fetch_port_forwards().await.unwrap();
    assert_eq!(forwards.len(), 1);
    assert_eq!(forwards[0].protocol, Protocol::Tcp);
    assert_eq!(forwards[0].external_port, PortSpec::range(8000, 8010).unwrap());
    assert_eq!(forwards[0].internal_port, forwards[0].external_port);
}

#[tokio::test]
async fn unreadable_vlan_row_fails_the_fetch() {
    let (server, remote) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/interfaces/vlan/getVlans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                { "uuid": "v-1", "if": "igc1", "tag": "100", "vlanif": "vlan0.100" },
                { "uuid": "v-2", "if": "igc1", "tag": "9000", "vlanif": "vlan0.9000" }
            ]
        })))
        .mount(&server)
        .await;

    let err = remote.fetch_vlans().await.unwrap_err();
    match err {
        CoreError::Conversion {
            kind, key, field, ..
        } => {
            assert_eq!(kind, EntityKind::Vlan);
            assert_eq!(key, "v-2");
            assert_eq!(field, "tag");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn static_mappings_are_read_per_scope() {
    let (server, remote) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/dhcp/service/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dhcp": {
                "lan": {
                    "enable": "1",
                    "range": { "from": "192.168.1.100", "to": "192.168.1.199" },
                    "staticmap": [
                        { "uuid": "m-1", "mac": "AA:BB:CC:00:00:01", "ipaddr": "192.168.1.10", "hostname": "nas" }
                    ]
                },
                "opt1": { "enable": "0", "staticmap": "" },
                "ntpd": { "enable": "1" }
            }
        })))
        .mount(&server)
        .await;

    let servers = remote.fetch_dhcp_servers().await.unwrap();
    assert_eq!(servers.len(), 2);

    let mappings = remote.fetch_dhcp_static_mappings().await.unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].scope, "lan");
    assert_eq!(mappings[0].mac_address.as_str(), "aa:bb:cc:00:00:01");
}

#[tokio::test]
async fn create_vlan_applies_and_learns_device_name() {
    let (server, remote) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/interfaces/vlan/addItem"))
        .and(body_partial_json(json!({ "vlan": { "if": "igc1", "tag": "200" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": "saved", "uuid": "v-9" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/interfaces/vlan/reconfigure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/interfaces/vlan/getVlans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{ "uuid": "v-9", "if": "igc1", "tag": "200", "vlanif": "vlan0.200" }]
        })))
        .mount(&server)
        .await;

    let vlan = remote
        .create_vlan(&VlanSpec {
            parent_interface: "igc1".into(),
            tag: VlanTag::new(200).unwrap(),
            description: "iot".into(),
            priority: 0,
        })
        .await
        .unwrap();
    assert_eq!(vlan.device, "vlan0.200");
    assert_eq!(vlan.remote_id.as_deref(), Some("v-9"));
}

#[tokio::test]
async fn created_vlan_survives_an_unreadable_listing() {
    let (server, remote) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/interfaces/vlan/addItem"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": "saved", "uuid": "v-9" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/interfaces/vlan/reconfigure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/interfaces/vlan/getVlans"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    // The create succeeded remotely, so it is not reported as a failure.
    let vlan = remote
        .create_vlan(&VlanSpec {
            parent_interface: "igc1".into(),
            tag: VlanTag::new(200).unwrap(),
            description: "iot".into(),
            priority: 0,
        })
        .await
        .unwrap();
    assert_eq!(vlan.device, "");
    assert_eq!(vlan.remote_id.as_deref(), Some("v-9"));
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let (server, remote) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/firewall/filter/searchRule"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = remote.fetch_firewall_rules().await.unwrap_err();
    assert!(err.is_retryable(), "{err}");
    assert!(err.to_string().contains("fetch firewall rules"));
}
