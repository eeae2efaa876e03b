use aci_client::model::{ContractFilter, NodeRole, PathKind};
use aci_client::{AciClient, AciError, ApicConfig};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn login_body(refresh_timeout_secs: &str) -> Value {
    json!({
        "totalCount": "1",
        "imdata": [
            {"aaaLogin": {"attributes": {
                "token": "tok-abc123",
                "refreshTimeoutSeconds": refresh_timeout_secs
            }}}
        ]
    })
}

fn envelope(rows: Vec<Value>) -> Value {
    json!({"totalCount": rows.len().to_string(), "imdata": rows})
}

async fn mount_login(server: &MockServer, refresh_timeout_secs: &str, expected_logins: u64) {
    Mock::given(method("POST"))
        .and(path("/api/aaaLogin.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body(refresh_timeout_secs)))
        .expect(expected_logins)
        .mount(server)
        .await;
}

fn client_for(server: &MockServer) -> AciClient {
    AciClient::new(ApicConfig::new("admin", "secret", server.uri(), true, "site1")).unwrap()
}

#[tokio::test]
async fn test_valid_token_is_reused_across_calls() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/class/fvTenant.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvTenant": {"attributes": {"name": "prod", "descr": ""}}}),
            json!({"fvTenant": {"attributes": {"name": "lab", "descr": "lab tenant"}}}),
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.get_tenants().await.unwrap();
    let second = client.get_tenants().await.unwrap();

    // One login serves both calls, and output is deterministically ordered.
    assert_eq!(first, second);
    assert_eq!(first[0].name, "lab");
    assert_eq!(first[0].description, "lab tenant");
    assert_eq!(first[1].name, "prod");
}

#[tokio::test]
async fn test_expired_token_triggers_one_login_per_call() {
    let server = MockServer::start().await;
    // A declared lifetime of zero means the token is already stale at the
    // next call, so every call performs exactly one login first.
    mount_login(&server, "0", 2).await;

    Mock::given(method("GET"))
        .and(path("/api/node/class/fvTenant.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.get_tenants().await.unwrap();
    client.get_tenants().await.unwrap();
}

#[tokio::test]
async fn test_failed_login_aborts_the_original_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/aaaLogin.json"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server).get_tenants().await.unwrap_err();
    match err {
        AciError::Http { operation, status, .. } => {
            assert_eq!(operation, "login");
            assert_eq!(status, 401);
        }
        other => panic!("expected login protocol error, got {other:?}")
    }
}

#[tokio::test]
async fn test_http_failure_names_the_operation() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/node/class/fvTenant.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server).get_tenants().await.unwrap_err();
    match err {
        AciError::Http { operation, status, reason, .. } => {
            assert_eq!(operation, "get_tenants");
            assert_eq!(status, 500);
            assert_eq!(reason, "Internal Server Error");
        }
        other => panic!("expected protocol error, got {other:?}")
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_connectivity_error() {
    // A pooled server (`MockServer::start`) keeps its port bound after drop;
    // only a bare server releases the port so the connection is refused.
    let server = MockServer::builder().start().await;
    let uri = server.uri();
    drop(server);

    let client = AciClient::new(ApicConfig::new("admin", "secret", uri, true, "site1")).unwrap();
    let err = client.get_tenants().await.unwrap_err();
    assert!(err.is_connectivity(), "got {err:?}");
}

#[tokio::test]
async fn test_scoped_ap_listing_is_a_subset_of_unscoped() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    let lab_rows = vec![
        json!({"fvAp": {"attributes": {"name": "web", "dn": "uni/tn-lab/ap-web"}}}),
        json!({"fvAp": {"attributes": {"name": "db", "dn": "uni/tn-lab/ap-db"}}}),
    ];
    let mut all_rows = lab_rows.clone();
    all_rows.push(json!({"fvAp": {"attributes": {"name": "core", "dn": "uni/tn-prod/ap-core"}}}));

    Mock::given(method("GET"))
        .and(path("/api/node/class/fvAp.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(all_rows)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab.json"))
        .and(query_param("query-target", "children"))
        .and(query_param("target-subtree-class", "fvAp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(lab_rows)))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let unscoped = client.get_aps(None).await.unwrap();
    let scoped = client.get_aps(Some("lab")).await.unwrap();

    assert_eq!(unscoped.len(), 3);
    assert_eq!(scoped.len(), 2);
    for ap in &scoped {
        assert_eq!(ap.tenant, "lab");
        assert!(unscoped.contains(ap));
    }
}

#[tokio::test]
async fn test_epg_listing_filters_by_tenant_client_side() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/class/fvAEPg.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvAEPg": {"attributes": {"name": "app1", "dn": "uni/tn-lab/ap-web/epg-app1"}}}),
            json!({"fvAEPg": {"attributes": {"name": "app2", "dn": "uni/tn-prod/ap-core/epg-app2"}}}),
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let epgs = client.get_epgs(Some("lab"), None).await.unwrap();
    assert_eq!(epgs.len(), 1);
    assert_eq!(epgs[0].tenant, "lab");
    assert_eq!(epgs[0].ap, "web");
    assert_eq!(epgs[0].name, "app1");
}

/// The end-to-end normalization scenario: one EPG bound to a bridge domain
/// with one subnet and one provided contract whose filter chain resolves to
/// a single entry.
#[tokio::test]
async fn test_epg_details_end_to_end() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/ap-web/epg-app1.json"))
        .and(query_param("query-target", "children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvRsBd": {"attributes": {"tnFvBDName": "bd1"}}}),
            json!({"fvRsProv": {"attributes": {"tnVzBrCPName": "allow-https"}}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/BD-bd1.json"))
        .and(query_param("target-subtree-class", "fvSubnet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvSubnet": {"attributes": {"ip": "10.1.1.1/24", "scope": "public"}}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/brc-allow-https.json"))
        .and(query_param("target-subtree-class", "vzSubj"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"vzSubj": {"attributes": {"dn": "uni/tn-lab/brc-allow-https/subj-s1"}}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/brc-allow-https/subj-s1.json"))
        .and(query_param("target-subtree-class", "vzRsSubjFiltAtt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"vzRsSubjFiltAtt": {"attributes": {
                "tDn": "uni/tn-lab/flt-https", "action": "permit"
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/flt-https.json"))
        .and(query_param("target-subtree-class", "vzEntry"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"vzEntry": {"attributes": {
                "name": "https", "dToPort": "443", "etherT": "ipv4", "prot": "tcp"
            }}}),
        ])))
        .mount(&server)
        .await;

    let details = client_for(&server)
        .get_epg_details("lab", "web", "app1")
        .await
        .unwrap();

    assert_eq!(details.name, "app1");
    assert_eq!(details.bd.as_deref(), Some("bd1"));
    assert_eq!(details.subnets, vec!["10.1.1.1/24".to_string()]);
    assert!(details.consumed_contracts.is_empty());
    assert!(details.domains.is_empty());
    assert!(details.static_paths.is_empty());

    assert_eq!(details.provided_contracts.len(), 1);
    let contract = &details.provided_contracts[0];
    assert_eq!(contract.name, "allow-https");
    assert_eq!(
        contract.filters,
        vec![ContractFilter {
            name: "https".to_string(),
            dst_port: "443".to_string(),
            ethertype: "ipv4".to_string(),
            protocol: "tcp".to_string(),
            action: "permit".to_string()
        }]
    );
}

#[tokio::test]
async fn test_single_attached_static_path() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/ap-web/epg-app1.json"))
        .and(query_param("target-subtree-class", "fvRsPathAtt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvRsPathAtt": {"attributes": {
                "encap": "vlan-100",
                "tDn": "topology/pod-1/paths-101/pathep-[eth1/33]"
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/topology/pod-1/paths-101.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fabricPathEpCont": {"attributes": {"nodeId": "101"}}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/topology/pod-1/paths-101/pathep-[eth1/33].json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fabricPathEp": {"attributes": {"name": "eth1/33", "pathT": "leaf"}}}),
        ])))
        .mount(&server)
        .await;

    let paths = client_for(&server)
        .get_static_paths("lab", "web", "app1")
        .await
        .unwrap();

    assert_eq!(paths.len(), 1);
    let p = &paths[0];
    assert_eq!(p.encap, "vlan-100");
    assert_eq!(p.kind, Some(PathKind::NonPortChannel));
    assert_eq!(p.node_id.as_deref(), Some("101"));
    assert_eq!(p.interface.as_deref(), Some("eth1/33"));
    assert_eq!(p.path_type.as_deref(), Some("leaf"));
    assert_eq!(p.node_a, None);
}

async fn mount_bundle_mocks(server: &MockServer, node_a: &str, node_b: &str) {
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/ap-web/epg-app1.json"))
        .and(query_param("target-subtree-class", "fvRsPathAtt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![json!({
            "fvRsPathAtt": {"attributes": {
                "encap": "vlan-200",
                "tDn": format!("topology/pod-1/protpaths-{node_a}-{node_b}/pathep-[PG1]")
            }}
        })])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/node/mo/topology/pod-1/protpaths-{node_a}-{node_b}.json"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![json!({
            "fabricProtPathEpCont": {"attributes": {"nodeAId": node_a, "nodeBId": node_b}}
        })])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/node/mo/topology/pod-1/protpaths-{node_a}-{node_b}/pathep-[PG1].json"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fabricPathEp": {"attributes": {"name": "PG1", "pathT": "leaf"}}}),
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/infra/funcprof/accbundle-PG1.json"))
        .and(query_param("target-subtree-class", "infraRtAccBaseGrp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"infraRtAccBaseGrp": {"attributes": {
                "tDn": "uni/infra/accportprof-LEAF101/hports-SEL1-typ-range"
            }}}),
            json!({"infraRtAccBaseGrp": {"attributes": {
                "tDn": "uni/infra/accportprof-LEAF102/hports-SEL2-typ-range"
            }}}),
        ])))
        .mount(server)
        .await;
    for profile in ["LEAF101", "LEAF102"] {
        Mock::given(method("GET"))
            .and(path(format!(
                "/api/node/mo/uni/infra/accportprof-{profile}/hports-SEL{}-typ-range.json",
                if profile == "LEAF101" { "1" } else { "2" }
            )))
            .and(query_param("target-subtree-class", "infraPortBlk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
                json!({"infraPortBlk": {"attributes": {"toCard": "1", "toPort": "33"}}}),
            ])))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn test_vpc_static_path_when_node_ids_differ() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;
    mount_bundle_mocks(&server, "101", "102").await;

    let paths = client_for(&server)
        .get_static_paths("lab", "web", "app1")
        .await
        .unwrap();

    assert_eq!(paths.len(), 1);
    let p = &paths[0];
    assert_eq!(p.kind, Some(PathKind::VirtualPortChannel));
    assert_eq!(p.node_a.as_deref(), Some("101"));
    assert_eq!(p.node_b.as_deref(), Some("102"));
    assert_eq!(p.node_a_selector.as_deref(), Some("LEAF101"));
    assert_eq!(p.node_b_selector.as_deref(), Some("LEAF102"));
    assert_eq!(p.node_a_interfaces, vec!["1/33".to_string()]);
    assert_eq!(p.node_b_interfaces, vec!["1/33".to_string()]);
}

#[tokio::test]
async fn test_pc_static_path_when_node_ids_match() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;
    mount_bundle_mocks(&server, "101", "101").await;

    let paths = client_for(&server)
        .get_static_paths("lab", "web", "app1")
        .await
        .unwrap();
    assert_eq!(paths[0].kind, Some(PathKind::PortChannel));
}

#[tokio::test]
async fn test_decommissioned_bundle_yields_null_record_not_error() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/ap-web/epg-app1.json"))
        .and(query_param("target-subtree-class", "fvRsPathAtt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvRsPathAtt": {"attributes": {
                "encap": "vlan-300",
                "tDn": "topology/pod-1/protpaths-201-202/pathep-[PG-gone]"
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/topology/pod-1/protpaths-201-202.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![])))
        .mount(&server)
        .await;

    let paths = client_for(&server)
        .get_static_paths("lab", "web", "app1")
        .await
        .unwrap();

    assert_eq!(paths.len(), 1);
    let p = &paths[0];
    assert_eq!(p.encap, "vlan-300");
    assert_eq!(p.kind, None);
    assert_eq!(p.node_a, None);
    assert_eq!(p.node_b, None);
    assert!(p.node_a_interfaces.is_empty());
    assert!(p.node_b_interfaces.is_empty());
}

#[tokio::test]
async fn test_out_of_scope_path_shapes_produce_no_record() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/ap-web/epg-app1.json"))
        .and(query_param("target-subtree-class", "fvRsPathAtt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvRsPathAtt": {"attributes": {
                "encap": "vlan-400",
                "tDn": "topology/pod-1/node-101/sys"
            }}}),
        ])))
        .mount(&server)
        .await;

    let paths = client_for(&server)
        .get_static_paths("lab", "web", "app1")
        .await
        .unwrap();
    assert!(paths.is_empty());
}

#[tokio::test]
async fn test_node_listing_merges_identity_mgmt_and_fex_rows() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/class/fabricNode.json"))
        .and(query_param("query-target-filter", r#"ne(fabricNode.role,"controller")"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fabricNode": {"attributes": {
                "id": "101", "name": "leaf1", "model": "N9K-C93180YC-EX",
                "role": "leaf", "serial": "SN101", "address": "10.0.0.101",
                "dn": "topology/pod-1/node-101", "fabricSt": "active"
            }}}),
            json!({"fabricNode": {"attributes": {
                "id": "102", "name": "leaf2", "model": "N9K-C93180YC-EX",
                "role": "leaf", "serial": "SN102", "address": "10.0.0.102",
                "dn": "topology/pod-1/node-102", "fabricSt": "inactive"
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/class/topSystem.json"))
        .and(query_param("query-target-filter", r#"ne(topSystem.role,"controller")"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"topSystem": {"attributes": {
                "id": "101", "oobMgmtAddr": "0.0.0.0", "oobMgmtAddrMask": "0",
                "address": "10.0.0.101", "tepPool": "10.0.0.0/16",
                "systemUpTime": "05:22:43:18.000"
            }}}),
            // A management row with no matching identity row is skipped.
            json!({"topSystem": {"attributes": {
                "id": "999", "oobMgmtAddr": "192.0.2.9", "oobMgmtAddrMask": "24",
                "address": "10.0.0.199", "tepPool": "10.0.0.0/16",
                "systemUpTime": "00:00:01:00.000"
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/class/eqptExtCh.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"eqptExtCh": {"attributes": {
                "id": "101", "model": "N2K-C2248TP", "ser": "FEXSN1",
                "descr": "rack 12 fex", "dn": "topology/pod-1/node-101/sys/extch-101"
            }}}),
        ])))
        .mount(&server)
        .await;

    let nodes = client_for(&server).get_nodes().await.unwrap();

    // Inactive node dropped, unknown mgmt row dropped, FEX keyed synthetically.
    assert_eq!(nodes.len(), 2);
    let leaf = &nodes["101"];
    assert_eq!(leaf.role, NodeRole::Leaf);
    assert_eq!(leaf.pod_id, "1");
    assert_eq!(leaf.oob_ip, "10.0.0.101/16");
    assert_eq!(leaf.subnet, "10.0.0.0/16");
    assert_eq!(leaf.uptime, "05:22:43:18.000");
    assert_eq!(leaf.site, "site1");

    let fex = &nodes["101101"];
    assert_eq!(fex.role, NodeRole::Fex);
    assert_eq!(fex.name, "leaf1-101");
    assert_eq!(fex.parent_id.as_deref(), Some("101"));
    assert_eq!(fex.fex_id.as_deref(), Some("101"));
    assert_eq!(fex.serial, "FEXSN1");
}

#[tokio::test]
async fn test_controller_listing_with_simulator_model_fallback() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/class/fabricNode.json"))
        .and(query_param("query-target-filter", r#"eq(fabricNode.role,"controller")"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fabricNode": {"attributes": {
                "id": "1", "name": "apic1", "model": "", "role": "controller",
                "serial": "SNAPIC", "address": "10.0.0.1",
                "dn": "topology/pod-1/node-1", "fabricSt": ""
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/class/topSystem.json"))
        .and(query_param("query-target-filter", r#"eq(topSystem.role,"controller")"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"topSystem": {"attributes": {
                "id": "1", "podId": "1", "oobMgmtAddr": "192.0.2.10",
                "oobMgmtAddrMask": "24", "address": "10.0.0.1",
                "tepPool": "10.0.0.0/16", "systemUpTime": "12:00:00:00.000"
            }}}),
        ])))
        .mount(&server)
        .await;

    let controllers = client_for(&server).get_controllers().await.unwrap();
    let apic = &controllers["1"];
    assert_eq!(apic.model, "APIC-SIM");
    assert_eq!(apic.role, NodeRole::Controller);
    assert_eq!(apic.pod_id, "1");
    assert_eq!(apic.oob_ip, "192.0.2.10/24");
    assert_eq!(apic.subnet, "10.0.0.0/16");
}

#[tokio::test]
async fn test_pending_node_listing() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/class/dhcpClient.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"dhcpClient": {"attributes": {
                "id": "FDO12345", "fabricId": "1", "nodeId": "0",
                "model": "N9K-C93180YC-EX", "nodeRole": "leaf", "supported": "yes"
            }}}),
        ])))
        .mount(&server)
        .await;

    let pending = client_for(&server).get_pending_nodes().await.unwrap();
    let node = &pending["FDO12345"];
    assert_eq!(node.serial, "FDO12345");
    assert_eq!(node.role, "leaf");
    assert!(node.supported);
}

#[tokio::test]
async fn test_interface_listing_attributes_fex_ports_to_the_fex() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    let phys_if = |dn: &str, descr: &str| {
        json!({"l1PhysIf": {
            "attributes": {
                "dn": dn, "descr": descr, "speed": "10G", "bw": "0",
                "usage": "epg", "layer": "Layer2", "mode": "trunk",
                "switchingSt": "enabled"
            },
            "children": [
                {"ethpmPhysIf": {
                    "attributes": {"operSt": "up", "operStQual": "none"},
                    "children": [
                        {"ethpmFcot": {"attributes": {
                            "guiSN": "OPT1", "guiName": "CISCO-FINISAR",
                            "guiPN": "FTLX8574D3BCL-C2", "guiCiscoPID": "SFP-10G-SR",
                            "typeName": "10Gbase-SR"
                        }}}
                    ]
                }}
            ]
        }})
    };

    Mock::given(method("GET"))
        .and(path("/api/node/class/l1PhysIf.json"))
        .and(query_param("order-by", "l1PhysIf.id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            phys_if("topology/pod-1/node-101/sys/phys-[eth1/1]", "uplink"),
            phys_if("topology/pod-1/node-101/sys/phys-[eth101/1/1]", "fex host port"),
        ])))
        .mount(&server)
        .await;

    let nodes = vec!["101".to_string(), "101101".to_string()];
    let interfaces = client_for(&server).get_interfaces(&nodes).await.unwrap();

    let local = &interfaces["101"]["eth1/1"];
    assert_eq!(local.description, "uplink");
    assert_eq!(local.state, "up");
    assert_eq!(local.state_reason, "none");
    assert_eq!(local.gbic_serial, "OPT1");
    assert_eq!(local.gbic_model, "10Gbase-SR");

    let fex_port = &interfaces["101101"]["eth101/1/1"];
    assert_eq!(fex_port.description, "fex host port");
}

#[tokio::test]
async fn test_register_node_posts_identity_policy() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("POST"))
        .and(path("/api/node/mo/uni/controller/nodeidentpol.json"))
        .and(body_partial_json(json!({
            "fabricNodeIdentP": {"attributes": {
                "serial": "FDO12345", "nodeId": "103", "name": "leaf3"
            }}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"totalCount": "0", "imdata": []}))
        )
        .expect(1)
        .mount(&server)
        .await;

    let registered = client_for(&server)
        .register_node("FDO12345", "103", "leaf3")
        .await
        .unwrap();
    assert!(registered);
}

#[tokio::test]
async fn test_bd_listing_merges_vrf_and_subnets() {
    let server = MockServer::start().await;
    mount_login(&server, "600", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab.json"))
        .and(query_param("target-subtree-class", "fvBD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvBD": {"attributes": {
                "name": "bd1", "dn": "uni/tn-lab/BD-bd1", "descr": "app bd",
                "unicastRoute": "yes", "mac": "00:22:BD:F8:19:FF",
                "unkMacUcastAct": "proxy"
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/BD-bd1.json"))
        .and(query_param("target-subtree-class", "fvRsCtx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvRsCtx": {"attributes": {
                "tnFvCtxName": "vrf1", "tDn": "uni/tn-common/ctx-vrf1"
            }}}),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/node/mo/uni/tn-lab/BD-bd1.json"))
        .and(query_param("target-subtree-class", "fvSubnet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![
            json!({"fvSubnet": {"attributes": {"ip": "10.1.1.1/24", "scope": "public"}}}),
        ])))
        .mount(&server)
        .await;

    let bds = client_for(&server).get_bds(Some("lab")).await.unwrap();
    let bd = &bds["bd1"];
    assert_eq!(bd.tenant, "lab");
    assert!(bd.unicast_routing);
    assert_eq!(bd.vrf, "vrf1");
    assert_eq!(bd.vrf_tenant.as_deref(), Some("common"));
    assert_eq!(bd.subnets.len(), 1);
    assert_eq!(bd.subnets[0].ip, "10.1.1.1/24");
    assert_eq!(bd.subnets[0].scope, "public");
}
