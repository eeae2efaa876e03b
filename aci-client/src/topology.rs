//! Physical-topology extraction: fabric nodes and controllers, pending
//! (unregistered) nodes, physical interfaces, static path bindings, and the
//! one write operation (node registration).

use std::collections::BTreeMap;

use ipnet::IpNet;
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::AciClient;
use crate::dn::{
    fex_id_from_dn, interface_from_dn, node_from_dn, path_container_from_dn, pod_from_dn,
    selector_from_dn
};
use crate::error::AciResult;
use crate::model::{FabricNode, Interface, NodeRole, PathKind, PendingNode, StaticPath};
use crate::session::child_mo;

/// The APIC's null-address sentinel; an out-of-band address equal to this is
/// treated as absent, not as a literal value.
const NULL_ADDR: &str = "0.0.0.0";

/// Shape of a static-path target DN, deciding which resolution handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathShape {
    /// `.../paths-<node>/...`: a port on a single node.
    SinglePath,
    /// `.../protpaths-<a>-<b>/...`: a port-channel or vPC bundle.
    RedundantPath,
    /// Anything else is out of scope for this extraction and produces no
    /// record.
    Other
}

fn path_shape(target_dn: &str) -> PathShape {
    if target_dn.contains("protpaths-") {
        PathShape::RedundantPath
    } else if target_dn.contains("paths-") {
        PathShape::SinglePath
    } else {
        PathShape::Other
    }
}

/// Management address and subnet fallback shared by node and controller
/// listing: explicit out-of-band address first, else the in-band address
/// with the TEP pool's prefix length, else empty. The reported subnet is the
/// TEP pool when set, else the network of the derived address.
fn derive_mgmt(oob_addr: &str, oob_mask: &str, inband_addr: &str, tep_pool: &str) -> (String, String) {
    let mgmt = if !oob_addr.is_empty() && oob_addr != NULL_ADDR {
        format!("{oob_addr}/{oob_mask}")
    } else if !inband_addr.is_empty() && inband_addr != NULL_ADDR && !tep_pool.is_empty() {
        match tep_pool.parse::<IpNet>() {
            Ok(pool) => format!("{inband_addr}/{}", pool.prefix_len()),
            Err(_) => String::new()
        }
    } else {
        String::new()
    };

    let subnet = if tep_pool != NULL_ADDR {
        tep_pool.to_string()
    } else if !mgmt.is_empty() {
        mgmt.parse::<IpNet>()
            .map(|net| net.trunc().to_string())
            .unwrap_or_default()
    } else {
        String::new()
    };

    (mgmt, subnet)
}

impl AciClient {
    /// Leaf, spine and FEX nodes, keyed by node id (synthetic parent+fex id
    /// for chassis extenders). Merges three class queries: `fabricNode`
    /// identity rows key the space; `topSystem` management rows and
    /// `eqptExtCh` extender rows only ever enrich existing keys, never
    /// create them.
    pub async fn get_nodes(&self) -> AciResult<BTreeMap<String, FabricNode>> {
        let env = self
            .session
            .get(
                "get_nodes",
                "/api/class/fabricNode.json",
                &[("query-target-filter", r#"ne(fabricNode.role,"controller")"#)]
            )
            .await?;

        let mut nodes = BTreeMap::new();
        for mo in env.rows::<FabricNodeAttributes>("fabricNode")? {
            let attrs = mo.attributes;
            if attrs.fabric_st != "active" {
                continue;
            }
            nodes.insert(
                attrs.id.clone(),
                FabricNode {
                    id: attrs.id,
                    name: attrs.name,
                    model: attrs.model,
                    role: NodeRole::from(attrs.role.as_str()),
                    serial: attrs.serial,
                    fabric_ip: attrs.address,
                    pod_id: pod_from_dn(&attrs.dn).unwrap_or_default().to_string(),
                    oob_ip: String::new(),
                    subnet: String::new(),
                    uptime: String::new(),
                    description: String::new(),
                    parent_id: None,
                    fex_id: None,
                    site: self.site().to_string()
                }
            );
        }

        let env = self
            .session
            .get(
                "get_nodes",
                "/api/class/topSystem.json",
                &[("query-target-filter", r#"ne(topSystem.role,"controller")"#)]
            )
            .await?;
        for mo in env.rows::<TopSystemAttributes>("topSystem")? {
            let attrs = mo.attributes;
            // Identity rows are assumed to precede and fully key this merge;
            // a management row with no matching identity row is skipped.
            let Some(node) = nodes.get_mut(&attrs.id) else {
                continue;
            };
            let (mgmt, subnet) = derive_mgmt(
                &attrs.oob_mgmt_addr,
                &attrs.oob_mgmt_addr_mask,
                &attrs.address,
                &attrs.tep_pool
            );
            node.oob_ip = mgmt;
            node.subnet = subnet;
            node.uptime = attrs.system_up_time;
        }

        let env = self
            .session
            .get("get_nodes", "/api/node/class/eqptExtCh.json", &[])
            .await?;
        let mut fexes = Vec::new();
        for mo in env.rows::<FexAttributes>("eqptExtCh")? {
            let attrs = mo.attributes;
            let parent_id = node_from_dn(&attrs.dn).unwrap_or_default().to_string();
            let Some(parent) = nodes.get(&parent_id) else {
                continue;
            };
            fexes.push(FabricNode {
                id: format!("{parent_id}{}", attrs.id),
                name: format!("{}-{}", parent.name, attrs.id),
                model: attrs.model,
                role: NodeRole::Fex,
                serial: attrs.ser,
                fabric_ip: String::new(),
                pod_id: pod_from_dn(&attrs.dn).unwrap_or_default().to_string(),
                oob_ip: String::new(),
                subnet: String::new(),
                uptime: String::new(),
                description: attrs.descr,
                parent_id: Some(parent_id),
                fex_id: Some(attrs.id),
                site: self.site().to_string()
            });
        }
        for fex in fexes {
            nodes.insert(fex.id.clone(), fex);
        }

        info!(count = nodes.len(), "extracted fabric nodes");
        Ok(nodes)
    }

    /// APIC controllers, keyed by node id. Same two-query merge as
    /// `get_nodes`, with the pod id sourced from the management row.
    pub async fn get_controllers(&self) -> AciResult<BTreeMap<String, FabricNode>> {
        let env = self
            .session
            .get(
                "get_controllers",
                "/api/class/fabricNode.json",
                &[("query-target-filter", r#"eq(fabricNode.role,"controller")"#)]
            )
            .await?;

        let mut controllers = BTreeMap::new();
        for mo in env.rows::<FabricNodeAttributes>("fabricNode")? {
            let attrs = mo.attributes;
            let model = if attrs.model.is_empty() {
                // Simulator controllers report no model.
                "APIC-SIM".to_string()
            } else {
                attrs.model
            };
            controllers.insert(
                attrs.id.clone(),
                FabricNode {
                    id: attrs.id,
                    name: attrs.name,
                    model,
                    role: NodeRole::from(attrs.role.as_str()),
                    serial: attrs.serial,
                    fabric_ip: attrs.address,
                    pod_id: String::new(),
                    oob_ip: String::new(),
                    subnet: String::new(),
                    uptime: String::new(),
                    description: String::new(),
                    parent_id: None,
                    fex_id: None,
                    site: self.site().to_string()
                }
            );
        }

        let env = self
            .session
            .get(
                "get_controllers",
                "/api/class/topSystem.json",
                &[("query-target-filter", r#"eq(topSystem.role,"controller")"#)]
            )
            .await?;
        for mo in env.rows::<TopSystemAttributes>("topSystem")? {
            let attrs = mo.attributes;
            let Some(controller) = controllers.get_mut(&attrs.id) else {
                continue;
            };
            let (mgmt, subnet) = derive_mgmt(
                &attrs.oob_mgmt_addr,
                &attrs.oob_mgmt_addr_mask,
                &attrs.address,
                &attrs.tep_pool
            );
            controller.pod_id = attrs.pod_id;
            controller.oob_ip = mgmt;
            controller.subnet = subnet;
            controller.uptime = attrs.system_up_time;
        }
        Ok(controllers)
    }

    /// Nodes visible to the fabric DHCP process but not yet registered,
    /// keyed by serial number.
    pub async fn get_pending_nodes(&self) -> AciResult<BTreeMap<String, PendingNode>> {
        let filter = concat!(
            r#"and(not(wcard(dhcpClient.dn,"__ui_")),and(or(eq(dhcpClient.ip,"0.0.0.0")),"#,
            r#"or(eq(dhcpClient.nodeRole,"spine"),eq(dhcpClient.nodeRole,"leaf"),"#,
            r#"eq(dhcpClient.nodeRole,"unsupported"))))"#
        );
        let env = self
            .session
            .get(
                "get_pending_nodes",
                "/api/node/class/dhcpClient.json",
                &[("query-target-filter", filter)]
            )
            .await?;

        let mut pending = BTreeMap::new();
        for mo in env.rows::<DhcpClientAttributes>("dhcpClient")? {
            let attrs = mo.attributes;
            pending.insert(
                attrs.id.clone(),
                PendingNode {
                    serial: attrs.id,
                    fabric_id: attrs.fabric_id,
                    node_id: attrs.node_id,
                    model: attrs.model,
                    role: attrs.node_role,
                    supported: attrs.supported == "yes"
                }
            );
        }
        Ok(pending)
    }

    /// Physical interfaces per switch, keyed by switch id then port name.
    /// FEX host ports (named `eth<fex>/x/y`, fex ≥ 100) are attributed to
    /// the synthetic FEX node id. Only interfaces carried in the `nodes`
    /// key set are reported; ports without an `ethpmPhysIf` child (no
    /// operational data) are skipped.
    pub async fn get_interfaces(
        &self,
        nodes: &[String]
    ) -> AciResult<BTreeMap<String, BTreeMap<String, Interface>>> {
        let env = self
            .session
            .get(
                "get_interfaces",
                "/api/node/class/l1PhysIf.json",
                &[
                    ("rsp-subtree", "full"),
                    ("rsp-subtree-class", "ethpmPhysIf,ethpmFcot"),
                    ("order-by", "l1PhysIf.id")
                ]
            )
            .await?;

        let mut interfaces: BTreeMap<String, BTreeMap<String, Interface>> =
            nodes.iter().map(|id| (id.clone(), BTreeMap::new())).collect();

        for mo in env.rows::<PhysIfAttributes>("l1PhysIf")? {
            let attrs = &mo.attributes;
            let fex_id = fex_id_from_dn(&attrs.dn);
            let node_id = node_from_dn(&attrs.dn).unwrap_or_default();
            let switch_id = if fex_id < 100 {
                node_id.to_string()
            } else {
                format!("{node_id}{fex_id}")
            };
            let Some(port_name) = interface_from_dn(&attrs.dn) else {
                continue;
            };
            let Some(ethpm) = child_mo::<EthpmPhysIfAttributes>(&mo.children, "ethpmPhysIf")?
            else {
                continue;
            };
            let fcot = child_mo::<FcotAttributes>(&ethpm.children, "ethpmFcot")?
                .map(|mo| mo.attributes)
                .unwrap_or_default();

            let Some(ports) = interfaces.get_mut(&switch_id) else {
                continue;
            };
            ports.insert(
                port_name.to_string(),
                Interface {
                    description: attrs.descr.clone(),
                    speed: attrs.speed.clone(),
                    bandwidth: attrs.bw.clone(),
                    usage: attrs.usage.clone(),
                    layer: attrs.layer.clone(),
                    mode: attrs.mode.clone(),
                    switching_state: attrs.switching_st.clone(),
                    state: ethpm.attributes.oper_st.clone(),
                    state_reason: ethpm.attributes.oper_st_qual.clone(),
                    gbic_serial: fcot.gui_sn,
                    gbic_vendor: fcot.gui_name,
                    gbic_type: fcot.gui_pn,
                    gbic_model: if fcot.gui_cisco_pid.is_empty() {
                        fcot.gui_cisco_pid
                    } else {
                        fcot.type_name
                    }
                }
            );
        }
        Ok(interfaces)
    }

    /// Static path bindings of one EPG. The target DN's shape decides the
    /// handler: pod/path for single-attached ports, pod/redundant-path for
    /// (v)PC bundles; any other shape is deliberately ignored.
    pub async fn get_static_paths(
        &self,
        tenant: &str,
        ap: &str,
        epg: &str
    ) -> AciResult<Vec<StaticPath>> {
        let env = self
            .session
            .get(
                "get_static_paths",
                &format!("/api/node/mo/uni/tn-{tenant}/ap-{ap}/epg-{epg}.json"),
                &[("query-target", "subtree"), ("target-subtree-class", "fvRsPathAtt")]
            )
            .await?;

        let mut paths = Vec::new();
        for mo in env.rows::<PathAttAttributes>("fvRsPathAtt")? {
            let encap = mo.attributes.encap;
            let target_dn = mo.attributes.t_dn;
            let resolved = match path_shape(&target_dn) {
                PathShape::SinglePath => self.resolve_single_path(encap, &target_dn).await?,
                PathShape::RedundantPath => self.resolve_bundled_path(encap, &target_dn).await?,
                PathShape::Other => None
            };
            if let Some(path) = resolved {
                paths.push(path);
            }
        }
        debug!(tenant, ap, epg, count = paths.len(), "resolved static paths");
        Ok(paths)
    }

    /// A port on a single node: the container yields the owning node id, the
    /// path endpoint itself yields the interface name and path type.
    async fn resolve_single_path(
        &self,
        encap: String,
        target_dn: &str
    ) -> AciResult<Option<StaticPath>> {
        let Some(container) = path_container_from_dn(target_dn) else {
            return Ok(None);
        };
        let env = self
            .session
            .get(
                "get_static_paths",
                &format!("/api/node/mo/{container}.json"),
                &[]
            )
            .await?;
        let cont = env.first::<PathContAttributes>("fabricPathEpCont", "get_static_paths")?;

        let env = self
            .session
            .get(
                "get_static_paths",
                &format!("/api/node/mo/{target_dn}.json"),
                &[]
            )
            .await?;
        let ep = env.first::<PathEpAttributes>("fabricPathEp", "get_static_paths")?;

        Ok(Some(StaticPath {
            encap,
            kind: Some(PathKind::NonPortChannel),
            node_id: Some(cont.attributes.node_id),
            interface: Some(ep.attributes.name),
            path_type: Some(ep.attributes.path_t),
            ..StaticPath::default()
        }))
    }

    /// A (v)PC bundle: the redundant-path container yields the node pair
    /// (zero rows mean the binding is absent or decommissioned and produce
    /// the all-`None` record), then the named policy group's selector
    /// associations yield the per-side member ports. The first distinct
    /// selector accumulates under side A, a second distinct one under
    /// side B.
    async fn resolve_bundled_path(
        &self,
        encap: String,
        target_dn: &str
    ) -> AciResult<Option<StaticPath>> {
        let Some(container) = path_container_from_dn(target_dn) else {
            return Ok(None);
        };
        let env = self
            .session
            .get(
                "get_static_paths",
                &format!("/api/node/mo/{container}.json"),
                &[]
            )
            .await?;
        let conts = env.rows::<ProtPathContAttributes>("fabricProtPathEpCont")?;
        let Some(cont) = conts.into_iter().next() else {
            // Absent or decommissioned binding; not an error.
            return Ok(Some(StaticPath {
                encap,
                ..StaticPath::default()
            }));
        };

        let node_a = cont.attributes.node_a_id;
        let node_b = cont.attributes.node_b_id;
        let kind = if node_a == node_b {
            PathKind::PortChannel
        } else {
            PathKind::VirtualPortChannel
        };

        let env = self
            .session
            .get(
                "get_static_paths",
                &format!("/api/node/mo/{target_dn}.json"),
                &[]
            )
            .await?;
        let policy_group = env
            .first::<PathEpAttributes>("fabricPathEp", "get_static_paths")?
            .attributes
            .name;

        let mut path = StaticPath {
            encap,
            kind: Some(kind),
            node_a: Some(node_a),
            node_b: Some(node_b),
            ..StaticPath::default()
        };

        let env = self
            .session
            .get(
                "get_static_paths",
                &format!("/api/node/mo/uni/infra/funcprof/accbundle-{policy_group}.json"),
                &[
                    ("query-target", "subtree"),
                    ("target-subtree-class", "infraRtAccBaseGrp")
                ]
            )
            .await?;
        for assoc in env.rows::<TargetDnAttributes>("infraRtAccBaseGrp")? {
            let selector_dn = assoc.attributes.t_dn;
            let Some(selector) = selector_from_dn(&selector_dn) else {
                continue;
            };
            let block_env = self
                .session
                .get(
                    "get_static_paths",
                    &format!("/api/node/mo/{selector_dn}.json"),
                    &[
                        ("query-target", "subtree"),
                        ("target-subtree-class", "infraPortBlk")
                    ]
                )
                .await?;
            let ports: Vec<String> = block_env
                .rows::<PortBlockAttributes>("infraPortBlk")?
                .into_iter()
                .map(|mo| format!("{}/{}", mo.attributes.to_card, mo.attributes.to_port))
                .collect();

            match &path.node_a_selector {
                None => {
                    path.node_a_selector = Some(selector.to_string());
                    path.node_a_interfaces.extend(ports);
                }
                Some(side_a) if side_a == selector => {
                    path.node_a_interfaces.extend(ports);
                }
                Some(_) => {
                    path.node_b_selector = Some(selector.to_string());
                    path.node_b_interfaces.extend(ports);
                }
            }
        }
        Ok(Some(path))
    }

    /// Register a pending node into the fabric's identity policy. The only
    /// write operation; failures route through the same protocol-error path
    /// as reads.
    pub async fn register_node(
        &self,
        serial: &str,
        node_id: &str,
        name: &str
    ) -> AciResult<bool> {
        let payload = serde_json::json!({
            "fabricNodeIdentP": {
                "attributes": {
                    "dn": format!("uni/controller/nodeidentpol/nodep-{serial}"),
                    "serial": serial,
                    "nodeId": node_id,
                    "name": name
                }
            }
        });
        self.session
            .post(
                "register_node",
                "/api/node/mo/uni/controller/nodeidentpol.json",
                &payload
            )
            .await?;
        info!(serial, node_id, name, "registered fabric node");
        Ok(true)
    }
}

#[derive(Debug, Deserialize)]
struct FabricNodeAttributes {
    id: String,
    name: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    serial: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    dn: String,
    #[serde(rename = "fabricSt", default)]
    fabric_st: String
}

#[derive(Debug, Deserialize)]
struct TopSystemAttributes {
    id: String,
    #[serde(rename = "oobMgmtAddr", default)]
    oob_mgmt_addr: String,
    #[serde(rename = "oobMgmtAddrMask", default)]
    oob_mgmt_addr_mask: String,
    #[serde(default)]
    address: String,
    #[serde(rename = "tepPool", default)]
    tep_pool: String,
    #[serde(rename = "systemUpTime", default)]
    system_up_time: String,
    #[serde(rename = "podId", default)]
    pod_id: String
}

#[derive(Debug, Deserialize)]
struct FexAttributes {
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    ser: String,
    #[serde(default)]
    descr: String,
    #[serde(default)]
    dn: String
}

#[derive(Debug, Deserialize)]
struct DhcpClientAttributes {
    id: String,
    #[serde(rename = "fabricId", default)]
    fabric_id: String,
    #[serde(rename = "nodeId", default)]
    node_id: String,
    #[serde(default)]
    model: String,
    #[serde(rename = "nodeRole", default)]
    node_role: String,
    #[serde(default)]
    supported: String
}

#[derive(Debug, Deserialize)]
struct PhysIfAttributes {
    #[serde(default)]
    dn: String,
    #[serde(default)]
    descr: String,
    #[serde(default)]
    speed: String,
    #[serde(default)]
    bw: String,
    #[serde(default)]
    usage: String,
    #[serde(default)]
    layer: String,
    #[serde(default)]
    mode: String,
    #[serde(rename = "switchingSt", default)]
    switching_st: String
}

#[derive(Debug, Deserialize)]
struct EthpmPhysIfAttributes {
    #[serde(rename = "operSt", default)]
    oper_st: String,
    #[serde(rename = "operStQual", default)]
    oper_st_qual: String
}

#[derive(Debug, Default, Deserialize)]
struct FcotAttributes {
    #[serde(rename = "guiSN", default)]
    gui_sn: String,
    #[serde(rename = "guiName", default)]
    gui_name: String,
    #[serde(rename = "guiPN", default)]
    gui_pn: String,
    #[serde(rename = "guiCiscoPID", default)]
    gui_cisco_pid: String,
    #[serde(rename = "typeName", default)]
    type_name: String
}

#[derive(Debug, Deserialize)]
struct PathAttAttributes {
    #[serde(default)]
    encap: String,
    #[serde(rename = "tDn")]
    t_dn: String
}

#[derive(Debug, Deserialize)]
struct PathContAttributes {
    #[serde(rename = "nodeId")]
    node_id: String
}

#[derive(Debug, Deserialize)]
struct ProtPathContAttributes {
    #[serde(rename = "nodeAId")]
    node_a_id: String,
    #[serde(rename = "nodeBId")]
    node_b_id: String
}

#[derive(Debug, Deserialize)]
struct PathEpAttributes {
    name: String,
    #[serde(rename = "pathT", default)]
    path_t: String
}

#[derive(Debug, Deserialize)]
struct TargetDnAttributes {
    #[serde(rename = "tDn")]
    t_dn: String
}

#[derive(Debug, Deserialize)]
struct PortBlockAttributes {
    #[serde(rename = "toCard", default)]
    to_card: String,
    #[serde(rename = "toPort", default)]
    to_port: String
}
