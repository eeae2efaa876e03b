//! Canonical, flat representations of fabric state.
//!
//! Every extraction operation rebuilds these transiently from the APIC; none
//! are mutated in place.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    pub description: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppProfile {
    pub tenant: String,
    pub name: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epg {
    pub tenant: String,
    pub ap: String,
    pub name: String
}

/// One filter entry resolved through the contract → subject → filter
/// association chain, with the association's action attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFilter {
    pub name: String,
    pub dst_port: String,
    pub ethertype: String,
    pub protocol: String,
    pub action: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgContract {
    pub name: String,
    pub filters: Vec<ContractFilter>
}

/// Fully-resolved EPG configuration: the bound bridge domain and its
/// subnets, both contract directions with their filter chains, attached
/// physical domains, and static path bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgDetails {
    pub name: String,
    pub bd: Option<String>,
    pub subnets: Vec<String>,
    pub provided_contracts: Vec<EpgContract>,
    pub consumed_contracts: Vec<EpgContract>,
    pub domains: Vec<String>,
    pub static_paths: Vec<StaticPath>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub ip: String,
    pub scope: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDomain {
    pub name: String,
    pub tenant: String,
    pub description: String,
    pub unicast_routing: bool,
    pub mac: String,
    /// Action for unknown unicast MAC traffic (`proxy` or `flood`).
    pub l2_unknown_unicast: String,
    pub vrf: String,
    /// Tenant owning the VRF, which may differ from the BD's own tenant.
    pub vrf_tenant: Option<String>,
    pub subnets: Vec<Subnet>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vrf {
    pub name: String,
    pub tenant: String
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Leaf,
    Spine,
    Controller,
    Fex,
    Unknown
}

impl From<&str> for NodeRole {
    fn from(role: &str) -> Self {
        match role {
            "leaf" => Self::Leaf,
            "spine" => Self::Spine,
            "controller" => Self::Controller,
            "fex" => Self::Fex,
            _ => Self::Unknown
        }
    }
}

/// A physical fabric node. Chassis extenders (FEXes) are folded into the
/// same record shape with a synthetic id of parent node id + FEX id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricNode {
    pub id: String,
    pub name: String,
    pub model: String,
    pub role: NodeRole,
    pub serial: String,
    pub fabric_ip: String,
    pub pod_id: String,
    /// Management address, derived out-of-band first, else in-band with the
    /// TEP pool's prefix length, else empty.
    pub oob_ip: String,
    pub subnet: String,
    pub uptime: String,
    pub description: String,
    /// Parent switch id, set for FEXes only.
    pub parent_id: Option<String>,
    /// Extender id, set for FEXes only.
    pub fex_id: Option<String>,
    pub site: String
}

/// A node visible to the fabric's DHCP process but not yet registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNode {
    pub serial: String,
    pub fabric_id: String,
    pub node_id: String,
    pub model: String,
    pub role: String,
    pub supported: bool
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub description: String,
    pub speed: String,
    pub bandwidth: String,
    pub usage: String,
    pub layer: String,
    pub mode: String,
    pub switching_state: String,
    pub state: String,
    pub state_reason: String,
    pub gbic_serial: String,
    pub gbic_vendor: String,
    pub gbic_type: String,
    pub gbic_model: String
}

/// Binding type of a static path. Virtual port-channel is distinguished
/// from port-channel solely by the two resolved node ids differing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathKind {
    #[serde(rename = "non-PC")]
    NonPortChannel,
    #[serde(rename = "PC")]
    PortChannel,
    #[serde(rename = "vPC")]
    VirtualPortChannel
}

/// A static port binding on an EPG.
///
/// Exactly one of two field groups is populated: `node_id`/`interface`/
/// `path_type` for a single-attached port, or the `node_a`/`node_b` pair
/// with per-side selector and member interfaces for (v)PC bundles. A
/// record with `kind` and all identity fields `None` means the
/// redundant-path container resolved to zero rows: the binding is absent
/// or decommissioned, which is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticPath {
    pub encap: String,
    pub kind: Option<PathKind>,
    pub node_id: Option<String>,
    pub interface: Option<String>,
    pub path_type: Option<String>,
    pub node_a: Option<String>,
    pub node_b: Option<String>,
    pub node_a_selector: Option<String>,
    pub node_b_selector: Option<String>,
    pub node_a_interfaces: Vec<String>,
    pub node_b_interfaces: Vec<String>
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_role_from_attribute() {
        assert_eq!(NodeRole::from("leaf"), NodeRole::Leaf);
        assert_eq!(NodeRole::from("spine"), NodeRole::Spine);
        assert_eq!(NodeRole::from("controller"), NodeRole::Controller);
        assert_eq!(NodeRole::from("remote-leaf-wan"), NodeRole::Unknown);
    }

    #[test]
    fn test_path_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&PathKind::VirtualPortChannel).unwrap(),
            "\"vPC\""
        );
        assert_eq!(
            serde_json::to_string(&PathKind::NonPortChannel).unwrap(),
            "\"non-PC\""
        );
    }
}
