//! Tenant-tree extraction: tenants, application profiles, EPGs, bridge
//! domains, VRFs and contract filter chains.
//!
//! Listing operations take an optional scope; `None` means all scopes and
//! issues a class-wide query, a concrete scope narrows the query server-side
//! with `query-target=children&target-subtree-class=...`.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, info};

use crate::client::AciClient;
use crate::dn::tenant_from_dn;
use crate::dn::ap_from_dn;
use crate::error::AciResult;
use crate::model::{
    AppProfile, BridgeDomain, ContractFilter, Epg, EpgContract, EpgDetails, Subnet, Tenant, Vrf
};

const CHILD_QUERY: (&str, &str) = ("query-target", "children");
const SUBTREE_QUERY: (&str, &str) = ("query-target", "subtree");

impl AciClient {
    /// List every tenant in the fabric.
    pub async fn get_tenants(&self) -> AciResult<Vec<Tenant>> {
        let env = self
            .session
            .get("get_tenants", "/api/node/class/fvTenant.json", &[])
            .await?;
        let mut tenants: Vec<Tenant> = env
            .rows::<TenantAttributes>("fvTenant")?
            .into_iter()
            .map(|mo| Tenant {
                name: mo.attributes.name,
                description: mo.attributes.descr
            })
            .collect();
        tenants.sort_by(|a, b| a.name.cmp(&b.name));
        info!(count = tenants.len(), "extracted tenants");
        Ok(tenants)
    }

    /// List application profiles, fabric-wide or scoped to one tenant.
    pub async fn get_aps(&self, tenant: Option<&str>) -> AciResult<Vec<AppProfile>> {
        let env = match tenant {
            None => {
                self.session
                    .get("get_aps", "/api/node/class/fvAp.json", &[])
                    .await?
            }
            Some(tenant) => {
                self.session
                    .get(
                        "get_aps",
                        &format!("/api/node/mo/uni/tn-{tenant}.json"),
                        &[CHILD_QUERY, ("target-subtree-class", "fvAp")]
                    )
                    .await?
            }
        };
        let mut aps: Vec<AppProfile> = env
            .rows::<NameDnAttributes>("fvAp")?
            .into_iter()
            .map(|mo| AppProfile {
                tenant: tenant_from_dn(&mo.attributes.dn).unwrap_or_default().to_string(),
                name: mo.attributes.name
            })
            .collect();
        aps.sort_by(|a, b| (&a.tenant, &a.name).cmp(&(&b.tenant, &b.name)));
        Ok(aps)
    }

    /// List EPGs. An application-profile scope narrows the query server-side
    /// (and requires a tenant scope); a tenant scope alone is applied
    /// client-side because the class query has no matching filter primitive.
    pub async fn get_epgs(&self, tenant: Option<&str>, ap: Option<&str>) -> AciResult<Vec<Epg>> {
        let env = match (tenant, ap) {
            (Some(tenant), Some(ap)) => {
                self.session
                    .get(
                        "get_epgs",
                        &format!("/api/node/mo/uni/tn-{tenant}/ap-{ap}.json"),
                        &[CHILD_QUERY, ("target-subtree-class", "fvAEPg")]
                    )
                    .await?
            }
            _ => {
                self.session
                    .get("get_epgs", "/api/node/class/fvAEPg.json", &[])
                    .await?
            }
        };
        let mut epgs: Vec<Epg> = env
            .rows::<NameDnAttributes>("fvAEPg")?
            .into_iter()
            .map(|mo| Epg {
                tenant: tenant_from_dn(&mo.attributes.dn).unwrap_or_default().to_string(),
                ap: ap_from_dn(&mo.attributes.dn).unwrap_or_default().to_string(),
                name: mo.attributes.name
            })
            .filter(|epg| tenant.is_none_or(|t| epg.tenant == t))
            .collect();
        epgs.sort_by(|a, b| (&a.tenant, &a.ap, &a.name).cmp(&(&b.tenant, &b.ap, &b.name)));
        Ok(epgs)
    }

    /// Subnet addresses configured under one bridge domain.
    pub async fn get_bd_subnets(&self, tenant: &str, bd: &str) -> AciResult<Vec<String>> {
        let env = self
            .session
            .get(
                "get_bd_subnets",
                &format!("/api/node/mo/uni/tn-{tenant}/BD-{bd}.json"),
                &[CHILD_QUERY, ("target-subtree-class", "fvSubnet")]
            )
            .await?;
        if env.total() == 0 {
            return Ok(Vec::new());
        }
        Ok(env
            .rows::<SubnetAttributes>("fvSubnet")?
            .into_iter()
            .map(|mo| mo.attributes.ip)
            .collect())
    }

    /// Resolve a contract's filter entries through the three-level fan-out:
    /// contract → subject DNs → filter associations → filter entries. Each
    /// level issues one call per DN returned by the previous level, and the
    /// association's action is attached to every resulting entry.
    pub async fn get_contract_filters(
        &self,
        tenant: &str,
        contract: &str
    ) -> AciResult<Vec<ContractFilter>> {
        let env = self
            .session
            .get(
                "get_contract_filters",
                &format!("/api/node/mo/uni/tn-{tenant}/brc-{contract}.json"),
                &[SUBTREE_QUERY, ("target-subtree-class", "vzSubj")]
            )
            .await?;
        let subject_dns: Vec<String> = env
            .rows::<DnAttributes>("vzSubj")?
            .into_iter()
            .map(|mo| mo.attributes.dn)
            .collect();

        let mut filters = Vec::new();
        for subject_dn in subject_dns {
            let assoc_env = self
                .session
                .get(
                    "get_contract_filters",
                    &format!("/api/node/mo/{subject_dn}.json"),
                    &[SUBTREE_QUERY, ("target-subtree-class", "vzRsSubjFiltAtt")]
                )
                .await?;
            for assoc in assoc_env.rows::<FilterAssocAttributes>("vzRsSubjFiltAtt")? {
                let entry_env = self
                    .session
                    .get(
                        "get_contract_filters",
                        &format!("/api/node/mo/{}.json", assoc.attributes.t_dn),
                        &[SUBTREE_QUERY, ("target-subtree-class", "vzEntry")]
                    )
                    .await?;
                for entry in entry_env.rows::<FilterEntryAttributes>("vzEntry")? {
                    filters.push(ContractFilter {
                        name: entry.attributes.name,
                        dst_port: entry.attributes.d_to_port,
                        ethertype: entry.attributes.ether_t,
                        protocol: entry.attributes.prot,
                        action: assoc.attributes.action.clone()
                    });
                }
            }
        }
        Ok(filters)
    }

    /// Fully resolve one EPG: children first, then one nested query per
    /// relation kind actually present. A relation kind absent from the
    /// children list skips its nested query entirely.
    pub async fn get_epg_details(
        &self,
        tenant: &str,
        ap: &str,
        epg: &str
    ) -> AciResult<EpgDetails> {
        let env = self
            .session
            .get(
                "get_epg_details",
                &format!("/api/node/mo/uni/tn-{tenant}/ap-{ap}/epg-{epg}.json"),
                &[CHILD_QUERY]
            )
            .await?;

        let mut details = EpgDetails {
            name: epg.to_string(),
            ..EpgDetails::default()
        };
        let mut has_static_paths = false;

        for row in &env.imdata {
            if let Some(value) = row.get("fvRsBd") {
                let rel = crate::session::decode_mo::<BdRelAttributes>(value, "fvRsBd")?;
                details.subnets = self.get_bd_subnets(tenant, &rel.attributes.tn_fv_bd_name).await?;
                details.bd = Some(rel.attributes.tn_fv_bd_name);
            }
            if let Some(value) = row.get("fvRsCons") {
                let rel = crate::session::decode_mo::<ContractRelAttributes>(value, "fvRsCons")?;
                let name = rel.attributes.tn_vz_br_cp_name;
                details.consumed_contracts.push(EpgContract {
                    filters: self.get_contract_filters(tenant, &name).await?,
                    name
                });
            }
            if let Some(value) = row.get("fvRsProv") {
                let rel = crate::session::decode_mo::<ContractRelAttributes>(value, "fvRsProv")?;
                let name = rel.attributes.tn_vz_br_cp_name;
                details.provided_contracts.push(EpgContract {
                    filters: self.get_contract_filters(tenant, &name).await?,
                    name
                });
            }
            if let Some(value) = row.get("fvRsDomAtt") {
                let rel = crate::session::decode_mo::<TargetDnAttributes>(value, "fvRsDomAtt")?;
                let dom_env = self
                    .session
                    .get(
                        "get_epg_details",
                        &format!("/api/node/mo/{}.json", rel.attributes.t_dn),
                        &[]
                    )
                    .await?;
                let dom = dom_env.first::<NameDnAttributes>("physDomP", "get_epg_details")?;
                details.domains.push(dom.attributes.name);
            }
            if row.contains_key("fvRsPathAtt") {
                has_static_paths = true;
            }
        }

        if has_static_paths {
            details.static_paths = self.get_static_paths(tenant, ap, epg).await?;
        }
        debug!(tenant, ap, epg, "resolved EPG details");
        Ok(details)
    }

    /// List VRFs, fabric-wide or scoped to one tenant.
    pub async fn get_vrfs(&self, tenant: Option<&str>) -> AciResult<Vec<Vrf>> {
        let env = match tenant {
            None => {
                self.session
                    .get("get_vrfs", "/api/node/class/fvCtx.json", &[])
                    .await?
            }
            Some(tenant) => {
                self.session
                    .get(
                        "get_vrfs",
                        &format!("/api/node/mo/uni/tn-{tenant}.json"),
                        &[CHILD_QUERY, ("target-subtree-class", "fvCtx")]
                    )
                    .await?
            }
        };
        let mut vrfs: Vec<Vrf> = env
            .rows::<NameDnAttributes>("fvCtx")?
            .into_iter()
            .map(|mo| Vrf {
                name: mo.attributes.name,
                tenant: tenant_from_dn(&mo.attributes.dn).unwrap_or_default().to_string()
            })
            .collect();
        vrfs.sort_by(|a, b| (&a.tenant, &a.name).cmp(&(&b.tenant, &b.name)));
        Ok(vrfs)
    }

    /// Bridge domains with their owning VRF and subnets, keyed by BD name.
    ///
    /// Three round trips per scope: the BD attributes, then per BD the
    /// `fvRsCtx` relation and the `fvSubnet` children, merged by name.
    pub async fn get_bds(&self, tenant: Option<&str>) -> AciResult<BTreeMap<String, BridgeDomain>> {
        let env = match tenant {
            None => {
                self.session
                    .get("get_bds", "/api/node/class/fvBD.json", &[])
                    .await?
            }
            Some(tenant) => {
                self.session
                    .get(
                        "get_bds",
                        &format!("/api/node/mo/uni/tn-{tenant}.json"),
                        &[CHILD_QUERY, ("target-subtree-class", "fvBD")]
                    )
                    .await?
            }
        };

        let mut bds = BTreeMap::new();
        for mo in env.rows::<BdAttributes>("fvBD")? {
            let attrs = mo.attributes;
            bds.insert(
                attrs.name.clone(),
                BridgeDomain {
                    tenant: tenant_from_dn(&attrs.dn).unwrap_or_default().to_string(),
                    name: attrs.name,
                    description: attrs.descr,
                    unicast_routing: attrs.unicast_route == "yes",
                    mac: attrs.mac,
                    l2_unknown_unicast: attrs.unk_mac_ucast_act,
                    vrf: String::new(),
                    vrf_tenant: None,
                    subnets: Vec::new()
                }
            );
        }

        for (name, bd) in &mut bds {
            let ctx_env = self
                .session
                .get(
                    "get_bds",
                    &format!("/api/node/mo/uni/tn-{}/BD-{name}.json", bd.tenant),
                    &[CHILD_QUERY, ("target-subtree-class", "fvRsCtx")]
                )
                .await?;
            for ctx in ctx_env.rows::<VrfRelAttributes>("fvRsCtx")? {
                bd.vrf = ctx
                    .attributes
                    .tn_fv_ctx_name
                    .unwrap_or_else(|| "default".to_string());
                bd.vrf_tenant = ctx
                    .attributes
                    .t_dn
                    .as_deref()
                    .and_then(tenant_from_dn)
                    .map(str::to_string);
            }

            let subnet_env = self
                .session
                .get(
                    "get_bds",
                    &format!("/api/node/mo/uni/tn-{}/BD-{name}.json", bd.tenant),
                    &[CHILD_QUERY, ("target-subtree-class", "fvSubnet")]
                )
                .await?;
            for subnet in subnet_env.rows::<SubnetAttributes>("fvSubnet")? {
                bd.subnets.push(Subnet {
                    ip: subnet.attributes.ip,
                    scope: subnet.attributes.scope
                });
            }
        }
        Ok(bds)
    }
}

#[derive(Debug, Deserialize)]
struct TenantAttributes {
    name: String,
    #[serde(default)]
    descr: String
}

#[derive(Debug, Deserialize)]
struct NameDnAttributes {
    name: String,
    #[serde(default)]
    dn: String
}

#[derive(Debug, Deserialize)]
struct DnAttributes {
    dn: String
}

#[derive(Debug, Deserialize)]
struct TargetDnAttributes {
    #[serde(rename = "tDn")]
    t_dn: String
}

#[derive(Debug, Deserialize)]
struct SubnetAttributes {
    ip: String,
    #[serde(default)]
    scope: String
}

#[derive(Debug, Deserialize)]
struct BdRelAttributes {
    #[serde(rename = "tnFvBDName")]
    tn_fv_bd_name: String
}

#[derive(Debug, Deserialize)]
struct ContractRelAttributes {
    #[serde(rename = "tnVzBrCPName")]
    tn_vz_br_cp_name: String
}

#[derive(Debug, Deserialize)]
struct VrfRelAttributes {
    #[serde(rename = "tnFvCtxName")]
    tn_fv_ctx_name: Option<String>,
    #[serde(rename = "tDn")]
    t_dn: Option<String>
}

#[derive(Debug, Deserialize)]
struct FilterAssocAttributes {
    #[serde(rename = "tDn")]
    t_dn: String,
    #[serde(default)]
    action: String
}

#[derive(Debug, Deserialize)]
struct FilterEntryAttributes {
    name: String,
    #[serde(rename = "dToPort", default)]
    d_to_port: String,
    #[serde(rename = "etherT", default)]
    ether_t: String,
    #[serde(default)]
    prot: String
}

#[derive(Debug, Deserialize)]
struct BdAttributes {
    name: String,
    #[serde(default)]
    dn: String,
    #[serde(default)]
    descr: String,
    #[serde(rename = "unicastRoute", default)]
    unicast_route: String,
    #[serde(default)]
    mac: String,
    #[serde(rename = "unkMacUcastAct", default)]
    unk_mac_ucast_act: String
}
