//! Parsers for APIC distinguished names.
//!
//! A DN is a slash-separated path of segments, each prefixed by a short type
//! tag, e.g. `uni/tn-lab/ap-web/epg-app1` or
//! `topology/pod-1/node-101/sys/phys-[eth1/33]`. Bracketed segment names may
//! themselves contain slashes, so splitting has to be bracket-aware.
//!
//! These functions run inside hot extraction loops and never fail: malformed
//! input yields `None` (or `0` for the FEX id), not an error.

/// Split a DN into top-level segments, treating `[...]` as opaque.
fn segments(dn: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut depth = 0i32;
    for (i, b) in dn.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth -= 1,
            b'/' if depth == 0 => {
                out.push(&dn[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&dn[start..]);
    out
}

fn find_segment<'a>(dn: &'a str, prefix: &str) -> Option<&'a str> {
    segments(dn)
        .into_iter()
        .find_map(|seg| seg.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty())
}

/// Tenant name from a `tn-` segment.
pub fn tenant_from_dn(dn: &str) -> Option<&str> {
    find_segment(dn, "tn-")
}

/// Application profile name from an `ap-` segment.
pub fn ap_from_dn(dn: &str) -> Option<&str> {
    find_segment(dn, "ap-")
}

/// Pod number from a `pod-` segment.
pub fn pod_from_dn(dn: &str) -> Option<&str> {
    find_segment(dn, "pod-")
}

/// Node id from a `node-` segment.
pub fn node_from_dn(dn: &str) -> Option<&str> {
    find_segment(dn, "node-")
}

/// Physical interface name from a `phys-[...]` segment, e.g. `eth1/33`.
pub fn interface_from_dn(dn: &str) -> Option<&str> {
    let start = dn.find("phys-[")? + "phys-[".len();
    let end = dn[start..].find(']')? + start;
    Some(&dn[start..end])
}

/// Chassis-extender id encoded in the interface name: FEX host ports are
/// named `eth<fex>/x/y` with a fex id of 100 or above, while ports local to
/// the switch are `eth<slot>/<port>` with a slot below 100. Returns 0 when
/// no interface name is present.
pub fn fex_id_from_dn(dn: &str) -> u32 {
    interface_from_dn(dn)
        .and_then(|name| name.strip_prefix("eth"))
        .and_then(|rest| rest.split('/').next())
        .and_then(|id| id.parse().ok())
        .unwrap_or(0)
}

/// The pod/path container prefix of a static-path target DN: everything up
/// to and including the `paths-` or `protpaths-` segment.
pub fn path_container_from_dn(dn: &str) -> Option<&str> {
    let mut start = 0usize;
    let mut depth = 0i32;
    for (i, b) in dn.bytes().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => depth -= 1,
            b'/' if depth == 0 => {
                let seg = &dn[start..i];
                if seg.starts_with("paths-") || seg.starts_with("protpaths-") {
                    return Some(&dn[..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let seg = &dn[start..];
    if seg.starts_with("paths-") || seg.starts_with("protpaths-") {
        Some(dn)
    } else {
        None
    }
}

/// Interface-selector profile name embedded in an `infraRtAccBaseGrp`
/// target DN: the text between the first `-` and the last `/`, e.g.
/// `uni/infra/accportprof-LEAF101/hports-SEL-typ-range` yields `LEAF101`.
pub fn selector_from_dn(dn: &str) -> Option<&str> {
    let start = dn.find('-')? + 1;
    let end = dn.rfind('/')?;
    if start <= end { Some(&dn[start..end]) } else { None }
}
