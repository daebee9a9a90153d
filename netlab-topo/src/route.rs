use crate::TopologyError;
use crate::addr::Subnet;
use crate::spec::{ResolvedEndpoint, ResolvedLink, TopologySpec};
use std::fmt;
use std::net::Ipv4Addr;

/// A static route owned by a single router: traffic for `destination` leaves
/// through `dev` towards `via`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub router: String,
    pub destination: Subnet,
    pub via: Ipv4Addr,
    pub dev: String,
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} via {} dev {}",
            self.router, self.destination, self.via, self.dev
        )
    }
}

/// Computes the static routes that give a full router mesh reachability
/// between its LAN subnets.
///
/// For every ordered router pair (A, B) where A holds no address inside B's
/// LAN, the link directly connecting A and B yields one route on A:
/// destination = B's LAN subnet, next-hop = B's address on that link, egress
/// = A's interface on that link. The next-hop is therefore always reachable
/// over a directly connected link, and routers in a shared subnet get no
/// extra route.
pub fn static_mesh_routes(topo: &TopologySpec) -> Result<Vec<RouteEntry>, TopologyError> {
    let links = topo.resolved_links()?;
    let routers: Vec<_> = topo.routers().collect();
    let mut routes = Vec::new();

    for a in &routers {
        let a_ip = a
            .ip
            .ok_or_else(|| TopologyError::MissingRouterAddress(a.name.clone()))?;

        for b in &routers {
            if a.name == b.name {
                continue;
            }
            let b_lan = b
                .ip
                .ok_or_else(|| TopologyError::MissingRouterAddress(b.name.clone()))?
                .subnet();
            if b_lan.contains(a_ip.addr) {
                // Same subnet, directly reachable without a route
                continue;
            }

            let (local, peer) = direct_link(&links, &a.name, &b.name)?;
            let via = peer.addr.ok_or_else(|| TopologyError::MissingLinkAddress {
                node: peer.node.clone(),
                ifname: peer.ifname.clone(),
            })?;

            routes.push(RouteEntry {
                router: a.name.clone(),
                destination: b_lan,
                via: via.addr,
                dev: local.ifname.clone(),
            });
        }
    }

    Ok(routes)
}

/// Finds the link connecting two routers, oriented as (local, peer).
fn direct_link<'a>(
    links: &'a [ResolvedLink],
    local: &str,
    peer: &str,
) -> Result<(&'a ResolvedEndpoint, &'a ResolvedEndpoint), TopologyError> {
    for link in links {
        if link.a.node == local && link.b.node == peer {
            return Ok((&link.a, &link.b));
        }
        if link.b.node == local && link.a.node == peer {
            return Ok((&link.b, &link.a));
        }
    }
    Err(TopologyError::NoDirectLink {
        a: local.to_string(),
        b: peer.to_string(),
    })
}
