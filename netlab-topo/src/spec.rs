use crate::addr::{IfaceAddr, Subnet};
use crate::TopologyError;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

/// A complete description of an emulated network: the set of nodes and the
/// links between them.
///
/// The spec is plain data. It is constructed once (by a builder or from a
/// JSON graph file), validated, handed to a runtime and discarded at
/// teardown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySpec {
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<LinkSpec>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    /// The node's primary address. Assigned to the node's first interface
    /// unless that interface carries an explicit address of its own.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IfaceAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_route: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    #[default]
    Host,
    Router,
    Switch,
}

/// One end of a link. The interface name defaults to `{node}-eth{n}`, where
/// `n` counts the node's interfaces in link declaration order.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifname: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<IfaceAddr>,
}

impl Endpoint {
    pub fn plain(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ifname: None,
            addr: None,
        }
    }

    pub fn named(node: impl Into<String>, ifname: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            ifname: Some(ifname.into()),
            addr: None,
        }
    }

    pub fn addressed(
        node: impl Into<String>,
        ifname: impl Into<String>,
        addr: IfaceAddr,
    ) -> Self {
        Self {
            node: node.into(),
            ifname: Some(ifname.into()),
            addr: Some(addr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: Endpoint,
    pub b: Endpoint,
    /// Percentage of packets dropped on this link (0..=100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_pct: Option<u8>,
}

impl LinkSpec {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        Self { a, b, loss_pct: None }
    }

    pub fn with_loss(a: Endpoint, b: Endpoint, loss_pct: u8) -> Self {
        Self { a, b, loss_pct: Some(loss_pct) }
    }
}

/// A link endpoint with its interface name and address resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub node: String,
    pub kind: NodeKind,
    pub ifname: String,
    pub addr: Option<IfaceAddr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    pub a: ResolvedEndpoint,
    pub b: ResolvedEndpoint,
    pub loss_pct: Option<u8>,
}

impl NodeSpec {
    pub fn host(name: impl Into<String>, ip: IfaceAddr, default_route: Option<Ipv4Addr>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Host,
            ip: Some(ip),
            default_route,
        }
    }

    pub fn router(name: impl Into<String>, ip: IfaceAddr) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Router,
            ip: Some(ip),
            default_route: None,
        }
    }

    pub fn switch(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Switch,
            ip: None,
            default_route: None,
        }
    }
}

impl TopologySpec {
    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn routers(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Router)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Host)
    }

    pub fn switches(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Switch)
    }

    /// Resolves every link's interface names and addresses.
    ///
    /// Missing interface names become `{node}-eth{n}` with `n` counting the
    /// node's interfaces in declaration order. A non-switch endpoint without
    /// an explicit address inherits the node's primary address, but only on
    /// the node's first interface.
    pub fn resolved_links(&self) -> Result<Vec<ResolvedLink>, TopologyError> {
        let mut iface_count: HashMap<&str, u32> = HashMap::new();
        let mut links = Vec::with_capacity(self.links.len());

        for link in &self.links {
            let a = self.resolve_endpoint(&link.a, &mut iface_count)?;
            let b = self.resolve_endpoint(&link.b, &mut iface_count)?;
            links.push(ResolvedLink {
                a,
                b,
                loss_pct: link.loss_pct,
            });
        }

        Ok(links)
    }

    fn resolve_endpoint<'a>(
        &'a self,
        endpoint: &Endpoint,
        iface_count: &mut HashMap<&'a str, u32>,
    ) -> Result<ResolvedEndpoint, TopologyError> {
        let node = self
            .node(&endpoint.node)
            .ok_or_else(|| TopologyError::UnknownNode(endpoint.node.clone()))?;

        let index = iface_count.entry(&node.name).or_insert(0);
        let ifname = endpoint
            .ifname
            .clone()
            .unwrap_or_else(|| format!("{}-eth{index}", node.name));

        let addr = match endpoint.addr {
            Some(addr) => Some(addr),
            // The primary address lands on the node's first interface
            None if *index == 0 && node.kind != NodeKind::Switch => node.ip,
            None => None,
        };

        *index += 1;
        Ok(ResolvedEndpoint {
            node: node.name.clone(),
            kind: node.kind,
            ifname,
            addr,
        })
    }

    /// Checks the topology's addressing invariants.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut names = HashSet::new();
        for node in &self.nodes {
            if node.name.is_empty() || !names.insert(node.name.as_str()) {
                return Err(TopologyError::DuplicateNode(node.name.clone()));
            }
            if node.kind == NodeKind::Switch && (node.ip.is_some() || node.default_route.is_some())
            {
                return Err(TopologyError::AddressedSwitch(node.name.clone()));
            }
        }

        for link in &self.links {
            if let Some(loss) = link.loss_pct {
                if loss > 100 {
                    return Err(TopologyError::LossOutOfRange(loss));
                }
            }
        }

        // Per-subnet address uniqueness, over the resolved interfaces
        let mut assigned: HashMap<Subnet, HashSet<Ipv4Addr>> = HashMap::new();
        for link in self.resolved_links()? {
            for endpoint in [&link.a, &link.b] {
                let Some(addr) = endpoint.addr else { continue };
                let subnet = addr.subnet();
                if !assigned.entry(subnet).or_default().insert(addr.addr) {
                    return Err(TopologyError::DuplicateAddress {
                        addr: addr.addr,
                        subnet,
                    });
                }
            }
        }

        // Default gateways must resolve to an address assigned in the host's
        // own subnet
        for node in &self.nodes {
            let Some(gateway) = node.default_route else { continue };
            let reachable = node.ip.is_some_and(|ip| {
                let subnet = ip.subnet();
                subnet.contains(gateway)
                    && assigned.get(&subnet).is_some_and(|addrs| addrs.contains(&gateway))
            });
            if !reachable {
                return Err(TopologyError::UnresolvedGateway {
                    host: node.name.clone(),
                    gateway,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> IfaceAddr {
        IfaceAddr::from_str(s).unwrap()
    }

    fn two_host_lan() -> TopologySpec {
        TopologySpec {
            nodes: vec![
                NodeSpec::router("r1", addr("10.0.0.1/24")),
                NodeSpec::host("h1", addr("10.0.0.2/24"), Some(Ipv4Addr::new(10, 0, 0, 1))),
                NodeSpec::switch("s1"),
            ],
            links: vec![
                LinkSpec::new(
                    Endpoint::plain("s1"),
                    Endpoint::addressed("r1", "r1-eth1", addr("10.0.0.1/24")),
                ),
                LinkSpec::new(Endpoint::plain("h1"), Endpoint::plain("s1")),
            ],
        }
    }

    #[test]
    fn valid_lan_passes_validation() {
        two_host_lan().validate().unwrap();
    }

    #[test]
    fn default_ifnames_are_numbered_per_node() {
        let links = two_host_lan().resolved_links().unwrap();
        assert_eq!(links[0].a.ifname, "s1-eth0");
        assert_eq!(links[1].a.ifname, "h1-eth0");
        assert_eq!(links[1].b.ifname, "s1-eth1");
    }

    #[test]
    fn primary_address_lands_on_first_interface_only() {
        let links = two_host_lan().resolved_links().unwrap();
        assert_eq!(links[1].a.addr, Some(addr("10.0.0.2/24")));
        assert_eq!(links[0].a.addr, None); // switches carry no addresses
        assert_eq!(links[1].b.addr, None);
    }

    #[test]
    fn duplicate_address_in_subnet_is_rejected() {
        let mut topo = two_host_lan();
        topo.nodes.push(NodeSpec::host("h2", addr("10.0.0.2/24"), None));
        topo.links
            .push(LinkSpec::new(Endpoint::plain("h2"), Endpoint::plain("s1")));

        assert!(matches!(
            topo.validate(),
            Err(TopologyError::DuplicateAddress { .. })
        ));
    }

    #[test]
    fn same_address_in_different_subnets_is_fine() {
        let mut topo = two_host_lan();
        topo.nodes.push(NodeSpec::host("h2", addr("10.9.0.2/24"), None));
        topo.links
            .push(LinkSpec::new(Endpoint::plain("h2"), Endpoint::plain("s1")));

        topo.validate().unwrap();
    }

    #[test]
    fn addressed_switch_is_rejected() {
        let mut topo = two_host_lan();
        topo.nodes.iter_mut().find(|n| n.name == "s1").unwrap().ip =
            Some(addr("10.0.0.9/24"));

        assert!(matches!(
            topo.validate(),
            Err(TopologyError::AddressedSwitch(_))
        ));
    }

    #[test]
    fn gateway_outside_subnet_is_rejected() {
        let mut topo = two_host_lan();
        topo.nodes
            .iter_mut()
            .find(|n| n.name == "h1")
            .unwrap()
            .default_route = Some(Ipv4Addr::new(10, 99, 0, 1));

        assert!(matches!(
            topo.validate(),
            Err(TopologyError::UnresolvedGateway { .. })
        ));
    }

    #[test]
    fn gateway_must_be_assigned_somewhere() {
        let mut topo = two_host_lan();
        // In the right subnet, but nobody owns this address
        topo.nodes
            .iter_mut()
            .find(|n| n.name == "h1")
            .unwrap()
            .default_route = Some(Ipv4Addr::new(10, 0, 0, 254));

        assert!(matches!(
            topo.validate(),
            Err(TopologyError::UnresolvedGateway { .. })
        ));
    }

    #[test]
    fn unknown_link_endpoint_is_rejected() {
        let mut topo = two_host_lan();
        topo.links
            .push(LinkSpec::new(Endpoint::plain("h9"), Endpoint::plain("s1")));

        assert!(matches!(topo.validate(), Err(TopologyError::UnknownNode(_))));
    }

    #[test]
    fn excessive_loss_is_rejected() {
        let mut topo = two_host_lan();
        topo.links[1].loss_pct = Some(101);

        assert!(matches!(
            topo.validate(),
            Err(TopologyError::LossOutOfRange(101))
        ));
    }

    #[test]
    fn spec_roundtrips_through_json() {
        let topo = two_host_lan();
        let json = serde_json::to_string(&topo).unwrap();
        let parsed: TopologySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, topo);
    }
}
