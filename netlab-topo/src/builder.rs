//! Builders for the fixed experiment topologies.

use crate::TopologyError;
use crate::addr::IfaceAddr;
use crate::spec::{Endpoint, LinkSpec, NodeSpec, TopologySpec};
use std::net::Ipv4Addr;

fn iface(addr: Ipv4Addr, prefix: u8) -> IfaceAddr {
    IfaceAddr::new(addr, prefix)
}

/// Three routers (ra, rb, rc) in three /24 subnets, each fronting a switch
/// with two hosts, and pairwise inter-router links forming a triangle.
///
/// Addressing:
/// - LANs: 10.0.0.0/24 (ra/s1/h1/h2), 10.1.0.0/24 (rb/s2/h3/h4),
///   10.2.0.0/24 (rc/s3/h5/h6); routers at .1, hosts at .2 and .3 with a
///   default route via their router.
/// - Inter-router: ra-rb on 10.100.0.0/24, rb-rc on 10.200.0.0/24,
///   rc-ra on 10.250.0.0/24.
pub fn router_triangle() -> TopologySpec {
    let lan = |third: u8, fourth: u8| iface(Ipv4Addr::new(10, third, 0, fourth), 24);
    let gw = |third: u8| Ipv4Addr::new(10, third, 0, 1);

    let nodes = vec![
        NodeSpec::router("ra", lan(0, 1)),
        NodeSpec::router("rb", lan(1, 1)),
        NodeSpec::router("rc", lan(2, 1)),
        NodeSpec::host("h1", lan(0, 2), Some(gw(0))),
        NodeSpec::host("h2", lan(0, 3), Some(gw(0))),
        NodeSpec::host("h3", lan(1, 2), Some(gw(1))),
        NodeSpec::host("h4", lan(1, 3), Some(gw(1))),
        NodeSpec::host("h5", lan(2, 2), Some(gw(2))),
        NodeSpec::host("h6", lan(2, 3), Some(gw(2))),
        NodeSpec::switch("s1"),
        NodeSpec::switch("s2"),
        NodeSpec::switch("s3"),
    ];

    let backbone = |net: u8, fourth: u8| iface(Ipv4Addr::new(10, net, 0, fourth), 24);
    let links = vec![
        // Router-switch links, one per subnet
        LinkSpec::new(
            Endpoint::plain("s1"),
            Endpoint::addressed("ra", "ra-eth1", lan(0, 1)),
        ),
        LinkSpec::new(
            Endpoint::plain("s2"),
            Endpoint::addressed("rb", "rb-eth1", lan(1, 1)),
        ),
        LinkSpec::new(
            Endpoint::plain("s3"),
            Endpoint::addressed("rc", "rc-eth1", lan(2, 1)),
        ),
        // The inter-router triangle
        LinkSpec::new(
            Endpoint::addressed("ra", "ra-eth2", backbone(100, 1)),
            Endpoint::addressed("rb", "rb-eth2", backbone(100, 2)),
        ),
        LinkSpec::new(
            Endpoint::addressed("rb", "rb-eth3", backbone(200, 1)),
            Endpoint::addressed("rc", "rc-eth2", backbone(200, 2)),
        ),
        LinkSpec::new(
            Endpoint::addressed("rc", "rc-eth3", backbone(250, 1)),
            Endpoint::addressed("ra", "ra-eth3", backbone(250, 2)),
        ),
        // Hosts behind their switches
        LinkSpec::new(Endpoint::plain("h1"), Endpoint::plain("s1")),
        LinkSpec::new(Endpoint::plain("h2"), Endpoint::plain("s1")),
        LinkSpec::new(Endpoint::plain("h3"), Endpoint::plain("s2")),
        LinkSpec::new(Endpoint::plain("h4"), Endpoint::plain("s2")),
        LinkSpec::new(Endpoint::plain("h5"), Endpoint::plain("s3")),
        LinkSpec::new(Endpoint::plain("h6"), Endpoint::plain("s3")),
    ];

    TopologySpec { nodes, links }
}

/// Four hosts in a single /24 split across two bridged switches, with the
/// configured loss percentage on the inter-switch link.
pub fn dumbbell(loss_pct: u8) -> Result<TopologySpec, TopologyError> {
    if loss_pct > 100 {
        return Err(TopologyError::LossOutOfRange(loss_pct));
    }

    let host_ip = |fourth: u8| iface(Ipv4Addr::new(10, 0, 0, fourth), 24);

    let nodes = vec![
        NodeSpec::host("h1", host_ip(1), None),
        NodeSpec::host("h2", host_ip(2), None),
        NodeSpec::host("h3", host_ip(3), None),
        NodeSpec::host("h4", host_ip(4), None),
        NodeSpec::switch("s1"),
        NodeSpec::switch("s2"),
    ];

    let links = vec![
        LinkSpec::with_loss(Endpoint::plain("s1"), Endpoint::plain("s2"), loss_pct),
        LinkSpec::new(
            Endpoint::plain("s1"),
            Endpoint::addressed("h1", "h1-eth1", host_ip(1)),
        ),
        LinkSpec::new(
            Endpoint::plain("s1"),
            Endpoint::addressed("h2", "h2-eth1", host_ip(2)),
        ),
        LinkSpec::new(
            Endpoint::plain("s2"),
            Endpoint::addressed("h3", "h3-eth2", host_ip(3)),
        ),
        LinkSpec::new(
            Endpoint::plain("s2"),
            Endpoint::addressed("h4", "h4-eth2", host_ip(4)),
        ),
    ];

    Ok(TopologySpec { nodes, links })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::route::static_mesh_routes;
    use crate::spec::NodeKind;
    use std::str::FromStr;

    #[test]
    fn triangle_shape_and_validity() {
        let topo = router_triangle();
        topo.validate().unwrap();

        assert_eq!(topo.routers().count(), 3);
        assert_eq!(topo.hosts().count(), 6);
        assert_eq!(topo.switches().count(), 3);
        assert_eq!(topo.links.len(), 12);
    }

    #[test]
    fn triangle_construction_is_deterministic() {
        assert_eq!(router_triangle(), router_triangle());
        assert_eq!(dumbbell(7).unwrap(), dumbbell(7).unwrap());
    }

    #[test]
    fn every_triangle_router_gets_exactly_two_routes() {
        let topo = router_triangle();
        let routes = static_mesh_routes(&topo).unwrap();

        assert_eq!(routes.len(), 6);
        for router in topo.routers() {
            let extra = routes.iter().filter(|r| r.router == router.name).count();
            assert_eq!(extra, 2, "{} should get two extra routes", router.name);
        }
    }

    #[test]
    fn triangle_routes_match_the_direct_links() {
        let routes = static_mesh_routes(&router_triangle()).unwrap();
        let expected = [
            ("ra", "10.1.0.0/24", "10.100.0.2", "ra-eth2"),
            ("ra", "10.2.0.0/24", "10.250.0.1", "ra-eth3"),
            ("rb", "10.0.0.0/24", "10.100.0.1", "rb-eth2"),
            ("rb", "10.2.0.0/24", "10.200.0.2", "rb-eth3"),
            ("rc", "10.0.0.0/24", "10.250.0.2", "rc-eth3"),
            ("rc", "10.1.0.0/24", "10.200.0.1", "rc-eth2"),
        ];

        for (router, destination, via, dev) in expected {
            assert!(
                routes.iter().any(|r| {
                    r.router == router
                        && r.destination.to_string() == destination
                        && r.via.to_string() == via
                        && r.dev == dev
                }),
                "missing route {router}: {destination} via {via} dev {dev}"
            );
        }
    }

    #[test]
    fn triangle_hosts_default_route_via_their_router() {
        let topo = router_triangle();
        for host in topo.hosts() {
            let gateway = host.default_route.expect("every host has a gateway");
            let subnet = host.ip.unwrap().subnet();
            let router = topo
                .routers()
                .find(|r| r.ip.unwrap().addr == gateway)
                .expect("gateway belongs to a router");
            assert!(subnet.contains(router.ip.unwrap().addr));
        }
    }

    #[test]
    fn dumbbell_loss_sits_on_the_inter_switch_link() {
        let topo = dumbbell(10).unwrap();
        topo.validate().unwrap();

        let lossy: Vec<_> = topo.links.iter().filter(|l| l.loss_pct.is_some()).collect();
        assert_eq!(lossy.len(), 1);
        assert_eq!(lossy[0].loss_pct, Some(10));
        assert_eq!(
            topo.node(&lossy[0].a.node).unwrap().kind,
            NodeKind::Switch
        );
        assert_eq!(
            topo.node(&lossy[0].b.node).unwrap().kind,
            NodeKind::Switch
        );
    }

    #[test]
    fn dumbbell_hosts_share_one_subnet() {
        let topo = dumbbell(0).unwrap();
        let subnet = crate::addr::Subnet::from_str("10.0.0.0/24").unwrap();
        for host in topo.hosts() {
            assert_eq!(host.ip.unwrap().subnet(), subnet);
        }
    }

    #[test]
    fn dumbbell_rejects_out_of_range_loss() {
        assert!(matches!(
            dumbbell(101),
            Err(TopologyError::LossOutOfRange(101))
        ));
    }
}
