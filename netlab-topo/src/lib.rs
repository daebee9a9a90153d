//! Virtual network topology model
//!
//! Provides a declarative description of emulated networks (hosts, routers,
//! switches and the links between them), static route computation for router
//! meshes, and builders for the fixed experiment topologies.

pub mod addr;
pub mod builder;
pub mod route;
pub mod spec;

pub use addr::{IfaceAddr, Subnet};
pub use route::{RouteEntry, static_mesh_routes};
pub use spec::{Endpoint, LinkSpec, NodeKind, NodeSpec, TopologySpec};

use std::net::Ipv4Addr;

/// Errors produced while constructing or validating a topology.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("duplicate node name: {0}")]
    DuplicateNode(String),
    #[error("link references unknown node: {0}")]
    UnknownNode(String),
    #[error("address {addr} is assigned twice within subnet {subnet}")]
    DuplicateAddress { addr: Ipv4Addr, subnet: Subnet },
    #[error("switch {0} must not carry an address or default route")]
    AddressedSwitch(String),
    #[error("default route of {host} points at {gateway}, which is not an address of an attached node")]
    UnresolvedGateway { host: String, gateway: Ipv4Addr },
    #[error("link loss of {0}% is out of range (maximum is 100)")]
    LossOutOfRange(u8),
    #[error("routers {a} and {b} are not directly linked")]
    NoDirectLink { a: String, b: String },
    #[error("link endpoint {node}:{ifname} has no address, but a route needs one")]
    MissingLinkAddress { node: String, ifname: String },
    #[error("router {0} has no primary address, cannot derive its subnet")]
    MissingRouterAddress(String),
    #[error("invalid address or subnet: {0}")]
    InvalidAddress(String),
}
