use crate::TopologyError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An interface address: an IPv4 address plus the prefix length of the
/// subnet it lives in, e.g. `10.0.0.1/24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfaceAddr {
    pub addr: Ipv4Addr,
    pub prefix: u8,
}

impl IfaceAddr {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Self {
        Self { addr, prefix }
    }

    /// The subnet enclosing this address.
    pub fn subnet(&self) -> Subnet {
        Subnet::containing(self.addr, self.prefix)
    }
}

impl fmt::Display for IfaceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl FromStr for IfaceAddr {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = parse_cidr(s)?;
        Ok(Self { addr, prefix })
    }
}

/// An IPv4 subnet in CIDR notation (e.g. `10.0.0.0/24`).
///
/// The stored address is always the network address; constructing a subnet
/// from an arbitrary address inside it masks off the host bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    pub network: Ipv4Addr,
    pub prefix: u8,
}

impl Subnet {
    /// Returns the subnet with the given prefix length that contains `addr`.
    pub fn containing(addr: Ipv4Addr, prefix: u8) -> Self {
        let mask = prefix_mask(prefix);
        Self {
            network: Ipv4Addr::from_bits(addr.to_bits() & mask),
            prefix,
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = prefix_mask(self.prefix);
        addr.to_bits() & mask == self.network.to_bits()
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Subnet {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = parse_cidr(s)?;
        Ok(Self::containing(addr, prefix))
    }
}

fn prefix_mask(prefix: u8) -> u32 {
    debug_assert!(0 < prefix && prefix <= 32);
    u32::MAX << (32 - prefix)
}

// Parse CIDR syntax (e.g. 10.0.0.0/24); a missing prefix is interpreted as /32
fn parse_cidr(s: &str) -> Result<(Ipv4Addr, u8), TopologyError> {
    let invalid = |detail: &str| TopologyError::InvalidAddress(format!("{s}: {detail}"));

    let mut parts = s.split('/');
    let addr: Ipv4Addr = parts
        .next()
        .ok_or_else(|| invalid("empty string"))?
        .parse()
        .map_err(|_| invalid("not a valid IPv4 address"))?;

    let prefix: u8 = parts
        .next()
        .unwrap_or("32")
        .parse()
        .map_err(|_| invalid("prefix is not a valid unsigned integer"))?;
    if prefix == 0 {
        return Err(invalid("prefix cannot be 0"));
    }
    if prefix > 32 {
        return Err(invalid("prefix cannot be higher than 32"));
    }

    if parts.next().is_some() {
        return Err(invalid("trailing characters after prefix"));
    }

    Ok((addr, prefix))
}
