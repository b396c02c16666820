// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4, 0-128 for IPv6)")]
    InvalidPrefixLength(u8),

    #[error("Invalid port: {0} (must be 1-65535)")]
    InvalidPort(u32),
}

/// CIDR block value object
///
/// An IPv4 or IPv6 address range in CIDR notation. Used for the deployment's
/// internal range, the external allow-list and subnet layouts.
///
/// Invariants:
/// - Valid IP address format
/// - Prefix length is mandatory and within range for the IP version
///
/// # Examples
///
/// ```rust
/// use cim_deployment::domain::CidrBlock;
///
/// let block = CidrBlock::new("10.0.10.0/23").unwrap();
/// assert_eq!(block.prefix_length(), 23);
/// assert_eq!(block.host(4).unwrap().to_string(), "10.0.10.4");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock {
    address: IpAddr,
    prefix_length: u8,
}

impl CidrBlock {
    /// Create a new CIDR block from `address/prefix` notation
    ///
    /// # Invariants
    /// - Prefix must be present
    /// - Prefix 0-32 for IPv4, 0-128 for IPv6
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref().trim();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = IpAddr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_length)
    }

    /// Create from separate address and prefix
    pub fn from_parts(address: IpAddr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > Self::max_prefix(&address) {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        Ok(Self {
            address,
            prefix_length,
        })
    }

    /// IPv4 block from octets; prefixes above 32 are clamped
    pub fn ipv4(address: Ipv4Addr, prefix_length: u8) -> Self {
        Self {
            address: IpAddr::V4(address),
            prefix_length: prefix_length.min(32),
        }
    }

    /// The whole IPv4 space (`0.0.0.0/0`)
    pub fn any_ipv4() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            prefix_length: 0,
        }
    }

    fn max_prefix(address: &IpAddr) -> u8 {
        match address {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    /// Get the address part as written
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Get the prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    /// Check if this is an IPv4 block
    pub fn is_ipv4(&self) -> bool {
        matches!(self.address, IpAddr::V4(_))
    }

    /// Network address (host bits cleared)
    pub fn network_address(&self) -> IpAddr {
        match self.address {
            IpAddr::V4(v4) => {
                let bits = u32::from(v4) & mask_v4(self.prefix_length);
                IpAddr::V4(Ipv4Addr::from(bits))
            }
            IpAddr::V6(v6) => {
                let bits = u128::from(v6) & mask_v6(self.prefix_length);
                IpAddr::V6(Ipv6Addr::from(bits))
            }
        }
    }

    /// Address at `offset` from the network address, if it lies in the block
    pub fn host(&self, offset: u128) -> Option<IpAddr> {
        let host_bits = u32::from(Self::max_prefix(&self.address) - self.prefix_length);
        if host_bits < 128 && offset >= (1u128 << host_bits) {
            return None;
        }

        match self.network_address() {
            IpAddr::V4(base) => {
                let offset = u32::try_from(offset).ok()?;
                u32::from(base)
                    .checked_add(offset)
                    .map(|bits| IpAddr::V4(Ipv4Addr::from(bits)))
            }
            IpAddr::V6(base) => u128::from(base)
                .checked_add(offset)
                .map(|bits| IpAddr::V6(Ipv6Addr::from(bits))),
        }
    }

    /// Check whether an address falls inside this block
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.address, ip) {
            (IpAddr::V4(_), IpAddr::V4(candidate)) => {
                let mask = mask_v4(self.prefix_length);
                let base = u32::from(self.network_address_v4());
                u32::from(candidate) & mask == base
            }
            (IpAddr::V6(net), IpAddr::V6(candidate)) => {
                let mask = mask_v6(self.prefix_length);
                u128::from(net) & mask == u128::from(candidate) & mask
            }
            _ => false,
        }
    }

    fn network_address_v4(&self) -> Ipv4Addr {
        match self.network_address() {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Get as CIDR notation string
    pub fn as_cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix_length)
    }
}

fn mask_v4(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_v6(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cidr())
    }
}

impl FromStr for CidrBlock {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CidrBlock {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CidrBlock> for String {
    fn from(block: CidrBlock) -> Self {
        block.as_cidr()
    }
}

/// Transport port value object
///
/// Invariants:
/// - Valid port range (1-65535); port 0 is reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port
    pub const MIN: u32 = 1;

    /// Maximum valid port
    pub const MAX: u32 = 65535;

    /// Create a new port with validation
    pub fn new(port: u32) -> Result<Self, NetworkError> {
        if !(Self::MIN..=Self::MAX).contains(&port) {
            return Err(NetworkError::InvalidPort(port));
        }

        // In range, so the narrowing cannot fail
        u16::try_from(port)
            .map(Self)
            .map_err(|_| NetworkError::InvalidPort(port))
    }

    /// Get the port value
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Port {
    type Error = NetworkError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u32 {
    fn from(port: Port) -> Self {
        u32::from(port.0)
    }
}

/// Subnet placement class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    /// Routable from the internet
    Public,
    /// Private, outbound traffic through a NAT gateway
    PrivateWithEgress,
}

impl fmt::Display for SubnetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetKind::Public => write!(f, "public"),
            SubnetKind::PrivateWithEgress => write!(f, "private-with-egress"),
        }
    }
}

/// One subnet group in a network layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetLayout {
    /// Subnet group name
    pub name: String,
    /// Prefix length of each subnet in the group
    pub cidr_mask: u8,
    /// Placement class
    pub kind: SubnetKind,
}

impl SubnetLayout {
    /// Create a subnet layout entry
    pub fn new(name: impl Into<String>, cidr_mask: u8, kind: SubnetKind) -> Self {
        Self {
            name: name.into(),
            cidr_mask,
            kind,
        }
    }

    /// Two /27 groups: private application subnets and public subnets
    pub fn default_layout() -> Vec<Self> {
        vec![
            Self::new("private-application", 27, SubnetKind::PrivateWithEgress),
            Self::new("public", 27, SubnetKind::Public),
        ]
    }
}
