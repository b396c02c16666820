// Copyright (c) 2025 - Cowboy AI, Inc.
//! Ingress Matrix Builder
//!
//! Expands compact per-component port specifications into the explicit list
//! of firewall rules the provisioning backend applies.
//!
//! ```text
//! IngressSpec { ports: [80, 443], protocols: [Tcp, Udp], scope: Internal }
//!     ↓ build
//! tcp/80  udp/80  tcp/443  udp/443   (all from the internal range)
//! ```
//!
//! Expansion order is spec → port → protocol. Rules that repeat an earlier
//! `(port, protocol, source range, direction)` tuple are dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::domain::{CidrBlock, Port};
use crate::errors::{DeploymentError, DeploymentResult};

/// Transport protocol of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    /// Every protocol
    All,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::All => write!(f, "all"),
        }
    }
}

/// Traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

/// Which source range class a rule was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// The deployment's own address range
    Internal,
    /// The externally supplied allow-list
    External,
}

/// Port component of an expanded rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePort {
    Single(Port),
    AllPorts,
}

impl fmt::Display for RulePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePort::Single(port) => write!(f, "{}", port),
            RulePort::AllPorts => write!(f, "*"),
        }
    }
}

/// Ports requested by a spec entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSet {
    /// Explicit port numbers, validated during [`build`]
    List(Vec<u32>),
    /// Every port
    All,
}

impl PortSet {
    /// Explicit list from a slice
    pub fn list(ports: &[u32]) -> Self {
        PortSet::List(ports.to_vec())
    }

    fn expand(&self) -> DeploymentResult<Vec<RulePort>> {
        match self {
            PortSet::All => Ok(vec![RulePort::AllPorts]),
            PortSet::List(ports) => ports
                .iter()
                .map(|&port| {
                    Port::new(port)
                        .map(RulePort::Single)
                        .map_err(|e| DeploymentError::InvalidRuleSpec(e.to_string()))
                })
                .collect(),
        }
    }
}

/// Compact rule specification: ports × protocols from one source range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSpec {
    pub ports: PortSet,
    pub protocols: Vec<Protocol>,
    pub source_range: CidrBlock,
    pub direction: Direction,
    pub scope: Scope,
}

impl IngressSpec {
    /// Create an ingress-direction spec
    pub fn new(
        ports: PortSet,
        protocols: Vec<Protocol>,
        source_range: CidrBlock,
        scope: Scope,
    ) -> Self {
        Self {
            ports,
            protocols,
            source_range,
            direction: Direction::Ingress,
            scope,
        }
    }

    /// Same spec, other direction
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }
}

/// One explicit firewall rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub port: RulePort,
    pub source_range: CidrBlock,
    pub direction: Direction,
    pub scope: Scope,
}

impl IngressRule {
    fn dedup_key(&self) -> (RulePort, Protocol, CidrBlock, Direction) {
        (self.port, self.protocol, self.source_range, self.direction)
    }

    /// Human readable description handed to the backend
    pub fn description(&self) -> String {
        let peer = match self.direction {
            Direction::Ingress => "from",
            Direction::Egress => "to",
        };
        format!(
            "allow {}/{} {} {} ({:?})",
            self.protocol, self.port, peer, self.source_range, self.scope
        )
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Expand specs into explicit rules
///
/// # Errors
/// - [`DeploymentError::InvalidRuleSpec`] when a port is outside 1-65535 or
///   a spec has no protocols
pub fn build(specs: &[IngressSpec]) -> DeploymentResult<Vec<IngressRule>> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();

    for spec in specs {
        if spec.protocols.is_empty() {
            return Err(DeploymentError::InvalidRuleSpec(format!(
                "no protocols given for source range {}",
                spec.source_range
            )));
        }

        for port in spec.ports.expand()? {
            for &protocol in &spec.protocols {
                let rule = IngressRule {
                    protocol,
                    port,
                    source_range: spec.source_range,
                    direction: spec.direction,
                    scope: spec.scope,
                };

                if seen.insert(rule.dedup_key()) {
                    rules.push(rule);
                } else {
                    debug!("Dropping duplicate ingress rule: {}", rule);
                }
            }
        }
    }

    Ok(rules)
}

/// Builder that pairs each scope with its source range
///
/// Specs created through [`IngressMatrix::internal`] always use the internal
/// range and specs from [`IngressMatrix::external`] always use the external
/// allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngressMatrix {
    internal_range: CidrBlock,
    external_range: CidrBlock,
}

impl IngressMatrix {
    pub fn new(internal_range: CidrBlock, external_range: CidrBlock) -> Self {
        Self {
            internal_range,
            external_range,
        }
    }

    pub fn internal_range(&self) -> CidrBlock {
        self.internal_range
    }

    pub fn external_range(&self) -> CidrBlock {
        self.external_range
    }

    /// Spec sourced from the internal range
    pub fn internal(&self, ports: PortSet, protocols: &[Protocol]) -> IngressSpec {
        IngressSpec::new(ports, protocols.to_vec(), self.internal_range, Scope::Internal)
    }

    /// Spec sourced from the external allow-list
    pub fn external(&self, ports: PortSet, protocols: &[Protocol]) -> IngressSpec {
        IngressSpec::new(ports, protocols.to_vec(), self.external_range, Scope::External)
    }

    /// Expand specs, see [`build`]
    pub fn build(&self, specs: &[IngressSpec]) -> DeploymentResult<Vec<IngressRule>> {
        build(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn internal() -> CidrBlock {
        CidrBlock::new("10.0.0.0/23").unwrap()
    }

    fn external() -> CidrBlock {
        CidrBlock::new("203.0.113.10/32").unwrap()
    }

    #[test]
    fn test_single_protocol_expansion() {
        let spec = IngressSpec::new(PortSet::list(&[80, 443]), vec![Protocol::Tcp], internal(), Scope::Internal);
        let rules = build(&[spec]).unwrap();

        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.protocol == Protocol::Tcp));
        assert!(rules.iter().all(|r| r.source_range == internal()));
        assert!(rules.iter().all(|r| r.direction == Direction::Ingress));
    }

    #[test]
    fn test_expansion_order_is_port_then_protocol() {
        let matrix = IngressMatrix::new(internal(), external());
        let rules = build(&[matrix.internal(PortSet::list(&[80, 443]), &[Protocol::Tcp, Protocol::Udp])]).unwrap();

        let rendered: Vec<String> = rules
            .iter()
            .map(|r| format!("{}/{}", r.protocol, r.port))
            .collect();
        assert_eq!(rendered, vec!["tcp/80", "udp/80", "tcp/443", "udp/443"]);
    }

    #[test]
    fn test_scopes_keep_their_ranges() {
        let matrix = IngressMatrix::new(internal(), external());
        let rules = matrix
            .build(&[
                matrix.internal(PortSet::list(&[80]), &[Protocol::Tcp]),
                matrix.external(PortSet::list(&[80]), &[Protocol::Tcp]),
            ])
            .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].scope, Scope::Internal);
        assert_eq!(rules[0].source_range, internal());
        assert_eq!(rules[1].scope, Scope::External);
        assert_eq!(rules[1].source_range, external());
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let matrix = IngressMatrix::new(internal(), external());
        let rules = build(&[
            matrix.internal(PortSet::list(&[80, 80]), &[Protocol::Tcp]),
            matrix.internal(PortSet::list(&[80, 9000]), &[Protocol::Tcp]),
        ])
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].port, RulePort::Single(Port::new(9000).unwrap()));
    }

    #[test]
    fn test_same_port_other_direction_is_kept() {
        let spec = IngressSpec::new(PortSet::All, vec![Protocol::All], CidrBlock::any_ipv4(), Scope::External);
        let rules = build(&[spec.clone(), spec.with_direction(Direction::Egress)]).unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].port, RulePort::AllPorts);
        assert_eq!(rules[1].direction, Direction::Egress);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let matrix = IngressMatrix::new(internal(), external());
        let result = build(&[matrix.internal(PortSet::list(&[80, 0]), &[Protocol::Tcp])]);
        assert!(matches!(result, Err(DeploymentError::InvalidRuleSpec(_))));

        let result = build(&[matrix.internal(PortSet::list(&[65536]), &[Protocol::Tcp])]);
        assert!(matches!(result, Err(DeploymentError::InvalidRuleSpec(_))));
    }

    #[test]
    fn test_empty_protocols_rejected() {
        let matrix = IngressMatrix::new(internal(), external());
        let result = build(&[matrix.internal(PortSet::list(&[80]), &[])]);
        assert!(matches!(result, Err(DeploymentError::InvalidRuleSpec(_))));
    }

    #[test]
    fn test_empty_port_list_yields_nothing() {
        let matrix = IngressMatrix::new(internal(), external());
        let rules = build(&[matrix.external(PortSet::list(&[]), &[Protocol::Tcp])]).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_rule_description() {
        let matrix = IngressMatrix::new(internal(), external());
        let rules = build(&[matrix.internal(PortSet::list(&[27017]), &[Protocol::Tcp])]).unwrap();
        assert_eq!(
            rules[0].description(),
            "allow tcp/27017 from 10.0.0.0/23 (Internal)"
        );
    }
}
