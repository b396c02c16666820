// Copyright (c) 2025 - Cowboy AI, Inc.
//! Replica-Set Cluster Topology
//!
//! Plans a variable-size set of database nodes, resolves their addresses
//! through a provisioning collaborator and derives the two artifacts that
//! depend on those addresses.
//!
//! # Phases
//!
//! ```text
//! plan(n)            pure:   [S1, S2, ..., S(n-1), P(n)]
//!   ↓
//! resolve_addresses  impure: provider called once per node, in plan order
//!   ↓
//! render_primary_bootstrap / connection_descriptor   pure
//! ```
//!
//! # Primary Placement
//!
//! The primary is always the last node. Secondaries are provisioned first so
//! that every secondary address is known when the primary's bootstrap script
//! is rendered. This is a static placement policy, not an election.
//!
//! # Bootstrap Template Format
//!
//! A template is plain text containing the token [`CLUSTER_IPS_PLACEHOLDER`].
//! The first occurrence is replaced by ` "<addr>" ` for every secondary in
//! ordinal order, concatenated. Nothing else in the template is interpreted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::errors::{DeploymentError, DeploymentResult};

/// Token replaced by the quoted secondary address list
pub const CLUSTER_IPS_PLACEHOLDER: &str = "{{CLUSTER_IPS_ARRAY}}";

/// Role of a node in the replica set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Primary,
    Secondary,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Primary => write!(f, "primary"),
            NodeRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// One planned cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    ordinal: usize,
    role: NodeRole,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    address: Option<String>,
}

impl NodeSpec {
    /// Ordinal, 1-based
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn is_primary(&self) -> bool {
        self.role == NodeRole::Primary
    }

    /// Assigned address; empty strings count as unset
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref().filter(|a| !a.trim().is_empty())
    }

    pub fn is_resolved(&self) -> bool {
        self.address().is_some()
    }

    fn resolved_address(&self) -> DeploymentResult<&str> {
        self.address().ok_or(DeploymentError::UnresolvedAddress {
            ordinal: self.ordinal,
        })
    }
}

/// Source of node addresses
///
/// Implementations create the compute resource for `node` and return its
/// address. `topology` reflects every node resolved so far, so when the
/// primary is requested all secondary addresses are available.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    async fn provision_node(
        &self,
        node: &NodeSpec,
        topology: &ClusterTopology,
    ) -> DeploymentResult<String>;
}

/// Ordered set of replica-set nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    nodes: Vec<NodeSpec>,
}

impl ClusterTopology {
    /// Plan a cluster of `desired_size` nodes
    ///
    /// # Invariants
    /// - Exactly `desired_size` nodes, ordinals `1..=desired_size`
    /// - Exactly one primary, always last
    pub fn plan(desired_size: usize) -> DeploymentResult<Self> {
        if desired_size == 0 {
            return Err(DeploymentError::InvalidClusterSize(desired_size));
        }

        let nodes = (1..=desired_size)
            .map(|ordinal| NodeSpec {
                ordinal,
                role: if ordinal == desired_size {
                    NodeRole::Primary
                } else {
                    NodeRole::Secondary
                },
                address: None,
            })
            .collect();

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Secondaries in ordinal order
    pub fn secondaries(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.iter().filter(|n| !n.is_primary())
    }

    pub fn primary(&self) -> Option<&NodeSpec> {
        self.nodes.last().filter(|n| n.is_primary())
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.nodes.iter().all(NodeSpec::is_resolved)
    }

    /// Record the address of node `ordinal`
    pub fn assign_address(
        &mut self,
        ordinal: usize,
        address: impl Into<String>,
    ) -> DeploymentResult<()> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.ordinal == ordinal)
            .ok_or(DeploymentError::UnknownNode(ordinal))?;

        node.address = Some(address.into());
        Ok(())
    }

    /// Resolve every address through `provider`, in plan order
    ///
    /// Stops at the first provider error. Nodes resolved before the error
    /// keep their addresses.
    pub async fn resolve_addresses<P>(&mut self, provider: &P) -> DeploymentResult<()>
    where
        P: AddressProvider + ?Sized,
    {
        for idx in 0..self.nodes.len() {
            let node = self.nodes[idx].clone();
            let address = provider.provision_node(&node, self).await?;

            if address.trim().is_empty() {
                return Err(DeploymentError::UnresolvedAddress {
                    ordinal: node.ordinal,
                });
            }

            debug!(
                "Resolved {} node {} to {}",
                node.role, node.ordinal, address
            );
            self.nodes[idx].address = Some(address);
        }

        Ok(())
    }

    /// Quoted, space-padded secondary address list
    fn secondary_address_array(&self) -> DeploymentResult<String> {
        self.secondaries()
            .map(|node| {
                node.resolved_address()
                    .map(|address| format!(" \"{}\" ", address))
            })
            .collect()
    }

    /// Substitute the secondary address list into `template`
    ///
    /// # Errors
    /// - [`DeploymentError::UnresolvedAddress`] if any secondary has no address
    pub fn render_primary_bootstrap(&self, template: &str) -> DeploymentResult<String> {
        let addresses = self.secondary_address_array()?;

        if !template.contains(CLUSTER_IPS_PLACEHOLDER) {
            warn!(
                "Bootstrap template has no {} placeholder, leaving it unchanged",
                CLUSTER_IPS_PLACEHOLDER
            );
            return Ok(template.to_string());
        }

        Ok(template.replacen(CLUSTER_IPS_PLACEHOLDER, &addresses, 1))
    }

    /// `addr:port` for every secondary, then the primary, comma separated
    ///
    /// # Errors
    /// - [`DeploymentError::UnresolvedAddress`] if any node has no address
    pub fn connection_descriptor(&self, port: u16) -> DeploymentResult<String> {
        let secondaries = self.secondaries();
        let primary = self.primary().into_iter();

        let pairs = secondaries
            .chain(primary)
            .map(|node| {
                node.resolved_address()
                    .map(|address| format!("{}:{}", address, port))
            })
            .collect::<DeploymentResult<Vec<_>>>()?;

        Ok(pairs.join(","))
    }

    /// All resolved addresses in plan order
    pub fn addresses(&self) -> DeploymentResult<Vec<String>> {
        self.nodes
            .iter()
            .map(|node| node.resolved_address().map(str::to_string))
            .collect()
    }
}
