// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioned Resource Handles
//!
//! Handles are opaque references returned by the provisioning backend. The
//! core never interprets the identifier; it only threads handles from the
//! component that created them into the components that depend on them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of resource a handle points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Virtual network with its subnets
    Network,
    /// Firewall group that ingress rules are attached to
    SecurityGroup,
    /// Identity role assumed by nodes or tasks
    Role,
    /// Container scheduler cluster
    ContainerCluster,
    /// Single compute instance
    ComputeNode,
    /// Managed search cluster
    ManagedCluster,
    /// Scheduled container service
    Service,
}

impl ResourceKind {
    /// Short prefix used when naming identifiers of this kind
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Network => "net",
            ResourceKind::SecurityGroup => "sg",
            ResourceKind::Role => "role",
            ResourceKind::ContainerCluster => "cluster",
            ResourceKind::ComputeNode => "node",
            ResourceKind::ManagedCluster => "search",
            ResourceKind::Service => "svc",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Network => "network",
            ResourceKind::SecurityGroup => "security group",
            ResourceKind::Role => "role",
            ResourceKind::ContainerCluster => "container cluster",
            ResourceKind::ComputeNode => "compute node",
            ResourceKind::ManagedCluster => "managed cluster",
            ResourceKind::Service => "service",
        };
        write!(f, "{}", name)
    }
}

/// Opaque handle to a provisioned resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// What the handle refers to
    pub kind: ResourceKind,
    /// Backend identifier
    pub id: String,
}

impl ResourceHandle {
    /// Create a new handle
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Whether the handle is of the given kind
    pub fn is(&self, kind: ResourceKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        let handle = ResourceHandle::new(ResourceKind::SecurityGroup, "sg-0001");
        assert_eq!(handle.to_string(), "security group sg-0001");
        assert!(handle.is(ResourceKind::SecurityGroup));
        assert!(!handle.is(ResourceKind::Network));
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ResourceKind::ContainerCluster).unwrap();
        assert_eq!(json, "\"container_cluster\"");
    }
}
