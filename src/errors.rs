// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for deployment assembly

use thiserror::Error;

use crate::state_machine::TransitionError;

/// Errors that can occur while planning or materializing a deployment
#[derive(Debug, Error)]
pub enum DeploymentError {
    /// Malformed ingress rule input
    #[error("Invalid ingress rule spec: {0}")]
    InvalidRuleSpec(String),

    /// Cluster size below the minimum of one node
    #[error("Invalid cluster size: {0} (must be at least 1)")]
    InvalidClusterSize(usize),

    /// Topology artifact requested before the node's address was known
    #[error("Address of cluster node {ordinal} is not resolved")]
    UnresolvedAddress { ordinal: usize },

    /// Node ordinal outside the planned topology
    #[error("Unknown cluster node ordinal: {0}")]
    UnknownNode(usize),

    /// Component declared a dependency that was never registered
    #[error("Component '{component}' depends on unknown component '{dependency}'")]
    UnknownDependency {
        component: String,
        dependency: String,
    },

    /// Declared dependency graph contains a cycle
    #[error("Dependency cycle detected among components: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),

    /// Component registered twice under the same identifier
    #[error("Component already registered: {0}")]
    DuplicateComponent(String),

    /// Component tried to read outputs of a component it does not depend on
    #[error("Component '{component}' did not declare a dependency on '{dependency}'")]
    UndeclaredDependency {
        component: String,
        dependency: String,
    },

    /// Output key absent (or of another type) on a materialized component
    #[error("Component '{component}' has no {kind} output named '{key}'")]
    MissingOutput {
        component: String,
        key: String,
        kind: &'static str,
    },

    /// Component creation failed; the remaining pass was aborted
    #[error("Materialization of component '{component}' failed: {source}")]
    MaterializationFailure {
        component: String,
        #[source]
        source: Box<DeploymentError>,
    },

    /// Component lifecycle transition rejected
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] TransitionError),

    /// Provisioning backend reported an error
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// Template could not be read
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for deployment operations
pub type DeploymentResult<T> = Result<T, DeploymentError>;

impl From<serde_json::Error> for DeploymentError {
    fn from(err: serde_json::Error) -> Self {
        DeploymentError::Serialization(err.to_string())
    }
}

impl DeploymentError {
    /// Whether this error describes the dependency graph itself rather than
    /// a failure while creating a component
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            DeploymentError::UnknownDependency { .. }
                | DeploymentError::CyclicDependency(_)
                | DeploymentError::DuplicateComponent(_)
        )
    }
}
