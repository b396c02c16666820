// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dependency-ordered deployment assembly
//!
//! This crate plans a multi-component deployment (network, database replica
//! set, search cluster, container services), orders the components by their
//! declared dependencies, and threads each component's outputs into the
//! components that depend on it. Resource creation is delegated to a
//! [`Provisioner`] backend.
//!
//! # Modules
//!
//! - [`ingress`]: ports × protocols × scoped source ranges → firewall rules
//! - [`cluster`]: replica-set node plan, address resolution, bootstrap rendering
//! - [`assembler`]: graph validation, topological order, materialization
//! - [`stacks`]: the concrete components of the log-collection environment
//! - [`environment`]: configuration and wiring

pub mod assembler;
pub mod cluster;
pub mod component;
pub mod domain;
pub mod environment;
pub mod errors;
pub mod ingress;
pub mod provisioner;
pub mod stacks;
pub mod state_machine;
pub mod templates;

// Re-export commonly used types
pub use assembler::{Assembler, AssemblyReport};
pub use cluster::{AddressProvider, ClusterTopology, NodeRole, NodeSpec};
pub use component::{Component, ComponentId, ComponentOutputs, ComponentStatus, DependencyOutputs, OutputValue};
pub use environment::{assemble, EnvironmentConfig};
pub use errors::{DeploymentError, DeploymentResult};
pub use ingress::{IngressMatrix, IngressRule, IngressSpec};
pub use provisioner::{InMemoryProvisioner, Provisioner};
pub use templates::{DirectoryTemplateSource, StaticTemplates, TemplateSource};
