// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Domain Models
//!
//! Value objects shared by the ingress, cluster and component modules.
//!
//! # Value Objects with Invariants
//!
//! - [`CidrBlock`] - IPv4/IPv6 range in CIDR notation, prefix mandatory
//! - [`Port`] - Transport port (1-65535)
//! - [`SubnetLayout`] - Subnet group of a network layout
//! - [`ResourceHandle`] - Opaque reference to a provisioned resource

pub mod network;
pub mod resource;

pub use network::{CidrBlock, NetworkError, Port, SubnetKind, SubnetLayout};
pub use resource::{ResourceHandle, ResourceKind};
