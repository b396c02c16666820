// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Backend Interface
//!
//! The core decides *what* to create and *in which order*; the backend
//! behind [`Provisioner`] decides *how*. Every call is treated as atomic and
//! synchronous by the assembler: it is awaited to completion before the next
//! one is issued.
//!
//! Retries, rollback and credential handling belong to the backend.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{CidrBlock, ResourceHandle, SubnetKind, SubnetLayout};
use crate::errors::DeploymentResult;
use crate::ingress::{Direction, IngressRule, Protocol, RulePort};

pub use memory::{InMemoryProvisioner, ProvisionCall};

/// Virtual network request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub name: String,
    pub region: String,
    pub cidr: CidrBlock,
    pub max_azs: u8,
    pub nat_gateways: u8,
    pub subnets: Vec<SubnetLayout>,
    /// ACL entries applied to public subnets
    pub public_acl: Vec<AclEntry>,
}

/// Allow entry of a stateless subnet ACL
///
/// ACL entries are not built by the ingress matrix and carry no scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub name: String,
    /// Lower numbers are evaluated first
    pub rule_number: u16,
    pub cidr: CidrBlock,
    pub protocol: Protocol,
    pub port: RulePort,
    pub direction: Direction,
}

/// Firewall group request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRequest {
    pub name: String,
    pub network: ResourceHandle,
    pub allow_all_outbound: bool,
}

/// Identity role request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub name: String,
    /// Service principal allowed to assume the role
    pub assumed_by: String,
    pub managed_policies: Vec<String>,
}

/// Container scheduler cluster request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerClusterRequest {
    pub name: String,
    pub network: ResourceHandle,
}

/// Compute instance request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNodeRequest {
    pub name: String,
    pub network: ResourceHandle,
    pub subnet: SubnetKind,
    pub security_group: ResourceHandle,
    pub role: ResourceHandle,
    pub instance_profile: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key_name: Option<String>,
    /// Shell program run on first boot
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bootstrap_script: Option<String>,
}

/// Created compute instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNode {
    pub id: String,
    pub private_address: String,
}

/// Credentials for a managed cluster's master user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterUser {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// Managed search cluster request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedClusterRequest {
    pub name: String,
    pub network: ResourceHandle,
    pub security_group: ResourceHandle,
    pub engine_version: String,
    pub master_nodes: u32,
    pub data_nodes: u32,
    pub instance_type: String,
    pub master_user: MasterUser,
}

/// Created managed cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedCluster {
    pub id: String,
    pub endpoint: String,
}

/// Load balancer placed in front of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerRequest {
    pub name: String,
    pub internet_facing: bool,
    pub listener_port: u16,
    pub target_port: u16,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub security_group: Option<ResourceHandle>,
}

/// Where a service ships its container logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTarget {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
}

/// Scheduled container service request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub name: String,
    pub image: String,
    pub cluster: ResourceHandle,
    pub role: ResourceHandle,
    pub security_group: ResourceHandle,
    pub subnet: SubnetKind,
    pub container_ports: Vec<u16>,
    #[serde(skip_serializing, default)]
    pub environment: BTreeMap<String, String>,
    /// Replaces the image's entry point when non-empty
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entry_point: Vec<String>,
    pub assign_public_ip: bool,
    pub cpu: u32,
    pub memory_limit_mib: u32,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub load_balancers: Vec<LoadBalancerRequest>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub log_target: Option<LogTarget>,
}

/// Created service; one address per requested load balancer, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    pub load_balancer_addresses: Vec<String>,
}

/// Provisioning backend
///
/// Implementations talk to the real cloud API. [`InMemoryProvisioner`] is a
/// deterministic dry-run implementation.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create a virtual network with its subnet layout
    async fn create_network(&self, request: &NetworkRequest) -> DeploymentResult<ResourceHandle>;

    /// Create a firewall group inside a network
    async fn create_security_group(
        &self,
        request: &SecurityGroupRequest,
    ) -> DeploymentResult<ResourceHandle>;

    /// Create an identity role
    async fn create_role(&self, request: &RoleRequest) -> DeploymentResult<ResourceHandle>;

    /// Create a container scheduler cluster
    async fn create_container_cluster(
        &self,
        request: &ContainerClusterRequest,
    ) -> DeploymentResult<ResourceHandle>;

    /// Create a compute instance; its address is only known afterwards
    async fn create_compute_node(&self, request: &ComputeNodeRequest)
        -> DeploymentResult<ComputeNode>;

    /// Create a managed search cluster
    async fn create_managed_cluster(
        &self,
        request: &ManagedClusterRequest,
    ) -> DeploymentResult<ManagedCluster>;

    /// Create a container service and its load balancers
    async fn create_service(&self, request: &ServiceRequest) -> DeploymentResult<ServiceEndpoint>;

    /// Attach ingress rules to a security group
    async fn apply_ingress_rules(
        &self,
        security_group: &ResourceHandle,
        rules: &[IngressRule],
    ) -> DeploymentResult<()>;
}
