// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Provisioning Backend
//!
//! Deterministic dry-run backend. Identifiers are sequential, node addresses
//! are allocated in order from the owning network's CIDR block (skipping the
//! first four, which cloud networks reserve), and DNS names are synthesized
//! from resource names. Every call is recorded so a dry run can be inspected
//! or printed.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{
    ComputeNode, ComputeNodeRequest, ContainerClusterRequest, ManagedCluster,
    ManagedClusterRequest, NetworkRequest, Provisioner, RoleRequest, SecurityGroupRequest,
    ServiceEndpoint, ServiceRequest,
};
use crate::domain::{CidrBlock, ResourceHandle, ResourceKind};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::ingress::IngressRule;

/// Offsets below this are reserved in every network
const FIRST_HOST_OFFSET: u128 = 4;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum ProvisionCall {
    CreateNetwork {
        name: String,
        handle: ResourceHandle,
    },
    CreateSecurityGroup {
        name: String,
        handle: ResourceHandle,
    },
    CreateRole {
        name: String,
        handle: ResourceHandle,
    },
    CreateContainerCluster {
        name: String,
        handle: ResourceHandle,
    },
    CreateComputeNode {
        name: String,
        id: String,
        private_address: String,
        bootstrapped: bool,
    },
    CreateManagedCluster {
        name: String,
        endpoint: String,
    },
    CreateService {
        name: String,
        addresses: Vec<String>,
    },
    ApplyIngressRules {
        security_group: String,
        rules: Vec<String>,
    },
}

impl ProvisionCall {
    /// Name of the resource the call created, if any
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            ProvisionCall::CreateNetwork { name, .. }
            | ProvisionCall::CreateSecurityGroup { name, .. }
            | ProvisionCall::CreateRole { name, .. }
            | ProvisionCall::CreateContainerCluster { name, .. }
            | ProvisionCall::CreateComputeNode { name, .. }
            | ProvisionCall::CreateManagedCluster { name, .. }
            | ProvisionCall::CreateService { name, .. } => Some(name),
            ProvisionCall::ApplyIngressRules { .. } => None,
        }
    }
}

#[derive(Debug)]
struct NetworkAllocation {
    cidr: CidrBlock,
    next_offset: u128,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    networks: HashMap<String, NetworkAllocation>,
    network_requests: BTreeMap<String, NetworkRequest>,
    calls: Vec<ProvisionCall>,
    bootstrap_scripts: BTreeMap<String, String>,
    services: BTreeMap<String, ServiceRequest>,
    ingress: HashMap<String, Vec<IngressRule>>,
}

impl State {
    fn handle(&mut self, kind: ResourceKind) -> ResourceHandle {
        self.next_id += 1;
        ResourceHandle::new(kind, format!("{}-{:04}", kind.id_prefix(), self.next_id))
    }
}

/// Deterministic dry-run [`Provisioner`]
#[derive(Debug)]
pub struct InMemoryProvisioner {
    dns_suffix: String,
    failing: HashSet<String>,
    state: Mutex<State>,
}

impl Default for InMemoryProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryProvisioner {
    pub fn new() -> Self {
        Self {
            dns_suffix: "internal".to_string(),
            failing: HashSet::new(),
            state: Mutex::new(State::default()),
        }
    }

    /// Use `suffix` for synthesized DNS names
    pub fn with_dns_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.dns_suffix = suffix.into();
        self
    }

    /// Make every request for a resource called `name` fail
    pub fn with_failure(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    fn state(&self) -> DeploymentResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| DeploymentError::Provisioning("provisioner state poisoned".to_string()))
    }

    fn check_failure(&self, name: &str) -> DeploymentResult<()> {
        if self.failing.contains(name) {
            warn!("Injected failure for resource {}", name);
            return Err(DeploymentError::Provisioning(format!(
                "injected failure creating {}",
                name
            )));
        }
        Ok(())
    }

    fn dns_name(&self, name: &str, service: &str) -> String {
        format!("{}.{}.{}", name.to_lowercase(), service, self.dns_suffix)
    }

    /// Every call recorded so far, in order
    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.state().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Bootstrap script handed to the compute node called `name`
    pub fn bootstrap_script(&self, name: &str) -> Option<String> {
        self.state()
            .ok()
            .and_then(|s| s.bootstrap_scripts.get(name).cloned())
    }

    /// Request that created the network called `name`
    pub fn network_request(&self, name: &str) -> Option<NetworkRequest> {
        self.state()
            .ok()
            .and_then(|s| s.network_requests.get(name).cloned())
    }

    /// Request that created the service called `name`
    pub fn service(&self, name: &str) -> Option<ServiceRequest> {
        self.state().ok().and_then(|s| s.services.get(name).cloned())
    }

    /// Environment handed to the service called `name`
    pub fn service_environment(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.service(name).map(|request| request.environment)
    }

    /// Rules attached to a security group so far
    pub fn ingress_rules(&self, security_group: &ResourceHandle) -> Vec<IngressRule> {
        self.state()
            .ok()
            .and_then(|s| s.ingress.get(&security_group.id).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provisioner for InMemoryProvisioner {
    async fn create_network(&self, request: &NetworkRequest) -> DeploymentResult<ResourceHandle> {
        self.check_failure(&request.name)?;
        let mut state = self.state()?;

        let handle = state.handle(ResourceKind::Network);
        state.networks.insert(
            handle.id.clone(),
            NetworkAllocation {
                cidr: request.cidr,
                next_offset: FIRST_HOST_OFFSET,
            },
        );
        state
            .network_requests
            .insert(request.name.clone(), request.clone());
        state.calls.push(ProvisionCall::CreateNetwork {
            name: request.name.clone(),
            handle: handle.clone(),
        });

        debug!("Created network {} ({})", handle.id, request.cidr);
        Ok(handle)
    }

    async fn create_security_group(
        &self,
        request: &SecurityGroupRequest,
    ) -> DeploymentResult<ResourceHandle> {
        self.check_failure(&request.name)?;
        let mut state = self.state()?;

        if !state.networks.contains_key(&request.network.id) {
            return Err(DeploymentError::Provisioning(format!(
                "unknown network {}",
                request.network.id
            )));
        }

        let handle = state.handle(ResourceKind::SecurityGroup);
        state.calls.push(ProvisionCall::CreateSecurityGroup {
            name: request.name.clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    async fn create_role(&self, request: &RoleRequest) -> DeploymentResult<ResourceHandle> {
        self.check_failure(&request.name)?;
        let mut state = self.state()?;

        let handle = state.handle(ResourceKind::Role);
        state.calls.push(ProvisionCall::CreateRole {
            name: request.name.clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    async fn create_container_cluster(
        &self,
        request: &ContainerClusterRequest,
    ) -> DeploymentResult<ResourceHandle> {
        self.check_failure(&request.name)?;
        let mut state = self.state()?;

        let handle = state.handle(ResourceKind::ContainerCluster);
        state.calls.push(ProvisionCall::CreateContainerCluster {
            name: request.name.clone(),
            handle: handle.clone(),
        });
        Ok(handle)
    }

    async fn create_compute_node(
        &self,
        request: &ComputeNodeRequest,
    ) -> DeploymentResult<ComputeNode> {
        self.check_failure(&request.name)?;
        let mut state = self.state()?;

        let allocation = state
            .networks
            .get_mut(&request.network.id)
            .ok_or_else(|| {
                DeploymentError::Provisioning(format!("unknown network {}", request.network.id))
            })?;

        let address = allocation.cidr.host(allocation.next_offset).ok_or_else(|| {
            DeploymentError::Provisioning(format!("network {} is exhausted", allocation.cidr))
        })?;
        allocation.next_offset += 1;

        let handle = state.handle(ResourceKind::ComputeNode);
        let node = ComputeNode {
            id: handle.id,
            private_address: address.to_string(),
        };

        if let Some(script) = &request.bootstrap_script {
            state
                .bootstrap_scripts
                .insert(request.name.clone(), script.clone());
        }
        state.calls.push(ProvisionCall::CreateComputeNode {
            name: request.name.clone(),
            id: node.id.clone(),
            private_address: node.private_address.clone(),
            bootstrapped: request.bootstrap_script.is_some(),
        });

        debug!("Created compute node {} at {}", node.id, node.private_address);
        Ok(node)
    }

    async fn create_managed_cluster(
        &self,
        request: &ManagedClusterRequest,
    ) -> DeploymentResult<ManagedCluster> {
        self.check_failure(&request.name)?;
        let mut state = self.state()?;

        let handle = state.handle(ResourceKind::ManagedCluster);
        let cluster = ManagedCluster {
            id: handle.id,
            endpoint: self.dns_name(&request.name, "search"),
        };
        state.calls.push(ProvisionCall::CreateManagedCluster {
            name: request.name.clone(),
            endpoint: cluster.endpoint.clone(),
        });
        Ok(cluster)
    }

    async fn create_service(&self, request: &ServiceRequest) -> DeploymentResult<ServiceEndpoint> {
        self.check_failure(&request.name)?;
        let mut state = self.state()?;

        let handle = state.handle(ResourceKind::Service);
        let addresses: Vec<String> = request
            .load_balancers
            .iter()
            .map(|lb| {
                let zone = if lb.internet_facing { "elb" } else { "elb-internal" };
                self.dns_name(&lb.name, zone)
            })
            .collect();

        state
            .services
            .insert(request.name.clone(), request.clone());
        state.calls.push(ProvisionCall::CreateService {
            name: request.name.clone(),
            addresses: addresses.clone(),
        });

        Ok(ServiceEndpoint {
            id: handle.id,
            load_balancer_addresses: addresses,
        })
    }

    async fn apply_ingress_rules(
        &self,
        security_group: &ResourceHandle,
        rules: &[IngressRule],
    ) -> DeploymentResult<()> {
        if !security_group.is(ResourceKind::SecurityGroup) {
            return Err(DeploymentError::Provisioning(format!(
                "{} is not a security group",
                security_group
            )));
        }

        let mut state = self.state()?;
        state
            .ingress
            .entry(security_group.id.clone())
            .or_default()
            .extend(rules.iter().cloned());
        state.calls.push(ProvisionCall::ApplyIngressRules {
            security_group: security_group.id.clone(),
            rules: rules.iter().map(IngressRule::description).collect(),
        });
        Ok(())
    }
}
