// Copyright (c) 2025 - Cowboy AI, Inc.
//! Database Replica-Set Stack
//!
//! Plans the replica-set topology, creates one compute node per planned
//! node and publishes the cluster's connection descriptor.
//!
//! ```text
//! plan(n) → secondary 1 .. secondary n-1 → primary n
//!                                           └─ bootstrap = node init + replica init
//!                                              (replica init lists every secondary)
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::network::{self, internal_range};
use super::resource_name;
use crate::cluster::{AddressProvider, ClusterTopology, NodeSpec};
use crate::component::{
    Component, ComponentId, ComponentOutputs, DependencyOutputs, OutputValue,
};
use crate::domain::{ResourceHandle, SubnetKind};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::ingress::{self, IngressSpec, PortSet, Protocol, Scope};
use crate::provisioner::{ComputeNodeRequest, Provisioner, RoleRequest, SecurityGroupRequest};

/// Output: node security group
pub const SECURITY_GROUP: &str = "security_group";

/// Output: role assumed by the nodes
pub const ROLE: &str = "role";

/// Output: every node address in plan order
pub const NODE_ADDRESSES: &str = "node_addresses";

/// Output: address of the primary
pub const PRIMARY_ADDRESS: &str = "primary_address";

/// Output: `addr:port` list, secondaries first
pub const CONNECTION_DESCRIPTOR: &str = "connection_descriptor";

/// Output: database port
pub const PORT: &str = "port";

/// Replica-set settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub cluster_size: usize,
    pub port: u16,
    pub instance_profile: String,
    pub subnet: SubnetKind,
    /// Principal allowed to assume the node role
    pub node_principal: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            cluster_size: 3,
            port: 27017,
            instance_profile: "t2.nano".to_string(),
            subnet: SubnetKind::Public,
            node_principal: "ec2.amazonaws.com".to_string(),
        }
    }
}

/// [`AddressProvider`] that creates one compute node per cluster node
///
/// The primary's bootstrap is the node init script followed by the replica
/// init script rendered against the topology resolved so far.
pub(crate) struct NodeProvisioner<'a> {
    provisioner: &'a dyn Provisioner,
    name_prefix: String,
    network: ResourceHandle,
    security_group: ResourceHandle,
    role: ResourceHandle,
    settings: &'a DatabaseSettings,
    key_name: Option<String>,
    node_init: &'a str,
    replica_init: &'a str,
}

impl NodeProvisioner<'_> {
    fn bootstrap_script(&self, node: &NodeSpec, topology: &ClusterTopology) -> DeploymentResult<String> {
        if !node.is_primary() {
            return Ok(self.node_init.to_string());
        }

        let replica_init = topology.render_primary_bootstrap(self.replica_init)?;
        Ok(format!("{}\n{}", self.node_init, replica_init))
    }
}

#[async_trait]
impl AddressProvider for NodeProvisioner<'_> {
    async fn provision_node(
        &self,
        node: &NodeSpec,
        topology: &ClusterTopology,
    ) -> DeploymentResult<String> {
        let request = ComputeNodeRequest {
            name: format!("{}{}", self.name_prefix, node.ordinal()),
            network: self.network.clone(),
            subnet: self.settings.subnet,
            security_group: self.security_group.clone(),
            role: self.role.clone(),
            instance_profile: self.settings.instance_profile.clone(),
            key_name: self.key_name.clone(),
            bootstrap_script: Some(self.bootstrap_script(node, topology)?),
        };

        let created = self.provisioner.create_compute_node(&request).await?;
        debug!("{} node {} is {}", node.role(), node.ordinal(), created.id);
        Ok(created.private_address)
    }
}

/// Database replica-set component
#[derive(Debug, Clone)]
pub struct ReplicaSetStack {
    id: ComponentId,
    dependencies: Vec<ComponentId>,
    prefix: String,
    settings: DatabaseSettings,
    key_name: Option<String>,
    node_init: String,
    replica_init: String,
}

impl ReplicaSetStack {
    /// Create the component
    ///
    /// `node_init` runs on every node; `replica_init` additionally runs on
    /// the primary after the cluster placeholder is substituted.
    pub fn new(
        id: impl Into<ComponentId>,
        network: impl Into<ComponentId>,
        prefix: impl Into<String>,
        settings: DatabaseSettings,
        node_init: impl Into<String>,
        replica_init: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            dependencies: vec![network.into()],
            prefix: prefix.into(),
            settings,
            key_name: None,
            node_init: node_init.into(),
            replica_init: replica_init.into(),
        }
    }

    /// Key pair installed on every node
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    fn network(&self) -> &ComponentId {
        &self.dependencies[0]
    }
}

#[async_trait]
impl Component for ReplicaSetStack {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    async fn materialize(
        &self,
        inputs: &DependencyOutputs,
        provisioner: &dyn Provisioner,
    ) -> DeploymentResult<ComponentOutputs> {
        let mut topology = ClusterTopology::plan(self.settings.cluster_size)?;

        let network = inputs.handle(self.network(), network::NETWORK)?.clone();
        let cidr = internal_range(inputs, self.network())?;

        let security_group = provisioner
            .create_security_group(&SecurityGroupRequest {
                name: resource_name(&self.prefix, "mongo-sg"),
                network: network.clone(),
                allow_all_outbound: true,
            })
            .await?;

        let rules = ingress::build(&[IngressSpec::new(
            PortSet::list(&[u32::from(self.settings.port)]),
            vec![Protocol::Tcp],
            cidr,
            Scope::Internal,
        )])?;
        provisioner
            .apply_ingress_rules(&security_group, &rules)
            .await?;

        let role = provisioner
            .create_role(&RoleRequest {
                name: resource_name(&self.prefix, "Role"),
                assumed_by: self.settings.node_principal.clone(),
                managed_policies: Vec::new(),
            })
            .await?;

        let nodes = NodeProvisioner {
            provisioner,
            name_prefix: resource_name(&self.prefix, "MongoDBId"),
            network,
            security_group: security_group.clone(),
            role: role.clone(),
            settings: &self.settings,
            key_name: self.key_name.clone(),
            node_init: &self.node_init,
            replica_init: &self.replica_init,
        };
        topology.resolve_addresses(&nodes).await?;

        let descriptor = topology.connection_descriptor(self.settings.port)?;
        let primary = topology
            .primary()
            .and_then(NodeSpec::address)
            .map(str::to_string)
            .ok_or(DeploymentError::UnresolvedAddress {
                ordinal: topology.size(),
            })?;
        info!(
            "Replica set of {} nodes ready, primary at {}",
            topology.size(),
            primary
        );

        Ok(ComponentOutputs::new()
            .with(SECURITY_GROUP, OutputValue::Handle(security_group))
            .with(ROLE, OutputValue::Handle(role))
            .with(NODE_ADDRESSES, OutputValue::Addresses(topology.addresses()?))
            .with(PRIMARY_ADDRESS, OutputValue::Address(primary))
            .with(CONNECTION_DESCRIPTOR, OutputValue::Text(descriptor))
            .with(PORT, OutputValue::Port(self.settings.port)))
    }
}
