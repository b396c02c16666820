// Copyright (c) 2025 - Cowboy AI, Inc.
//! Managed Search Cluster Stack

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::network::{self, internal_range};
use super::resource_name;
use crate::component::{
    Component, ComponentId, ComponentOutputs, DependencyOutputs, OutputValue,
};
use crate::errors::DeploymentResult;
use crate::ingress::{self, IngressSpec, PortSet, Protocol, Scope};
use crate::provisioner::{ManagedClusterRequest, MasterUser, Provisioner, SecurityGroupRequest};

/// Output: cluster security group
pub const SECURITY_GROUP: &str = "security_group";

/// Output: HTTPS endpoint host name
pub const ENDPOINT: &str = "endpoint";

/// Search cluster settings
///
/// The master user has no default; it must come from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub engine_version: String,
    pub master_nodes: u32,
    pub data_nodes: u32,
    pub instance_type: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            engine_version: "ELASTICSEARCH_7_10".to_string(),
            master_nodes: 2,
            data_nodes: 1,
            instance_type: "t3.small.search".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl SearchSettings {
    pub fn master_user(&self) -> MasterUser {
        MasterUser {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchStack {
    id: ComponentId,
    dependencies: Vec<ComponentId>,
    prefix: String,
    settings: SearchSettings,
}

impl SearchStack {
    pub fn new(
        id: impl Into<ComponentId>,
        network: impl Into<ComponentId>,
        prefix: impl Into<String>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            id: id.into(),
            dependencies: vec![network.into()],
            prefix: prefix.into(),
            settings,
        }
    }
}

#[async_trait]
impl Component for SearchStack {
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
        let network_id = &self.dependencies[0];
        let network = inputs.handle(network_id, network::NETWORK)?;
        let cidr = internal_range(inputs, network_id)?;

        let security_group = provisioner
            .create_security_group(&SecurityGroupRequest {
                name: resource_name(&self.prefix, "sg"),
                network: network.clone(),
                allow_all_outbound: true,
            })
            .await?;

        // all TCP from inside the network
        let rules = ingress::build(&[IngressSpec::new(
            PortSet::All,
            vec![Protocol::Tcp],
            cidr,
            Scope::Internal,
        )])?;
        provisioner
            .apply_ingress_rules(&security_group, &rules)
            .await?;

        let cluster = provisioner
            .create_managed_cluster(&ManagedClusterRequest {
                name: resource_name(&self.prefix, "-search"),
                network: network.clone(),
                security_group: security_group.clone(),
                engine_version: self.settings.engine_version.clone(),
                master_nodes: self.settings.master_nodes,
                data_nodes: self.settings.data_nodes,
                instance_type: self.settings.instance_type.clone(),
                master_user: self.settings.master_user(),
            })
            .await?;
        info!("Search cluster {} at {}", cluster.id, cluster.endpoint);

        Ok(ComponentOutputs::new()
            .with(SECURITY_GROUP, OutputValue::Handle(security_group))
            .with(ENDPOINT, OutputValue::Address(cluster.endpoint)))
    }
}
