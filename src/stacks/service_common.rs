// Copyright (c) 2025 - Cowboy AI, Inc.
//! Shared resources for container services: the scheduler cluster, the task
//! role, and the security groups for tasks and their public load balancers.

use async_trait::async_trait;

use super::network;
use super::resource_name;
use crate::component::{
    Component, ComponentId, ComponentOutputs, DependencyOutputs, OutputValue,
};
use crate::errors::DeploymentResult;
use crate::provisioner::{
    ContainerClusterRequest, Provisioner, RoleRequest, SecurityGroupRequest,
};

pub const CONTAINER_CLUSTER: &str = "container_cluster";
pub const SERVICE_ROLE: &str = "service_role";
pub const SERVICE_SECURITY_GROUP: &str = "service_security_group";
pub const LOAD_BALANCER_SECURITY_GROUP: &str = "load_balancer_security_group";

const TASK_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
const TASK_EXECUTION_POLICY: &str = "service-role/AmazonECSTaskExecutionRolePolicy";

#[derive(Debug, Clone)]
pub struct ServiceCommonStack {
    id: ComponentId,
    dependencies: Vec<ComponentId>,
    prefix: String,
}

impl ServiceCommonStack {
    pub fn new(
        id: impl Into<ComponentId>,
        network: impl Into<ComponentId>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            dependencies: vec![network.into()],
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl Component for ServiceCommonStack {
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
        let network = inputs.handle(&self.dependencies[0], network::NETWORK)?;

        let cluster = provisioner
            .create_container_cluster(&ContainerClusterRequest {
                name: resource_name(&self.prefix, "Cluster"),
                network: network.clone(),
            })
            .await?;

        let role = provisioner
            .create_role(&RoleRequest {
                name: resource_name(&self.prefix, "ServiceCommonTaskRole"),
                assumed_by: TASK_PRINCIPAL.to_string(),
                managed_policies: vec![TASK_EXECUTION_POLICY.to_string()],
            })
            .await?;

        let service_group = provisioner
            .create_security_group(&SecurityGroupRequest {
                name: resource_name(&self.prefix, "ServiceCommonSG"),
                network: network.clone(),
                allow_all_outbound: true,
            })
            .await?;

        let load_balancer_group = provisioner
            .create_security_group(&SecurityGroupRequest {
                name: resource_name(&self.prefix, "ServiceCommonAlbSG"),
                network: network.clone(),
                allow_all_outbound: true,
            })
            .await?;

        Ok(ComponentOutputs::new()
            .with(CONTAINER_CLUSTER, OutputValue::Handle(cluster))
            .with(SERVICE_ROLE, OutputValue::Handle(role))
            .with(SERVICE_SECURITY_GROUP, OutputValue::Handle(service_group))
            .with(
                LOAD_BALANCER_SECURITY_GROUP,
                OutputValue::Handle(load_balancer_group),
            ))
    }
}
