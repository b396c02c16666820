// Copyright (c) 2025 - Cowboy AI, Inc.
//! Application Stack
//!
//! A public container service that ships its logs to the log collector's
//! GELF input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::network::internal_range;
use super::{logging, resource_name, service_common};
use crate::component::{
    Component, ComponentId, ComponentOutputs, DependencyOutputs, OutputValue,
};
use crate::domain::{CidrBlock, SubnetKind};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::ingress::{IngressMatrix, PortSet, Protocol};
use crate::provisioner::{LoadBalancerRequest, LogTarget, Provisioner, ServiceRequest};

/// Output: public load balancer address
pub const PUBLIC_ADDRESS: &str = "public_address";

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Resource label under the deployment prefix
    pub name: String,
    pub image: String,
    pub cpu: u32,
    pub memory_limit_mib: u32,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub container_ports: Vec<u16>,
    /// Opened for TCP and UDP from the internal range
    pub internal_ports: Vec<u32>,
    /// Opened for TCP from the external allow-list
    pub public_ports: Vec<u32>,
    pub listener_port: u16,
    pub target_port: u16,
    pub assign_public_ip: bool,
    pub environment: BTreeMap<String, String>,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            name: "Nginx".to_string(),
            image: "nginx".to_string(),
            cpu: 256,
            memory_limit_mib: 512,
            min_capacity: 1,
            max_capacity: 3,
            container_ports: vec![80, 1514, 9200, 12201],
            internal_ports: vec![80, 1514, 9200, 12201],
            public_ports: vec![80],
            listener_port: 80,
            target_port: 80,
            assign_public_ip: true,
            environment: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplicationStack {
    id: ComponentId,
    /// network, service-common, log-collector
    dependencies: Vec<ComponentId>,
    prefix: String,
    external_range: CidrBlock,
    settings: ApplicationSettings,
}

impl ApplicationStack {
    pub fn new(
        id: impl Into<ComponentId>,
        network: impl Into<ComponentId>,
        service_common: impl Into<ComponentId>,
        log_collector: impl Into<ComponentId>,
        prefix: impl Into<String>,
        external_range: CidrBlock,
        settings: ApplicationSettings,
    ) -> Self {
        Self {
            id: id.into(),
            dependencies: vec![network.into(), service_common.into(), log_collector.into()],
            prefix: prefix.into(),
            external_range,
            settings,
        }
    }
}

#[async_trait]
impl Component for ApplicationStack {
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
        let [network, common, collector] = &self.dependencies[..] else {
            return Err(DeploymentError::Configuration(format!(
                "{} needs exactly three dependencies",
                self.id
            )));
        };

        let cidr = internal_range(inputs, network)?;
        let cluster = inputs.handle(common, service_common::CONTAINER_CLUSTER)?;
        let role = inputs.handle(common, service_common::SERVICE_ROLE)?;
        let service_group = inputs.handle(common, service_common::SERVICE_SECURITY_GROUP)?;
        let balancer_group = inputs.handle(common, service_common::LOAD_BALANCER_SECURITY_GROUP)?;

        let log_target = LogTarget {
            host: inputs.address(collector, logging::GELF_ADDRESS)?.to_string(),
            port: inputs.port(collector, logging::GELF_PORT)?,
            protocol: Protocol::Udp,
        };

        let matrix = IngressMatrix::new(cidr, self.external_range);
        let rules = matrix.build(&[
            matrix.internal(
                PortSet::List(self.settings.internal_ports.clone()),
                &[Protocol::Tcp, Protocol::Udp],
            ),
            matrix.external(
                PortSet::List(self.settings.public_ports.clone()),
                &[Protocol::Tcp],
            ),
        ])?;
        provisioner.apply_ingress_rules(service_group, &rules).await?;

        let label = &self.settings.name;
        let request = ServiceRequest {
            name: resource_name(&self.prefix, label),
            image: self.settings.image.clone(),
            cluster: cluster.clone(),
            role: role.clone(),
            security_group: service_group.clone(),
            subnet: SubnetKind::PrivateWithEgress,
            container_ports: self.settings.container_ports.clone(),
            environment: self.settings.environment.clone(),
            entry_point: Vec::new(),
            assign_public_ip: self.settings.assign_public_ip,
            cpu: self.settings.cpu,
            memory_limit_mib: self.settings.memory_limit_mib,
            min_capacity: self.settings.min_capacity,
            max_capacity: self.settings.max_capacity,
            load_balancers: vec![LoadBalancerRequest {
                name: resource_name(&self.prefix, &format!("{}Alb", label)),
                internet_facing: true,
                listener_port: self.settings.listener_port,
                target_port: self.settings.target_port,
                protocol: Protocol::Tcp,
                security_group: Some(balancer_group.clone()),
            }],
            log_target: Some(log_target),
        };

        let endpoint = provisioner.create_service(&request).await?;
        let public_address = endpoint
            .load_balancer_addresses
            .into_iter()
            .next()
            .ok_or_else(|| {
                DeploymentError::Provisioning(format!(
                    "no load balancer address for {}",
                    request.name
                ))
            })?;
        info!("{} reachable at {}", request.name, public_address);

        Ok(ComponentOutputs::new().with(PUBLIC_ADDRESS, OutputValue::Address(public_address)))
    }
}
