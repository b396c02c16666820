// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Stack
//!
//! Creates the virtual network every other component lives in, with its
//! subnet layout and an allow-all ACL on the public subnets. ACL entries
//! admit any IPv4 peer and are not built from ingress scopes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use tracing::info;

use super::resource_name;
use crate::component::{
    Component, ComponentId, ComponentOutputs, DependencyOutputs, OutputValue,
};
use crate::domain::{CidrBlock, SubnetLayout};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::ingress::{Direction, Protocol, RulePort};
use crate::provisioner::{AclEntry, NetworkRequest, Provisioner};

/// Output: network handle
pub const NETWORK: &str = "network";

/// Output: the network's address range, as `address/prefix`
pub const CIDR: &str = "cidr";

/// Network settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub region: String,
    /// Must hold every subnet group of the layout
    pub cidr: CidrBlock,
    pub max_azs: u8,
    pub nat_gateways: u8,
    pub subnets: Vec<SubnetLayout>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            region: "eu-west-1".to_string(),
            cidr: CidrBlock::ipv4(Ipv4Addr::new(10, 0, 10, 0), 23),
            max_azs: 2,
            nat_gateways: 1,
            subnets: SubnetLayout::default_layout(),
        }
    }
}

/// Allow-all ingress and egress entries for public subnets
pub fn public_acl() -> Vec<AclEntry> {
    [
        ("AllowIngress", 10, Direction::Ingress),
        ("AllowEgress", 11, Direction::Egress),
    ]
    .into_iter()
    .map(|(name, rule_number, direction)| AclEntry {
        name: name.to_string(),
        rule_number,
        cidr: CidrBlock::any_ipv4(),
        protocol: Protocol::All,
        port: RulePort::AllPorts,
        direction,
    })
    .collect()
}

/// Internal address range published by a network component
pub fn internal_range(
    inputs: &DependencyOutputs,
    network: &ComponentId,
) -> DeploymentResult<CidrBlock> {
    let text = inputs.text(network, CIDR)?;
    text.parse().map_err(|_| DeploymentError::MissingOutput {
        component: network.to_string(),
        key: CIDR.to_string(),
        kind: "cidr",
    })
}

/// Virtual network component
#[derive(Debug, Clone)]
pub struct NetworkStack {
    id: ComponentId,
    prefix: String,
    settings: NetworkSettings,
}

impl NetworkStack {
    pub fn new(id: impl Into<ComponentId>, prefix: impl Into<String>, settings: NetworkSettings) -> Self {
        Self {
            id: id.into(),
            prefix: prefix.into(),
            settings,
        }
    }
}

#[async_trait]
impl Component for NetworkStack {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &[]
    }

    async fn materialize(
        &self,
        _inputs: &DependencyOutputs,
        provisioner: &dyn Provisioner,
    ) -> DeploymentResult<ComponentOutputs> {
        let request = NetworkRequest {
            name: resource_name(&self.prefix, "Vpc"),
            region: self.settings.region.clone(),
            cidr: self.settings.cidr,
            max_azs: self.settings.max_azs,
            nat_gateways: self.settings.nat_gateways,
            subnets: self.settings.subnets.clone(),
            public_acl: public_acl(),
        };

        let network = provisioner.create_network(&request).await?;
        info!("Network {} covers {}", network.id, self.settings.cidr);

        Ok(ComponentOutputs::new()
            .with(NETWORK, OutputValue::Handle(network))
            .with(CIDR, OutputValue::Text(self.settings.cidr.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::InMemoryProvisioner;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_public_acl_covers_both_directions() {
        let acl = public_acl();
        assert_eq!(acl.len(), 2);
        assert!(acl.iter().all(|e| e.port == RulePort::AllPorts));
        assert!(acl.iter().all(|e| e.protocol == Protocol::All));
        assert!(acl.iter().all(|e| e.cidr == CidrBlock::any_ipv4()));
        assert_eq!(acl[0].direction, Direction::Ingress);
        assert_eq!(acl[1].direction, Direction::Egress);
        assert_eq!((acl[0].rule_number, acl[1].rule_number), (10, 11));
    }

    #[tokio::test]
    async fn test_network_request_carries_acl() {
        let stack = NetworkStack::new("network", "Gray", NetworkSettings::default());
        let provisioner = InMemoryProvisioner::new();
        stack
            .materialize(&DependencyOutputs::empty("network".into()), &provisioner)
            .await
            .unwrap();

        let request = provisioner.network_request("GrayVpc").unwrap();
        assert_eq!(request.public_acl, public_acl());
    }

    #[tokio::test]
    async fn test_outputs() {
        let stack = NetworkStack::new("network", "Gray", NetworkSettings::default());
        let provisioner = InMemoryProvisioner::new();
        let inputs = DependencyOutputs::empty("network".into());

        let outputs = stack.materialize(&inputs, &provisioner).await.unwrap();
        assert_eq!(
            outputs.get(CIDR),
            Some(&OutputValue::Text("10.0.10.0/23".to_string()))
        );
        assert!(matches!(outputs.get(NETWORK), Some(OutputValue::Handle(_))));
    }

    #[test]
    fn test_internal_range_rejects_garbage() {
        let network = ComponentId::from("network");
        let mut outputs = HashMap::new();
        outputs.insert(
            network.clone(),
            Arc::new(ComponentOutputs::new().with(CIDR, OutputValue::Text("nope".to_string()))),
        );
        let inputs = DependencyOutputs::new("database".into(), outputs);

        assert!(matches!(
            internal_range(&inputs, &network),
            Err(DeploymentError::MissingOutput { kind: "cidr", .. })
        ));
    }
}
