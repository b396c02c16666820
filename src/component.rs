// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment Components
//!
//! A component is a named unit of infrastructure with declared dependencies
//! and a set of outputs that exist only once it has been materialized.
//!
//! # Output Threading
//!
//! ```text
//! network ──outputs──▶ DependencyOutputs{network} ──▶ database.materialize()
//!                                                          │
//! database ──outputs──▶ DependencyOutputs{database, ...} ◀─┘ ──▶ log-collector
//! ```
//!
//! A component only ever sees the outputs of the components it declared as
//! dependencies; [`DependencyOutputs`] refuses every other lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::domain::ResourceHandle;
use crate::errors::{DeploymentError, DeploymentResult};
use crate::provisioner::Provisioner;

/// Component identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Materialization status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Pending,
    Materializing,
    Materialized,
    Failed,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Typed output value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OutputValue {
    /// Free-form text (connection strings, names)
    Text(String),
    /// Network address or DNS name
    Address(String),
    /// Ordered list of addresses
    Addresses(Vec<String>),
    /// Transport port
    Port(u16),
    /// Provisioned resource
    Handle(ResourceHandle),
}

/// Outputs of one materialized component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentOutputs {
    values: BTreeMap<String, OutputValue>,
}

impl ComponentOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output, builder style
    pub fn with(mut self, key: impl Into<String>, value: OutputValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OutputValue> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read-only view over the outputs of a component's declared dependencies
#[derive(Debug, Clone)]
pub struct DependencyOutputs {
    consumer: ComponentId,
    outputs: HashMap<ComponentId, Arc<ComponentOutputs>>,
}

impl DependencyOutputs {
    pub(crate) fn new(
        consumer: ComponentId,
        outputs: HashMap<ComponentId, Arc<ComponentOutputs>>,
    ) -> Self {
        Self { consumer, outputs }
    }

    /// View for a component without dependencies
    pub fn empty(consumer: ComponentId) -> Self {
        Self::new(consumer, HashMap::new())
    }

    /// Component the view was built for
    pub fn consumer(&self) -> &ComponentId {
        &self.consumer
    }

    /// Dependencies visible through this view
    pub fn visible(&self) -> impl Iterator<Item = &ComponentId> {
        self.outputs.keys()
    }

    /// All outputs of `dependency`
    ///
    /// # Errors
    /// - [`DeploymentError::UndeclaredDependency`] if the consumer did not
    ///   declare `dependency`
    pub fn outputs(&self, dependency: &ComponentId) -> DeploymentResult<&ComponentOutputs> {
        self.outputs
            .get(dependency)
            .map(Arc::as_ref)
            .ok_or_else(|| DeploymentError::UndeclaredDependency {
                component: self.consumer.to_string(),
                dependency: dependency.to_string(),
            })
    }

    fn value(&self, dependency: &ComponentId, key: &str) -> DeploymentResult<&OutputValue> {
        self.outputs(dependency)?
            .get(key)
            .ok_or_else(|| missing(dependency, key, "declared"))
    }

    pub fn text(&self, dependency: &ComponentId, key: &str) -> DeploymentResult<&str> {
        match self.value(dependency, key)? {
            OutputValue::Text(text) => Ok(text),
            _ => Err(missing(dependency, key, "text")),
        }
    }

    pub fn address(&self, dependency: &ComponentId, key: &str) -> DeploymentResult<&str> {
        match self.value(dependency, key)? {
            OutputValue::Address(address) => Ok(address),
            _ => Err(missing(dependency, key, "address")),
        }
    }

    pub fn addresses(&self, dependency: &ComponentId, key: &str) -> DeploymentResult<&[String]> {
        match self.value(dependency, key)? {
            OutputValue::Addresses(addresses) => Ok(addresses),
            _ => Err(missing(dependency, key, "addresses")),
        }
    }

    pub fn port(&self, dependency: &ComponentId, key: &str) -> DeploymentResult<u16> {
        match self.value(dependency, key)? {
            OutputValue::Port(port) => Ok(*port),
            _ => Err(missing(dependency, key, "port")),
        }
    }

    pub fn handle(&self, dependency: &ComponentId, key: &str) -> DeploymentResult<&ResourceHandle> {
        match self.value(dependency, key)? {
            OutputValue::Handle(handle) => Ok(handle),
            _ => Err(missing(dependency, key, "handle")),
        }
    }
}

fn missing(dependency: &ComponentId, key: &str, kind: &'static str) -> DeploymentError {
    DeploymentError::MissingOutput {
        component: dependency.to_string(),
        key: key.to_string(),
        kind,
    }
}

/// A unit of infrastructure created through the provisioning backend
///
/// `materialize` is called exactly once, after every component listed in
/// `dependencies` is materialized. It must not keep state between calls;
/// everything it produces goes into the returned outputs.
#[async_trait]
pub trait Component: Send + Sync {
    /// Unique identifier
    fn id(&self) -> &ComponentId;

    /// Components whose outputs this one consumes
    fn dependencies(&self) -> &[ComponentId];

    /// Create the underlying resources
    async fn materialize(
        &self,
        inputs: &DependencyOutputs,
        provisioner: &dyn Provisioner,
    ) -> DeploymentResult<ComponentOutputs>;
}
