// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-deployment
//!
//! Deterministic configuration, templates and recorder components shared by
//! the integration tests.
//!
//! # Design Principles
//! - Configuration is complete and valid unless a test breaks it on purpose
//! - Templates are tiny and fixed so rendered output can be compared exactly
//! - Recorder components record what they saw instead of provisioning anything

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use cim_deployment::domain::CidrBlock;
use cim_deployment::templates::{CONTENT_PACK_TEMPLATE, NODE_INIT_TEMPLATE, REPLICA_INIT_TEMPLATE};
use cim_deployment::{
    Component, ComponentId, ComponentOutputs, DeploymentError, DeploymentResult,
    DependencyOutputs, EnvironmentConfig, OutputValue, Provisioner, StaticTemplates,
};

pub const EXTERNAL_RANGE: &str = "203.0.113.7/32";
pub const NODE_INIT: &str = "#!/bin/bash\necho node-init";
pub const REPLICA_INIT: &str = "SECONDARIES=( {{CLUSTER_IPS_ARRAY}} )";
pub const CONTENT_PACK: &str = "{\n  \"v\": \"1\",\n  \"entities\": []\n}\n";
pub const PASSWORD_SECRET: &str = "fixture-password-secret";
/// SHA-256 of "admin"
pub const ROOT_PASSWORD_SHA2: &str =
    "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918";

/// Complete, valid configuration with the stock defaults
pub fn config() -> EnvironmentConfig {
    let mut config = EnvironmentConfig::default();
    config.external_access_range = Some(CidrBlock::new(EXTERNAL_RANGE).unwrap());
    config.ssh_key_name = Some("gray-key".to_string());
    config.log_collector.database_user = "gray".to_string();
    config.log_collector.database_password = "gray-pw".to_string();
    config.log_collector.password_secret = PASSWORD_SECRET.to_string();
    config.log_collector.root_password_sha2 = ROOT_PASSWORD_SHA2.to_string();
    config.search.username = "search-admin".to_string();
    config.search.password = "search-pw".to_string();
    config
}

pub fn templates() -> StaticTemplates {
    StaticTemplates::new()
        .with(NODE_INIT_TEMPLATE, NODE_INIT)
        .with(REPLICA_INIT_TEMPLATE, REPLICA_INIT)
        .with(CONTENT_PACK_TEMPLATE, CONTENT_PACK)
}

/// What a recorder saw when it was materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub component: String,
    /// Visible dependencies, sorted
    pub visible: Vec<String>,
}

pub type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<RecordedCall> {
    log.lock().unwrap().clone()
}

pub fn called(log: &CallLog) -> Vec<String> {
    calls(log).into_iter().map(|c| c.component).collect()
}

/// Component that records its materialization and publishes its own name
///
/// It also reads the `name` output of every declared dependency, so a
/// missing or misrouted output fails the recorder.
pub struct Recorder {
    id: ComponentId,
    deps: Vec<ComponentId>,
    log: CallLog,
    fail: bool,
}

impl Recorder {
    pub fn new(id: &str, deps: &[&str], log: &CallLog) -> Self {
        Self {
            id: id.into(),
            deps: deps.iter().map(|d| ComponentId::from(*d)).collect(),
            log: Arc::clone(log),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Component for Recorder {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.deps
    }

    async fn materialize(
        &self,
        inputs: &DependencyOutputs,
        _provisioner: &dyn Provisioner,
    ) -> DeploymentResult<ComponentOutputs> {
        let mut visible: Vec<String> = inputs.visible().map(|id| id.to_string()).collect();
        visible.sort();
        self.log.lock().unwrap().push(RecordedCall {
            component: self.id.to_string(),
            visible,
        });

        for dep in &self.deps {
            assert_eq!(inputs.text(dep, "name")?, dep.as_str());
        }

        if self.fail {
            return Err(DeploymentError::Provisioning(format!(
                "recorder {} told to fail",
                self.id
            )));
        }

        Ok(ComponentOutputs::new().with("name", OutputValue::Text(self.id.to_string())))
    }
}
