// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bootstrap Template Sources
//!
//! Templates are opaque text. The only interpreted content is the cluster
//! placeholder handled by [`crate::cluster`].

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::errors::{DeploymentError, DeploymentResult};

/// Template run on every database node
pub const NODE_INIT_TEMPLATE: &str = "mongo-init.sh";

/// Template run on the primary to initiate the replica set
pub const REPLICA_INIT_TEMPLATE: &str = "mongo-replica-init.sh";

/// Content pack installed by the log collector
pub const CONTENT_PACK_TEMPLATE: &str = "graylog-inputs.json";

/// Source of static template text
pub trait TemplateSource: Send + Sync {
    fn read_template(&self, name: &str) -> DeploymentResult<String>;
}

/// Templates held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: HashMap<String, String>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.insert(name.into(), text.into());
        self
    }
}

impl TemplateSource for StaticTemplates {
    fn read_template(&self, name: &str) -> DeploymentResult<String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| DeploymentError::Template(format!("unknown template {}", name)))
    }
}

/// Templates read from files under a root directory
#[derive(Debug, Clone)]
pub struct DirectoryTemplateSource {
    root: PathBuf,
}

impl DirectoryTemplateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateSource for DirectoryTemplateSource {
    fn read_template(&self, name: &str) -> DeploymentResult<String> {
        let path = self.root.join(name);
        debug!("Reading template {}", path.display());

        std::fs::read_to_string(&path)
            .map_err(|e| DeploymentError::Template(format!("{}: {}", path.display(), e)))
    }
}
