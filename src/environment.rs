// Copyright (c) 2025 - Cowboy AI, Inc.
//! Environment Configuration and Wiring
//!
//! [`EnvironmentConfig`] carries every literal of a deployment: names,
//! region, address ranges, sizes and credentials. [`assemble`] turns a
//! validated configuration into an [`Assembler`] with every stack
//! registered under explicit dependency ids.
//!
//! # Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `DEPLOY_PREFIX` | `prefix` |
//! | `DEPLOY_REGION` | `network.region` |
//! | `DEPLOY_CIDR` | `network.cidr` |
//! | `DEPLOY_EXTERNAL_ACCESS` | `external_access_range` |
//! | `DEPLOY_SSH_KEY` | `ssh_key_name` |
//! | `DEPLOY_CLUSTER_SIZE` | `database.cluster_size` |
//! | `DEPLOY_DB_USER` / `DEPLOY_DB_PASSWORD` | log collector database credentials |
//! | `DEPLOY_SEARCH_USER` / `DEPLOY_SEARCH_PASSWORD` | search master user |
//! | `DEPLOY_COLLECTOR_PASSWORD_SECRET` | `log_collector.password_secret` |
//! | `DEPLOY_COLLECTOR_ROOT_SHA2` | `log_collector.root_password_sha2` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::assembler::Assembler;
use crate::domain::{CidrBlock, Port};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::stacks::{
    ids, ApplicationSettings, ApplicationStack, ContentPack, DatabaseSettings,
    LogCollectorDependencies,
    LogCollectorSettings, LogCollectorStack, NetworkSettings, NetworkStack, ReplicaSetStack,
    SearchSettings, SearchStack, ServiceCommonStack,
};
use crate::templates::{TemplateSource, NODE_INIT_TEMPLATE, REPLICA_INIT_TEMPLATE};

/// The collector refuses shorter password secrets
const MIN_PASSWORD_SECRET_LEN: usize = 16;

/// Complete deployment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Prefix of every resource name
    pub prefix: String,
    /// Allow-list for internet-facing services; required
    pub external_access_range: Option<CidrBlock>,
    /// Key pair for the database nodes
    pub ssh_key_name: Option<String>,
    pub network: NetworkSettings,
    pub database: DatabaseSettings,
    pub search: SearchSettings,
    pub log_collector: LogCollectorSettings,
    pub application: ApplicationSettings,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            prefix: "Gray".to_string(),
            external_access_range: None,
            ssh_key_name: None,
            network: NetworkSettings::default(),
            database: DatabaseSettings::default(),
            search: SearchSettings::default(),
            log_collector: LogCollectorSettings::default(),
            application: ApplicationSettings::default(),
        }
    }
}

impl EnvironmentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> DeploymentResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any variable lookup
    ///
    /// Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> DeploymentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(prefix) = lookup("DEPLOY_PREFIX") {
            config.prefix = prefix;
        }
        if let Some(region) = lookup("DEPLOY_REGION") {
            config.network.region = region;
        }
        if let Some(cidr) = lookup("DEPLOY_CIDR") {
            config.network.cidr = parse_var("DEPLOY_CIDR", &cidr)?;
        }
        if let Some(range) = lookup("DEPLOY_EXTERNAL_ACCESS") {
            config.external_access_range = Some(parse_var("DEPLOY_EXTERNAL_ACCESS", &range)?);
        }
        config.ssh_key_name = lookup("DEPLOY_SSH_KEY").or(config.ssh_key_name);
        if let Some(size) = lookup("DEPLOY_CLUSTER_SIZE") {
            config.database.cluster_size = parse_var("DEPLOY_CLUSTER_SIZE", &size)?;
        }

        config.log_collector.database_user = lookup("DEPLOY_DB_USER").unwrap_or_default();
        config.log_collector.database_password = lookup("DEPLOY_DB_PASSWORD").unwrap_or_default();
        config.search.username = lookup("DEPLOY_SEARCH_USER").unwrap_or_default();
        config.search.password = lookup("DEPLOY_SEARCH_PASSWORD").unwrap_or_default();
        config.log_collector.password_secret =
            lookup("DEPLOY_COLLECTOR_PASSWORD_SECRET").unwrap_or_default();
        config.log_collector.root_password_sha2 =
            lookup("DEPLOY_COLLECTOR_ROOT_SHA2").unwrap_or_default();

        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> DeploymentResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DeploymentError::Configuration(format!("{}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// External allow-list range
    ///
    /// # Errors
    /// - [`DeploymentError::Configuration`] if unset
    pub fn external_range(&self) -> DeploymentResult<CidrBlock> {
        self.external_access_range.ok_or_else(|| {
            DeploymentError::Configuration("external access range is not set".to_string())
        })
    }

    /// Check the configuration before any component is built
    pub fn validate(&self) -> DeploymentResult<()> {
        if self.prefix.trim().is_empty() {
            return Err(config_error("resource prefix is empty"));
        }

        self.external_range()?;

        if !self.network.cidr.is_ipv4() {
            return Err(config_error("network range must be IPv4"));
        }
        for subnet in &self.network.subnets {
            if subnet.cidr_mask < self.network.cidr.prefix_length() || subnet.cidr_mask > 32 {
                return Err(DeploymentError::Configuration(format!(
                    "subnet group {} (/{}) does not fit in {}",
                    subnet.name, subnet.cidr_mask, self.network.cidr
                )));
            }
        }

        if self.database.cluster_size == 0 {
            return Err(DeploymentError::InvalidClusterSize(0));
        }
        if self.search.data_nodes == 0 {
            return Err(config_error("search cluster needs at least one data node"));
        }

        require("log collector database user", &self.log_collector.database_user)?;
        require(
            "log collector database password",
            &self.log_collector.database_password,
        )?;
        require("search master user", &self.search.username)?;
        require("search master password", &self.search.password)?;
        require(
            "log collector password secret",
            &self.log_collector.password_secret,
        )?;
        if self.log_collector.password_secret.chars().count() < MIN_PASSWORD_SECRET_LEN {
            return Err(DeploymentError::Configuration(format!(
                "log collector password secret must be at least {} characters",
                MIN_PASSWORD_SECRET_LEN
            )));
        }
        let sha2 = &self.log_collector.root_password_sha2;
        require("log collector root password hash", sha2)?;
        if sha2.len() != 64 || !sha2.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config_error(
                "log collector root password hash must be 64 hex digits (SHA-256)",
            ));
        }

        let single_ports = [
            ("database port", self.database.port),
            ("log collector web port", self.log_collector.web_port),
            ("log collector web target port", self.log_collector.web_target_port),
            ("log collector GELF port", self.log_collector.gelf_port),
            ("application listener port", self.application.listener_port),
            ("application target port", self.application.target_port),
        ];
        for (what, port) in single_ports {
            check_port(what, u32::from(port))?;
        }

        let port_lists = [
            ("log collector internal ports", &self.log_collector.internal_ports),
            ("application internal ports", &self.application.internal_ports),
            ("application public ports", &self.application.public_ports),
        ];
        for (what, ports) in port_lists {
            for &port in ports {
                check_port(what, port)?;
            }
        }

        Ok(())
    }
}

fn config_error(message: &str) -> DeploymentError {
    DeploymentError::Configuration(message.to_string())
}

fn require(what: &str, value: &str) -> DeploymentResult<()> {
    if value.trim().is_empty() {
        return Err(DeploymentError::Configuration(format!("{} is not set", what)));
    }
    Ok(())
}

fn check_port(what: &str, port: u32) -> DeploymentResult<()> {
    Port::new(port)
        .map(|_| ())
        .map_err(|e| DeploymentError::Configuration(format!("{}: {}", what, e)))
}

fn parse_var<T>(key: &str, value: &str) -> DeploymentResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DeploymentError::Configuration(format!("{}={}: {}", key, value, e)))
}

/// Build the assembler for a complete environment
///
/// Validates `config`, reads both bootstrap templates and the collector's
/// content pack (when one is configured) and registers every stack.
/// Nothing is provisioned.
pub fn assemble(
    config: &EnvironmentConfig,
    templates: &dyn TemplateSource,
) -> DeploymentResult<Assembler> {
    config.validate()?;
    let external_range = config.external_range()?;

    let node_init = templates.read_template(NODE_INIT_TEMPLATE)?;
    let replica_init = templates.read_template(REPLICA_INIT_TEMPLATE)?;
    debug!(
        "Loaded bootstrap templates ({} and {} bytes)",
        node_init.len(),
        replica_init.len()
    );

    let prefix = config.prefix.as_str();
    let mut assembler = Assembler::new();

    assembler.register(NetworkStack::new(
        ids::NETWORK,
        prefix,
        config.network.clone(),
    ))?;

    let mut database = ReplicaSetStack::new(
        ids::DATABASE,
        ids::NETWORK,
        prefix,
        config.database.clone(),
        node_init,
        replica_init,
    );
    if let Some(key_name) = &config.ssh_key_name {
        database = database.with_key_name(key_name);
    }
    assembler.register(database)?;

    assembler.register(ServiceCommonStack::new(
        ids::SERVICE_COMMON,
        ids::NETWORK,
        prefix,
    ))?;

    assembler.register(SearchStack::new(
        ids::SEARCH,
        ids::NETWORK,
        prefix,
        config.search.clone(),
    ))?;

    let mut log_collector = LogCollectorStack::new(
        ids::LOG_COLLECTOR,
        LogCollectorDependencies {
            network: ids::NETWORK.into(),
            database: ids::DATABASE.into(),
            search: ids::SEARCH.into(),
            service_common: ids::SERVICE_COMMON.into(),
        },
        prefix,
        external_range,
        config.search.master_user(),
        config.log_collector.clone(),
    );
    if let Some(pack_settings) = &config.log_collector.content_pack {
        let text = templates.read_template(&pack_settings.template)?;
        let pack = ContentPack::from_template(pack_settings, &text)?;
        log_collector = log_collector.with_content_pack(pack);
        debug!("Loaded content pack {}", pack_settings.template);
    }
    assembler.register(log_collector)?;

    assembler.register(ApplicationStack::new(
        ids::APPLICATION,
        ids::NETWORK,
        ids::SERVICE_COMMON,
        ids::LOG_COLLECTOR,
        prefix,
        external_range,
        config.application.clone(),
    ))?;

    info!(
        "Assembled environment {} with {} components",
        config.prefix,
        assembler.len()
    );
    Ok(assembler)
}
