// Copyright (c) 2025 - Cowboy AI, Inc.
//! Log Collector Stack
//!
//! Runs the log collector as a container service backed by the database
//! replica set and the search cluster. Two load balancers front it:
//!
//! - an internal one receiving GELF over UDP, whose address is handed to
//!   applications as their log destination
//! - a public one serving the web interface to the external allow-list
//!
//! When a content pack is configured, the container writes it to the
//! content pack directory before running the stock entry point, and the
//! collector installs it on first start. The shipped pack creates the GELF
//! UDP input applications log to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::network::internal_range;
use super::{database, resource_name, search, service_common};
use crate::component::{
    Component, ComponentId, ComponentOutputs, DependencyOutputs, OutputValue,
};
use crate::domain::{CidrBlock, SubnetKind};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::ingress::{IngressMatrix, PortSet, Protocol};
use crate::provisioner::{LoadBalancerRequest, MasterUser, Provisioner, ServiceRequest};
use crate::templates::CONTENT_PACK_TEMPLATE;

/// Output: public web interface address
pub const WEB_ADDRESS: &str = "web_address";

/// Output: internal GELF input address
pub const GELF_ADDRESS: &str = "gelf_address";

/// Output: GELF input port
pub const GELF_PORT: &str = "gelf_port";

/// Environment variable carrying the database URI
pub const DATABASE_URI_VAR: &str = "GRAYLOG_MONGODB_URI";

/// Environment variable carrying the search hosts
pub const SEARCH_HOSTS_VAR: &str = "GRAYLOG_ELASTICSEARCH_HOSTS";

/// Environment variable carrying the password salt
pub const PASSWORD_SECRET_VAR: &str = "GRAYLOG_PASSWORD_SECRET";

/// Environment variable carrying the admin password hash
pub const ROOT_PASSWORD_SHA2_VAR: &str = "GRAYLOG_ROOT_PASSWORD_SHA2";

pub const CONTENT_PACKS_LOADER_VAR: &str = "GRAYLOG_CONTENT_PACKS_LOADER_ENABLED";
pub const CONTENT_PACKS_DIR_VAR: &str = "GRAYLOG_CONTENT_PACKS_DIR";
pub const CONTENT_PACKS_AUTO_INSTALL_VAR: &str = "GRAYLOG_CONTENT_PACKS_AUTO_INSTALL";

/// Stock entry point of the collector image
const IMAGE_ENTRY_POINT: &str = "/docker-entrypoint.sh";

/// Where the content pack comes from and where the container puts it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentPackSettings {
    /// Template holding the pack's JSON document
    pub template: String,
    /// Directory inside the container, relative to the working directory
    pub directory: String,
    /// File name the pack is written under and auto-installed from
    pub file: String,
}

impl Default for ContentPackSettings {
    fn default() -> Self {
        Self {
            template: CONTENT_PACK_TEMPLATE.to_string(),
            directory: "data/contentpacks".to_string(),
            file: "inputs-setup.json".to_string(),
        }
    }
}

/// Content pack ready to be written by the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPack {
    directory: String,
    file: String,
    /// Single-line JSON document
    body: String,
}

impl ContentPack {
    /// Parse `text` as JSON and keep it on one line
    ///
    /// # Errors
    /// - [`DeploymentError::Template`] if `text` is not JSON
    pub fn from_template(settings: &ContentPackSettings, text: &str) -> DeploymentResult<Self> {
        let document: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            DeploymentError::Template(format!("{}: {}", settings.template, e))
        })?;

        Ok(Self {
            directory: settings.directory.trim_end_matches('/').to_string(),
            file: settings.file.clone(),
            body: serde_json::to_string(&document)?,
        })
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Shell entry point writing the pack, then starting the collector
    pub fn entry_point(&self) -> Vec<String> {
        let body = self.body.replace('\'', r"'\''");
        let command = format!(
            "mkdir -p '{dir}/' && echo '{body}' > '{dir}/{file}' && {entry}",
            dir = self.directory,
            body = body,
            file = self.file,
            entry = IMAGE_ENTRY_POINT,
        );
        vec!["/bin/sh".to_string(), "-c".to_string(), command]
    }

    fn environment(&self) -> [(&'static str, String); 3] {
        [
            (CONTENT_PACKS_LOADER_VAR, "true".to_string()),
            (CONTENT_PACKS_DIR_VAR, self.directory.clone()),
            (CONTENT_PACKS_AUTO_INSTALL_VAR, self.file.clone()),
        ]
    }
}

/// Log collector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogCollectorSettings {
    pub image: String,
    pub cpu: u32,
    pub memory_limit_mib: u32,
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// Listener port of the public web load balancer
    pub web_port: u16,
    /// Container port serving the web interface
    pub web_target_port: u16,
    pub gelf_port: u16,
    pub container_ports: Vec<u16>,
    /// Opened for TCP and UDP from the internal range
    pub internal_ports: Vec<u32>,
    pub database_name: String,
    pub database_user: String,
    #[serde(skip_serializing)]
    pub database_password: String,
    /// Salt for stored passwords, at least 16 characters
    #[serde(skip_serializing)]
    pub password_secret: String,
    /// Hex SHA-256 of the web interface admin password
    #[serde(skip_serializing)]
    pub root_password_sha2: String,
    /// Pack installed on first start; `None` installs nothing
    pub content_pack: Option<ContentPackSettings>,
    /// Extra container environment
    pub environment: BTreeMap<String, String>,
}

impl Default for LogCollectorSettings {
    fn default() -> Self {
        let environment = [
            ("GRAYLOG_HTTP_BIND_ADDRESS", "0.0.0.0:9000"),
            ("GRAYLOG_HTTP_ENABLE_CORS", "true"),
            ("GRAYLOG_ALLOW_LEADING_WILDCARD_SEARCHES", "true"),
            ("GRAYLOG_ELASTICSEARCH_SHARDS", "1"),
            ("GRAYLOG_ELASTICSEARCH_REPLICAS", "0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            image: "graylog/graylog:5.0".to_string(),
            cpu: 512,
            memory_limit_mib: 1024,
            min_capacity: 1,
            max_capacity: 3,
            web_port: 80,
            web_target_port: 9000,
            gelf_port: 12201,
            container_ports: vec![9000, 80, 443, 1514, 9200, 12201, 27017],
            internal_ports: vec![443, 80, 1514, 9000, 9200, 12201, 27017],
            database_name: "graylog".to_string(),
            database_user: String::new(),
            database_password: String::new(),
            password_secret: String::new(),
            root_password_sha2: String::new(),
            content_pack: Some(ContentPackSettings::default()),
            environment,
        }
    }
}

/// Dependencies of the log collector, by role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCollectorDependencies {
    pub network: ComponentId,
    pub database: ComponentId,
    pub search: ComponentId,
    pub service_common: ComponentId,
}

/// Log collector component
#[derive(Debug, Clone)]
pub struct LogCollectorStack {
    id: ComponentId,
    deps: LogCollectorDependencies,
    dependencies: Vec<ComponentId>,
    prefix: String,
    external_range: CidrBlock,
    search_user: MasterUser,
    settings: LogCollectorSettings,
    content_pack: Option<ContentPack>,
}

impl LogCollectorStack {
    /// `search_user` is the search cluster's master user.
    pub fn new(
        id: impl Into<ComponentId>,
        deps: LogCollectorDependencies,
        prefix: impl Into<String>,
        external_range: CidrBlock,
        search_user: MasterUser,
        settings: LogCollectorSettings,
    ) -> Self {
        let dependencies = vec![
            deps.network.clone(),
            deps.database.clone(),
            deps.search.clone(),
            deps.service_common.clone(),
        ];

        Self {
            id: id.into(),
            deps,
            dependencies,
            prefix: prefix.into(),
            external_range,
            search_user,
            settings,
            content_pack: None,
        }
    }

    /// Install `pack` when the collector first starts
    pub fn with_content_pack(mut self, pack: ContentPack) -> Self {
        self.content_pack = Some(pack);
        self
    }

    fn database_uri(&self, descriptor: &str) -> String {
        format!(
            "mongodb://{}:{}@{}/{}",
            self.settings.database_user,
            self.settings.database_password,
            descriptor,
            self.settings.database_name
        )
    }

    fn search_hosts(&self, endpoint: &str) -> String {
        format!(
            "https://{}:{}@{}:443/",
            self.search_user.username, self.search_user.password, endpoint
        )
    }

    /// Container environment with the dependency-derived entries
    pub fn environment(
        &self,
        descriptor: &str,
        search_endpoint: &str,
    ) -> BTreeMap<String, String> {
        let mut environment = self.settings.environment.clone();
        environment.insert(DATABASE_URI_VAR.to_string(), self.database_uri(descriptor));
        environment.insert(
            SEARCH_HOSTS_VAR.to_string(),
            self.search_hosts(search_endpoint),
        );
        environment.insert(
            PASSWORD_SECRET_VAR.to_string(),
            self.settings.password_secret.clone(),
        );
        environment.insert(
            ROOT_PASSWORD_SHA2_VAR.to_string(),
            self.settings.root_password_sha2.clone(),
        );
        if let Some(pack) = &self.content_pack {
            for (key, value) in pack.environment() {
                environment.insert(key.to_string(), value);
            }
        }
        environment
    }
}

#[async_trait]
impl Component for LogCollectorStack {
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
        let deps = &self.deps;
        let cidr = internal_range(inputs, &deps.network)?;

        let cluster = inputs.handle(&deps.service_common, service_common::CONTAINER_CLUSTER)?;
        let role = inputs.handle(&deps.service_common, service_common::SERVICE_ROLE)?;
        let service_group =
            inputs.handle(&deps.service_common, service_common::SERVICE_SECURITY_GROUP)?;
        let balancer_group = inputs.handle(
            &deps.service_common,
            service_common::LOAD_BALANCER_SECURITY_GROUP,
        )?;

        let descriptor = inputs.text(&deps.database, database::CONNECTION_DESCRIPTOR)?;
        let search_endpoint = inputs.address(&deps.search, search::ENDPOINT)?;

        let matrix = IngressMatrix::new(cidr, self.external_range);
        let service_rules = matrix.build(&[
            matrix.internal(
                PortSet::List(self.settings.internal_ports.clone()),
                &[Protocol::Tcp, Protocol::Udp],
            ),
            matrix.external(PortSet::All, &[Protocol::All]),
        ])?;
        provisioner
            .apply_ingress_rules(service_group, &service_rules)
            .await?;

        let balancer_rules = matrix.build(&[matrix.external(
            PortSet::list(&[u32::from(self.settings.web_port)]),
            &[Protocol::Tcp],
        )])?;
        provisioner
            .apply_ingress_rules(balancer_group, &balancer_rules)
            .await?;

        let request = ServiceRequest {
            name: resource_name(&self.prefix, "LogCollector"),
            image: self.settings.image.clone(),
            cluster: cluster.clone(),
            role: role.clone(),
            security_group: service_group.clone(),
            subnet: SubnetKind::PrivateWithEgress,
            container_ports: self.settings.container_ports.clone(),
            environment: self.environment(descriptor, search_endpoint),
            entry_point: self
                .content_pack
                .as_ref()
                .map(ContentPack::entry_point)
                .unwrap_or_default(),
            assign_public_ip: false,
            cpu: self.settings.cpu,
            memory_limit_mib: self.settings.memory_limit_mib,
            min_capacity: self.settings.min_capacity,
            max_capacity: self.settings.max_capacity,
            load_balancers: vec![
                LoadBalancerRequest {
                    name: resource_name(&self.prefix, "LogCollectorIntLB"),
                    internet_facing: false,
                    listener_port: self.settings.gelf_port,
                    target_port: self.settings.gelf_port,
                    protocol: Protocol::Udp,
                    security_group: None,
                },
                LoadBalancerRequest {
                    name: resource_name(&self.prefix, "LogCollectorAlb"),
                    internet_facing: true,
                    listener_port: self.settings.web_port,
                    target_port: self.settings.web_target_port,
                    protocol: Protocol::Tcp,
                    security_group: Some(balancer_group.clone()),
                },
            ],
            log_target: None,
        };

        let endpoint = provisioner.create_service(&request).await?;
        let (gelf_address, web_address) = match endpoint.load_balancer_addresses.as_slice() {
            [gelf, web] => (gelf.clone(), web.clone()),
            other => {
                return Err(DeploymentError::Provisioning(format!(
                    "expected 2 load balancer addresses for {}, got {}",
                    request.name,
                    other.len()
                )))
            }
        };
        info!("Log collector accepting GELF at {}:{}", gelf_address, self.settings.gelf_port);

        Ok(ComponentOutputs::new()
            .with(WEB_ADDRESS, OutputValue::Address(web_address))
            .with(GELF_ADDRESS, OutputValue::Address(gelf_address))
            .with(GELF_PORT, OutputValue::Port(self.settings.gelf_port)))
    }
}
