// Copyright (c) 2025 - Cowboy AI, Inc.
//! Concrete Deployment Components
//!
//! One component per stack of the log-collection environment:
//!
//! ```text
//! network ─┬─▶ database ─────────────┐
//!          ├─▶ service-common ───────┼─▶ log-collector ─▶ application
//!          └─▶ search ───────────────┘
//! ```
//!
//! Each stack declares its dependencies explicitly and reads everything it
//! needs from their outputs. Literal settings come from the stack's
//! settings struct, never from constants in this module.

pub mod application;
pub mod database;
pub mod logging;
pub mod network;
pub mod search;
pub mod service_common;

pub use application::{ApplicationSettings, ApplicationStack};
pub use database::{DatabaseSettings, ReplicaSetStack};
pub use logging::{
    ContentPack, ContentPackSettings, LogCollectorDependencies, LogCollectorSettings,
    LogCollectorStack,
};
pub use network::{NetworkSettings, NetworkStack};
pub use search::{SearchSettings, SearchStack};
pub use service_common::ServiceCommonStack;

/// Well-known component identifiers
pub mod ids {
    pub const NETWORK: &str = "network";
    pub const DATABASE: &str = "database";
    pub const SERVICE_COMMON: &str = "service-common";
    pub const SEARCH: &str = "search";
    pub const LOG_COLLECTOR: &str = "log-collector";
    pub const APPLICATION: &str = "application";
}

/// Resource name under the deployment prefix
pub(crate) fn resource_name(prefix: &str, label: &str) -> String {
    format!("{}{}", prefix, label)
}
