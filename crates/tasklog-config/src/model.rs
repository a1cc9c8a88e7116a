// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TasklogConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Deployment configuration pushed to the cluster as the CONFIG task.
    #[serde(default)]
    pub cluster: ClusterConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a writer waits for another connection's lock, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    "tasklog.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Connection settings of the external cluster.
///
/// The whole section is serialized into the CONFIG task so the cluster
/// receives the deployment configuration through the log.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    /// Base URI of the cluster API.
    #[serde(default = "default_cluster_uri")]
    pub uri: String,

    /// API user name.
    #[serde(default = "default_cluster_username")]
    pub username: String,

    /// API password. `None` when the cluster does not require one.
    #[serde(default)]
    pub password: Option<String>,

    /// Project the API user belongs to.
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Tunnel encapsulation used between hosts (`vxlan` or `gre`).
    #[serde(default = "default_tunnel_protocol")]
    pub tunnel_protocol: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            uri: default_cluster_uri(),
            username: default_cluster_username(),
            password: None,
            project_id: default_project_id(),
            tunnel_protocol: default_tunnel_protocol(),
        }
    }
}

impl ClusterConfig {
    /// JSON payload of the CONFIG task.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "uri": self.uri,
            "username": self.username,
            "password": self.password,
            "project_id": self.project_id,
            "tunnel_protocol": self.tunnel_protocol,
        })
    }
}

fn default_cluster_uri() -> String {
    "http://localhost:8181/midonet-api".to_string()
}

fn default_cluster_username() -> String {
    "admin".to_string()
}

fn default_project_id() -> String {
    "admin".to_string()
}

fn default_tunnel_protocol() -> String {
    "vxlan".to_string()
}
