// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tasklog.toml` > `~/.config/tasklog/tasklog.toml` > `/etc/tasklog/tasklog.toml`
//! with environment variable overrides via the `TASKLOG_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TasklogConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tasklog/tasklog.toml";

/// Configuration file in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "tasklog.toml";

/// `~/.config/tasklog/tasklog.toml`, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tasklog/tasklog.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tasklog/tasklog.toml` (system-wide)
/// 3. `~/.config/tasklog/tasklog.toml` (user XDG config)
/// 4. `./tasklog.toml` (local directory)
/// 5. `TASKLOG_*` environment variables
pub fn load_config() -> Result<TasklogConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TasklogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TasklogConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TasklogConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TasklogConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for hierarchical config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TasklogConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// keys stay intact: `TASKLOG_STORAGE_DATABASE_PATH` maps to
/// `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("TASKLOG_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("log_", "log.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("cluster_", "cluster.", 1);
        mapped.into()
    })
}
