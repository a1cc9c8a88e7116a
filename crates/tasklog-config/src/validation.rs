// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::TasklogConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const TUNNEL_PROTOCOLS: &[&str] = &["vxlan", "gre"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &TasklogConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log.level `{}` is not one of {}",
                config.log.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.storage.busy_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "storage.busy_timeout_ms must be greater than zero".to_string(),
        });
    }

    let uri = config.cluster.uri.trim();
    if !(uri.starts_with("http://") || uri.starts_with("https://")) {
        errors.push(ConfigError::Validation {
            message: format!("cluster.uri `{uri}` must be an http:// or https:// URI"),
        });
    }

    if config.cluster.username.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "cluster.username must not be empty".to_string(),
        });
    }

    if !TUNNEL_PROTOCOLS.contains(&config.cluster.tunnel_protocol.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "cluster.tunnel_protocol `{}` is not one of {}",
                config.cluster.tunnel_protocol,
                TUNNEL_PROTOCOLS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
