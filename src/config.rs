//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, then the user's config file
//! under `$XDG_CONFIG_HOME/fleet/config.toml`, then an explicit `--config` file, then
//! `FLEET__SECTION__KEY` environment variables.

mod facade;
mod merge;
mod paths;
mod sources;

pub use facade::ConfigLoader;
pub use paths::xdg_root::{config_home, user_config_path};

use crate::error::FleetError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Where the control plane is and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Base URL of the control-plane gateway
    pub endpoint: String,
    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:31337".to_string(),
            token: None,
            request_timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Agent-side execution timeout carried with each command
    pub result_timeout_secs: u64,
    /// Dispatch calls in flight at once
    pub concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            result_timeout_secs: 60,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_cycles: u32,
    /// Per-agent queries in flight within one cycle
    pub concurrency: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_cycles: 100,
            concurrency: 1,
        }
    }
}

/// Interface-enumeration filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Interfaces skipped entirely
    pub loopback_interfaces: Vec<String>,
    /// Infrastructure addresses dropped on exact match
    pub excluded_addresses: Vec<String>,
    /// Rename length ceiling
    pub max_label_len: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            loopback_interfaces: vec!["lo".to_string()],
            excluded_addresses: vec!["172.17.0.1".to_string()],
            max_label_len: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Collector base URLs
    pub urls: Vec<String>,
    /// Value of the `type` field in each notification
    pub source_type: String,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://127.0.0.1".to_string()],
            source_type: "sliver".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Effective configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub control_plane: ControlPlaneConfig,
    pub dispatch: DispatchConfig,
    pub polling: PollingConfig,
    pub decode: DecodeConfig,
    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

impl FleetConfig {
    pub fn validate(&self) -> Result<(), FleetError> {
        let mut errors = Vec::new();
        if self.control_plane.endpoint.trim().is_empty() {
            errors.push("control_plane.endpoint must not be empty".to_string());
        }
        if self.control_plane.request_timeout_secs == 0 {
            errors.push("control_plane.request_timeout_secs must be positive".to_string());
        }
        if self.dispatch.concurrency == 0 {
            errors.push("dispatch.concurrency must be at least 1".to_string());
        }
        if self.polling.interval_secs == 0 {
            errors.push("polling.interval_secs must be positive".to_string());
        }
        if self.polling.max_cycles == 0 {
            errors.push("polling.max_cycles must be at least 1".to_string());
        }
        if self.polling.concurrency == 0 {
            errors.push("polling.concurrency must be at least 1".to_string());
        }
        if self.decode.max_label_len == 0 {
            errors.push("decode.max_label_len must be positive".to_string());
        }
        if self.notify.timeout_secs == 0 {
            errors.push("notify.timeout_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FleetError::ConfigError(errors.join("; ")))
        }
    }

    /// Render as TOML, as read back by [`ConfigLoader::load_from_file`]
    pub fn to_toml(&self) -> Result<String, FleetError> {
        toml::to_string_pretty(self)
            .map_err(|e| FleetError::ConfigError(format!("Failed to render config: {}", e)))
    }
}
