//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::FleetConfig;
use crate::error::FleetError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from defaults, the user config file and the environment.
    pub fn load() -> Result<FleetConfig, FleetError> {
        Self::checked(MergeService::load(None)?)
    }

    /// Load with `path` layered over the user config file.
    pub fn load_from_file(path: &Path) -> Result<FleetConfig, FleetError> {
        if !path.is_file() {
            return Err(FleetError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::checked(MergeService::load(Some(path))?)
    }

    fn checked(config: FleetConfig) -> Result<FleetConfig, FleetError> {
        config.validate()?;
        Ok(config)
    }
}
