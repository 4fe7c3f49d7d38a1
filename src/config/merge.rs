pub(crate) mod service;

use super::FleetConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with every built-in default, so partial files only override.
pub(crate) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&FleetConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
