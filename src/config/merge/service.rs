//! MergeService: orchestrates sources and deserializes to FleetConfig.

use super::builder_with_defaults;
use crate::config::sources::{environment, file};
use crate::config::FleetConfig;
use config::ConfigError;
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> user config file -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<FleetConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = file::add_user_file(builder);
        let builder = match explicit {
            Some(path) => file::add_explicit_file(builder, path),
            None => builder,
        };
        let builder = environment::add_to_builder(builder);

        builder.build()?.try_deserialize()
    }
}
