//! TOML file sources: the user config file and an explicit `--config` file.

use crate::config::paths::xdg_root::user_config_path;
use config::builder::DefaultState;
use config::{ConfigBuilder, File, FileFormat};
use std::path::Path;
use tracing::debug;

/// Layer `$XDG_CONFIG_HOME/fleet/config.toml` if it exists.
pub fn add_user_file(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match user_config_path() {
        Some(path) if path.is_file() => {
            debug!(path = %path.display(), "Loading user config file");
            builder.add_source(File::from(path).format(FileFormat::Toml).required(false))
        }
        _ => builder,
    }
}

/// Layer a file the caller named explicitly; it must exist.
pub fn add_explicit_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    debug!(path = %path.display(), "Loading config file");
    builder.add_source(File::from(path).format(FileFormat::Toml).required(true))
}
