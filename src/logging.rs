//! Logging System
//!
//! Structured diagnostics through `tracing`. Level, format and destination come from
//! (highest first) CLI flags, `FLEET_LOG*` environment variables, the configuration
//! file and built-in defaults. Operator-facing results never go through here; see
//! [`crate::report`].

use crate::error::FleetError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Resolve the log file path with precedence: CLI, FLEET_LOG_FILE env, config file, default.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, FleetError> {
    if let Some(p) = cli_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    if let Ok(env_path) = std::env::var("FLEET_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    default_log_file_path()
}

fn default_log_file_path() -> Result<PathBuf, FleetError> {
    let project_dirs = directories::ProjectDirs::from("", "fleet", "fleet").ok_or_else(|| {
        FleetError::ConfigError("Could not determine platform state directory for log file".to_string())
    })?;
    // macOS and Windows have no state dir; fall back to the data dir there
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join("fleet.log"))
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means use runtime default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Enable colored output (text format only, stdout/stderr only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Module-specific log levels
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Logging settings given on the command line; each one beats its environment variable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingOverrides {
    pub level: Option<String>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub file: Option<PathBuf>,
}

/// Initialize the global subscriber.
///
/// Priority order (highest to lowest):
/// 1. CLI arguments (`overrides`)
/// 2. Environment variables (FLEET_LOG, FLEET_LOG_FORMAT, FLEET_LOG_OUTPUT, ...)
/// 3. Configuration file
/// 4. Defaults
pub fn init_logging(
    config: Option<&LoggingConfig>,
    overrides: &LoggingOverrides,
) -> Result<(), FleetError> {
    let disabled = config.map(|c| !c.enabled).unwrap_or(false);
    if disabled {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .try_init()
            .map_err(|e| FleetError::ConfigError(format!("Failed to install logger: {}", e)));
    }

    let filter = build_env_filter(config, overrides.level.as_deref())?;
    let format = determine_format(
        overrides.format.as_deref(),
        std::env::var("FLEET_LOG_FORMAT").ok().as_deref(),
        config,
    )?;
    let output = determine_output(
        overrides.output.as_deref(),
        std::env::var("FLEET_LOG_OUTPUT").ok().as_deref(),
        config,
    )?;
    let use_color = config.map(|c| c.color).unwrap_or(true) && !output.file;

    let file_path = if output.file {
        Some(resolve_log_file_path(
            overrides.file.clone(),
            config.and_then(|c| c.file.clone()),
        )?)
    } else {
        None
    };
    let writer = output.writer(file_path)?;

    let base_subscriber = Registry::default().with(filter);
    let installed = if format == "json" {
        base_subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        base_subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|e| FleetError::ConfigError(format!("Failed to install logger: {}", e)))
}

/// Build environment filter from the CLI level, FLEET_LOG, or config
fn build_env_filter(
    config: Option<&LoggingConfig>,
    cli_level: Option<&str>,
) -> Result<EnvFilter, FleetError> {
    if cli_level.is_none() {
        if let Ok(filter) = EnvFilter::try_from_env("FLEET_LOG") {
            return Ok(filter);
        }
    }

    let level = cli_level
        .or_else(|| config.map(|c| c.level.as_str()))
        .unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(level);
    if let Some(config) = config {
        for (module, module_level) in &config.modules {
            filter = filter.add_directive(parse_directive(module, module_level)?);
        }
    }

    if let Ok(modules_str) = std::env::var("FLEET_LOG_MODULES") {
        for module_spec in modules_str.split(',') {
            if let Some((module, module_level)) = module_spec.split_once('=') {
                filter = filter.add_directive(parse_directive(module.trim(), module_level.trim())?);
            }
        }
    }

    Ok(filter)
}

fn parse_directive(
    module: &str,
    level: &str,
) -> Result<tracing_subscriber::filter::Directive, FleetError> {
    format!("{}={}", module, level)
        .parse()
        .map_err(|e| FleetError::ConfigError(format!("Invalid log directive: {}", e)))
}

/// Determine output format: CLI, then environment, then config
fn determine_format(
    cli: Option<&str>,
    env: Option<&str>,
    config: Option<&LoggingConfig>,
) -> Result<String, FleetError> {
    if let Some(format) = env {
        if cli.is_none() && (format == "json" || format == "text") {
            return Ok(format.to_string());
        }
    }

    let format = cli
        .or_else(|| config.map(|c| c.format.as_str()))
        .unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(FleetError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}

/// Output destinations
#[derive(Debug, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl OutputDestinations {
    fn writer(&self, file_path: Option<PathBuf>) -> Result<BoxMakeWriter, FleetError> {
        let file = match file_path {
            Some(path) => Some(open_log_file(&path)?),
            None => None,
        };
        let writer = match (file, self.stdout, self.stderr) {
            (Some(f), _, true) => BoxMakeWriter::new(f.and(std::io::stderr)),
            (Some(f), _, false) => BoxMakeWriter::new(f),
            (None, true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
            (None, true, false) => BoxMakeWriter::new(std::io::stdout),
            (None, false, _) => BoxMakeWriter::new(std::io::stderr),
        };
        Ok(writer)
    }
}

fn open_log_file(path: &std::path::Path) -> Result<std::sync::Mutex<std::fs::File>, FleetError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| FleetError::ConfigError(format!("Failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(std::sync::Mutex::new)
        .map_err(|e| FleetError::ConfigError(format!("Failed to open log file {:?}: {}", path, e)))
}

/// Determine output destinations: CLI, then environment, then config
fn determine_output(
    cli: Option<&str>,
    env: Option<&str>,
    config: Option<&LoggingConfig>,
) -> Result<OutputDestinations, FleetError> {
    let output = cli
        .or(env)
        .or_else(|| config.map(|c| c.output.as_str()))
        .unwrap_or("stderr");
    parse_output_destinations(output)
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, FleetError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        _ => {
            return Err(FleetError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
