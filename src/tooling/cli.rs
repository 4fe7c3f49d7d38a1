//! CLI Tooling
//!
//! Command-line interface for fan-out runs, agent listing and configuration
//! inspection. Every command runs against one control plane; operator output goes
//! through a reporter and the returned string is the closing summary.

use crate::agent::{AgentDirectory, AgentKind, AgentSelector};
use crate::config::{ConfigLoader, FleetConfig};
use crate::control_plane::{ControlPlane, HttpControlPlane};
use crate::decode::DecoderSet;
use crate::error::FleetError;
use crate::fanout::{FanOut, FanOutSettings, Operation};
use crate::logging::LoggingOverrides;
use crate::notify::{HttpNotifySink, NotificationSink};
use crate::report::{ConsoleReporter, JsonReporter, Reporter};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Fleet CLI - fan out commands to C2 agents and collect their results
#[derive(Parser, Debug)]
#[command(name = "fleet")]
#[command(about = "Fan out commands to C2 agents and reconcile their results")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the user config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Control-plane gateway URL (overrides control_plane.endpoint)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Operator output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Disable colored operator output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long, global = true)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Execute a program on every targeted agent and print its output
    Command {
        /// Program to execute
        #[arg(long = "command")]
        path: String,
        /// Arguments, separated by '^'
        #[arg(long, value_delimiter = '^', allow_hyphen_values = true)]
        args: Vec<String>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Rename every targeted agent to "<address>_<hostname>."
    Rename {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Report every targeted agent's addresses to the collectors
    #[command(alias = "pwnboard")]
    Notify {
        /// Collector base URLs, separated by '^' (overrides notify.urls)
        #[arg(long)]
        url: Option<String>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// List every agent known to the control plane
    Agents,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

/// Agent selection shared by the fan-out commands
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetArgs {
    /// Only these sessions, space separated
    #[arg(long, value_delimiter = ' ', num_args = 1.., conflicts_with = "beacons")]
    pub sessions: Vec<String>,
    /// Only these beacons, space separated
    #[arg(long, value_delimiter = ' ', num_args = 1..)]
    pub beacons: Vec<String>,
}

impl TargetArgs {
    pub fn selector(&self) -> AgentSelector {
        let named = |kind, names: &[String]| AgentSelector::Named {
            kind,
            names: names.iter().filter(|n| !n.is_empty()).cloned().collect(),
        };
        if !self.sessions.is_empty() {
            named(AgentKind::Connected, &self.sessions)
        } else if !self.beacons.is_empty() {
            named(AgentKind::StoreAndForward, &self.beacons)
        } else {
            AgentSelector::All
        }
    }
}

impl Cli {
    /// Fold command-line overrides into a loaded configuration
    pub fn apply_overrides(&self, config: &mut FleetConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.control_plane.endpoint = endpoint.clone();
        }
    }

    /// `--log-*` flags, kept apart from the configuration so they outrank `FLEET_LOG*`
    pub fn logging_overrides(&self) -> LoggingOverrides {
        LoggingOverrides {
            level: self.log_level.clone(),
            format: self.log_format.clone(),
            output: self.log_output.clone(),
            file: self.log_file.clone(),
        }
    }
}

/// Split a '^'-separated list, dropping empty entries
pub fn split_carets(value: &str) -> Vec<String> {
    value
        .split('^')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// CLI context holding the configuration and the control plane
pub struct CliContext {
    config: FleetConfig,
    plane: Arc<dyn ControlPlane>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    format: OutputFormat,
    color: bool,
}

impl CliContext {
    /// Load configuration (applying `cli` overrides) and connect the HTTP control plane.
    pub fn new(cli: &Cli) -> Result<Self, FleetError> {
        let mut config = match &cli.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load()?,
        };
        cli.apply_overrides(&mut config);
        config.validate()?;

        let mut context = Self::from_config(config)?;
        context.format = cli.format;
        context.color = !cli.no_color;
        Ok(context)
    }

    pub fn from_config(config: FleetConfig) -> Result<Self, FleetError> {
        let plane = Arc::new(HttpControlPlane::new(&config.control_plane)?);
        Ok(Self {
            config,
            plane,
            sinks: Vec::new(),
            format: OutputFormat::Text,
            color: true,
        })
    }

    /// Replace the control plane
    pub fn with_control_plane(mut self, plane: Arc<dyn ControlPlane>) -> Self {
        self.plane = plane;
        self
    }

    /// Use `sink` for notify runs instead of the configured collectors
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Execute a command on a fresh runtime, reporting to stdout.
    pub fn execute(&self, command: &Commands) -> Result<String, FleetError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(FleetError::ConfigError(
                "Cannot start a runtime from within an async context; use execute_with".to_string(),
            ));
        }
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            match self.format {
                OutputFormat::Text => {
                    let mut reporter = ConsoleReporter::stdout(self.color);
                    self.execute_with(command, &mut reporter).await
                }
                OutputFormat::Json => {
                    let mut reporter = JsonReporter::stdout();
                    self.execute_with(command, &mut reporter).await
                }
            }
        })
    }

    /// Execute a command, sending operator output to `reporter`.
    pub async fn execute_with(
        &self,
        command: &Commands,
        reporter: &mut dyn Reporter,
    ) -> Result<String, FleetError> {
        match command {
            Commands::Command { path, args, target } => {
                let operation = Operation::RunCommand {
                    path: path.clone(),
                    args: args.iter().filter(|a| !a.is_empty()).cloned().collect(),
                };
                self.fan_out(&operation, target, Vec::new(), reporter).await
            }
            Commands::Rename { target } => {
                self.fan_out(&Operation::Rename, target, Vec::new(), reporter)
                    .await
            }
            Commands::Notify { url, target } => {
                let sinks = self.notification_sinks(url.as_deref())?;
                self.fan_out(&Operation::Notify, target, sinks, reporter)
                    .await
            }
            Commands::Agents => self.list_agents().await,
            Commands::Config {
                command: ConfigCommands::Show,
            } => self.config.to_toml(),
        }
    }

    fn notification_sinks(
        &self,
        urls: Option<&str>,
    ) -> Result<Vec<Arc<dyn NotificationSink>>, FleetError> {
        if !self.sinks.is_empty() && urls.is_none() {
            return Ok(self.sinks.clone());
        }
        let mut config = self.config.notify.clone();
        if let Some(urls) = urls {
            config.urls = split_carets(urls);
        }
        debug!(urls = ?config.urls, "Using HTTP notification sink");
        let sink: Arc<dyn NotificationSink> = Arc::new(HttpNotifySink::new(&config)?);
        Ok(vec![sink])
    }

    async fn fan_out(
        &self,
        operation: &Operation,
        target: &TargetArgs,
        sinks: Vec<Arc<dyn NotificationSink>>,
        reporter: &mut dyn Reporter,
    ) -> Result<String, FleetError> {
        let decoders = DecoderSet::standard(&self.config.decode);
        let fan_out = sinks.into_iter().fold(
            FanOut::new(
                self.plane.as_ref(),
                &decoders,
                FanOutSettings::from(&self.config),
            ),
            |fan_out, sink| fan_out.with_sink(sink),
        );
        let summary = fan_out.run(operation, &target.selector(), reporter).await?;
        match self.format {
            OutputFormat::Text => Ok(summary.to_string()),
            OutputFormat::Json => serde_json::to_string(&summary)
                .map_err(|e| FleetError::ConfigError(format!("Failed to render summary: {}", e))),
        }
    }

    async fn list_agents(&self) -> Result<String, FleetError> {
        let directory = AgentDirectory::new(self.plane.as_ref());
        let mut agents = Vec::new();
        for kind in AgentKind::ALL {
            agents.extend(directory.list_agents(kind).await?);
        }

        if self.format == OutputFormat::Json {
            let rows: Vec<_> = agents
                .iter()
                .map(|a| {
                    json!({
                        "kind": a.kind(),
                        "id": a.id(),
                        "name": a.name(),
                        "hostname": a.hostname(),
                        "is_dead": !a.is_live(),
                    })
                })
                .collect();
            return serde_json::to_string_pretty(&rows)
                .map_err(|e| FleetError::ConfigError(format!("Failed to render agents: {}", e)));
        }

        if agents.is_empty() {
            return Ok("No agents found.".to_string());
        }
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec!["Kind", "ID", "Name", "Hostname", "Status"]);
        for agent in &agents {
            table.add_row(vec![
                agent.kind().label(),
                agent.id().as_str(),
                agent.name(),
                agent.hostname(),
                if agent.is_live() { "alive" } else { "dead" },
            ]);
        }
        Ok(table.to_string())
    }
}
