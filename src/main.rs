//! nodeagent - Main Entry Point

use clap::{Parser, Subcommand};
use nodeagent::agent::{build_host_agent, Runtime};
use nodeagent::config::AgentConfig;
use nodeagent::observability::init_default_logging;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};

/// Telemetry and control agent for a networked sensor node
#[derive(Parser)]
#[command(name = "nodeagent")]
#[command(about = "Telemetry and control agent for a networked sensor node")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "NODEAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent until SIGINT or SIGTERM
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

const DEFAULT_CONFIG_PATHS: &[&str] = &["nodeagent.toml", "config/nodeagent.toml"];

fn main() {
    let cli = Cli::parse();

    let level_override = match cli.verbose {
        0 => None,
        1 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    };
    init_default_logging(level_override);

    info!("Starting nodeagent v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_agent(&config),
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: Option<&PathBuf>,
) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(AgentConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(AgentConfig::load_from_file(&path)?);
        }
    }

    Err(format!(
        "no configuration file found; pass -c/--config or create one of {DEFAULT_CONFIG_PATHS:?}"
    )
    .into())
}

fn run_agent(config: &AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(device = %config.device.name, broker = %config.mqtt.broker_url, "Building agent");

    let agent = build_host_agent(config)?;
    let runtime = Runtime::new(agent, &config.agent);
    runtime.register_signal_handlers()?;

    let agent = runtime.run();
    let metrics = agent.metrics();
    info!(
        readings_published = metrics.readings_published,
        events_published = metrics.events_published,
        commands_applied = metrics.commands_applied,
        "Agent stopped"
    );
    Ok(())
}

fn handle_config_command(
    config: &AgentConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = config.require_credentials() {
        error!("Credential check failed: {}", e);
    }

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    } else {
        println!("Configuration is valid");
    }
    Ok(())
}
