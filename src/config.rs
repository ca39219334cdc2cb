use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_AMQP_URL: &str = "amqp://127.0.0.1:5672/%2f";
pub const DEFAULT_QUEUE: &str = "device_logs";
pub const DEFAULT_CONSUMER_TAG: &str = "device-log-consumer";

#[derive(Parser, Debug)]
#[clap(name = "device-log-consumer", version, about)]
pub struct Cli {
    /// Path to an optional TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Override the broker URL
    #[clap(long)]
    pub amqp_url: Option<String>,

    /// Override the queue name
    #[clap(long)]
    pub queue: Option<String>,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every record delivered to the queue (default)
    Consume,

    /// Publish one device log record to the queue
    Publish(PublishArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct PublishArgs {
    #[clap(long)]
    pub user: Option<String>,

    #[clap(long)]
    pub os: Option<String>,

    #[clap(long)]
    pub device_model: Option<String>,

    #[clap(long)]
    pub geolocation: Option<String>,

    #[clap(long)]
    pub accelerometer: Option<String>,

    #[clap(long)]
    pub available_devices: Option<String>,

    #[clap(long)]
    pub wifi_signal_strength: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub amqp_url: String,
    pub queue: String,
    pub consumer_tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            amqp_url: DEFAULT_AMQP_URL.to_string(),
            queue: DEFAULT_QUEUE.to_string(),
            consumer_tag: DEFAULT_CONSUMER_TAG.to_string(),
        }
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => {
            let config_content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            parse_config(&config_content)?
        }
        None => Config::default(),
    };

    // Apply CLI overrides
    if let Some(ref amqp_url) = cli.amqp_url {
        config.amqp_url = amqp_url.clone();
    }

    if let Some(ref queue) = cli.queue {
        config.queue = queue.clone();
    }

    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse config file")
}
