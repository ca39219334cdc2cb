mod broker;
mod config;
mod consumer;
mod error;
mod handler;
mod log_message;
mod publisher;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use crate::broker::Broker;
use crate::config::Command;
use crate::handler::PrintHandler;

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Failed to initialize logger")?;

    info!("Starting device-log-consumer");

    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;
    info!("Configuration loaded: queue '{}'", config.queue);

    let broker = Broker::connect(&config)
        .await
        .context("Failed to connect to broker")?;

    // Idempotent, so both subcommands may declare it
    broker
        .ensure_queue(&config.queue)
        .await
        .with_context(|| format!("Failed to declare queue '{}'", config.queue))?;

    let outcome = match cli.command {
        Some(Command::Publish(ref args)) => {
            let message = publisher::message_from_args(args);
            publisher::publish(&broker, &config.queue, &message).await
        }
        Some(Command::Consume) | None => {
            let mut handler = PrintHandler::stdout();
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            consumer::run(&broker, &config, &mut handler, shutdown).await
        }
    };

    // Released on every exit path that gets this far
    broker.close().await;

    outcome.context("Consumer terminated with an error")
}
