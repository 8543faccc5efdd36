// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use log_relay::config::{load_config_with_env, ConfigLoader, LoggingConfig, Role};
use log_relay::server;

#[derive(Subcommand, Clone, Copy, Debug)]
enum Command {
    /// Accept logs over HTTP and publish them to the queue
    Receiver,
    /// Accept push deliveries and write them to blob storage
    Processor,
    /// Run both halves around an in-memory queue
    Standalone,
}

impl From<Command> for Role {
    fn from(command: Command) -> Self {
        match command {
            Command::Receiver => Role::Receiver,
            Command::Processor => Role::Processor,
            Command::Standalone => Role::Standalone,
        }
    }
}

/// Log Relay - HTTP log ingestion into timestamp-partitioned blob storage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Listen address (overrides config file and PORT)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();
    let role = Role::from(args.command);

    // Load configuration from file and environment
    let mut config = load_config_with_env(args.config.as_ref())?;

    // Apply CLI overrides
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }

    init_tracing(&config.logging)?;

    ConfigLoader::validate_for(&config, role)?;

    info!("Starting log-relay as {}", role);
    match &args.config {
        Some(path) => info!("Loaded configuration from: {:?}", path),
        None => info!("No configuration file, using defaults and environment"),
    }
    info!("Queue backend: {}", config.queue.backend);
    info!("Storage backend: {}", config.storage.backend);

    server::run(config, role).await?;

    info!("log-relay shut down successfully");
    Ok(())
}
