// Configuration module for log-relay
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation, per role
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RelayConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
///
/// Without a file the built-in defaults are used, so a deployment can be
/// configured through the environment alone.
pub fn load_config_with_env<P: AsRef<Path>>(path: Option<P>) -> Result<RelayConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    apply_env_overrides(&mut config);

    ConfigLoader::validate(&config)?;

    Ok(config)
}

/// Allow environment variables to override config values
pub fn apply_env_overrides(config: &mut RelayConfig) {
    if let Ok(bucket) = std::env::var("BUCKET_NAME") {
        config.storage.bucket_name = bucket;
    }

    if let Ok(project_id) = std::env::var("PROJECT_ID") {
        config.project_id = project_id;
    }

    if let Ok(topic) = std::env::var("PUBSUB_TOPIC") {
        config.queue.topic = topic;
    }

    if let Ok(host) = std::env::var("PUBSUB_EMULATOR_HOST") {
        config.queue.pubsub.endpoint = emulator_url(&host);
        config.queue.pubsub.emulator = true;
    }

    if let Ok(host) = std::env::var("STORAGE_EMULATOR_HOST") {
        config.storage.gcs.endpoint = emulator_url(&host);
        config.storage.gcs.emulator = true;
    }

    if let Ok(token) = std::env::var("GCP_ACCESS_TOKEN") {
        config.auth.access_token = Some(token);
    }

    // Cloud Run and friends hand the port over in PORT
    if let Ok(port) = std::env::var("PORT") {
        let host = config
            .server
            .listen_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.server.listen_addr = format!("{}:{}", host, port);
    }
}

fn emulator_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("http://{}", host.trim_end_matches('/'))
    }
}
