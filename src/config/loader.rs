// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RelayConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        Self::parse(&content)
    }

    /// Parse YAML text after substituting environment variables
    pub fn parse(content: &str) -> Result<RelayConfig> {
        let content = Self::substitute_env_vars(content);

        let config: RelayConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${BUCKET_NAME} -> my-log-bucket
    /// - ${PUBSUB_TOPIC:-logs} -> logs (if PUBSUB_TOPIC not set)
    pub(crate) fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("env substitution pattern is valid")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        })
        .to_string()
    }

    /// Checks that hold for every role
    pub fn validate(config: &RelayConfig) -> Result<()> {
        match config.queue.backend.as_str() {
            "pubsub" | "memory" => {}
            unknown => bail!("Unknown queue backend: '{}'. Supported: pubsub, memory", unknown),
        }

        match config.storage.backend.as_str() {
            "gcs" | "memory" => {}
            "filesystem" => {
                if config.storage.filesystem.base_path.is_empty() {
                    bail!("storage.filesystem.base_path cannot be empty");
                }
            }
            unknown => bail!(
                "Unknown storage backend: '{}'. Supported: gcs, filesystem, memory",
                unknown
            ),
        }

        if config.queue.memory.capacity == 0 {
            bail!("queue.memory.capacity must be > 0");
        }

        if config.queue.memory.workers == 0 {
            bail!("queue.memory.workers must be > 0");
        }

        if config.queue.memory.max_delivery_attempts == 0 {
            bail!("queue.memory.max_delivery_attempts must be > 0");
        }

        if config.processor.processor_id.is_empty() {
            bail!("processor.processor_id cannot be empty");
        }

        match config.logging.format.as_str() {
            "text" | "json" => {}
            unknown => bail!("Unknown logging format: '{}'. Supported: text, json", unknown),
        }

        Ok(())
    }

    /// Checks for the settings a given role actually reads
    pub fn validate_for(config: &RelayConfig, role: Role) -> Result<()> {
        Self::validate(config)?;

        if config.project_id.is_empty() {
            bail!("project_id is required (set PROJECT_ID)");
        }

        let needs_queue = matches!(role, Role::Receiver | Role::Standalone);
        let needs_storage = matches!(role, Role::Processor | Role::Standalone);

        if needs_queue && config.queue.topic.is_empty() {
            bail!("queue.topic is required for the {} role (set PUBSUB_TOPIC)", role);
        }

        if role == Role::Receiver && config.queue.backend == "memory" {
            bail!("the memory queue backend only has a consumer in the standalone role");
        }

        if needs_storage && config.storage.bucket_name.is_empty() {
            bail!("storage.bucket_name is required for the {} role (set BUCKET_NAME)", role);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.project_id = "demo-project".to_string();
        config.queue.topic = "logs".to_string();
        config.storage.bucket_name = "demo-logs".to_string();
        config
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LOG_RELAY_TEST_VAR", "test_value");

        let input = "bucket_name: ${LOG_RELAY_TEST_VAR}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "bucket_name: test_value");

        std::env::remove_var("LOG_RELAY_TEST_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("LOG_RELAY_TEST_VAR2");

        let input = "topic: ${LOG_RELAY_TEST_VAR2:-fallback-topic}";
        let output = ConfigLoader::substitute_env_vars(input);
        assert_eq!(output, "topic: fallback-topic");
    }

    #[test]
    fn test_env_var_missing_without_default_is_kept() {
        std::env::remove_var("LOG_RELAY_TEST_VAR3");

        let output = ConfigLoader::substitute_env_vars("x: ${LOG_RELAY_TEST_VAR3}");
        assert_eq!(output, "x: ${LOG_RELAY_TEST_VAR3}");
    }

    #[test]
    fn test_validation_unknown_storage_backend() {
        let mut config = complete_config();
        config.storage.backend = "s3".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown storage backend"));
    }

    #[test]
    fn test_validation_zero_workers() {
        let mut config = complete_config();
        config.queue.memory.workers = 0;

        let result = ConfigLoader::validate(&config);
        assert!(result.unwrap_err().to_string().contains("workers"));
    }

    #[test]
    fn test_processor_requires_bucket() {
        let mut config = complete_config();
        config.storage.bucket_name.clear();

        let err = ConfigLoader::validate_for(&config, Role::Processor).unwrap_err();
        assert!(err.to_string().contains("BUCKET_NAME"));

        // The receiver never touches storage
        assert!(ConfigLoader::validate_for(&config, Role::Receiver).is_ok());
    }

    #[test]
    fn test_receiver_requires_topic() {
        let mut config = complete_config();
        config.queue.topic.clear();

        let err = ConfigLoader::validate_for(&config, Role::Receiver).unwrap_err();
        assert!(err.to_string().contains("PUBSUB_TOPIC"));
        assert!(ConfigLoader::validate_for(&config, Role::Processor).is_ok());
    }

    #[test]
    fn test_every_role_requires_project() {
        let mut config = complete_config();
        config.project_id.clear();

        for role in [Role::Receiver, Role::Processor, Role::Standalone] {
            assert!(ConfigLoader::validate_for(&config, role).is_err());
        }
    }

    #[test]
    fn test_receiver_rejects_memory_queue() {
        let mut config = complete_config();
        config.queue.backend = "memory".to_string();

        assert!(ConfigLoader::validate_for(&config, Role::Receiver).is_err());
    }

    #[test]
    fn test_default_credentials_on_unless_disabled() {
        let config = ConfigLoader::parse("project_id: demo\n").unwrap();
        assert!(config.auth.default_credentials);

        let config = ConfigLoader::parse("auth:\n  metadata_server: false\n").unwrap();
        assert!(!config.auth.default_credentials);
    }
}
