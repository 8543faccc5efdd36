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

// Configuration types for log-relay

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which half of the pipeline this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// HTTP ingestion endpoint publishing to the queue
    Receiver,
    /// Push endpoint consuming queue deliveries into blob storage
    Processor,
    /// Both halves joined by an in-memory queue
    Standalone,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Receiver => write!(f, "receiver"),
            Role::Processor => write!(f, "processor"),
            Role::Standalone => write!(f, "standalone"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Project identifier stamped into every processed record
    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub processor: ProcessorSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Largest request body accepted by either endpoint
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Credentials for Google APIs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Static bearer token; wins over the credential chain
    #[serde(default)]
    pub access_token: Option<String>,

    /// Resolve Application Default Credentials (service account file,
    /// gcloud ADC, then the metadata server). Emulators ignore this.
    #[serde(default = "default_true", alias = "metadata_server")]
    pub default_credentials: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            default_credentials: default_true(),
        }
    }
}

/// Queue configuration with backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Backend type: "pubsub" or "memory"
    #[serde(default = "default_queue_backend")]
    pub backend: String,

    /// Topic name, either bare or `projects/{project}/topics/{name}`
    #[serde(default)]
    pub topic: String,

    #[serde(default)]
    pub pubsub: PubSubConfig,

    #[serde(default)]
    pub memory: MemoryQueueConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            topic: String::new(),
            pubsub: PubSubConfig::default(),
            memory: MemoryQueueConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PubSubConfig {
    #[serde(default = "default_pubsub_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Set when talking to the emulator; disables auth
    #[serde(default)]
    pub emulator: bool,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pubsub_endpoint(),
            timeout_seconds: default_timeout(),
            max_retries: default_retries(),
            emulator: false,
        }
    }
}

impl PubSubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// In-process queue used by the standalone role
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryQueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    #[serde(default = "default_delivery_workers")]
    pub workers: usize,

    /// Deliveries before a message is dead-lettered
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            workers: default_delivery_workers(),
            max_delivery_attempts: default_max_delivery_attempts(),
        }
    }
}

/// Storage configuration with backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend type: "gcs", "filesystem", "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    #[serde(default)]
    pub bucket_name: String,

    /// In-process write attempts before the failure is handed back to the queue
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub gcs: GcsConfig,

    #[serde(default)]
    pub filesystem: FilesystemConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket_name: String::new(),
            max_retries: default_retries(),
            gcs: GcsConfig::default(),
            filesystem: FilesystemConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GcsConfig {
    /// Only consulted in emulator mode; production traffic goes to Google
    #[serde(default = "default_gcs_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Set when talking to an emulator such as fake-gcs-server; disables
    /// auth and sends requests to `endpoint`
    #[serde(default)]
    pub emulator: bool,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_gcs_endpoint(),
            timeout_seconds: default_timeout(),
            emulator: false,
        }
    }
}

impl GcsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

/// How the storage key is made unique beyond its microsecond timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDiscriminator {
    /// Queue message id; redeliveries of one message share a key
    #[default]
    MessageId,
    /// Fresh random token per write
    Random,
    /// Timestamp only
    None,
}

/// Delivery processor settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorSettings {
    #[serde(default = "default_processor_id")]
    pub processor_id: String,

    #[serde(default)]
    pub key_discriminator: KeyDiscriminator,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            processor_id: default_processor_id(),
            key_discriminator: KeyDiscriminator::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,  // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String,  // "text", "json"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_listen_addr() -> String { "0.0.0.0:8080".to_string() }
fn default_max_body_bytes() -> usize { 1024 * 1024 }
fn default_queue_backend() -> String { "pubsub".to_string() }
fn default_pubsub_endpoint() -> String { "https://pubsub.googleapis.com".to_string() }
fn default_storage_backend() -> String { "gcs".to_string() }
fn default_gcs_endpoint() -> String { "https://storage.googleapis.com".to_string() }
fn default_base_path() -> String { "/data/logs".to_string() }
fn default_timeout() -> u64 { 60 }
fn default_retries() -> u32 { 3 }
fn default_queue_capacity() -> usize { 1000 }
fn default_delivery_workers() -> usize { 4 }
fn default_max_delivery_attempts() -> u32 { 5 }
fn default_processor_id() -> String { "log-relay".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
