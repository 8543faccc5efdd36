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

// Backend factory for creating blob stores from configuration

use super::backend::BlobStore;
use super::filesystem::FilesystemBackend;
use super::gcs::GcsBackend;
use super::memory::MemoryBackend;
use crate::auth::TokenSource;
use crate::config::StorageConfig;
use anyhow::{bail, Context, Result};
use std::sync::Arc;

pub struct BackendFactory;

impl BackendFactory {
    /// Create blob store from configuration
    pub fn create(config: &StorageConfig, tokens: &TokenSource) -> Result<Arc<dyn BlobStore>> {
        match config.backend.as_str() {
            "gcs" => {
                let backend = GcsBackend::new(&config.gcs, config.bucket_name.clone(), tokens)
                    .context("Failed to build GCS client")?;
                Ok(Arc::new(backend))
            }

            "filesystem" => {
                let backend =
                    FilesystemBackend::new(&config.filesystem, config.bucket_name.clone())
                        .context("Failed to open filesystem store")?;
                Ok(Arc::new(backend))
            }

            "memory" => Ok(Arc::new(MemoryBackend::new(config.bucket_name.clone()))),

            unknown => bail!(
                "Unknown storage backend: '{}'. Supported: gcs, filesystem, memory",
                unknown
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_config(backend: &str) -> StorageConfig {
        StorageConfig {
            backend: backend.to_string(),
            bucket_name: "logs-bucket".to_string(),
            ..StorageConfig::default()
        }
    }

    #[test]
    fn test_create_gcs_backend() {
        let backend = BackendFactory::create(&storage_config("gcs"), &TokenSource::Anonymous);
        let backend = backend.unwrap();
        assert_eq!(backend.backend_type(), "gcs");
        assert_eq!(backend.bucket(), "logs-bucket");
    }

    #[test]
    fn test_create_filesystem_backend() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = storage_config("filesystem");
        config.filesystem.base_path = temp_dir.path().to_string_lossy().to_string();

        let backend = BackendFactory::create(&config, &TokenSource::Anonymous);
        assert_eq!(backend.unwrap().backend_type(), "filesystem");
        assert!(temp_dir.path().join("logs-bucket").is_dir());
    }

    #[test]
    fn test_create_memory_backend() {
        let backend =
            BackendFactory::create(&storage_config("memory"), &TokenSource::Anonymous);
        assert_eq!(backend.unwrap().backend_type(), "memory");
    }

    #[test]
    fn test_create_unknown_backend() {
        let backend =
            BackendFactory::create(&storage_config("s3"), &TokenSource::Anonymous);
        assert!(backend.is_err());
        if let Err(e) = backend {
            assert!(e.to_string().contains("Unknown storage backend"));
        }
    }
}
