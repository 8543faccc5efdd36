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

// Filesystem backend implementation

use super::backend::{object_path, put_if_absent, BlobStore, PutOutcome};
use crate::config::FilesystemConfig;
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::{Attributes, ObjectStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Sidecar written next to every object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

/// Filesystem backend laying objects out as `{base_path}/{bucket}/{key}`
///
/// Files carry no attributes, so content type and metadata go to a
/// `{key}.meta.json` sidecar written once the body is in place.
pub struct FilesystemBackend {
    bucket: String,
    bucket_path: PathBuf,
    store: LocalFileSystem,
}

impl FilesystemBackend {
    pub fn new(config: &FilesystemConfig, bucket: String) -> Result<Self, StorageError> {
        let bucket_path = PathBuf::from(&config.base_path).join(&bucket);

        info!(
            "Initializing filesystem backend at: {}",
            bucket_path.display()
        );

        // The store resolves its prefix eagerly, so the directory must exist
        std::fs::create_dir_all(&bucket_path).map_err(|source| StorageError::Io {
            path: bucket_path.clone(),
            source,
        })?;
        let store = LocalFileSystem::new_with_prefix(&bucket_path)?;

        Ok(Self {
            bucket,
            bucket_path,
            store,
        })
    }

    /// Path of the object stored under `key`
    pub fn object_path(&self, key: &str) -> PathBuf {
        self.bucket_path.join(key)
    }

    /// Path of the metadata sidecar for `key`
    pub fn metadata_path(&self, key: &str) -> PathBuf {
        self.bucket_path.join(format!("{}{}", key, SIDECAR_SUFFIX))
    }
}

#[async_trait]
impl BlobStore for FilesystemBackend {
    async fn initialize(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.bucket_path)
            .await
            .map_err(|source| StorageError::Io {
                path: self.bucket_path.clone(),
                source,
            })
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PutOutcome, StorageError> {
        let location = object_path(key)?;
        let size = body.len();
        debug!("Writing {} bytes to {}", size, self.object_path(key).display());

        let outcome = put_if_absent(&self.store, &location, body, Attributes::new()).await?;
        if outcome == PutOutcome::AlreadyExists {
            return Ok(outcome);
        }

        // Only the writer that created the body gets to describe it
        let sidecar = serde_json::to_vec_pretty(&ObjectMetadata {
            content_type: content_type.to_string(),
            metadata: metadata.clone(),
        })?;
        let sidecar_location = object_path(&format!("{}{}", key, SIDECAR_SUFFIX))?;
        if put_if_absent(&self.store, &sidecar_location, Bytes::from(sidecar), Attributes::new())
            .await?
            == PutOutcome::AlreadyExists
        {
            warn!("Metadata sidecar for '{}' already existed; kept it", key);
        }

        info!(
            "Successfully wrote {} bytes to '{}'",
            size,
            self.object_path(key).display()
        );
        Ok(PutOutcome::Created)
    }

    async fn health_check(&self) -> Result<bool, StorageError> {
        // Check if the bucket directory is accessible and writable
        match fs::metadata(&self.bucket_path).await {
            Ok(metadata) if metadata.is_dir() => {
                let test_file = self.bucket_path.join(".health_check_test");
                match fs::File::create(&test_file).await {
                    Ok(mut f) => {
                        if let Err(e) = f.write_all(b"test").await {
                            warn!("Health check failed - cannot write: {}", e);
                            return Ok(false);
                        }
                        let _ = fs::remove_file(&test_file).await;
                        Ok(true)
                    }
                    Err(e) => {
                        warn!("Health check failed - cannot create file: {}", e);
                        Ok(false)
                    }
                }
            }
            Ok(_) => {
                warn!(
                    "Health check failed - bucket path is not a directory: {}",
                    self.bucket_path.display()
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    "Health check failed - cannot access bucket path {}: {}",
                    self.bucket_path.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    fn backend_type(&self) -> &str {
        "filesystem"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
