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

// In-memory backend for the standalone role and tests

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::memory::InMemory;
use object_store::{Attribute, ObjectStore};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::backend::{object_attributes, object_path, put_if_absent, BlobStore, PutOutcome};
use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
}

pub struct MemoryBackend {
    bucket: String,
    store: InMemory,
}

impl MemoryBackend {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            store: InMemory::new(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let location = object_path(key).ok()?;
        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return None,
            Err(e) => {
                warn!("Failed to read '{}': {}", key, e);
                return None;
            }
        };

        let mut content_type = String::new();
        let mut metadata = HashMap::new();
        for (attribute, value) in result.attributes.iter() {
            match attribute {
                Attribute::ContentType => content_type = AsRef::<str>::as_ref(value).to_string(),
                Attribute::Metadata(name) => {
                    metadata.insert(name.to_string(), AsRef::<str>::as_ref(value).to_string());
                }
                _ => {}
            }
        }

        let body = result.bytes().await.ok()?;
        Some(StoredObject {
            body,
            content_type,
            metadata,
        })
    }

    /// All keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .store
            .list(None)
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.keys().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PutOutcome, StorageError> {
        let size = body.len();
        let location = object_path(key)?;
        let outcome = put_if_absent(
            &self.store,
            &location,
            body,
            object_attributes(content_type, metadata),
        )
        .await?;

        if outcome == PutOutcome::Created {
            debug!("Stored {} bytes at '{}'", size, key);
        }
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<bool, StorageError> {
        Ok(true)
    }

    fn backend_type(&self) -> &str {
        "memory"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
