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

// Blob store trait for create-only object writes

use async_trait::async_trait;
use bytes::Bytes;
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutMode, PutOptions, PutPayload,
};
use std::collections::HashMap;

use crate::error::StorageError;
use crate::retry::retry_with_backoff;

/// Result of a create-if-absent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    /// An object already sits at the key; nothing was written
    AlreadyExists,
}

/// Generic blob store trait for write-only log persistence
///
/// Objects are never updated: `put_object` must not replace an existing
/// object. Reading and listing are left to the store's own tooling.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Initialize the backend (check or create the bucket)
    async fn initialize(&self) -> Result<(), StorageError>;

    /// Create an object unless one already exists at `key`
    ///
    /// # Arguments
    /// * `key` - Object key inside the configured bucket
    /// * `body` - Object contents
    /// * `content_type` - MIME type stored with the object
    /// * `metadata` - Custom key/value metadata
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PutOutcome, StorageError>;

    /// `put_object` with exponential backoff on transient failures
    async fn put_with_retry(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &HashMap<String, String>,
        max_retries: u32,
    ) -> Result<PutOutcome, StorageError> {
        let what = format!("Upload of '{}'", key);
        retry_with_backoff(&what, max_retries, StorageError::is_retryable, || {
            self.put_object(key, body.clone(), content_type, metadata)
        })
        .await
    }

    /// Health check
    async fn health_check(&self) -> Result<bool, StorageError>;

    /// Get backend type identifier
    fn backend_type(&self) -> &str;

    /// Bucket the objects go to
    fn bucket(&self) -> &str;
}

/// Object path for a storage key
pub fn object_path(key: &str) -> Result<Path, StorageError> {
    Path::parse(key).map_err(|source| StorageError::InvalidKey {
        key: key.to_string(),
        source,
    })
}

/// Content type plus custom metadata as object attributes
pub fn object_attributes(content_type: &str, metadata: &HashMap<String, String>) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        Attribute::ContentType,
        AttributeValue::from(content_type.to_string()),
    );
    for (name, value) in metadata {
        attributes.insert(
            Attribute::Metadata(name.clone().into()),
            AttributeValue::from(value.clone()),
        );
    }
    attributes
}

/// Create-only put; an occupied path comes back as `AlreadyExists`
pub async fn put_if_absent(
    store: &dyn ObjectStore,
    location: &Path,
    body: Bytes,
    attributes: Attributes,
) -> Result<PutOutcome, StorageError> {
    let opts = PutOptions {
        mode: PutMode::Create,
        attributes,
        ..Default::default()
    };

    match store.put_opts(location, PutPayload::from(body), opts).await {
        Ok(_) => Ok(PutOutcome::Created),
        Err(object_store::Error::AlreadyExists { .. })
        | Err(object_store::Error::Precondition { .. }) => Ok(PutOutcome::AlreadyExists),
        Err(e) => Err(StorageError::ObjectStore(e)),
    }
}
