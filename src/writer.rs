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

//! Turns a processed record into one immutable object in blob storage.

use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::KeyDiscriminator;
use crate::error::StorageError;
use crate::partition::{blob_key, partition_time};
use crate::record::{iso_timestamp, LogRecord};
use crate::storage::{BlobStore, PutOutcome};

pub const CONTENT_TYPE: &str = "application/json";

/// Keys tried for one record before giving up on finding a free one
const MAX_KEY_ATTEMPTS: u32 = 4;

/// Where a record ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub key: String,
    pub outcome: PutOutcome,
}

pub struct StorageWriter {
    store: Arc<dyn BlobStore>,
    max_retries: u32,
    discriminator: KeyDiscriminator,
}

impl StorageWriter {
    pub fn new(store: Arc<dyn BlobStore>, max_retries: u32, discriminator: KeyDiscriminator) -> Self {
        Self {
            store,
            max_retries,
            discriminator,
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Write `record` under a key derived from its timestamp
    ///
    /// When the key carries the message id, an object already there is an
    /// earlier delivery of the same message and counts as written. Any other
    /// occupied key belongs to a different record, so a fresh random suffix
    /// is tried instead.
    pub async fn write(
        &self,
        record: &LogRecord,
        message_id: Option<&str>,
    ) -> Result<WriteReceipt, StorageError> {
        let now = Utc::now();
        let filed_at = partition_time(record.timestamp.as_deref(), now);
        let message_id = message_id.filter(|id| !id.is_empty());

        let body = Bytes::from(serde_json::to_vec_pretty(record)?);

        let mut metadata = HashMap::with_capacity(3);
        metadata.insert("level".to_string(), record.level().to_string());
        metadata.insert("source".to_string(), record.source().to_string());
        metadata.insert("processed_at".to_string(), iso_timestamp(now));

        let identified = self.discriminator == KeyDiscriminator::MessageId && message_id.is_some();
        let mut key = blob_key(filed_at, self.discriminator_for(message_id).as_deref());

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let outcome = self
                .store
                .put_with_retry(&key, body.clone(), CONTENT_TYPE, &metadata, self.max_retries)
                .await
                .map_err(|e| {
                    error!("Failed to store log at '{}': {}", key, e);
                    e
                })?;

            match outcome {
                PutOutcome::Created => {
                    info!("Stored log in {}/{}", self.store.bucket(), key);
                    return Ok(WriteReceipt { key, outcome });
                }
                PutOutcome::AlreadyExists if identified => {
                    info!("Object '{}' already exists, treating redelivery as stored", key);
                    return Ok(WriteReceipt { key, outcome });
                }
                PutOutcome::AlreadyExists => {
                    let next = blob_key(filed_at, Some(&random_suffix()));
                    warn!(
                        "Key '{}' is taken by another record (attempt {}/{}), trying '{}'",
                        key, attempt, MAX_KEY_ATTEMPTS, next
                    );
                    key = next;
                }
            }
        }

        error!("No free key for record filed at {}", filed_at.to_rfc3339());
        Err(StorageError::KeyCollision {
            key,
            attempts: MAX_KEY_ATTEMPTS,
        })
    }

    fn discriminator_for(&self, message_id: Option<&str>) -> Option<String> {
        match self.discriminator {
            KeyDiscriminator::MessageId => {
                Some(message_id.map(str::to_string).unwrap_or_else(random_suffix))
            }
            KeyDiscriminator::Random => Some(random_suffix()),
            KeyDiscriminator::None => None,
        }
    }
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde_json::json;

    fn writer(discriminator: KeyDiscriminator) -> (StorageWriter, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new("bucket"));
        let writer = StorageWriter::new(backend.clone(), 0, discriminator);
        (writer, backend)
    }

    #[tokio::test]
    async fn test_write_partitions_by_record_timestamp() {
        let (writer, backend) = writer(KeyDiscriminator::None);
        let record = LogRecord::from_value(json!({
            "level": "WARN",
            "source": "svc-a",
            "timestamp": "2026-01-07T12:00:00Z"
        }))
        .unwrap();

        let receipt = writer.write(&record, Some("7")).await.unwrap();
        assert_eq!(receipt.key, "logs/2026/01/07/12/log_20260107_120000_000000.json");
        assert_eq!(receipt.outcome, PutOutcome::Created);

        let stored = backend.get(&receipt.key).await.unwrap();
        assert_eq!(stored.content_type, CONTENT_TYPE);
        assert_eq!(stored.metadata["level"], "WARN");
        assert_eq!(stored.metadata["source"], "svc-a");
        assert!(stored.metadata.contains_key("processed_at"));
    }

    #[tokio::test]
    async fn test_metadata_defaults() {
        let (writer, backend) = writer(KeyDiscriminator::Random);
        let record = LogRecord::from_value(json!({"message": "m"})).unwrap();

        let receipt = writer.write(&record, None).await.unwrap();
        let stored = backend.get(&receipt.key).await.unwrap();
        assert_eq!(stored.metadata["level"], "INFO");
        assert_eq!(stored.metadata["source"], "unknown");

        // Defaults go to metadata only
        let body: serde_json::Value = serde_json::from_slice(&stored.body).unwrap();
        assert_eq!(body, json!({"message": "m"}));
    }

    #[tokio::test]
    async fn test_redelivery_lands_on_same_key() {
        let (writer, backend) = writer(KeyDiscriminator::MessageId);
        let record =
            LogRecord::from_value(json!({"timestamp": "2026-01-07T12:00:00Z", "n": 1})).unwrap();

        let first = writer.write(&record, Some("99")).await.unwrap();
        let second = writer.write(&record, Some("99")).await.unwrap();

        assert_eq!(first.key, second.key);
        assert!(first.key.ends_with("_99.json"));
        assert_eq!(second.outcome, PutOutcome::AlreadyExists);
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_microsecond_distinct_messages() {
        let (writer, backend) = writer(KeyDiscriminator::MessageId);
        let record = LogRecord::from_value(json!({"timestamp": "2026-01-07T12:00:00Z"})).unwrap();

        writer.write(&record, Some("1")).await.unwrap();
        writer.write(&record, Some("2")).await.unwrap();
        assert_eq!(backend.len().await, 2);
    }

    #[tokio::test]
    async fn test_distinct_records_sharing_a_key_are_both_kept() {
        let (writer, backend) = writer(KeyDiscriminator::None);
        let first =
            LogRecord::from_value(json!({"timestamp": "2026-01-07T12:00:00Z", "n": 1})).unwrap();
        let second =
            LogRecord::from_value(json!({"timestamp": "2026-01-07T12:00:00Z", "n": 2})).unwrap();

        let a = writer.write(&first, None).await.unwrap();
        let b = writer.write(&second, None).await.unwrap();

        assert_eq!(a.key, "logs/2026/01/07/12/log_20260107_120000_000000.json");
        assert_ne!(a.key, b.key);
        assert_eq!(b.outcome, PutOutcome::Created);
        assert!(b.key.starts_with("logs/2026/01/07/12/log_20260107_120000_000000_"));

        let stored: serde_json::Value =
            serde_json::from_slice(&backend.get(&b.key).await.unwrap().body).unwrap();
        assert_eq!(stored["n"], 2);
        assert_eq!(backend.len().await, 2);
    }

    #[tokio::test]
    async fn test_collision_without_message_id_gets_fresh_key() {
        let (writer, backend) = writer(KeyDiscriminator::MessageId);
        let record = LogRecord::from_value(json!({"timestamp": "2026-01-07T12:00:00Z"})).unwrap();

        writer.write(&record, None).await.unwrap();
        writer.write(&record, Some("")).await.unwrap();
        assert_eq!(backend.len().await, 2);
    }
}
