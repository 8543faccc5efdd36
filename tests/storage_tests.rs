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

// Storage writer against the filesystem backend

use bytes::Bytes;
use log_relay::auth::TokenSource;
use log_relay::config::{FilesystemConfig, KeyDiscriminator, MemoryQueueConfig, StorageConfig};
use log_relay::queue::{MemoryQueue, Publisher};
use log_relay::record::LogRecord;
use log_relay::storage::filesystem::ObjectMetadata;
use log_relay::storage::{BackendFactory, BlobStore, FilesystemBackend, PutOutcome};
use log_relay::writer::StorageWriter;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

mod helpers;
use helpers::make_processor;

fn filesystem_backend() -> (Arc<FilesystemBackend>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = FilesystemConfig {
        base_path: temp_dir.path().to_string_lossy().to_string(),
    };
    (
        Arc::new(FilesystemBackend::new(&config, "relay-logs".to_string()).unwrap()),
        temp_dir,
    )
}

#[tokio::test]
async fn test_writer_lays_out_hourly_partitions_on_disk() {
    let (backend, temp_dir) = filesystem_backend();
    backend.initialize().await.unwrap();
    let writer = StorageWriter::new(backend.clone(), 2, KeyDiscriminator::None);

    let record = LogRecord::from_value(json!({
        "level": "ERROR",
        "source": "billing",
        "timestamp": "2026-01-07T12:34:56.789Z",
        "message": "charge failed"
    }))
    .unwrap();
    let receipt = writer.write(&record, Some("123")).await.unwrap();

    assert_eq!(
        receipt.key,
        "logs/2026/01/07/12/log_20260107_123456_789000.json"
    );
    let path = temp_dir
        .path()
        .join("relay-logs/logs/2026/01/07/12/log_20260107_123456_789000.json");
    assert!(path.exists());

    let body: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(body["message"], "charge failed");

    let sidecar: ObjectMetadata =
        serde_json::from_slice(&std::fs::read(backend.metadata_path(&receipt.key)).unwrap())
            .unwrap();
    assert_eq!(sidecar.content_type, "application/json");
    assert_eq!(sidecar.metadata["level"], "ERROR");
    assert_eq!(sidecar.metadata["source"], "billing");
}

#[tokio::test]
async fn test_filesystem_redelivery_keeps_first_object() {
    let (backend, _temp_dir) = filesystem_backend();
    backend.initialize().await.unwrap();
    let writer = StorageWriter::new(backend.clone(), 0, KeyDiscriminator::MessageId);

    let record = LogRecord::from_value(json!({"timestamp": "2026-01-07T12:00:00Z", "n": 1})).unwrap();
    let first = writer.write(&record, Some("abc")).await.unwrap();
    let second = writer.write(&record, Some("abc")).await.unwrap();

    assert_eq!(first.outcome, PutOutcome::Created);
    assert_eq!(second.outcome, PutOutcome::AlreadyExists);
    assert_eq!(first.key, second.key);
}

#[tokio::test]
async fn test_concurrent_writes_to_one_key_create_once() {
    let (backend, _temp_dir) = filesystem_backend();
    backend.initialize().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let backend = backend.clone();
        handles.push(tokio::spawn(async move {
            backend
                .put_object(
                    "logs/2026/01/07/12/same.json",
                    Bytes::from(format!("{{\"writer\":{}}}", i)),
                    "application/json",
                    &Default::default(),
                )
                .await
                .unwrap()
        }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap() == PutOutcome::Created {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_factory_builds_working_filesystem_store() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = StorageConfig {
        backend: "filesystem".to_string(),
        bucket_name: "factory-bucket".to_string(),
        ..StorageConfig::default()
    };
    config.filesystem.base_path = temp_dir.path().to_string_lossy().to_string();

    let store = BackendFactory::create(&config, &TokenSource::Anonymous).unwrap();
    store.initialize().await.unwrap();
    assert!(store.health_check().await.unwrap());
    assert!(temp_dir.path().join("factory-bucket").is_dir());
}

fn stored_records(root: &std::path::Path) -> Vec<Value> {
    let mut records = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if path.is_dir() {
                dirs.push(path);
            } else if name.starts_with("log_") && !name.ends_with(".meta.json") {
                records.push(serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap());
            }
        }
    }
    records
}

#[tokio::test]
async fn test_distinct_records_with_same_timestamp_survive_without_discriminator() {
    let (backend, temp_dir) = filesystem_backend();
    let writer = StorageWriter::new(backend.clone(), 0, KeyDiscriminator::None);

    for n in 0..3 {
        let record =
            LogRecord::from_value(json!({"timestamp": "2026-01-07T12:00:00Z", "n": n})).unwrap();
        let receipt = writer.write(&record, None).await.unwrap();
        assert_eq!(receipt.outcome, PutOutcome::Created);
    }

    let mut seen: Vec<i64> = stored_records(temp_dir.path())
        .iter()
        .map(|r| r["n"].as_i64().unwrap())
        .collect();
    seen.sort();
    assert_eq!(seen, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_restarted_standalone_does_not_reuse_keys() {
    let (backend, temp_dir) = filesystem_backend();
    let config = MemoryQueueConfig {
        capacity: 4,
        workers: 1,
        max_delivery_attempts: 3,
    };

    // Each run is a fresh queue over the same directory
    for run in ["first", "second"] {
        let queue = Arc::new(MemoryQueue::new("logs", &config));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = queue.spawn_workers(make_processor(backend.clone()), 1, shutdown_rx);

        let payload = json!({"timestamp": "2026-01-07T12:00:00Z", "run": run});
        queue.publish(Bytes::from(payload.to_string())).await.unwrap();

        assert!(queue.wait_idle(Duration::from_secs(5)).await);
        let _ = shutdown_tx.send(true);
        for worker in workers {
            worker.await.unwrap();
        }
    }

    let mut runs: Vec<String> = stored_records(temp_dir.path())
        .iter()
        .map(|r| r["run"].as_str().unwrap().to_string())
        .collect();
    runs.sort();
    assert_eq!(runs, vec!["first", "second"]);
}
