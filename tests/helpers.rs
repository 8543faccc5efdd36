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

// Shared test doubles and request helpers
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt as _;
use log_relay::config::KeyDiscriminator;
use log_relay::error::{PublishError, StorageError};
use log_relay::processor::DeliveryProcessor;
use log_relay::queue::Publisher;
use log_relay::storage::{BlobStore, MemoryBackend, PutOutcome};
use log_relay::writer::StorageWriter;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const PROJECT_ID: &str = "test-project";
pub const PROCESSOR_ID: &str = "log-relay";

/// Publisher that keeps every payload it is handed
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<Bytes>>,
}

impl RecordingPublisher {
    pub fn payloads(&self) -> Vec<Bytes> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, data: Bytes) -> Result<String, PublishError> {
        let mut published = self.published.lock().unwrap();
        published.push(data);
        Ok(format!("msg-{}", published.len()))
    }

    fn topic(&self) -> &str {
        "projects/test-project/topics/logs"
    }

    fn backend_type(&self) -> &str {
        "recording"
    }
}

/// Publisher whose topic is always unavailable
pub struct FailingPublisher;

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _data: Bytes) -> Result<String, PublishError> {
        Err(PublishError::Rejected {
            status: 404,
            body: "Resource not found".to_string(),
        })
    }

    fn topic(&self) -> &str {
        "projects/test-project/topics/missing"
    }

    fn backend_type(&self) -> &str {
        "failing"
    }
}

/// Store that fails the first `failures` writes, then delegates to memory
pub struct FlakyStore {
    pub inner: MemoryBackend,
    failures: usize,
    pub attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryBackend::new("flaky-bucket"),
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self::new(usize::MAX)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
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
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(StorageError::ObjectStore(object_store::Error::Generic {
                store: "flaky",
                source: "backend unavailable".into(),
            }));
        }
        self.inner.put_object(key, body, content_type, metadata).await
    }

    async fn health_check(&self) -> Result<bool, StorageError> {
        Ok(self.attempts() >= self.failures)
    }

    fn backend_type(&self) -> &str {
        "flaky"
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }
}

/// Processor writing to `store` with no in-process retries
pub fn make_processor(store: Arc<dyn BlobStore>) -> Arc<DeliveryProcessor> {
    let writer = StorageWriter::new(store, 0, KeyDiscriminator::MessageId);
    Arc::new(DeliveryProcessor::new(
        writer,
        PROCESSOR_ID.to_string(),
        PROJECT_ID.to_string(),
    ))
}

pub fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

/// Send one request and return status plus JSON body
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
