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

//! Error taxonomy for both halves of the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure obtaining a bearer token for Google APIs
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential lookup failed: {0}")]
    Credentials(#[from] object_store::Error),

    #[error("access token is not a valid header value")]
    InvalidToken,
}

/// Failure publishing to the queue
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("queue '{topic}' is full ({capacity} messages)")]
    QueueFull { topic: String, capacity: usize },

    #[error("publish request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("publish rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("publish response carried no message id")]
    MissingMessageId,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl PublishError {
    /// Whether another attempt has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Transport(e) => !e.is_builder(),
            PublishError::Rejected { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

/// Failure persisting an object
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("invalid object key '{key}': {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: object_store::path::Error,
    },

    /// Every candidate key was already taken by another record
    #[error("no free key for '{key}' after {attempts} attempts")]
    KeyCollision { key: String, attempts: u32 },

    #[error("failed to serialize object: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Io { .. } => true,
            StorageError::ObjectStore(e) => !matches!(
                e,
                object_store::Error::NotFound { .. }
                    | object_store::Error::AlreadyExists { .. }
                    | object_store::Error::Precondition { .. }
                    | object_store::Error::NotSupported { .. }
                    | object_store::Error::NotImplemented { .. }
                    | object_store::Error::InvalidPath { .. }
                    | object_store::Error::PermissionDenied { .. }
                    | object_store::Error::Unauthenticated { .. }
                    | object_store::Error::UnknownConfigurationKey { .. }
            ),
            StorageError::KeyCollision { .. } => true,
            StorageError::InvalidKey { .. } | StorageError::Serialize(_) => false,
        }
    }
}

/// Failure at the ingestion endpoint
#[derive(Debug, Error)]
pub enum IngestError {
    /// Body missing, unparseable, or not a JSON object
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure handling one queue delivery; every variant asks for redelivery
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("storage write failed: {0}")]
    StorageWrite(#[from] StorageError),
}

fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}
