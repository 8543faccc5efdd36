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

//! Two-stage log ingestion relay
//!
//! The receiver accepts JSON log records over HTTP, stamps them, and
//! publishes them to a Pub/Sub topic. The processor consumes the topic
//! through a push subscription and files each record as one JSON object
//! in blob storage, partitioned by hour of its timestamp. The standalone
//! role runs both halves in one process around an in-memory queue.

pub mod auth;
pub mod config;
pub mod error;
pub mod ingest;
pub mod partition;
pub mod processor;
pub mod protocol;
pub mod push;
pub mod queue;
pub mod record;
pub mod retry;
pub mod server;
pub mod storage;
pub mod writer;

// Re-export main types
pub use config::{load_config, load_config_with_env, RelayConfig, Role};
pub use error::{IngestError, ProcessError, PublishError, StorageError};
pub use processor::{DeliveryProcessor, Disposition};
pub use queue::{MemoryQueue, Publisher};
pub use record::LogRecord;
pub use storage::{BlobStore, PutOutcome};
pub use writer::{StorageWriter, WriteReceipt};
