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

// Blob store module
//
// Provides a trait-based abstraction for object storage, allowing the
// processor to write to different stores (GCS, local filesystem, memory).
// Every backend is an `object_store` implementation underneath.
//
// This module focuses on create-only WRITE operations.
// Stored logs are read with the store's own tooling.

pub mod backend;
pub mod factory;
pub mod filesystem;
pub mod gcs;
pub mod memory;

pub use backend::{BlobStore, PutOutcome};
pub use factory::BackendFactory;
pub use filesystem::FilesystemBackend;
pub use gcs::GcsBackend;
pub use memory::{MemoryBackend, StoredObject};
