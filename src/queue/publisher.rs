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

// Publisher trait for the queue topic

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::PublishError;

/// Publishes opaque payloads to one topic
///
/// Each call is an independent message: no batching, no ordering key.
/// `publish` returns once the queue has accepted the message and assigned
/// it an identifier.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `data`, returning the queue's message identifier
    async fn publish(&self, data: Bytes) -> Result<String, PublishError>;

    /// Topic the messages go to
    fn topic(&self) -> &str;

    /// Get backend type identifier
    fn backend_type(&self) -> &str;
}
