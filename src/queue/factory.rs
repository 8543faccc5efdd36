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

// Publisher factory for creating queue clients from configuration

use super::memory::MemoryQueue;
use super::publisher::Publisher;
use super::pubsub::PubSubPublisher;
use crate::auth::TokenSource;
use crate::config::RelayConfig;
use anyhow::{bail, Context, Result};
use std::sync::Arc;

pub struct PublisherFactory;

impl PublisherFactory {
    /// Create a publisher for the configured topic
    ///
    /// A memory queue built here has no delivery workers attached; the
    /// standalone server builds its own so it can spawn them.
    pub fn create(config: &RelayConfig, tokens: &TokenSource) -> Result<Arc<dyn Publisher>> {
        match config.queue.backend.as_str() {
            "pubsub" => {
                let publisher = PubSubPublisher::new(
                    &config.queue.pubsub,
                    &config.project_id,
                    &config.queue.topic,
                    tokens,
                )
                .context("Failed to build Pub/Sub client")?;
                Ok(Arc::new(publisher))
            }

            "memory" => Ok(Arc::new(MemoryQueue::new(
                config.queue.topic.clone(),
                &config.queue.memory,
            ))),

            unknown => bail!(
                "Unknown queue backend: '{}'. Supported: pubsub, memory",
                unknown
            ),
        }
    }
}
