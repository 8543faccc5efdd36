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

// Google Cloud Pub/Sub publisher (REST API)

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::publisher::Publisher;
use crate::auth::TokenSource;
use crate::config::PubSubConfig;
use crate::error::PublishError;
use crate::protocol::{OutgoingMessage, PublishRequest, PublishResponse};
use crate::retry::retry_with_backoff;

pub struct PubSubPublisher {
    client: Client,
    publish_url: String,
    topic_path: String,
    tokens: TokenSource,
    max_retries: u32,
}

impl PubSubPublisher {
    pub fn new(
        config: &PubSubConfig,
        project_id: &str,
        topic: &str,
        tokens: &TokenSource,
    ) -> Result<Self, PublishError> {
        let client = reqwest::ClientBuilder::new()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout())
            .build()?;

        let topic_path = topic_path(project_id, topic);
        let publish_url = format!(
            "{}/v1/{}:publish",
            config.endpoint.trim_end_matches('/'),
            topic_path
        );

        let tokens = if config.emulator {
            TokenSource::Anonymous
        } else {
            tokens.clone()
        };

        Ok(Self {
            client,
            publish_url,
            topic_path,
            tokens,
            max_retries: config.max_retries,
        })
    }

    pub fn publish_url(&self) -> &str {
        &self.publish_url
    }

    async fn publish_once(&self, data: &[u8]) -> Result<String, PublishError> {
        let body = PublishRequest {
            messages: vec![OutgoingMessage {
                data: STANDARD.encode(data),
                attributes: None,
            }],
        };

        let request = self.client.post(&self.publish_url).json(&body);
        let response = self.tokens.authorize(request).await?.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected { status, body });
        }

        let parsed: PublishResponse = response.json().await?;
        parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or(PublishError::MissingMessageId)
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish(&self, data: Bytes) -> Result<String, PublishError> {
        let what = format!("Publish to '{}'", self.topic_path);
        let message_id = retry_with_backoff(&what, self.max_retries, PublishError::is_retryable, || {
            self.publish_once(&data)
        })
        .await?;

        debug!("Published {} bytes as message {}", data.len(), message_id);
        Ok(message_id)
    }

    fn topic(&self) -> &str {
        &self.topic_path
    }

    fn backend_type(&self) -> &str {
        "pubsub"
    }
}

/// Full topic path; a topic that already is one passes through
pub fn topic_path(project_id: &str, topic: &str) -> String {
    if topic.starts_with("projects/") {
        topic.to_string()
    } else {
        format!("projects/{}/topics/{}", project_id, topic)
    }
}
