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

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const ACCEPTED_MESSAGE: &str = "Log received and queued for processing";

/// Response status for both endpoints
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Stored,
    Dropped,
    Error,
    Ok,
}

/// Body returned by the ingestion endpoint once the queue has the record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: ResponseStatus,
    pub message: String,
    pub message_id: String,
    /// The record's timestamp, echoed as stored
    pub timestamp: Value,
}

impl IngestResponse {
    pub fn accepted(message_id: String, timestamp: Value) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: ACCEPTED_MESSAGE.to_string(),
            message_id,
            timestamp,
        }
    }
}

/// Body returned by either endpoint on failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: ResponseStatus,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            error: error.into(),
        }
    }
}

/// Body returned by the push endpoint when a delivery is acknowledged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ResponseStatus,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// A queue message in Pub/Sub wire form
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    /// Base64 of the UTF-8 JSON payload
    #[serde(default)]
    pub data: String,

    #[serde(default, alias = "message_id", skip_serializing_if = "String::is_empty")]
    pub message_id: String,

    #[serde(default, alias = "publish_time", skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl PubsubMessage {
    pub fn from_payload(payload: &[u8]) -> Self {
        Self {
            data: STANDARD.encode(payload),
            ..Default::default()
        }
    }

    /// The raw payload bytes
    pub fn decode_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.trim())
    }
}

/// What a push subscription POSTs for each delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    pub message: PubsubMessage,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// Present when the subscription has a dead-letter policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_attempt: Option<u32>,
}

/// Structured-mode CloudEvent carrying a push envelope in `data`
#[derive(Debug, Clone, Deserialize)]
pub struct CloudEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub data: PushEnvelope,
}

/// Either delivery format the processor accepts
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundDelivery {
    Push(PushEnvelope),
    CloudEvent(CloudEvent),
}

impl InboundDelivery {
    pub fn into_envelope(self) -> PushEnvelope {
        match self {
            InboundDelivery::Push(envelope) => envelope,
            InboundDelivery::CloudEvent(event) => {
                let mut envelope = event.data;
                if envelope.message.message_id.is_empty() {
                    envelope.message.message_id = event.id.unwrap_or_default();
                }
                envelope
            }
        }
    }
}

/// Request body of the Pub/Sub REST publish call
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest<'a> {
    pub messages: Vec<OutgoingMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage<'a> {
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    #[serde(default)]
    pub message_ids: Vec<String>,
}
