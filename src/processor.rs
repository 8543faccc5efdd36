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

//! Delivery processor: one queue message in, one stored object out.
//!
//! The outcome is returned as a [`Disposition`] rather than an error so
//! each transport (push endpoint, in-memory workers) decides how to ack.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::error::ProcessError;
use crate::protocol::{PubsubMessage, PushEnvelope};
use crate::record::{is_falsy, iso_timestamp, LogRecord, ProcessingInfo};
use crate::writer::{StorageWriter, WriteReceipt};

/// What the queue should do with a delivery
#[derive(Debug)]
pub enum Disposition {
    /// Persisted (or found already persisted); acknowledge
    Stored(WriteReceipt),
    /// Empty payload; acknowledge and never retry
    Dropped,
    /// Redeliver later
    Retry(ProcessError),
}

impl Disposition {
    pub fn is_ack(&self) -> bool {
        !matches!(self, Disposition::Retry(_))
    }
}

pub struct DeliveryProcessor {
    writer: StorageWriter,
    processor_id: String,
    project_id: String,
}

impl DeliveryProcessor {
    pub fn new(writer: StorageWriter, processor_id: String, project_id: String) -> Self {
        Self {
            writer,
            processor_id,
            project_id,
        }
    }

    pub fn from_config(writer: StorageWriter, config: &RelayConfig) -> Self {
        Self::new(
            writer,
            config.processor.processor_id.clone(),
            config.project_id.clone(),
        )
    }

    pub fn writer(&self) -> &StorageWriter {
        &self.writer
    }

    pub async fn handle_envelope(&self, envelope: &PushEnvelope) -> Disposition {
        if let Some(attempt) = envelope.delivery_attempt {
            debug!(
                "Delivery attempt {} for message {}",
                attempt, envelope.message.message_id
            );
        }
        self.handle_message(&envelope.message).await
    }

    pub async fn handle_message(&self, message: &PubsubMessage) -> Disposition {
        let message_id = Some(message.message_id.as_str()).filter(|id| !id.is_empty());
        match message.decode_data() {
            Ok(payload) => self.process_payload(&payload, message_id).await,
            Err(e) => {
                warn!("Message {:?} has undecodable data: {}", message_id, e);
                Disposition::Retry(ProcessError::MalformedMessage(format!(
                    "invalid base64 data: {}",
                    e
                )))
            }
        }
    }

    /// Process the raw payload bytes of one message
    pub async fn process_payload(&self, payload: &[u8], message_id: Option<&str>) -> Disposition {
        let value = match parse_payload(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("Message {:?} is malformed: {}", message_id, e);
                return Disposition::Retry(e);
            }
        };

        if is_falsy(&value) {
            warn!("Received empty log data in message {:?}, dropping", message_id);
            return Disposition::Dropped;
        }

        let Some(mut record) = LogRecord::from_value(value) else {
            return Disposition::Retry(ProcessError::MalformedMessage(
                "payload is not a JSON object".to_string(),
            ));
        };

        record.processing = Some(ProcessingInfo {
            processed_at: iso_timestamp(Utc::now()),
            processor: self.processor_id.clone(),
            project_id: self.project_id.clone(),
        });

        match self.writer.write(&record, message_id).await {
            Ok(receipt) => Disposition::Stored(receipt),
            Err(e) => Disposition::Retry(ProcessError::StorageWrite(e)),
        }
    }
}

fn parse_payload(payload: &[u8]) -> Result<Value, ProcessError> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| ProcessError::MalformedMessage(format!("payload is not UTF-8: {}", e)))?;
    serde_json::from_str(text)
        .map_err(|e| ProcessError::MalformedMessage(format!("payload is not JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyDiscriminator;
    use crate::storage::{MemoryBackend, PutOutcome};
    use std::sync::Arc;

    fn processor() -> (DeliveryProcessor, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new("bucket"));
        let writer = StorageWriter::new(backend.clone(), 0, KeyDiscriminator::MessageId);
        let processor = DeliveryProcessor::new(writer, "log-relay".to_string(), "proj".to_string());
        (processor, backend)
    }

    fn message(payload: &[u8], id: &str) -> PubsubMessage {
        let mut message = PubsubMessage::from_payload(payload);
        message.message_id = id.to_string();
        message
    }

    #[tokio::test]
    async fn test_record_gets_processing_block() {
        let (processor, backend) = processor();
        let disposition = processor
            .handle_message(&message(br#"{"level":"WARN","message":"x"}"#, "1"))
            .await;

        let Disposition::Stored(receipt) = disposition else {
            panic!("expected Stored, got {:?}", disposition);
        };
        assert_eq!(receipt.outcome, PutOutcome::Created);

        let stored = backend.get(&receipt.key).await.unwrap();
        let body: Value = serde_json::from_slice(&stored.body).unwrap();
        assert_eq!(body["processing"]["processor"], "log-relay");
        assert_eq!(body["processing"]["project_id"], "proj");
        assert!(body["processing"]["processed_at"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_falsy_payloads_are_dropped() {
        let (processor, backend) = processor();
        for payload in [&b"{}"[..], b"null", b"0", b"\"\"", b"[]", b"false"] {
            let disposition = processor.process_payload(payload, Some("1")).await;
            assert!(matches!(disposition, Disposition::Dropped));
            assert!(disposition.is_ack());
        }
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_payloads_are_retried() {
        let (processor, backend) = processor();
        for payload in [&b"{not json"[..], b"\xff\xfe", b"[1,2]", b"42"] {
            let disposition = processor.process_payload(payload, Some("1")).await;
            assert!(
                matches!(disposition, Disposition::Retry(ProcessError::MalformedMessage(_))),
                "{:?}",
                disposition
            );
        }
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_bad_base64_is_retried() {
        let (processor, _backend) = processor();
        let bad = PubsubMessage {
            data: "***".to_string(),
            ..Default::default()
        };
        assert!(!processor.handle_message(&bad).await.is_ack());
    }
}
