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

//! Receiver half: HTTP ingestion endpoint.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::protocol::{ErrorResponse, IngestResponse};
use crate::queue::Publisher;
use crate::record::{is_falsy, iso_timestamp, LogRecord, RequestMetadata};

pub const NO_DATA_ERROR: &str = "No JSON data provided";
const NOT_AN_OBJECT_ERROR: &str = "Log data must be a JSON object";

#[derive(Clone)]
pub struct IngestState {
    pub publisher: Arc<dyn Publisher>,
}

/// `POST /`
pub fn routes(state: IngestState) -> Router {
    Router::new().route("/", post(ingest)).with_state(state)
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngestError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            IngestError::Publish(_) | IngestError::Serialize(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

pub async fn ingest(
    State(state): State<IngestState>,
    method: Method,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    let mut record = parse_record(&body).inspect_err(|e| warn!("Rejected log: {}", e))?;

    let now = Utc::now();
    record.ensure_timestamp(now);
    record.request_metadata = Some(RequestMetadata {
        method: method.to_string(),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
        remote_addr: peer.map(|ConnectInfo(addr)| addr.ip().to_string()),
        received_at: iso_timestamp(now),
    });

    let payload = serde_json::to_vec(&record)?;
    let message_id = match state.publisher.publish(Bytes::from(payload)).await {
        Ok(id) => id,
        Err(e) => {
            error!("Error processing log: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Published log to {} with message ID: {}",
        state.publisher.topic(),
        message_id
    );

    Ok(Json(IngestResponse::accepted(
        message_id,
        record.timestamp_value(),
    )))
}

/// Body bytes to a record; anything but a non-empty JSON object is rejected
pub fn parse_record(body: &[u8]) -> Result<LogRecord, IngestError> {
    let no_data = || IngestError::InvalidInput(NO_DATA_ERROR.to_string());

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(no_data());
    }
    let value: Value = serde_json::from_slice(body).map_err(|_| no_data())?;
    if is_falsy(&value) {
        return Err(no_data());
    }

    LogRecord::from_value(value)
        .ok_or_else(|| IngestError::InvalidInput(NOT_AN_OBJECT_ERROR.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_rejections() {
        for body in [&b""[..], b"   ", b"null", b"{}", b"[]", b"0", b"\"\"", b"false", b"{oops"] {
            let err = parse_record(body).unwrap_err();
            assert_eq!(err.to_string(), NO_DATA_ERROR, "body {:?}", body);
        }

        let err = parse_record(b"[1]").unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
        assert_eq!(err.to_string(), NOT_AN_OBJECT_ERROR);
    }

    #[test]
    fn test_parse_record_accepts_objects() {
        let record = parse_record(br#"{"level":"WARN","message":"x"}"#).unwrap();
        assert_eq!(record.level(), "WARN");
        assert!(!record.has_timestamp());
    }
}
