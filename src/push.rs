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

//! Processor half: push-subscription endpoint.
//!
//! Pub/Sub push (and Eventarc, which wraps the same envelope in a
//! CloudEvent) redelivers whenever the response is not 2xx, so the
//! [`Disposition`] maps straight onto the status code.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{error, warn};

use crate::processor::{DeliveryProcessor, Disposition};
use crate::protocol::{DeliveryResponse, ErrorResponse, InboundDelivery, ResponseStatus};

#[derive(Clone)]
pub struct PushState {
    pub processor: Arc<DeliveryProcessor>,
}

/// `POST /`
pub fn routes(state: PushState) -> Router {
    Router::new().route("/", post(deliver)).with_state(state)
}

pub async fn deliver(State(state): State<PushState>, body: Bytes) -> Response {
    let envelope = match serde_json::from_slice::<InboundDelivery>(&body) {
        Ok(delivery) => delivery.into_envelope(),
        Err(e) => {
            // Redelivering an envelope we cannot read would never succeed
            warn!("Rejecting undecodable push delivery: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("invalid push envelope: {}", e))),
            )
                .into_response();
        }
    };

    disposition_response(state.processor.handle_envelope(&envelope).await)
}

pub fn disposition_response(disposition: Disposition) -> Response {
    match disposition {
        Disposition::Stored(receipt) => (
            StatusCode::OK,
            Json(DeliveryResponse {
                status: ResponseStatus::Stored,
                key: Some(receipt.key),
            }),
        )
            .into_response(),
        Disposition::Dropped => (
            StatusCode::OK,
            Json(DeliveryResponse {
                status: ResponseStatus::Dropped,
                key: None,
            }),
        )
            .into_response(),
        Disposition::Retry(e) => {
            error!("Error processing message: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}
