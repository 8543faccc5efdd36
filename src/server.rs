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

//! HTTP server wiring for each role

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::auth::TokenSource;
use crate::config::{RelayConfig, Role};
use crate::ingest::{self, IngestState};
use crate::processor::DeliveryProcessor;
use crate::protocol::{HealthResponse, ResponseStatus};
use crate::push::{self, PushState};
use crate::queue::{MemoryQueue, Publisher, PublisherFactory};
use crate::storage::{BackendFactory, BlobStore};
use crate::writer::StorageWriter;

/// How long a standalone shutdown waits for queued messages to drain
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct HealthState {
    role: Role,
    backend: String,
    store: Option<Arc<dyn BlobStore>>,
}

async fn healthz(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = match &state.store {
        Some(store) => match store.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!("Storage health check errored: {}", e);
                false
            }
        },
        None => true,
    };

    let (code, status) = if healthy {
        (StatusCode::OK, ResponseStatus::Ok)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, ResponseStatus::Error)
    };

    (
        code,
        Json(HealthResponse {
            status,
            role: state.role.to_string(),
            backend: Some(state.backend.clone()),
        }),
    )
}

fn health_routes(state: HealthState) -> Router {
    Router::new().route("/healthz", get(healthz)).with_state(state)
}

/// Ingestion endpoint plus health
pub fn receiver_app(publisher: Arc<dyn Publisher>, max_body_bytes: usize) -> Router {
    let health = HealthState {
        role: Role::Receiver,
        backend: publisher.backend_type().to_string(),
        store: None,
    };

    ingest::routes(IngestState { publisher })
        .merge(health_routes(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Push endpoint plus health
pub fn processor_app(processor: Arc<DeliveryProcessor>, max_body_bytes: usize) -> Router {
    let store = Arc::clone(processor.writer().store());
    let health = HealthState {
        role: Role::Processor,
        backend: store.backend_type().to_string(),
        store: Some(store),
    };

    push::routes(PushState { processor })
        .merge(health_routes(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Ingestion endpoint feeding an in-memory queue; health reflects the store
pub fn standalone_app(
    queue: Arc<MemoryQueue>,
    store: Arc<dyn BlobStore>,
    max_body_bytes: usize,
) -> Router {
    let health = HealthState {
        role: Role::Standalone,
        backend: store.backend_type().to_string(),
        store: Some(store),
    };

    ingest::routes(IngestState { publisher: queue })
        .merge(health_routes(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// Build the delivery processor and its store from configuration
pub async fn build_processor(
    config: &RelayConfig,
    tokens: &TokenSource,
) -> Result<Arc<DeliveryProcessor>> {
    let store = BackendFactory::create(&config.storage, tokens)?;
    info!(
        "Storage backend initialized: {} (bucket '{}')",
        store.backend_type(),
        store.bucket()
    );
    store
        .initialize()
        .await
        .context("Failed to initialize storage backend")?;

    let writer = StorageWriter::new(
        store,
        config.storage.max_retries,
        config.processor.key_discriminator,
    );
    Ok(Arc::new(DeliveryProcessor::from_config(writer, config)))
}

/// Run the given role until Ctrl+C
pub async fn run(config: RelayConfig, role: Role) -> Result<()> {
    let tokens = TokenSource::from_config(&config.auth).context("Failed to set up credentials")?;
    let max_body = config.server.max_body_bytes;

    match role {
        Role::Receiver => {
            let publisher = PublisherFactory::create(&config, &tokens)?;
            info!(
                "Publishing to {} via {}",
                publisher.topic(),
                publisher.backend_type()
            );
            serve(receiver_app(publisher, max_body), &config.server.listen_addr).await
        }

        Role::Processor => {
            let processor = build_processor(&config, &tokens).await?;
            serve(processor_app(processor, max_body), &config.server.listen_addr).await
        }

        Role::Standalone => {
            let processor = build_processor(&config, &tokens).await?;
            let store = Arc::clone(processor.writer().store());

            let queue = Arc::new(MemoryQueue::new(
                config.queue.topic.clone(),
                &config.queue.memory,
            ));
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let workers =
                queue.spawn_workers(processor, config.queue.memory.workers, shutdown_rx);

            let app = standalone_app(Arc::clone(&queue), store, max_body);
            let served = serve(app, &config.server.listen_addr).await;

            if !queue.wait_idle(DRAIN_TIMEOUT).await {
                warn!(
                    "Shutting down with {} undelivered messages",
                    queue.stats().outstanding
                );
            }
            let _ = shutdown_tx.send(true);
            for worker in workers {
                if let Err(e) = worker.await {
                    error!("Delivery worker failed: {}", e);
                }
            }

            let stats = queue.stats();
            info!(
                "Queue drained: {} acknowledged, {} redelivered, {} dead-lettered",
                stats.acknowledged, stats.redelivered, stats.dead_lettered
            );
            served
        }
    }
}

async fn serve(app: Router, listen_addr: &str) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
