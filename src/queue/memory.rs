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

//! In-process topic with an at-least-once subscription.
//!
//! Messages are held in Pub/Sub wire form (base64 `data`) so the processor
//! sees exactly what a push subscription would deliver. A delivery that
//! comes back as [`Disposition::Retry`] is re-enqueued after an exponential
//! backoff; once `max_delivery_attempts` is reached it is dead-lettered.
//!
//! Message ids are `{instance}-{sequence}`. The instance part is random per
//! queue, so ids stay unique across restarts and storage keys built from
//! them never collide with objects written by an earlier process.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::publisher::Publisher;
use crate::config::MemoryQueueConfig;
use crate::error::PublishError;
use crate::processor::{DeliveryProcessor, Disposition};
use crate::protocol::{PubsubMessage, PushEnvelope};
use crate::record::iso_timestamp;
use crate::retry::backoff_delay;

/// How long an idle worker sleeps before polling again
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
struct QueuedMessage {
    message: PubsubMessage,
    delivery_attempt: u32,
}

/// Counters for one topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages waiting in the queue
    pub depth: usize,
    /// Published but neither acknowledged nor dead-lettered
    pub outstanding: usize,
    pub acknowledged: u64,
    pub redelivered: u64,
    pub dead_lettered: usize,
}

pub struct MemoryQueue {
    topic: String,
    subscription: String,
    messages: ArrayQueue<QueuedMessage>,
    notify: Notify,
    max_delivery_attempts: u32,

    instance: String,
    next_id: AtomicU64,
    outstanding: AtomicUsize,
    acknowledged: AtomicU64,
    redelivered: AtomicU64,
    dead_letters: Mutex<Vec<PubsubMessage>>,
}

impl MemoryQueue {
    pub fn new(topic: impl Into<String>, config: &MemoryQueueConfig) -> Self {
        let topic = topic.into();
        Self {
            subscription: format!("memory/{}", topic),
            topic,
            messages: ArrayQueue::new(config.capacity),
            notify: Notify::new(),
            max_delivery_attempts: config.max_delivery_attempts,
            instance: instance_id(),
            next_id: AtomicU64::new(1),
            outstanding: AtomicUsize::new(0),
            acknowledged: AtomicU64::new(0),
            redelivered: AtomicU64::new(0),
            dead_letters: Mutex::new(Vec::new()),
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            depth: self.messages.len(),
            outstanding: self.outstanding.load(Ordering::Acquire),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            dead_lettered: self.dead_letters().len(),
        }
    }

    /// Messages that exhausted their delivery attempts
    pub fn dead_letters(&self) -> Vec<PubsubMessage> {
        match self.dead_letters.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Wait until every published message is acknowledged or dead-lettered
    ///
    /// Returns false if `timeout` elapses first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.outstanding.load(Ordering::Acquire) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(10)).await;
        }
        true
    }

    /// Start `workers` delivery tasks feeding `processor`
    pub fn spawn_workers(
        self: &Arc<Self>,
        processor: Arc<DeliveryProcessor>,
        workers: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        info!(
            "Starting {} delivery workers for subscription '{}'",
            workers, self.subscription
        );

        (0..workers)
            .map(|worker_id| {
                let queue = Arc::clone(self);
                let processor = Arc::clone(&processor);
                let shutdown = shutdown.clone();
                tokio::spawn(async move { queue.run_worker(worker_id, processor, shutdown).await })
            })
            .collect()
    }

    async fn run_worker(
        self: Arc<Self>,
        worker_id: usize,
        processor: Arc<DeliveryProcessor>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!("Delivery worker {} started", worker_id);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.messages.pop() {
                Some(queued) => self.deliver(queued, &processor).await,
                None => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        changed = shutdown.changed() => {
                            // Sender dropped; treat as shutdown
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = sleep(IDLE_POLL) => {}
                    }
                }
            }
        }

        debug!("Delivery worker {} stopped", worker_id);
    }

    async fn deliver(self: &Arc<Self>, queued: QueuedMessage, processor: &DeliveryProcessor) {
        let envelope = PushEnvelope {
            message: queued.message.clone(),
            subscription: Some(self.subscription.clone()),
            delivery_attempt: Some(queued.delivery_attempt),
        };

        match processor.handle_envelope(&envelope).await {
            Disposition::Stored(_) | Disposition::Dropped => {
                self.acknowledged.fetch_add(1, Ordering::Relaxed);
                self.outstanding.fetch_sub(1, Ordering::AcqRel);
            }
            Disposition::Retry(e) if queued.delivery_attempt >= self.max_delivery_attempts => {
                error!(
                    "Message {} dead-lettered after {} delivery attempts: {}",
                    queued.message.message_id, queued.delivery_attempt, e
                );
                match self.dead_letters.lock() {
                    Ok(mut guard) => guard.push(queued.message),
                    Err(poisoned) => poisoned.into_inner().push(queued.message),
                }
                self.outstanding.fetch_sub(1, Ordering::AcqRel);
            }
            Disposition::Retry(e) => {
                let delay = backoff_delay(queued.delivery_attempt.saturating_sub(1));
                warn!(
                    "Message {} failed (attempt {}/{}): {}. Redelivering in {:?}",
                    queued.message.message_id,
                    queued.delivery_attempt,
                    self.max_delivery_attempts,
                    e,
                    delay
                );
                self.redelivered.fetch_add(1, Ordering::Relaxed);

                let queue = Arc::clone(self);
                let next = QueuedMessage {
                    message: queued.message,
                    delivery_attempt: queued.delivery_attempt + 1,
                };
                tokio::spawn(async move {
                    sleep(delay).await;
                    queue.requeue(next).await;
                });
            }
        }
    }

    /// Put a message back, waiting for room rather than losing it
    async fn requeue(&self, mut queued: QueuedMessage) {
        loop {
            match self.messages.push(queued) {
                Ok(()) => {
                    self.notify.notify_one();
                    return;
                }
                Err(rejected) => {
                    queued = rejected;
                    sleep(IDLE_POLL).await;
                }
            }
        }
    }
}

/// Short random tag distinguishing this queue from earlier runs
fn instance_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

#[async_trait]
impl Publisher for MemoryQueue {
    async fn publish(&self, data: Bytes) -> Result<String, PublishError> {
        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message_id = format!("{}-{}", self.instance, sequence);
        let mut message = PubsubMessage::from_payload(&data);
        message.message_id = message_id.clone();
        message.publish_time = Some(iso_timestamp(Utc::now()));

        // Count before pushing so a fast worker never sees outstanding underflow
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        let queued = QueuedMessage {
            message,
            delivery_attempt: 1,
        };
        if self.messages.push(queued).is_err() {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            warn!("Queue '{}' is full, rejecting message", self.topic);
            return Err(PublishError::QueueFull {
                topic: self.topic.clone(),
                capacity: self.messages.capacity(),
            });
        }

        self.notify.notify_one();
        Ok(message_id)
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}
