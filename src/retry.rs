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

// Exponential backoff shared by publishing, storage writes and redelivery

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

const INITIAL_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (0-based): 100ms doubling, capped at 30s
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    INITIAL_DELAY.saturating_mul(factor).min(MAX_DELAY)
}

/// Run `op` until it succeeds, fails permanently, or `max_retries` retries are spent
pub async fn retry_with_backoff<T, E, F, Fut>(
    what: &str,
    max_retries: u32,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    info!("{} succeeded after {} retries", what, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < max_retries && is_retryable(&e) => {
                let delay = backoff_delay(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    what,
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                error!("{} failed after {} attempts: {}", what, attempt + 1, e);
                return Err(e);
            }
        }
    }
}
