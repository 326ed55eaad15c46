// src/services/dispatch.rs

//! Rate-limit aware request dispatch.
//!
//! One logical API call enters [`Dispatcher::execute`]; what comes out is
//! the payload or a terminal error. In between, the dispatcher picks the
//! least-limited token, classifies every failure at the wire boundary,
//! rotates tokens when a rate limit bites, retries transient faults
//! immediately, and puts the whole process to sleep only when every token
//! is exhausted at once.

use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::services::github::CallResult;
use crate::services::tokens::TokenPool;

/// Added to every server-reported reset so we never wake ahead of the
/// server clock.
const RESET_SKEW_SECS: i64 = 1;

/// Backoff applied when a rate-limited response carries no reset header.
const FALLBACK_RESET_SECS: i64 = 60;

/// What one API attempt means for the dispatch loop.
enum Outcome<T> {
    Success(T),

    /// The token's quota is spent; retry is pointless before `reset_at`.
    RateLimited { reset_at: Option<i64> },

    /// The resource is permanently inaccessible; retrying cannot help.
    Blocked { reason: String },

    /// Anything else that failed with budget left on the token.
    Transient { message: String },
}

/// Classify a raw attempt. A block signal outranks the rate headers, and
/// only `x-ratelimit-remaining: 0` counts as a rate limit; a failure with
/// quota remaining (or no headers at all) is transient.
fn classify<T>(result: CallResult<T>) -> Outcome<T> {
    match result {
        Ok(response) => Outcome::Success(response.data),
        Err(err) => {
            if let Some(reason) = err.block_reason {
                Outcome::Blocked { reason }
            } else if err.rate.remaining == Some(0) {
                Outcome::RateLimited {
                    reset_at: err.rate.reset.map(|reset| reset + RESET_SKEW_SECS),
                }
            } else {
                Outcome::Transient {
                    message: err.message,
                }
            }
        }
    }
}

/// Global pause shared by all in-flight requests. `until` is an epoch
/// second while a pause is running and 0 otherwise.
struct Pause {
    until: i64,
}

pub struct Dispatcher {
    pool: TokenPool,
    max_transient_retries: u32,

    // Whichever task detects full exhaustion first sleeps while holding
    // this lock; everyone else queues on it and finds `until` cleared.
    pause: Mutex<Pause>,
}

impl Dispatcher {
    pub fn new(pool: TokenPool, max_transient_retries: u32) -> Self {
        Self {
            pool,
            max_transient_retries,
            pause: Mutex::new(Pause { until: 0 }),
        }
    }

    /// Run one logical API call through the token pool.
    ///
    /// `op` receives the chosen token and performs a single attempt; it may
    /// be invoked several times with different tokens. A rate limit rotates
    /// to the next usable token without sleeping, a transient fault burns
    /// the retry budget, a block signal fails fast. Returns once the
    /// attempt succeeded or the failure is terminal for this request.
    pub async fn execute<'a, T>(
        &'a self,
        op: impl Fn(&'a str) -> BoxFuture<'a, CallResult<T>>,
    ) -> Result<T> {
        let mut transient_left = self.max_transient_retries;

        loop {
            if self.pool.all_limited(Utc::now().timestamp()) {
                self.pause_until_reset().await;
            }

            let index = self.pool.least_limited();

            match classify(op(self.pool.token(index)).await) {
                Outcome::Success(data) => {
                    self.wait_for_pause().await;
                    return Ok(data);
                }
                Outcome::RateLimited { reset_at } => {
                    let reset_at = reset_at
                        .unwrap_or_else(|| Utc::now().timestamp() + FALLBACK_RESET_SECS);
                    log::debug!(
                        "token {index} rate limited until {}",
                        format_clock(reset_at)
                    );
                    self.pool.record_limited(index, reset_at);
                    // A fresh window deserves a fresh retry budget.
                    transient_left = self.max_transient_retries;
                }
                Outcome::Blocked { reason } => return Err(AppError::Blocked { reason }),
                Outcome::Transient { message } => {
                    if transient_left == 0 {
                        log::error!(
                            "request failed after {} immediate retries: {message}",
                            self.max_transient_retries
                        );
                        return Err(AppError::Api(message));
                    }
                    transient_left -= 1;
                    log::warn!("transient request failure, retrying: {message}");
                }
            }
        }
    }

    /// Sleep until the earliest reset frees a token. At most one task
    /// executes the sleep per exhaustion episode; latecomers queue on the
    /// lock and re-check the pool once the winner clears the pause.
    async fn pause_until_reset(&self) {
        let mut pause = self.pause.lock().await;

        let now = Utc::now().timestamp();
        if !self.pool.all_limited(now) {
            return;
        }

        let until = self.pool.earliest_reset().max(pause.until);
        pause.until = until;
        log::warn!(
            "all {} tokens rate limited, sleeping until {}",
            self.pool.len(),
            format_clock(until)
        );

        let wait = until.saturating_sub(now).max(0) as u64;
        tokio::time::sleep(Duration::from_secs(wait)).await;

        pause.until = 0;
        log::info!("rate limit reset reached, resuming requests");
    }

    /// A success that lands while another task rides out a global pause
    /// waits for the pause to clear, so bursts resume together.
    async fn wait_for_pause(&self) {
        drop(self.pause.lock().await);
    }
}

fn format_clock(epoch: i64) -> String {
    match chrono::DateTime::from_timestamp(epoch, 0) {
        Some(instant) => instant.format("%H:%M:%S UTC").to_string(),
        None => format!("epoch {epoch}"),
    }
}
