// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Payload writes with reconnect and exponential backoff.
//!
//! Each payload gets a fresh attempt counter `n`, starting at zero:
//!
//! ```text
//!   Attempting(n) ──ok──────────────────────────────> Succeeded
//!        │
//!        ├─transient, n < max_retries──> close, sleep 2^(n+1) units, Attempting(n+1)
//!        ├─transient, n >= max_retries─> Exhausted (RetriesExhausted)
//!        └─anything else───────────────> Transport error, no retry
//! ```

use crate::client::{Connector, DeliveryClient};
use crate::constants::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES};
use crate::error::DeliveryError;
use crate::framer::Payload;
use std::io::{self, ErrorKind};
use std::time::Duration;
use tracing::{error, warn};

/// Whether a write failure is worth retrying on a fresh connection.
///
/// A socket write timeout shows up as `WouldBlock` on Unix and `TimedOut` on
/// Windows; both count as timeouts.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NetworkUnreachable
            | ErrorKind::TimedOut
            | ErrorKind::WouldBlock
            | ErrorKind::BrokenPipe
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt; 0 means a single attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry `attempt` (0-based): `backoff_base * 2^(attempt+1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_add(1))
            .unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

/// Blocking wait between retries.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Outcome of a successful payload write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Writes attempted, the successful one included.
    pub attempts: u32,
}

impl WriteReport {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

pub struct RetryingWriter<C: Connector, S: Sleeper = ThreadSleeper> {
    client: DeliveryClient<C>,
    policy: RetryPolicy,
    sleeper: S,
}

impl<C: Connector> RetryingWriter<C, ThreadSleeper> {
    pub fn new(client: DeliveryClient<C>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(client, policy, ThreadSleeper)
    }
}

impl<C: Connector, S: Sleeper> RetryingWriter<C, S> {
    pub fn with_sleeper(client: DeliveryClient<C>, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    /// Writes one payload, retrying transient failures on a new connection.
    pub fn write(&mut self, payload: &Payload) -> Result<WriteReport, DeliveryError> {
        let mut attempt: u32 = 0;
        loop {
            let err = match self.client.write(payload.as_bytes()) {
                Ok(()) => {
                    return Ok(WriteReport {
                        attempts: attempt + 1,
                    })
                }
                Err(err) => err,
            };

            if !is_transient(&err) {
                // the stream may be mid-record; never reuse it
                self.client.close();
                return Err(DeliveryError::Transport(err));
            }

            if attempt >= self.policy.max_retries {
                self.client.close();
                error!(
                    "Could not push to Logentries after {} attempts: {err}",
                    attempt + 1
                );
                return Err(DeliveryError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: err,
                });
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                "Could not push to Logentries, reset and retry in {} ms: {err}",
                delay.as_millis()
            );
            self.client.close();
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }

    pub fn close(&mut self) {
        self.client.close();
    }

    pub fn client(&self) -> &DeliveryClient<C> {
        &self.client
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }
}
