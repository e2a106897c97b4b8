// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery core for shipping tagged log records to Logentries over TLS.
//!
//! Records flow one way through the pipeline:
//!
//! ```text
//!   Record ──> TokenTable::resolve ──> serialize ──> PayloadFramer ──> RetryingWriter ──> DeliveryClient
//!               (skip if no token)     (json/raw)    (size-bounded)    (backoff, reconnect)   (TLS stream)
//! ```
//!
//! Everything runs on the calling thread. A write blocks for the duration of the
//! network call, including any backoff sleeps between retries.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod chunk;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod framer;
pub mod pipeline;
pub mod record;
pub mod retry;
pub mod stats;
pub mod tls;
pub mod token;

pub use chunk::Chunk;
pub use client::{Connection, Connector, DeliveryClient};
pub use config::Config;
pub use error::{ChunkError, ConfigError, DeliveryError, FrameError};
pub use framer::{Payload, PayloadFramer};
pub use pipeline::{ChunkReport, Delivery, DeliveryPipeline, PipelineConfig};
pub use record::{OutputMode, Record};
pub use retry::{RetryPolicy, RetryingWriter, Sleeper, ThreadSleeper};
pub use stats::{DeliveryStats, StatsSnapshot};
pub use tls::{TlsConfig, TlsConnector};
pub use token::TokenTable;
