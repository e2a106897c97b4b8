// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-record delivery: resolve, serialize, frame, write.

use crate::chunk::Chunk;
use crate::client::{Connector, DeliveryClient};
use crate::config::Config;
use crate::error::{ConfigError, DeliveryError};
use crate::framer::PayloadFramer;
use crate::record::{OutputMode, Record};
use crate::retry::{RetryPolicy, RetryingWriter, Sleeper, ThreadSleeper};
use crate::stats::DeliveryStats;
use crate::token::TokenTable;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Settings of [`DeliveryPipeline`] that come from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub output_mode: OutputMode,
    pub max_payload_size: usize,
    pub retry_policy: RetryPolicy,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            output_mode: config.output_mode,
            max_payload_size: config.max_payload_size,
            retry_policy: RetryPolicy {
                max_retries: config.max_retries,
                backoff_base: config.backoff_base,
            },
        }
    }
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// No token for the tag; nothing was written.
    Skipped,
    /// Every payload of the record was written.
    Sent { payloads: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub delivered: usize,
    pub skipped: usize,
    pub payloads: usize,
}

pub struct DeliveryPipeline<C: Connector, S: Sleeper = ThreadSleeper> {
    tokens: Arc<TokenTable>,
    framer: PayloadFramer,
    output_mode: OutputMode,
    writer: RetryingWriter<C, S>,
    stats: Arc<DeliveryStats>,
}

impl<C: Connector> DeliveryPipeline<C, ThreadSleeper> {
    pub fn new(
        tokens: Arc<TokenTable>,
        connector: C,
        config: PipelineConfig,
    ) -> Result<Self, ConfigError> {
        Self::with_sleeper(tokens, connector, config, ThreadSleeper)
    }
}

impl<C: Connector, S: Sleeper> DeliveryPipeline<C, S> {
    /// Builds a pipeline, rejecting tokens that could never be framed.
    pub fn with_sleeper(
        tokens: Arc<TokenTable>,
        connector: C,
        config: PipelineConfig,
        sleeper: S,
    ) -> Result<Self, ConfigError> {
        let framer = PayloadFramer::new(config.max_payload_size);
        for token in tokens.tokens() {
            framer.check_token(token)?;
        }

        Ok(Self {
            tokens,
            framer,
            output_mode: config.output_mode,
            writer: RetryingWriter::with_sleeper(
                DeliveryClient::new(connector),
                config.retry_policy,
                sleeper,
            ),
            stats: Arc::new(DeliveryStats::new()),
        })
    }

    /// Delivers one record.
    ///
    /// Payloads are written strictly in order; the first failure abandons the
    /// rest of the record and is returned.
    pub fn deliver(&mut self, record: &Record) -> Result<Delivery, DeliveryError> {
        let tokens = Arc::clone(&self.tokens);
        let Some(token) = tokens.resolve(&record.tag) else {
            trace!("No token for tag '{}', dropping record", record.tag);
            self.stats.record_skipped();
            return Ok(Delivery::Skipped);
        };

        let result = self.send(token, record);
        match &result {
            Ok(_) => self.stats.record_delivered(),
            Err(e) => {
                error!("Failed to deliver record with tag '{}': {e}", record.tag);
                self.stats.record_failed();
            }
        }
        result
    }

    fn send(&mut self, token: &str, record: &Record) -> Result<Delivery, DeliveryError> {
        let body = self.output_mode.serialize(&record.fields)?;
        let payloads = self.framer.frame(token, &body)?;
        if payloads.len() > 1 {
            debug!(
                "Record with tag '{}' split into {} payloads",
                record.tag,
                payloads.len()
            );
        }

        for payload in &payloads {
            match self.writer.write(payload) {
                Ok(report) => self.stats.payload_sent(report.retries()),
                Err(e) => {
                    if let DeliveryError::RetriesExhausted { attempts, .. } = &e {
                        self.stats.retries_exhausted(attempts.saturating_sub(1));
                    }
                    return Err(e);
                }
            }
        }
        Ok(Delivery::Sent {
            payloads: payloads.len(),
        })
    }

    /// Delivers every record of a chunk, in order.
    ///
    /// Stops at the first failing record; records before it stay delivered.
    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<ChunkReport, DeliveryError> {
        let mut report = ChunkReport::default();
        for entry in chunk.entries() {
            match self.deliver(&entry?)? {
                Delivery::Skipped => report.skipped += 1,
                Delivery::Sent { payloads } => {
                    report.delivered += 1;
                    report.payloads += payloads;
                }
            }
        }
        Ok(report)
    }

    /// Closes the connection. A later delivery reconnects.
    pub fn close(&mut self) {
        self.writer.close();
    }

    pub fn stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }

    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    pub fn writer(&self) -> &RetryingWriter<C, S> {
        &self.writer
    }
}
