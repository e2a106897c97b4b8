// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod input;

use std::process::ExitCode;
use std::{
    env,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    time::interval,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use logentries_ssl::{
    Chunk, Config, ConfigError, DeliveryPipeline, PipelineConfig, Record, TlsConfig,
    TlsConnector, TokenTable,
};

type Pipeline = DeliveryPipeline<TlsConnector>;

// Records read from stdin but not yet buffered into a chunk
const INPUT_QUEUE_SIZE: usize = 1024;

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("LE_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on forwarder startup: {e}");
            return ExitCode::FAILURE;
        }
    };

    let pipeline = match build_pipeline(&config) {
        Ok(p) => p,
        Err(e) => {
            error!("Error creating delivery pipeline on forwarder startup: {e}");
            return ExitCode::FAILURE;
        }
    };
    let stats = pipeline.stats();
    let pipeline = Arc::new(Mutex::new(pipeline));

    info!(
        "Forwarding to {}:{} (max_retries={}, verify_fqdn={})",
        config.le_host, config.le_port, config.max_retries, config.verify_fqdn
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down");
            shutdown_token.cancel();
        }
    });

    let (tx, rx) = mpsc::channel(INPUT_QUEUE_SIZE);
    tokio::spawn(read_input(tx, cancel_token.clone()));

    run(rx, &pipeline, &config, cancel_token).await;

    let closing = Arc::clone(&pipeline);
    if let Err(e) = tokio::task::spawn_blocking(move || lock(&closing).close()).await {
        error!("Close task failed: {e}");
    }

    let snapshot = stats.snapshot();
    info!(
        "Forwarder stopped: {} records delivered, {} skipped, {} failed, {} payloads sent, {} retries",
        snapshot.records_delivered,
        snapshot.records_skipped,
        snapshot.records_failed,
        snapshot.payloads_sent,
        snapshot.retries
    );
    ExitCode::SUCCESS
}

fn build_pipeline(config: &Config) -> Result<Pipeline, ConfigError> {
    let tokens = TokenTable::from_config(config)?;
    debug!(
        "Loaded {} tag tokens (default token {})",
        tokens.len(),
        if tokens.default_token().is_some() { "set" } else { "unset" }
    );
    let connector = TlsConnector::new(TlsConfig::from(config))?;
    DeliveryPipeline::new(Arc::new(tokens), connector, PipelineConfig::from(config))
}

/// Buffers incoming records and flushes them by size or on a timer.
async fn run(
    mut rx: mpsc::Receiver<Record>,
    pipeline: &Arc<Mutex<Pipeline>>,
    config: &Config,
    cancel_token: CancellationToken,
) {
    let mut chunk = Chunk::new();
    let mut flush_interval = interval(config.flush_interval);
    flush_interval.tick().await; // discard first tick, which is instantaneous

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = flush_interval.tick() => {
                if !chunk.is_empty() {
                    flush(pipeline, std::mem::take(&mut chunk)).await;
                }
            }
            record = rx.recv() => {
                let Some(record) = record else {
                    debug!("Input closed");
                    break;
                };
                buffer(&mut chunk, &record);
                if chunk.len() >= config.chunk_limit_records {
                    flush(pipeline, std::mem::take(&mut chunk)).await;
                }
            }
        }
    }

    while let Ok(record) = rx.try_recv() {
        buffer(&mut chunk, &record);
    }
    if !chunk.is_empty() {
        flush(pipeline, chunk).await;
    }
}

fn buffer(chunk: &mut Chunk, record: &Record) {
    if let Err(e) = chunk.append(record) {
        error!("Dropping record with tag '{}': {e}", record.tag);
    }
}

/// Delivers a chunk on a blocking thread; the pipeline blocks on network I/O and backoff.
async fn flush(pipeline: &Arc<Mutex<Pipeline>>, chunk: Chunk) {
    let records = chunk.len();
    debug!("Flushing {records} records ({} bytes)", chunk.bytesize());

    let pipeline = Arc::clone(pipeline);
    let result =
        tokio::task::spawn_blocking(move || lock(&pipeline).write_chunk(&chunk)).await;

    match result {
        Ok(Ok(report)) => debug!(
            "Flushed {} records as {} payloads, skipped {} without a token",
            report.delivered, report.payloads, report.skipped
        ),
        Ok(Err(e)) => error!("Failed to flush chunk of {records} records: {e}"),
        Err(e) => error!("Flush task failed: {e}"),
    }
}

fn lock(pipeline: &Mutex<Pipeline>) -> std::sync::MutexGuard<'_, Pipeline> {
    // a panic mid-delivery leaves nothing half-written that we would reuse
    pipeline
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

async fn read_input(tx: mpsc::Sender<Record>, cancel_token: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel_token.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match input::parse_line(&line, input::unix_now()) {
                    Ok(record) => {
                        if tx.send(record).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Skipping malformed input line: {e}"),
                }
            }
            Ok(None) => return,
            Err(e) => {
                error!("Failed to read input: {e}");
                return;
            }
        }
    }
}
