// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults for the Logentries token-based TLS intake.

use std::time::Duration;

/// Logentries data intake host.
pub const DEFAULT_HOST: &str = "data.logentries.com";

/// TLS port of the token-based intake.
pub const DEFAULT_PORT: u16 = 443;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Largest payload, in bytes, written to the connection in a single call.
///
/// Records whose framed form exceeds this are split into several payloads,
/// each carrying its own token prefix and terminator.
pub const MAX_SIZE: usize = 8192;

/// Bytes added around the record body by the wire framing: the space after the
/// token, the space before the newline, and the newline.
pub const FRAME_OVERHEAD: usize = 3;

/// Backoff unit. The n-th retry (counting from zero) waits `2^(n+1)` units.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CHUNK_LIMIT_RECORDS: usize = 1000;
