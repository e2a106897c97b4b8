// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Newline-delimited JSON input.
//!
//! One event per line: `{"tag": "app", "time": 1700000000, "record": {...}}`.
//! `time` defaults to the time the line was read.

use logentries_ssl::Record;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Deserialize)]
struct InputLine {
    tag: String,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    record: Map<String, Value>,
}

pub fn parse_line(line: &str, now: i64) -> Result<Record, serde_json::Error> {
    let input: InputLine = serde_json::from_str(line)?;
    Ok(Record::new(
        input.tag,
        input.time.unwrap_or(now),
        input.record,
    ))
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
