// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log records and the two encodings used for the record body on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// A tagged log record as handed over by the host.
///
/// `time` is carried along for the host's benefit; delivery does not use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub tag: String,
    pub time: i64,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(tag: impl Into<String>, time: i64, fields: Map<String, Value>) -> Self {
        Self {
            tag: tag.into(),
            time,
            fields,
        }
    }
}

/// How the record fields are rendered between the token and the terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Compact JSON object, field order preserved.
    #[default]
    Json,
    /// `key=value` pairs separated by spaces. Strings are written verbatim,
    /// everything else as compact JSON.
    Raw,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Raw
        }
    }

    pub fn serialize(self, fields: &Map<String, Value>) -> Result<String, serde_json::Error> {
        match self {
            Self::Json => serde_json::to_string(fields),
            Self::Raw => {
                let mut out = String::new();
                for (key, value) in fields {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    match value {
                        Value::String(s) => {
                            let _ = write!(out, "{key}={s}");
                        }
                        other => {
                            let _ = write!(out, "{key}={}", serde_json::to_string(other)?);
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}
