// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tag to token routing.
//!
//! Tokens come from a YAML mapping file (`app: 2bfbea1e-...`) and/or a single
//! default token. The table is built once at startup and only read afterwards,
//! so it can be shared freely between pipelines.

use crate::config::Config;
use crate::error::ConfigError;
use serde_yaml::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Default)]
pub struct TokenTable {
    // keyed by lower-cased tag name
    tokens: HashMap<String, String>,
    default_token: Option<String>,
}

impl TokenTable {
    /// Builds a table from `(name, token)` pairs.
    ///
    /// Names are matched case-insensitively. When two names only differ by case
    /// the first one wins.
    pub fn new<I, K, V>(entries: I, default_token: Option<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut tokens = HashMap::new();
        for (name, token) in entries {
            match tokens.entry(name.as_ref().to_lowercase()) {
                Entry::Vacant(slot) => {
                    slot.insert(token.into());
                }
                Entry::Occupied(slot) => {
                    debug!("Ignoring duplicate token entry for tag '{}'", slot.key());
                }
            }
        }
        Self {
            tokens,
            default_token,
        }
    }

    /// Loads tag tokens from a YAML mapping file.
    pub fn load(path: &Path, default_token: Option<String>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::TokenFileRead {
                path: path.to_path_buf(),
                source,
            })?;
        let parse_error = |message: String| ConfigError::TokenFileParse {
            path: path.to_path_buf(),
            message,
        };

        let document: Value =
            serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?;
        let Value::Mapping(mapping) = document else {
            return Err(parse_error("expected a mapping of tag names to tokens".to_string()));
        };

        let mut entries = Vec::with_capacity(mapping.len());
        for (name, token) in mapping {
            let name = scalar_to_string(name)
                .ok_or_else(|| parse_error("tag names must be scalars".to_string()))?;
            let Value::String(token) = token else {
                return Err(parse_error(format!("token for '{name}' must be a string")));
            };
            entries.push((name, token));
        }

        debug!("Loaded {} tag tokens from {}", entries.len(), path.display());
        Ok(Self::new(entries, default_token))
    }

    /// Builds the table described by the configuration.
    ///
    /// At least one of `token_path` and `default_token` must be set.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        match (&config.token_path, &config.default_token) {
            (None, None) => Err(ConfigError::MissingTokenSource),
            (Some(path), default_token) => Self::load(path, default_token.clone()),
            (None, Some(default_token)) => {
                Ok(Self::new(Vec::<(String, String)>::new(), Some(default_token.clone())))
            }
        }
    }

    /// Returns the token for `tag`, falling back to the default token.
    ///
    /// `None` means the record has no route and should be dropped.
    pub fn resolve(&self, tag: &str) -> Option<&str> {
        self.tokens
            .get(&tag.to_lowercase())
            .or(self.default_token.as_ref())
            .map(String::as_str)
    }

    /// Every token a record could be framed with, default included.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens
            .values()
            .chain(self.default_token.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn default_token(&self) -> Option<&str> {
        self.default_token.as_deref()
    }
}

// Tokens are credentials: keep them out of debug output.
impl Debug for TokenTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&String> = self.tokens.keys().collect();
        tags.sort();
        f.debug_struct("TokenTable")
            .field("tags", &tags)
            .field("has_default_token", &self.default_token.is_some())
            .finish()
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
