// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Errors that stop the forwarder from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Define token_path or default_token")]
    MissingTokenSource,

    #[error("Could not load {}: {source}", path.display())]
    TokenFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {}: {message}", path.display())]
    TokenFileParse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to set up TLS: {0}")]
    Tls(String),

    #[error("Token cannot be framed: {0}")]
    Frame(#[from] FrameError),
}

/// Errors raised while turning a record body into wire payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("token of {token_len} bytes leaves no room in a {max_size} byte payload")]
    TokenTooLong { token_len: usize, max_size: usize },

    #[error("{capacity} bytes per chunk cannot hold a UTF-8 character (max payload size {max_size})")]
    CapacityTooSmall { capacity: usize, max_size: usize },
}

/// Errors raised while buffering or replaying records in a [`crate::Chunk`].
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("Failed to encode record: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("Failed to decode record at byte {offset}: {source}")]
    Decode {
        offset: usize,
        #[source]
        source: rmp_serde::decode::Error,
    },
}

/// Errors surfaced by the delivery pipeline for a single record.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Every allowed attempt hit a transient network failure.
    #[error("Could not push logs to Logentries after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// A failure outside the transient set; never retried.
    #[error("Could not push logs to Logentries: {0}")]
    Transport(#[source] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

impl DeliveryError {
    /// The I/O error behind a transport failure, if any.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            Self::RetriesExhausted { source, .. } | Self::Transport(source) => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::MissingTokenSource.to_string(),
            "Define token_path or default_token"
        );

        let error = ConfigError::TokenFileRead {
            path: PathBuf::from("/etc/le/tokens.yml"),
            source: Error::new(ErrorKind::NotFound, "No such file or directory"),
        };
        assert_eq!(
            error.to_string(),
            "Could not load /etc/le/tokens.yml: No such file or directory"
        );
    }

    #[test]
    fn test_exhausted_error_keeps_root_cause() {
        let error = DeliveryError::RetriesExhausted {
            attempts: 3,
            source: Error::new(ErrorKind::ConnectionReset, "reset by peer"),
        };
        assert!(error.to_string().contains("after 3 attempts"));
        assert_eq!(
            error.io_error().map(Error::kind),
            Some(ErrorKind::ConnectionReset)
        );
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_frame_error_has_no_io_error() {
        let error = DeliveryError::from(FrameError::TokenTooLong {
            token_len: 10,
            max_size: 8,
        });
        assert!(error.io_error().is_none());
    }
}
