// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Pre-flight errors. Fatal: the run aborts before any request is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("input file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    #[error("invalid JSON on line {line}: {message}")]
    ParseLine { line: usize, message: String },
}

/// Per-request errors. Never abort the run; always flatten into a
/// `RequestStatistics` with a `status_code`.
#[derive(Debug, Error)]
pub enum RequesterError {
    #[error("params.model is absent and no default model was configured")]
    MissingModel,

    #[error("stream ended without a usage chunk reporting completion_tokens")]
    MissingUsage,

    #[error("unsupported tool call kind: {0} (only \"function\" is supported)")]
    UnsupportedToolKind(String),

    #[error("protocol error: HTTP {status}: {message}")]
    Protocol { status: u16, message: String },
}

impl RequesterError {
    /// The status code this error should be recorded under: protocol errors
    /// keep their HTTP status, everything else is the local/runtime
    /// sentinel 600.
    pub fn status_code(&self) -> u16 {
        match self {
            RequesterError::Protocol { status, .. } => *status,
            _ => 600,
        }
    }
}

/// Internal queue bookkeeping errors. These indicate a bug in the Pool/Queue
/// pairing, not a caller mistake, so the caller is expected to treat them as
/// unrecoverable.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("released session {0:?} that the queue never tracked as active")]
    UnknownSession(Option<String>),
}
