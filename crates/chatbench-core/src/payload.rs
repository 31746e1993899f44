// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

/// A single unit of work read from the input file.
///
/// Immutable once enqueued; consumed exactly once by a worker.  `messages`
/// and `params` are kept as free-form JSON since the harness forwards them
/// to the remote endpoint largely unexamined — only `params.model` and
/// `params.stream_options` are ever touched by the Requester.
#[derive(Debug, Clone)]
pub struct RequestPayload {
    pub session_id: Option<String>,
    pub messages: Vec<Value>,
    pub params: Value,
}

impl RequestPayload {
    pub fn new(session_id: Option<String>, messages: Vec<Value>, params: Value) -> Self {
        Self { session_id, messages, params }
    }
}
