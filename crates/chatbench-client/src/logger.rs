// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

/// Sink for the optional raw-response log. `chatbench-io::writer::AsyncWriter`
/// is the production implementation; tests can supply an in-memory one.
#[async_trait]
pub trait ResponseLogger: Send + Sync {
    async fn log_line(&self, line: String);
}
