// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The HTTP-facing half of `chatbench`: the `ChatEndpoint` abstraction over
//! an OpenAI-compatible completions API, the per-request `Requester` that
//! drives one call end to end, and the worker `Pool` that drains a
//! `chatbench_core::SessionQueue` concurrently.

pub mod endpoint;
pub mod logger;
pub mod mock;
pub mod openai_compat;
pub mod pool;
pub mod requester;

pub use endpoint::{ChatCompletionChunk, ChatCompletionResponse, ChatEndpoint, ChunkStream, Delta};
pub use logger::ResponseLogger;
pub use openai_compat::OpenAiCompatEndpoint;
pub use pool::Pool;
pub use requester::Requester;
