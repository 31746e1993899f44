// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::pin::Pin;

use async_trait::async_trait;
use chatbench_core::RequesterError;
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;

/// A stream of parsed SSE chunks from a streaming chat-completion call.
pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<ChatCompletionChunk>> + Send>>;

/// A library providing both streaming and non-streaming create-completion
/// calls against an OpenAI-compatible endpoint.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn stream_chat_completion(
        &self,
        messages: Vec<Value>,
        params: Value,
    ) -> Result<ChunkStream, RequesterError>;

    async fn chat_completion(
        &self,
        messages: Vec<Value>,
        params: Value,
    ) -> Result<ChatCompletionResponse, RequesterError>;
}

// ─── Streaming wire types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// `choices[0].delta` if `choices` is nonempty, else absent.
    pub fn delta(&self) -> Option<&Delta> {
        self.choices.first().and_then(|c| c.delta.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub completion_tokens: Option<u32>,
}

// ─── Non-streaming wire types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseChoice {
    #[serde(default)]
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallFull>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallFull {
    pub id: String,
    pub function: FunctionFull,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionFull {
    pub name: String,
    pub arguments: String,
}
