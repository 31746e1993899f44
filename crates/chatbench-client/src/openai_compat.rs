// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use chatbench_core::RequesterError;
use futures::{stream, StreamExt};
use serde_json::{Map, Value};

use crate::endpoint::{ChatCompletionChunk, ChatCompletionResponse, ChatEndpoint, ChunkStream};

/// HTTP client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatEndpoint {
    client: reqwest::Client,
    chat_url: String,
    api_key: Option<String>,
}

impl OpenAiCompatEndpoint {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            chat_url: format!("{trimmed}/chat/completions"),
            api_key,
        }
    }

    fn build_body(&self, messages: Vec<Value>, params: Value, stream: bool) -> Value {
        let mut body = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert("messages".to_string(), Value::Array(messages));
        if stream {
            body.insert("stream".to_string(), Value::Bool(true));
        }
        Value::Object(body)
    }

    fn request(&self, body: Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(&self.chat_url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn error_from_response(resp: reqwest::Response) -> RequesterError {
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        RequesterError::Protocol { status, message }
    }
}

#[async_trait]
impl ChatEndpoint for OpenAiCompatEndpoint {
    async fn stream_chat_completion(
        &self,
        messages: Vec<Value>,
        params: Value,
    ) -> Result<ChunkStream, RequesterError> {
        let body = self.build_body(messages, params, true);
        let resp = self
            .request(body)
            .send()
            .await
            .map_err(|e| RequesterError::Protocol { status: 600, message: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }

        let byte_stream = resp.bytes_stream();
        let events = byte_stream
            .scan(String::new(), |buf, chunk| {
                let drained = match chunk {
                    Ok(bytes) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(anyhow::anyhow!(e))],
                };
                futures::future::ready(Some(drained))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(events))
    }

    async fn chat_completion(
        &self,
        messages: Vec<Value>,
        params: Value,
    ) -> Result<ChatCompletionResponse, RequesterError> {
        let body = self.build_body(messages, params, false);
        let resp = self
            .request(body)
            .send()
            .await
            .map_err(|e| RequesterError::Protocol { status: 600, message: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(Self::error_from_response(resp).await);
        }

        resp.json::<ChatCompletionResponse>()
            .await
            .map_err(|e| RequesterError::Protocol { status: 600, message: e.to_string() })
    }
}

/// Drains all complete `\n`-terminated lines from `buf`, leaving any
/// incomplete trailing bytes in place for the next chunk.
///
/// A persistent buffer across chunks is essential: an SSE event split across
/// TCP packets must not be silently dropped.
fn drain_complete_sse_lines(buf: &mut String) -> Vec<anyhow::Result<ChatCompletionChunk>> {
    let mut out = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line: String = buf.drain(..=pos).collect();
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(parsed) = parse_sse_data_line(line) {
            out.push(parsed);
        }
    }
    out
}

fn parse_sse_data_line(line: &str) -> Option<anyhow::Result<ChatCompletionChunk>> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(
        serde_json::from_str::<Value>(data)
            .map_err(anyhow::Error::from)
            .and_then(|v| serde_json::from_value(v).map_err(anyhow::Error::from)),
    )
}
