// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatbench_core::RequesterError;
use futures::stream;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::endpoint::{
    ChatCompletionChunk, ChatCompletionResponse, ChatEndpoint, ChunkStream, ChunkChoice, Delta,
    FunctionDelta, ResponseChoice, ResponseMessage, ToolCallDelta, ToolCallFull, FunctionFull, Usage,
};

/// One simulated streamed event: a role announcement, a content fragment, a
/// tool call fragment, or the final usage chunk.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Role(String),
    Content(String),
    ToolCall { index: u32, id: Option<String>, name: Option<String>, arguments: Option<String> },
    Usage { completion_tokens: u32 },
}

/// What a single call to the scripted endpoint should do.
#[derive(Debug, Clone)]
pub enum CallScript {
    /// Emit this sequence of chunks, optionally after a simulated delay
    /// (models per-response latency).
    Stream { events: Vec<ChatEvent>, delay: Duration },
    /// Fail immediately with this HTTP status, as if the server rejected
    /// the request.
    Error { status: u16, message: String },
}

impl CallScript {
    pub fn stream(events: Vec<ChatEvent>) -> Self {
        Self::Stream { events, delay: Duration::ZERO }
    }

    pub fn stream_after(events: Vec<ChatEvent>, delay: Duration) -> Self {
        Self::Stream { events, delay }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::Error { status, message: message.into() }
    }
}

/// A pre-scripted in-process `ChatEndpoint`. Each call pops the next script
/// from the front of the queue.
pub struct ScriptedEndpoint {
    scripts: Mutex<Vec<CallScript>>,
    /// Every `(messages, params)` pair seen, in call order — lets tests
    /// assert on request ordering and content.
    pub call_log: Arc<Mutex<Vec<(Vec<Value>, Value)>>>,
}

impl ScriptedEndpoint {
    pub fn new(scripts: Vec<CallScript>) -> Self {
        Self { scripts: Mutex::new(scripts), call_log: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Convenience: a provider that always streams a single text reply plus
    /// a usage chunk reporting `output_tokens` completion tokens.
    pub fn always_text(reply: impl Into<String>, output_tokens: u32) -> Self {
        Self::new(vec![CallScript::stream(vec![
            ChatEvent::Role("assistant".into()),
            ChatEvent::Content(reply.into()),
            ChatEvent::Usage { completion_tokens: output_tokens },
        ])])
    }

    fn to_chunk(ev: &ChatEvent) -> ChatCompletionChunk {
        match ev {
            ChatEvent::Role(r) => ChatCompletionChunk {
                choices: vec![ChunkChoice {
                    delta: Some(Delta { role: Some(r.clone()), content: None, tool_calls: None }),
                }],
                usage: None,
            },
            ChatEvent::Content(c) => ChatCompletionChunk {
                choices: vec![ChunkChoice {
                    delta: Some(Delta { role: None, content: Some(c.clone()), tool_calls: None }),
                }],
                usage: None,
            },
            ChatEvent::ToolCall { index, id, name, arguments } => ChatCompletionChunk {
                choices: vec![ChunkChoice {
                    delta: Some(Delta {
                        role: None,
                        content: None,
                        tool_calls: Some(vec![ToolCallDelta {
                            index: *index,
                            id: id.clone(),
                            function: Some(FunctionDelta { name: name.clone(), arguments: arguments.clone() }),
                        }]),
                    }),
                }],
                usage: None,
            },
            ChatEvent::Usage { completion_tokens } => ChatCompletionChunk {
                choices: vec![],
                usage: Some(Usage { completion_tokens: Some(*completion_tokens) }),
            },
        }
    }

    async fn pop_script(&self) -> Option<CallScript> {
        let mut scripts = self.scripts.lock().await;
        if scripts.is_empty() {
            None
        } else {
            Some(scripts.remove(0))
        }
    }

    async fn log_call(&self, messages: &[Value], params: &Value) {
        self.call_log.lock().await.push((messages.to_vec(), params.clone()));
    }
}

#[async_trait]
impl ChatEndpoint for ScriptedEndpoint {
    async fn stream_chat_completion(
        &self,
        messages: Vec<Value>,
        params: Value,
    ) -> Result<ChunkStream, RequesterError> {
        self.log_call(&messages, &params).await;

        match self.pop_script().await {
            Some(CallScript::Stream { events, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let chunks: Vec<anyhow::Result<ChatCompletionChunk>> =
                    events.iter().map(Self::to_chunk).map(Ok).collect();
                Ok(Box::pin(stream::iter(chunks)))
            }
            Some(CallScript::Error { status, message }) => Err(RequesterError::Protocol { status, message }),
            None => Ok(Box::pin(stream::iter(Vec::new()))),
        }
    }

    async fn chat_completion(
        &self,
        messages: Vec<Value>,
        params: Value,
    ) -> Result<ChatCompletionResponse, RequesterError> {
        self.log_call(&messages, &params).await;

        match self.pop_script().await {
            Some(CallScript::Stream { events, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let mut content = String::new();
                let mut tool_calls: Vec<ToolCallFull> = Vec::new();
                let mut completion_tokens = None;
                for ev in &events {
                    match ev {
                        ChatEvent::Content(c) => content.push_str(c),
                        ChatEvent::ToolCall { id, name, arguments, .. } => tool_calls.push(ToolCallFull {
                            id: id.clone().unwrap_or_default(),
                            function: FunctionFull {
                                name: name.clone().unwrap_or_default(),
                                arguments: arguments.clone().unwrap_or_default(),
                            },
                        }),
                        ChatEvent::Usage { completion_tokens: t } => completion_tokens = Some(*t),
                        ChatEvent::Role(_) => {}
                    }
                }
                Ok(ChatCompletionResponse {
                    choices: vec![ResponseChoice {
                        message: ResponseMessage {
                            content: if content.is_empty() { None } else { Some(content) },
                            tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                        },
                    }],
                    usage: Some(Usage { completion_tokens }),
                })
            }
            Some(CallScript::Error { status, message }) => Err(RequesterError::Protocol { status, message }),
            None => Ok(ChatCompletionResponse::default()),
        }
    }
}
