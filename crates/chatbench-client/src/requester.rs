// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;
use std::sync::Arc;

use chatbench_core::{ConversationMemory, RequestPayload, RequestStatistics, RequestTimer, RequesterError, ToolCallRecord};
use futures::StreamExt;
use serde_json::{json, Map, Value};

use crate::endpoint::ChatEndpoint;
use crate::logger::ResponseLogger;

/// Issues a single chat completion (streaming or non-streaming), drives the
/// timer, reassembles streamed content and tool calls, updates memory,
/// classifies errors, and returns a `RequestStatistics` record.
pub struct Requester<E> {
    endpoint: E,
    stream: bool,
    model: Option<String>,
    memory: Arc<ConversationMemory>,
    logger: Option<Arc<dyn ResponseLogger>>,
}

/// Accumulated state for one tool call across chunks, keyed by `index`.
/// `BTreeMap` preserves ascending-index order when the final map is built.
type ToolCallAccumulator = BTreeMap<u32, (Option<String>, Option<String>, String)>;

impl<E: ChatEndpoint> Requester<E> {
    pub fn new(endpoint: E, stream: bool, model: Option<String>, memory: Arc<ConversationMemory>) -> Self {
        Self { endpoint, stream, model, memory, logger: None }
    }

    /// Enables the optional raw-response log.
    pub fn with_logger(mut self, logger: Arc<dyn ResponseLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Never fails outward: every outcome — success, protocol error, or
    /// runtime error — is flattened into a `RequestStatistics` record so the
    /// Pool can collect it uniformly.
    pub async fn dispatch(&self, payload: RequestPayload) -> RequestStatistics {
        let RequestPayload { session_id, messages, params } = payload;
        let mut params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        // Step 1: memory integration.
        let messages = if let Some(sid) = &session_id {
            self.memory.add_messages(sid, messages).await;
            self.memory.get_history(sid).await
        } else {
            messages
        };

        // Step 2: parameter normalization.
        if let Some(model) = &self.model {
            params.insert("model".to_string(), Value::String(model.clone()));
        }
        if !matches!(params.get("model"), Some(Value::String(_))) {
            tracing::warn!(session_id = ?session_id, "missing model for request");
            return RequestStatistics {
                e2e: 0.0,
                ttft: None,
                itl: None,
                token_num: None,
                status_code: Some(RequesterError::MissingModel.status_code()),
            };
        }

        if self.stream {
            if params.contains_key("stream_options") {
                tracing::warn!("overwriting caller-supplied stream_options to enable usage reporting");
            }
            params.insert("stream_options".to_string(), json!({ "include_usage": true }));
            self.dispatch_streaming(session_id, messages, Value::Object(params)).await
        } else {
            self.dispatch_non_streaming(session_id, messages, Value::Object(params)).await
        }
    }

    async fn dispatch_streaming(
        &self,
        session_id: Option<String>,
        messages: Vec<Value>,
        params: Value,
    ) -> RequestStatistics {
        let mut timer = RequestTimer::new();
        timer.start();

        let mut stream = match self.endpoint.stream_chat_completion(messages, params).await {
            Ok(s) => s,
            Err(e) => {
                let (e2e, _, _) = timer.finalize();
                tracing::warn!(session_id = ?session_id, status = e.status_code(), error = %e, "protocol error dispatching streaming request");
                return RequestStatistics { e2e, ttft: None, itl: None, token_num: None, status_code: Some(e.status_code()) };
            }
        };

        let mut content = String::new();
        let mut tool_calls: ToolCallAccumulator = BTreeMap::new();
        let mut completion_tokens: Option<u32> = None;

        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(session_id = ?session_id, error = %e, "error decoding a streamed chunk, skipping");
                    continue;
                }
            };

            // A chunk is content-bearing iff `delta` exists and `delta.role`
            // is absent: the initial role-announcement chunk must not
            // advance the timer.
            let delta = chunk.delta();
            let content_bearing = delta.map(|d| d.role.is_none()).unwrap_or(false);
            if content_bearing {
                timer.mark_token();
            }

            if let Some(d) = delta {
                if let Some(c) = &d.content {
                    content.push_str(c);
                }
                for tc in d.tool_calls.iter().flatten() {
                    let entry = tool_calls.entry(tc.index).or_insert_with(|| (None, None, String::new()));
                    if let Some(id) = &tc.id {
                        entry.0 = Some(id.clone());
                    }
                    if let Some(func) = &tc.function {
                        if let Some(name) = &func.name {
                            entry.1 = Some(name.clone());
                        }
                        if let Some(arguments) = &func.arguments {
                            entry.2.push_str(arguments);
                        }
                    }
                }
            }

            if let Some(usage) = &chunk.usage {
                if let Some(ct) = usage.completion_tokens {
                    completion_tokens = Some(ct);
                }
            }
        }

        let (e2e, ttft, itl) = timer.finalize();
        let observed_output_tokens = match &itl {
            Some(v) => 1 + v.len() as u32,
            None if ttft.is_some() => 1,
            None => 0,
        };

        let Some(completion_tokens) = completion_tokens else {
            tracing::warn!(session_id = ?session_id, "stream ended without a usage chunk");
            return RequestStatistics { e2e, ttft, itl, token_num: None, status_code: Some(600) };
        };

        if completion_tokens != observed_output_tokens {
            tracing::warn!(
                session_id = ?session_id,
                completion_tokens,
                observed_output_tokens,
                "reported completion_tokens differs from observed output tokens"
            );
        }

        if let Some(sid) = &session_id {
            if !content.is_empty() {
                self.memory.add_assistant_message(sid, content.clone()).await;
            }
            if !tool_calls.is_empty() {
                let records = to_tool_call_records(&tool_calls);
                if let Err(e) = self.memory.add_tool_call(sid, &records).await {
                    tracing::warn!(session_id = %sid, error = %e, "unsupported tool call kind");
                    return RequestStatistics { e2e, ttft, itl, token_num: Some(completion_tokens), status_code: Some(600) };
                }
            }
        }

        if let Some(logger) = &self.logger {
            logger.log_line(serialize_response_log(&content, &tool_calls)).await;
        }

        RequestStatistics { e2e, ttft, itl, token_num: Some(completion_tokens), status_code: Some(200) }
    }

    async fn dispatch_non_streaming(
        &self,
        session_id: Option<String>,
        messages: Vec<Value>,
        params: Value,
    ) -> RequestStatistics {
        let mut timer = RequestTimer::new();
        timer.start();

        let resp = match self.endpoint.chat_completion(messages, params).await {
            Ok(r) => r,
            Err(e) => {
                let (e2e, _, _) = timer.finalize();
                tracing::warn!(session_id = ?session_id, status = e.status_code(), error = %e, "protocol error dispatching request");
                return RequestStatistics { e2e, ttft: None, itl: None, token_num: None, status_code: Some(e.status_code()) };
            }
        };
        let (e2e, _, _) = timer.finalize();

        let choice = resp.choices.into_iter().next().unwrap_or_default();
        let content = choice.message.content.unwrap_or_default();
        let tool_calls = choice.message.tool_calls.unwrap_or_default();

        let Some(completion_tokens) = resp.usage.and_then(|u| u.completion_tokens) else {
            tracing::warn!(session_id = ?session_id, "non-streaming response missing usage.completion_tokens");
            return RequestStatistics { e2e, ttft: None, itl: None, token_num: None, status_code: Some(600) };
        };

        if let Some(sid) = &session_id {
            if !content.is_empty() {
                self.memory.add_assistant_message(sid, content.clone()).await;
            }
            if !tool_calls.is_empty() {
                let records: Vec<ToolCallRecord> = tool_calls
                    .iter()
                    .map(|tc| ToolCallRecord {
                        id: tc.id.clone(),
                        kind: "function".to_string(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect();
                if let Err(e) = self.memory.add_tool_call(sid, &records).await {
                    tracing::warn!(session_id = %sid, error = %e, "unsupported tool call kind");
                    return RequestStatistics { e2e, ttft: None, itl: None, token_num: Some(completion_tokens), status_code: Some(600) };
                }
            }
        }

        if let Some(logger) = &self.logger {
            let map: ToolCallAccumulator = tool_calls
                .iter()
                .enumerate()
                .map(|(i, tc)| (i as u32, (Some(tc.id.clone()), Some(tc.function.name.clone()), tc.function.arguments.clone())))
                .collect();
            logger.log_line(serialize_response_log(&content, &map)).await;
        }

        RequestStatistics { e2e, ttft: None, itl: None, token_num: Some(completion_tokens), status_code: Some(200) }
    }
}

fn to_tool_call_records(tool_calls: &ToolCallAccumulator) -> Vec<ToolCallRecord> {
    tool_calls
        .values()
        .map(|(id, name, arguments)| ToolCallRecord {
            id: id.clone().unwrap_or_default(),
            kind: "function".to_string(),
            name: name.clone().unwrap_or_default(),
            arguments: arguments.clone(),
        })
        .collect()
}

/// `{content, tool_calls: {index: {name, arguments}, ...}}`.
fn serialize_response_log(content: &str, tool_calls: &ToolCallAccumulator) -> String {
    let map: Map<String, Value> = tool_calls
        .iter()
        .map(|(idx, (_, name, arguments))| {
            (idx.to_string(), json!({ "name": name.clone().unwrap_or_default(), "arguments": arguments }))
        })
        .collect();
    json!({ "content": content, "tool_calls": map }).to_string()
}
