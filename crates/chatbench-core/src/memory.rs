// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::RequesterError;

/// A reassembled tool call, ready to be appended to a session's history.
///
/// `kind` mirrors the OpenAI `tool_calls[].type` field; only `"function"` is
/// supported.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub arguments: String,
}

/// Per-session append-only message history, shared across all requests of a
/// run so multi-turn sessions accumulate.
///
/// Session isolation is delegated to `SessionQueue`'s exclusion invariant —
/// at most one worker ever touches a given session's entry at a time — so a
/// single coarse lock over the whole map is sufficient; contention is
/// bounded by the worker count.
pub struct ConversationMemory {
    sessions: Mutex<HashMap<String, Vec<Value>>>,
    max_history: Option<usize>,
}

impl ConversationMemory {
    pub fn new(max_history: Option<usize>) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), max_history }
    }

    /// Appends `msgs` to `sessions[sid]`, then truncates to `max_history` if
    /// configured.
    pub async fn add_messages(&self, sid: &str, msgs: Vec<Value>) {
        let mut guard = self.sessions.lock().await;
        let history = guard.entry(sid.to_string()).or_default();
        history.extend(msgs);
        Self::truncate(history, self.max_history);
    }

    /// Appends `{role: "assistant", content}`.
    pub async fn add_assistant_message(&self, sid: &str, content: impl Into<String>) {
        let msg = json!({ "role": "assistant", "content": content.into() });
        self.add_messages(sid, vec![msg]).await;
    }

    /// Appends `{role: "assistant", tool_calls: [...]}`.
    ///
    /// Fails with `UnsupportedToolKind` if any call is not of kind
    /// `"function"` — the only kind the OpenAI-compatible wire format and
    /// this harness understand.
    pub async fn add_tool_call(
        &self,
        sid: &str,
        calls: &[ToolCallRecord],
    ) -> Result<(), RequesterError> {
        if let Some(bad) = calls.iter().find(|c| c.kind != "function") {
            return Err(RequesterError::UnsupportedToolKind(bad.kind.clone()));
        }

        let serialized: Vec<Value> = calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": { "name": c.name, "arguments": c.arguments },
                })
            })
            .collect();
        let msg = json!({ "role": "assistant", "tool_calls": serialized });
        self.add_messages(sid, vec![msg]).await;
        Ok(())
    }

    /// Returns the current ordered history for `sid` (empty if unseen).
    ///
    /// Returns an owned copy: callers must not expect further mutation of
    /// the memory to retroactively affect a value already read out.
    pub async fn get_history(&self, sid: &str) -> Vec<Value> {
        self.sessions.lock().await.get(sid).cloned().unwrap_or_default()
    }

    /// Truncates `sessions[sid]` to empty.
    pub async fn clear(&self, sid: &str) {
        if let Some(history) = self.sessions.lock().await.get_mut(sid) {
            history.clear();
        }
    }

    fn truncate(history: &mut Vec<Value>, max_history: Option<usize>) {
        if let Some(max) = max_history {
            if history.len() > max {
                let drop = history.len() - max;
                history.drain(0..drop);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_messages_then_get_history_preserves_order() {
        let mem = ConversationMemory::new(None);
        mem.add_messages("s1", vec![json!({"role": "user", "content": "a"})]).await;
        mem.add_assistant_message("s1", "b").await;
        let history = mem.get_history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["content"], "a");
        assert_eq!(history[1]["content"], "b");
    }

    #[tokio::test]
    async fn unseen_session_has_empty_history() {
        let mem = ConversationMemory::new(None);
        assert!(mem.get_history("nope").await.is_empty());
    }

    #[tokio::test]
    async fn max_history_truncates_to_tail() {
        let mem = ConversationMemory::new(Some(2));
        for i in 0..5 {
            mem.add_assistant_message("s1", format!("msg-{i}")).await;
        }
        let history = mem.get_history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["content"], "msg-3");
        assert_eq!(history[1]["content"], "msg-4");
    }

    #[tokio::test]
    async fn clear_empties_session() {
        let mem = ConversationMemory::new(None);
        mem.add_assistant_message("s1", "hi").await;
        mem.clear("s1").await;
        assert!(mem.get_history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn add_tool_call_rejects_non_function_kind() {
        let mem = ConversationMemory::new(None);
        let calls = vec![ToolCallRecord {
            id: "1".into(),
            kind: "retrieval".into(),
            name: "search".into(),
            arguments: "{}".into(),
        }];
        let err = mem.add_tool_call("s1", &calls).await.unwrap_err();
        assert!(matches!(err, RequesterError::UnsupportedToolKind(k) if k == "retrieval"));
    }

    #[tokio::test]
    async fn add_tool_call_serializes_function_calls() {
        let mem = ConversationMemory::new(None);
        let calls = vec![ToolCallRecord {
            id: "call-1".into(),
            kind: "function".into(),
            name: "shell".into(),
            arguments: "{\"command\":\"ls\"}".into(),
        }];
        mem.add_tool_call("s1", &calls).await.unwrap();
        let history = mem.get_history("s1").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["tool_calls"][0]["function"]["name"], "shell");
    }

    #[tokio::test]
    async fn different_sessions_are_independent() {
        let mem = ConversationMemory::new(None);
        mem.add_assistant_message("a", "for a").await;
        mem.add_assistant_message("b", "for b").await;
        assert_eq!(mem.get_history("a").await.len(), 1);
        assert_eq!(mem.get_history("b").await.len(), 1);
    }
}
