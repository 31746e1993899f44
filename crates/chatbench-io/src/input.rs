// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;

use chatbench_core::{ConfigError, RequestPayload};
use serde_json::Value;

/// Reads a line-delimited JSON input file into `RequestPayload`s. Blank
/// lines are skipped, each remaining line must parse as a JSON object, and
/// `model` / `stream` keys trigger a warning since the harness overrides or
/// ignores them respectively.
pub fn load_payloads(path: impl AsRef<Path>) -> Result<Vec<RequestPayload>, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseLine { line: 0, message: e.to_string() })?;

    let mut payloads = Vec::new();
    let mut warned_model = false;
    let mut warned_stream = false;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut entry: Value = serde_json::from_str(line)
            .map_err(|e| ConfigError::ParseLine { line: idx + 1, message: e.to_string() })?;

        let obj = entry.as_object_mut().ok_or_else(|| ConfigError::ParseLine {
            line: idx + 1,
            message: "expected a JSON object".to_string(),
        })?;

        if !warned_model && obj.contains_key("model") {
            tracing::warn!(line = idx + 1, "input file contains the key \"model\"; any defined model may be overwritten");
            warned_model = true;
        }
        if !warned_stream && obj.contains_key("stream") {
            tracing::warn!(line = idx + 1, "input file contains the key \"stream\"; it will be ignored");
            warned_stream = true;
        }

        let session_id = obj.remove("session_id").and_then(|v| v.as_str().map(String::from));
        let messages = obj.remove("messages").and_then(|v| v.as_array().cloned()).unwrap_or_default();

        payloads.push(RequestPayload::new(session_id, messages, entry));
    }

    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_payloads("/nonexistent/path/does-not-exist.jsonl").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn parses_session_id_messages_and_remaining_params() {
        let f = write_temp("{\"session_id\": \"a\", \"messages\": [{\"role\":\"user\",\"content\":\"hi\"}], \"temperature\": 0.2}\n");
        let payloads = load_payloads(f.path()).unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].session_id.as_deref(), Some("a"));
        assert_eq!(payloads[0].messages.len(), 1);
        assert_eq!(payloads[0].params["temperature"], 0.2);
        assert!(payloads[0].params.get("messages").is_none());
        assert!(payloads[0].params.get("session_id").is_none());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let f = write_temp("\n{\"session_id\": null, \"messages\": []}\n\n");
        let payloads = load_payloads(f.path()).unwrap();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].session_id.is_none());
    }

    #[test]
    fn malformed_json_line_reports_line_number() {
        let f = write_temp("{\"session_id\": \"a\", \"messages\": []}\nnot json\n");
        let err = load_payloads(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseLine { line: 2, .. }));
    }

    #[test]
    fn absent_session_id_yields_none() {
        let f = write_temp("{\"messages\": []}\n");
        let payloads = load_payloads(f.path()).unwrap();
        assert!(payloads[0].session_id.is_none());
    }
}
