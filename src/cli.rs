// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::Parser;

/// Concurrent load-generation and latency-measurement harness for
/// OpenAI-compatible chat-completion endpoints.
#[derive(Parser, Debug)]
#[command(name = "chatbench", version, about)]
pub struct Cli {
    /// Model name sent as `params.model` on every request, overriding any
    /// inline value in the input file.
    #[arg(long)]
    pub model: String,

    /// Path to the line-delimited JSON input file.
    #[arg(long, short = 'f')]
    pub filepath: PathBuf,

    /// Number of concurrent workers driving the SessionQueue.
    #[arg(long, short = 'c', default_value_t = 1)]
    pub concurrency: usize,

    /// Path to write the aggregated JSON report to.
    #[arg(long, short = 'o', default_value = "output.json")]
    pub output_file: PathBuf,

    /// Append reassembled responses to `responses.jsonl` beside the report.
    #[arg(long)]
    pub log_responses: bool,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "CHATBENCH_BASE_URL", default_value = "http://localhost:8000/v1")]
    pub base_url: String,

    /// Bearer token for the endpoint, if it requires authentication.
    #[arg(long, env = "CHATBENCH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Whether to use the streaming create-completion path.
    #[arg(long, default_value_t = true)]
    pub stream: bool,

    /// Maximum number of messages retained per session (unbounded if unset).
    #[arg(long)]
    pub max_history: Option<usize>,
}

impl Cli {
    /// Derives the sibling path for the optional raw-response log:
    /// `responses.jsonl` next to `output_file`.
    pub fn responses_log_path(&self) -> PathBuf {
        self.output_file.parent().map(|p| p.join("responses.jsonl")).unwrap_or_else(|| PathBuf::from("responses.jsonl"))
    }
}
