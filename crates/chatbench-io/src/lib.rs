// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! File-system-facing collaborators for `chatbench`: the JSONL payload
//! loader, the serialized response-log writer, and the output-report
//! serializer.

pub mod input;
pub mod report;
pub mod writer;

pub use input::load_payloads;
pub use report::{save_to_json, DescribeReport, OutputReport};
pub use writer::AsyncWriter;
