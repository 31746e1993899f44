// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use chatbench_client::{OpenAiCompatEndpoint, Pool, Requester};
use chatbench_core::{aggregate, ConversationMemory, SessionQueue};
use chatbench_io::{load_payloads, save_to_json, AsyncWriter, OutputReport};
use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let payloads = load_payloads(&cli.filepath).with_context(|| format!("loading {}", cli.filepath.display()))?;
    let total = payloads.len();
    tracing::info!(total, filepath = %cli.filepath.display(), "loaded request payloads");

    let memory = Arc::new(ConversationMemory::new(cli.max_history));
    let endpoint = OpenAiCompatEndpoint::new(cli.base_url.clone(), cli.api_key.clone());

    let mut requester = Requester::new(endpoint, cli.stream, Some(cli.model.clone()), memory);
    if cli.log_responses {
        let log_path = cli.responses_log_path();
        let writer = Arc::new(AsyncWriter::new(&log_path).with_context(|| format!("opening {}", log_path.display()))?);
        requester = requester.with_logger(writer);
    }
    let requester = Arc::new(requester);

    let queue = Arc::new(SessionQueue::new(payloads));
    let records = Pool::run(cli.concurrency.max(1), queue, move |payload| {
        let requester = Arc::clone(&requester);
        async move { requester.dispatch(payload).await }
    })
    .await;

    print_console_report(&records);

    let report: OutputReport = aggregate(&records).into();
    save_to_json(&report, &cli.output_file).with_context(|| format!("writing {}", cli.output_file.display()))?;
    tracing::info!(output_file = %cli.output_file.display(), "wrote aggregated report");

    Ok(())
}

fn print_console_report(records: &[chatbench_core::RequestStatistics]) {
    let successful = chatbench_core::successful(records).len();
    let failed = records.len() - successful;
    println!("chatbench: {} requests, {} successful, {} failed", records.len(), successful, failed);

    let report = aggregate(records);
    println!(
        "E2E    mean={:.3}s p50={:.3}s p95={:.3}s",
        report.e2e.mean, report.e2e.p50, report.e2e.p95
    );
    println!(
        "TTFT   mean={:.3}s p50={:.3}s p95={:.3}s",
        report.ttft.mean, report.ttft.p50, report.ttft.p95
    );
    println!(
        "ITL    mean={:.3}s p50={:.3}s p95={:.3}s",
        report.itl.mean, report.itl.p50, report.itl.p95
    );
    let mut codes: Vec<_> = report.status_codes.iter().collect();
    codes.sort_by_key(|(code, _)| code.to_string());
    for (code, count) in codes {
        println!("  status {code}: {count}");
    }
}

/// Headless CLI: tracing always goes to stderr.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
