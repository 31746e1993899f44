// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chatbench_client::ResponseLogger;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Serialized append-only text sink bound to a file path. Any existing file
/// at the path is removed on construction, and every `write` appends
/// `line + "\n"` under an exclusive lock so writes are durable in the order
/// they were acquired.
pub struct AsyncWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AsyncWriter {
    pub fn new(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(Self { path, lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(())
    }
}

#[async_trait]
impl ResponseLogger for AsyncWriter {
    async fn log_line(&self, line: String) {
        if let Err(e) = self.write(&line).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append to response log");
        }
    }
}
