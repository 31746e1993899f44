// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::future::Future;
use std::sync::Arc;

use chatbench_core::{Acquisition, RequestPayload, RequestStatistics, SessionQueue};
use tokio::sync::mpsc;

/// Runs a fixed number of workers concurrently against a `SessionQueue`,
/// collecting the result of each invocation of `f`.
pub struct Pool;

impl Pool {
    /// Drives `concurrency` workers against `queue`, calling `f(payload)` for
    /// each acquired item, until the queue is permanently drained. Returns
    /// the collected records in arbitrary order.
    pub async fn run<F, Fut>(concurrency: usize, queue: Arc<SessionQueue>, f: F) -> Vec<RequestStatistics>
    where
        F: Fn(RequestPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RequestStatistics> + Send + 'static,
    {
        let f = Arc::new(f);
        let (tx, mut rx) = mpsc::unbounded_channel::<RequestStatistics>();

        let mut workers = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let queue = Arc::clone(&queue);
            let f = Arc::clone(&f);
            let tx = tx.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    match queue.get_item().await {
                        Acquisition::Item(handle) => {
                            let payload = handle.payload().clone();
                            let stat = f(payload).await;
                            queue
                                .release(handle)
                                .await
                                .expect("QueueInvariantViolation: released an untracked session");
                            // The receiver only disappears once every worker
                            // has exited, so this send cannot fail.
                            let _ = tx.send(stat);
                        }
                        Acquisition::Exhausted { drained: true } => break,
                        Acquisition::Exhausted { drained: false } => {
                            // Cooperative backoff: some other worker holds the
                            // only eligible session right now and will
                            // release it soon.
                            tokio::task::yield_now().await;
                        }
                    }
                }
            }));
        }
        drop(tx);

        let mut results = Vec::new();
        while let Some(stat) = rx.recv().await {
            results.push(stat);
        }

        for worker in workers {
            worker.await.expect("pool worker task panicked");
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload(sid: Option<&str>) -> RequestPayload {
        RequestPayload::new(sid.map(String::from), vec![json!({"role": "user"})], json!({}))
    }

    fn stat_ok() -> RequestStatistics {
        RequestStatistics { e2e: 0.0, ttft: None, itl: None, token_num: Some(1), status_code: Some(200) }
    }

    #[tokio::test]
    async fn processes_every_payload_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let queue = Arc::new(SessionQueue::new(vec![
            payload(Some("a")),
            payload(Some("b")),
            payload(None),
        ]));
        let calls2 = Arc::clone(&calls);
        let results = Pool::run(2, queue, move |_payload| {
            calls2.fetch_add(1, Ordering::SeqCst);
            async { stat_ok() }
        })
        .await;
        assert_eq!(results.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn concurrency_one_processes_all_payloads() {
        let queue = Arc::new(SessionQueue::new(vec![payload(Some("a")), payload(Some("b"))]));
        let results = Pool::run(1, queue, |_payload| async { stat_ok() }).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_session_payloads_never_run_concurrently() {
        use std::sync::Mutex;
        use std::time::Duration;

        let overlap_detected = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(Mutex::new(false));
        let queue = Arc::new(SessionQueue::new(vec![
            payload(Some("s")),
            payload(Some("s")),
            payload(Some("s")),
        ]));

        let overlap2 = Arc::clone(&overlap_detected);
        let in_flight2 = Arc::clone(&in_flight);
        let results = Pool::run(3, queue, move |_payload| {
            let overlap = Arc::clone(&overlap2);
            let in_flight = Arc::clone(&in_flight2);
            async move {
                {
                    let mut guard = in_flight.lock().unwrap();
                    if *guard {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    *guard = true;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                *in_flight.lock().unwrap() = false;
                stat_ok()
            }
        })
        .await;

        assert_eq!(results.len(), 3);
        assert_eq!(overlap_detected.load(Ordering::SeqCst), 0);
    }
}
