// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::time::Instant;

/// Monotonic wall-clock timing for a single streaming request.
///
/// Created once per request. `start()` arms the timer; `mark_token()` is
/// called once per content-bearing chunk (see `chatbench_client`'s chunk
/// classification rule); `finalize()` reads out `(e2e, ttft, itl)` and
/// resets the timer so the same instance can be reused for the next request.
#[derive(Debug, Default)]
pub struct RequestTimer {
    start_time: Option<Instant>,
    first_token_time: Option<Instant>,
    last_token_time: Option<Instant>,
    itl: Vec<f64>,
}

impl RequestTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the monotonic clock at call time.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.first_token_time = None;
        self.last_token_time = None;
        self.itl.clear();
    }

    /// Called once per arriving content-bearing chunk. The first call only
    /// records `first_token_time`; subsequent calls append the delta since
    /// the previous token to `itl`.
    pub fn mark_token(&mut self) {
        let now = Instant::now();
        if self.first_token_time.is_none() {
            self.first_token_time = Some(now);
        } else if let Some(last) = self.last_token_time {
            self.itl.push((now - last).as_secs_f64());
        }
        self.last_token_time = Some(now);
    }

    /// Returns `(e2e, ttft, itl)` and resets all internal state.
    ///
    /// `e2e` falls back to `now − start_time` when no token was ever
    /// observed — this is an explicit fallback from the reference
    /// implementation, matched exactly rather than redesigned (see
    /// DESIGN.md "Open Question decisions").
    pub fn finalize(&mut self) -> (f64, Option<f64>, Option<Vec<f64>>) {
        let start = self.start_time.unwrap_or_else(Instant::now);
        let now = Instant::now();

        let e2e = match self.last_token_time {
            Some(last) => (last - start).as_secs_f64(),
            None => (now - start).as_secs_f64(),
        };
        let ttft = self.first_token_time.map(|t| (t - start).as_secs_f64());
        let itl = if self.itl.is_empty() { None } else { Some(std::mem::take(&mut self.itl)) };

        self.start_time = None;
        self.first_token_time = None;
        self.last_token_time = None;

        (e2e, ttft, itl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn finalize_with_no_tokens_falls_back_to_now_minus_start() {
        let mut t = RequestTimer::new();
        t.start();
        sleep(Duration::from_millis(5));
        let (e2e, ttft, itl) = t.finalize();
        assert!(e2e > 0.0);
        assert!(ttft.is_none());
        assert!(itl.is_none());
    }

    #[test]
    fn first_mark_token_sets_ttft_but_no_itl() {
        let mut t = RequestTimer::new();
        t.start();
        t.mark_token();
        let (_e2e, ttft, itl) = t.finalize();
        assert!(ttft.is_some());
        assert!(itl.is_none());
    }

    #[test]
    fn second_mark_token_appends_one_itl_entry() {
        let mut t = RequestTimer::new();
        t.start();
        t.mark_token();
        sleep(Duration::from_millis(2));
        t.mark_token();
        let (e2e, ttft, itl) = t.finalize();
        let itl = itl.expect("itl should be populated after two tokens");
        assert_eq!(itl.len(), 1);
        assert!(itl[0] >= 0.0);
        assert!(ttft.unwrap() <= e2e);
    }

    #[test]
    fn finalize_resets_state_for_reuse() {
        let mut t = RequestTimer::new();
        t.start();
        t.mark_token();
        t.mark_token();
        let _ = t.finalize();

        t.start();
        let (_e2e, ttft, itl) = t.finalize();
        assert!(ttft.is_none(), "timer must not leak state across requests");
        assert!(itl.is_none());
    }

    #[test]
    fn three_tokens_produce_two_itl_entries() {
        let mut t = RequestTimer::new();
        t.start();
        t.mark_token();
        t.mark_token();
        t.mark_token();
        let (_, _, itl) = t.finalize();
        assert_eq!(itl.unwrap().len(), 2);
    }
}
