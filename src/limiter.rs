//! Sliding-window rate governor for model traffic.
//!
//! Tracks one record per admitted model call inside a trailing time
//! window, with input and output token counts attached. [`RateLimiter::reserve`]
//! blocks the calling task (and only the calling task) until admitting one
//! more call would not push any occupied cap over its configured limit,
//! then records the call. Output usage is attached afterwards via
//! [`RateLimiter::record_output`] and gates subsequent reservations.
//!
//! The records mutex is never held across an await: each poll computes the
//! time until the oldest record ages out, releases the lock, and sleeps.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    at: Instant,
    input: u64,
    output: u64,
}

/// Snapshot of the occupied capacity inside the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Admitted calls inside the window.
    pub calls: u32,
    /// Input tokens recorded inside the window.
    pub input_tokens: u64,
    /// Output tokens recorded inside the window.
    pub output_tokens: u64,
}

/// Sliding-window governor over call count, input tokens, and output tokens.
///
/// A cap of `0` means unbounded for that dimension.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_calls: u32,
    max_input: u64,
    max_output: u64,
    records: Mutex<VecDeque<CallRecord>>,
}

impl RateLimiter {
    /// Poll interval used when no record expiry gives a better wait hint.
    const POLL: Duration = Duration::from_millis(50);

    /// Create a limiter from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max_calls: config.max_calls,
            max_input: config.max_input_tokens,
            max_output: config.max_output_tokens,
            records: Mutex::new(VecDeque::new()),
        }
    }

    /// Block until one more call with `input_tokens` fits inside the
    /// window, then record it.
    ///
    /// A call whose own token count exceeds the input cap is still
    /// admitted once the window is empty, so a single oversized call can
    /// never deadlock the loop.
    pub async fn reserve(&self, input_tokens: u64) {
        loop {
            let wait = {
                let mut records = self.records.lock().await;
                let now = Instant::now();
                Self::prune(&mut records, now, self.window);

                if self.fits(&records, input_tokens) {
                    records.push_back(CallRecord {
                        at: now,
                        input: input_tokens,
                        output: 0,
                    });
                    return;
                }

                // Wait for the oldest record to age out, then recheck.
                records
                    .front()
                    .map(|r| {
                        self.window
                            .checked_sub(now.duration_since(r.at))
                            .unwrap_or(Self::POLL)
                    })
                    .unwrap_or(Self::POLL)
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait.max(Self::POLL)).await;
        }
    }

    /// Attach output token usage to the most recent record.
    ///
    /// No-op if no call has been recorded yet.
    pub async fn record_output(&self, output_tokens: u64) {
        let mut records = self.records.lock().await;
        if let Some(last) = records.back_mut() {
            last.output += output_tokens;
        }
    }

    /// Occupied capacity inside the current window.
    pub async fn occupancy(&self) -> Occupancy {
        let mut records = self.records.lock().await;
        let now = Instant::now();
        Self::prune(&mut records, now, self.window);
        Occupancy {
            calls: records.len() as u32,
            input_tokens: records.iter().map(|r| r.input).sum(),
            output_tokens: records.iter().map(|r| r.output).sum(),
        }
    }

    fn prune(records: &mut VecDeque<CallRecord>, now: Instant, window: Duration) {
        while let Some(front) = records.front() {
            if now.duration_since(front.at) >= window {
                records.pop_front();
            } else {
                break;
            }
        }
    }

    fn fits(&self, records: &VecDeque<CallRecord>, input_tokens: u64) -> bool {
        // An empty window always admits, even an oversized call.
        if records.is_empty() {
            return true;
        }

        if self.max_calls > 0 && records.len() as u32 + 1 > self.max_calls {
            return false;
        }

        if self.max_input > 0 {
            let occupied: u64 = records.iter().map(|r| r.input).sum();
            if occupied + input_tokens > self.max_input {
                return false;
            }
        }

        if self.max_output > 0 {
            let occupied: u64 = records.iter().map(|r| r.output).sum();
            if occupied > self.max_output {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_secs: u64, max_calls: u32, max_input: u64, max_output: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            window_secs,
            max_calls,
            max_input_tokens: max_input,
            max_output_tokens: max_output,
        })
    }

    #[tokio::test]
    async fn test_unbounded_admits_immediately() {
        let limiter = limiter(60, 0, 0, 0);
        for _ in 0..20 {
            limiter.reserve(1000).await;
        }
        assert_eq!(limiter.occupancy().await.calls, 20);
    }

    #[tokio::test]
    async fn test_call_cap_respected_within_window() {
        let limiter = limiter(60, 3, 0, 0);
        limiter.reserve(1).await;
        limiter.reserve(1).await;
        limiter.reserve(1).await;
        assert_eq!(limiter.occupancy().await.calls, 3);

        // The fourth reservation must block until the window ages out.
        let blocked =
            tokio::time::timeout(Duration::from_millis(100), limiter.reserve(1)).await;
        assert!(blocked.is_err(), "fourth call should block");
    }

    #[tokio::test]
    async fn test_call_cap_frees_after_window() {
        tokio::time::pause();
        let limiter = limiter(1, 1, 0, 0);
        limiter.reserve(1).await;

        let reserve = limiter.reserve(1);
        tokio::pin!(reserve);

        // Not admitted immediately.
        assert!(
            tokio::time::timeout(Duration::from_millis(10), reserve.as_mut())
                .await
                .is_err()
        );

        // After the window passes, the pending reservation is admitted.
        tokio::time::advance(Duration::from_millis(1100)).await;
        tokio::time::timeout(Duration::from_secs(1), reserve)
            .await
            .expect("reservation should complete after the window ages out");
    }

    #[tokio::test]
    async fn test_input_cap_blocks_when_occupied() {
        let limiter = limiter(60, 0, 100, 0);
        limiter.reserve(80).await;

        // 80 + 30 > 100, must block while the first record occupies the window.
        let blocked =
            tokio::time::timeout(Duration::from_millis(100), limiter.reserve(30)).await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_oversized_call_admitted_on_empty_window() {
        let limiter = limiter(60, 5, 100, 0);
        // 1000 > 100 but the window is empty: must not deadlock.
        tokio::time::timeout(Duration::from_millis(100), limiter.reserve(1000))
            .await
            .expect("oversized call must be admitted alone");
        assert_eq!(limiter.occupancy().await.input_tokens, 1000);
    }

    #[tokio::test]
    async fn test_record_output_attaches_to_latest() {
        let limiter = limiter(60, 0, 0, 0);
        limiter.reserve(10).await;
        limiter.record_output(40).await;
        limiter.reserve(10).await;
        limiter.record_output(5).await;

        let occ = limiter.occupancy().await;
        assert_eq!(occ.output_tokens, 45);
    }

    #[tokio::test]
    async fn test_output_cap_blocks_next_reservation() {
        let limiter = limiter(60, 0, 0, 50);
        limiter.reserve(1).await;
        limiter.record_output(80).await; // over the output cap

        let blocked =
            tokio::time::timeout(Duration::from_millis(100), limiter.reserve(1)).await;
        assert!(blocked.is_err(), "output overuse must gate the next call");
    }

    #[tokio::test]
    async fn test_record_output_without_calls_is_noop() {
        let limiter = limiter(60, 0, 0, 0);
        limiter.record_output(10).await;
        assert_eq!(limiter.occupancy().await.output_tokens, 0);
    }
}
