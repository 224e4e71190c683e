//! Per-provider request rate limiter
//!
//! Token bucket sized to a requests-per-minute budget. `acquire` waits for
//! the next token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token bucket for rate limiting
struct TokenBucket {
    capacity: u32,
    tokens: f64,
    last_refill: Instant,
    /// Tokens per second
    refill_rate: f64,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            last_refill: Instant::now(),
            refill_rate,
        }
    }

    fn time_until_available(&mut self) -> Option<Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            None
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(tokens_needed / self.refill_rate))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
        self.last_refill = now;
    }
}

pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    total_calls: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_minute` calls, with a burst of the same size
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let capacity = requests_per_minute.max(1);
        Self {
            bucket: Mutex::new(TokenBucket::new(capacity, capacity as f64 / 60.0)),
            total_calls: AtomicU64::new(0),
        }
    }

    /// Take a token, sleeping until one is available
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                match bucket.time_until_available() {
                    None => {
                        bucket.tokens -= 1.0;
                        self.total_calls.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    Some(wait) => wait,
                }
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    pub async fn get_stats(&self) -> RateLimiterStats {
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        RateLimiterStats {
            tokens_available: bucket.tokens as u32,
            capacity: bucket.capacity,
            total_calls: self.total_calls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub tokens_available: u32,
    pub capacity: u32,
    pub total_calls: u64,
}
