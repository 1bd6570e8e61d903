//! Token-bucket rate limiter with a bounded wait for a permit.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use fleet_mcp_core::error::{FleetError, FleetResult};

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Permits granted per refresh period
    pub limit_for_period: u32,
    /// How often the bucket refills
    pub refresh_period: Duration,
    /// Longest a caller will wait for a permit before `rate-limited`
    pub timeout: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 100,
            refresh_period: Duration::from_secs(60),
            timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    available: u32,
    cycle_start: Instant,
}

impl Bucket {
    /// Advance to the current cycle, restoring the full budget if at least
    /// one refresh period elapsed.
    fn refill(&mut self, now: Instant, config: &RateLimiterConfig) {
        let elapsed = now.duration_since(self.cycle_start);
        if elapsed >= config.refresh_period {
            let cycles = elapsed.as_nanos() / config.refresh_period.as_nanos().max(1);
            self.cycle_start += config.refresh_period * (cycles as u32);
            self.available = config.limit_for_period;
        }
    }
}

/// Token bucket for one logical endpoint.
pub struct RateLimiter {
    endpoint: String,
    config: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(endpoint: impl Into<String>, config: RateLimiterConfig) -> Self {
        let bucket = Bucket {
            available: config.limit_for_period,
            cycle_start: Instant::now(),
        };
        Self {
            endpoint: endpoint.into(),
            config,
            bucket: Mutex::new(bucket),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Acquire one permit, waiting up to the configured timeout for the
    /// next refill.
    pub async fn try_acquire(&self) -> FleetResult<()> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                bucket.refill(now, &self.config);
                if bucket.available > 0 {
                    bucket.available -= 1;
                    return Ok(());
                }
                (bucket.cycle_start + self.config.refresh_period).saturating_duration_since(now)
            };

            if Instant::now() + wait > deadline {
                debug!(endpoint = %self.endpoint, "rate limit exceeded");
                return Err(FleetError::RateLimited(self.endpoint.clone()));
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Permits left in the current cycle.
    pub async fn available_permits(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(Instant::now(), &self.config);
        bucket.available
    }
}
