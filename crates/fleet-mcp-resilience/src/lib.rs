//! # fleet-mcp-resilience
//!
//! Admission control around remote calls: token-bucket rate limiters and
//! sliding-window circuit breakers, keyed by logical endpoint. Callers run
//! in a guarded shape: acquire a permit, check the breaker, run the
//! operation, report the outcome.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use fleet_mcp_core::error::FleetResult;

pub mod circuit_breaker;
pub mod rate_limit;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

/// Logical endpoints guarded by default budgets.
pub mod endpoints {
    /// Remote generative language-model API
    pub const GENERATIVE: &str = "generative-api";
    /// Inbound user requests
    pub const USER_REQUESTS: &str = "user-requests";
    /// Tool executions dispatched through the registry
    pub const TOOL_EXECUTIONS: &str = "tool-executions";
    /// MCP server traffic
    pub const MCP: &str = "mcp";
}

/// Observable state of one endpoint's guards.
#[derive(Debug, Clone, Serialize)]
pub struct ResilienceStatus {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_state: Option<CircuitState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_permits: Option<u32>,
    pub recorded_calls: usize,
    pub failure_rate: f64,
}

/// Process-scoped store of limiters and breakers.
pub struct ResilienceRegistry {
    limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ResilienceRegistry {
    /// An empty registry; endpoints are guarded only once installed.
    pub fn new() -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Registry carrying the default budgets:
    /// generative 30/min (wait 5 s), user requests 100/min (wait 1 s),
    /// tool executions 50/min (wait 2 s); generative breaker 50% / 30 s /
    /// window 10 / min 5 / probes 3; MCP breaker 60% / 15 s / window 8 /
    /// min 3 / probes 2.
    pub async fn with_defaults() -> Self {
        let registry = Self::new();

        registry
            .install_limiter(
                endpoints::GENERATIVE,
                RateLimiterConfig {
                    limit_for_period: 30,
                    refresh_period: Duration::from_secs(60),
                    timeout: Duration::from_secs(5),
                },
            )
            .await;
        registry
            .install_limiter(
                endpoints::USER_REQUESTS,
                RateLimiterConfig {
                    limit_for_period: 100,
                    refresh_period: Duration::from_secs(60),
                    timeout: Duration::from_secs(1),
                },
            )
            .await;
        registry
            .install_limiter(
                endpoints::TOOL_EXECUTIONS,
                RateLimiterConfig {
                    limit_for_period: 50,
                    refresh_period: Duration::from_secs(60),
                    timeout: Duration::from_secs(2),
                },
            )
            .await;

        registry
            .install_breaker(
                endpoints::GENERATIVE,
                CircuitBreakerConfig {
                    failure_rate_threshold: 50.0,
                    sliding_window_size: 10,
                    minimum_calls: 5,
                    open_wait: Duration::from_secs(30),
                    half_open_probes: 3,
                },
            )
            .await;
        registry
            .install_breaker(
                endpoints::MCP,
                CircuitBreakerConfig {
                    failure_rate_threshold: 60.0,
                    sliding_window_size: 8,
                    minimum_calls: 3,
                    open_wait: Duration::from_secs(15),
                    half_open_probes: 2,
                },
            )
            .await;

        registry
    }

    pub async fn install_limiter(&self, endpoint: &str, config: RateLimiterConfig) {
        self.limiters
            .write()
            .await
            .insert(endpoint.to_string(), Arc::new(RateLimiter::new(endpoint, config)));
    }

    pub async fn install_breaker(&self, endpoint: &str, config: CircuitBreakerConfig) {
        self.breakers.write().await.insert(
            endpoint.to_string(),
            Arc::new(CircuitBreaker::new(endpoint, config)),
        );
    }

    /// Admission check: rate permit first, then the breaker. Endpoints with
    /// no installed guard pass freely.
    pub async fn acquire(&self, endpoint: &str) -> FleetResult<()> {
        let limiter = self.limiters.read().await.get(endpoint).cloned();
        if let Some(limiter) = limiter {
            limiter.try_acquire().await?;
        }
        let breaker = self.breakers.read().await.get(endpoint).cloned();
        if let Some(breaker) = breaker {
            breaker.try_acquire().await?;
        }
        Ok(())
    }

    /// Non-consuming admission probe.
    pub async fn can_call(&self, endpoint: &str) -> bool {
        let limiter = self.limiters.read().await.get(endpoint).cloned();
        if let Some(limiter) = limiter {
            if limiter.available_permits().await == 0 {
                return false;
            }
        }
        let breaker = self.breakers.read().await.get(endpoint).cloned();
        if let Some(breaker) = breaker {
            if breaker.state().await == CircuitState::Open {
                return false;
            }
        }
        true
    }

    pub async fn record_success(&self, endpoint: &str) {
        let breaker = self.breakers.read().await.get(endpoint).cloned();
        if let Some(breaker) = breaker {
            breaker.record_success().await;
        }
    }

    pub async fn record_failure(&self, endpoint: &str) {
        let breaker = self.breakers.read().await.get(endpoint).cloned();
        if let Some(breaker) = breaker {
            breaker.record_failure().await;
        }
    }

    /// Run `op` in the guarded shape: acquire, execute, report.
    ///
    /// Admission failures (`rate-limited`, `circuit-open`) are returned
    /// without touching the breaker window.
    pub async fn guard<T, Fut>(&self, endpoint: &str, op: Fut) -> FleetResult<T>
    where
        Fut: Future<Output = FleetResult<T>>,
    {
        self.acquire(endpoint).await?;
        match op.await {
            Ok(value) => {
                self.record_success(endpoint).await;
                Ok(value)
            }
            Err(e) => {
                self.record_failure(endpoint).await;
                Err(e)
            }
        }
    }

    /// Current guard state for one endpoint, if any guard is installed.
    pub async fn status(&self, endpoint: &str) -> Option<ResilienceStatus> {
        let limiter = self.limiters.read().await.get(endpoint).cloned();
        let breaker = self.breakers.read().await.get(endpoint).cloned();
        if limiter.is_none() && breaker.is_none() {
            return None;
        }

        let available_permits = match &limiter {
            Some(limiter) => Some(limiter.available_permits().await),
            None => None,
        };
        let (circuit_state, recorded_calls, failure_rate) = match &breaker {
            Some(breaker) => (
                Some(breaker.state().await),
                breaker.recorded_calls().await,
                breaker.failure_rate().await,
            ),
            None => (None, 0, 0.0),
        };

        Some(ResilienceStatus {
            endpoint: endpoint.to_string(),
            circuit_state,
            available_permits,
            recorded_calls,
            failure_rate,
        })
    }

    /// Status of every guarded endpoint.
    pub async fn status_all(&self) -> Vec<ResilienceStatus> {
        let mut names: Vec<String> = {
            let limiters = self.limiters.read().await;
            let breakers = self.breakers.read().await;
            limiters.keys().chain(breakers.keys()).cloned().collect()
        };
        names.sort();
        names.dedup();

        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            if let Some(status) = self.status(&name).await {
                statuses.push(status);
            }
        }
        statuses
    }
}

impl Default for ResilienceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_mcp_core::error::FleetError;

    #[tokio::test]
    async fn defaults_cover_all_endpoints() {
        let registry = ResilienceRegistry::with_defaults().await;

        for endpoint in [
            endpoints::GENERATIVE,
            endpoints::USER_REQUESTS,
            endpoints::TOOL_EXECUTIONS,
            endpoints::MCP,
        ] {
            assert!(registry.status(endpoint).await.is_some(), "{endpoint}");
            assert!(registry.can_call(endpoint).await, "{endpoint}");
        }

        let generative = registry.status(endpoints::GENERATIVE).await.unwrap();
        assert_eq!(generative.available_permits, Some(30));
        assert_eq!(generative.circuit_state, Some(CircuitState::Closed));

        // MCP is breaker-only.
        let mcp = registry.status(endpoints::MCP).await.unwrap();
        assert_eq!(mcp.available_permits, None);
    }

    #[tokio::test]
    async fn unguarded_endpoint_passes() {
        let registry = ResilienceRegistry::new();
        assert!(registry.acquire("unguarded").await.is_ok());
        assert!(registry.can_call("unguarded").await);
        assert!(registry.status("unguarded").await.is_none());
    }

    #[tokio::test]
    async fn guard_reports_outcomes_to_the_breaker() {
        let registry = ResilienceRegistry::new();
        registry
            .install_breaker(
                "op",
                CircuitBreakerConfig {
                    failure_rate_threshold: 50.0,
                    sliding_window_size: 4,
                    minimum_calls: 2,
                    open_wait: Duration::from_secs(30),
                    half_open_probes: 1,
                },
            )
            .await;

        for _ in 0..2 {
            let result: FleetResult<()> = registry
                .guard("op", async { Err(FleetError::Network("down".into())) })
                .await;
            assert!(result.is_err());
        }

        // Two failures out of two trips the breaker.
        let err = registry
            .guard("op", async { Ok::<_, FleetError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::CircuitOpen(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn rate_limited_guard_does_not_touch_the_window() {
        let registry = ResilienceRegistry::new();
        registry
            .install_limiter(
                "op",
                RateLimiterConfig {
                    limit_for_period: 1,
                    refresh_period: Duration::from_secs(60),
                    timeout: Duration::ZERO,
                },
            )
            .await;
        registry
            .install_breaker("op", CircuitBreakerConfig::default())
            .await;

        let ok: FleetResult<()> = registry.guard("op", async { Ok(()) }).await;
        assert!(ok.is_ok());

        let err = registry
            .guard("op", async { Ok::<_, FleetError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::RateLimited(_)));

        let status = registry.status("op").await.unwrap();
        assert_eq!(status.recorded_calls, 1);
    }
}
