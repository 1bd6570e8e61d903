//! Concrete health indicators wired at bootstrap.

use async_trait::async_trait;
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::Mutex;

use fleet_mcp_client::ClientRegistry;
use fleet_mcp_core::error::FleetError;
use fleet_mcp_resilience::{CircuitState, ResilienceRegistry};
use fleet_mcp_ai::LanguageModel;

use crate::health::{HealthIndicator, HealthReport, HealthStatus};

/// Memory-usage percentage above which the process is degraded.
const MEMORY_WARN_PERCENT: f64 = 80.0;
/// Memory-usage percentage above which the process is down.
const MEMORY_FAIL_PERCENT: f64 = 90.0;

/// Fan-out ping over every registered MCP server.
pub struct ServerFleetIndicator {
    registry: Arc<ClientRegistry>,
}

impl ServerFleetIndicator {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl HealthIndicator for ServerFleetIndicator {
    fn name(&self) -> &str {
        "mcp-servers"
    }

    async fn check(&self) -> HealthReport {
        let health = self.registry.overall_health().await;
        if health.is_empty() {
            return HealthReport::degraded("no servers registered");
        }

        let down: Vec<&str> = health
            .iter()
            .filter(|(_, healthy)| !**healthy)
            .map(|(id, _)| id.as_str())
            .collect();

        if down.is_empty() {
            HealthReport::up()
        } else if down.len() == health.len() {
            HealthReport::down("every server is unreachable")
        } else {
            HealthReport::degraded(format!("unhealthy servers: {}", down.join(", ")))
        }
    }
}

/// Reachability of the language model, probed with a minimal prompt.
pub struct LanguageModelIndicator {
    model: Arc<dyn LanguageModel>,
}

impl LanguageModelIndicator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl HealthIndicator for LanguageModelIndicator {
    fn name(&self) -> &str {
        "language-model"
    }

    async fn check(&self) -> HealthReport {
        match self.model.complete("ping").await {
            Ok(_) => HealthReport::up(),
            // Being throttled still means the endpoint is alive.
            Err(FleetError::RateLimited(_)) => HealthReport::degraded("rate limited"),
            Err(e) => HealthReport::down(format!("{} unreachable: {e}", self.model.name())),
        }
    }
}

/// Circuit-breaker summary across every guarded endpoint.
pub struct ResilienceIndicator {
    resilience: Arc<ResilienceRegistry>,
}

impl ResilienceIndicator {
    pub fn new(resilience: Arc<ResilienceRegistry>) -> Self {
        Self { resilience }
    }
}

#[async_trait]
impl HealthIndicator for ResilienceIndicator {
    fn name(&self) -> &str {
        "resilience"
    }

    async fn check(&self) -> HealthReport {
        let open: Vec<String> = self
            .resilience
            .status_all()
            .await
            .into_iter()
            .filter(|status| status.circuit_state == Some(CircuitState::Open))
            .map(|status| status.endpoint)
            .collect();

        if open.is_empty() {
            HealthReport::up()
        } else {
            HealthReport::degraded(format!("open circuits: {}", open.join(", ")))
        }
    }
}

/// Process memory and CPU, read through sysinfo.
pub struct SystemResourcesIndicator {
    system: Mutex<System>,
}

impl SystemResourcesIndicator {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemResourcesIndicator {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn classify_memory(percent: f64) -> HealthStatus {
    if percent > MEMORY_FAIL_PERCENT {
        HealthStatus::Down
    } else if percent > MEMORY_WARN_PERCENT {
        HealthStatus::Degraded
    } else {
        HealthStatus::Up
    }
}

#[async_trait]
impl HealthIndicator for SystemResourcesIndicator {
    fn name(&self) -> &str {
        "system-resources"
    }

    async fn check(&self) -> HealthReport {
        let mut system = self.system.lock().await;
        system.refresh_memory();
        system.refresh_cpu_usage();

        let total = system.total_memory();
        if total == 0 {
            return HealthReport::degraded("memory statistics unavailable");
        }
        let percent = system.used_memory() as f64 * 100.0 / total as f64;
        let cpu = system.global_cpu_usage();

        let detail = format!("memory {percent:.1}%, cpu {cpu:.1}%");
        HealthReport {
            status: classify_memory(percent),
            detail: Some(detail),
            checked_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_thresholds() {
        assert_eq!(classify_memory(50.0), HealthStatus::Up);
        assert_eq!(classify_memory(80.0), HealthStatus::Up);
        assert_eq!(classify_memory(85.0), HealthStatus::Degraded);
        assert_eq!(classify_memory(90.0), HealthStatus::Degraded);
        assert_eq!(classify_memory(95.0), HealthStatus::Down);
    }

    #[tokio::test]
    async fn resource_indicator_reports() {
        let indicator = SystemResourcesIndicator::new();
        let report = indicator.check().await;
        assert!(report.detail.is_some());
    }

    #[tokio::test]
    async fn resilience_indicator_is_up_with_closed_circuits() {
        let indicator =
            ResilienceIndicator::new(Arc::new(ResilienceRegistry::with_defaults().await));
        let report = indicator.check().await;
        assert_eq!(report.status, HealthStatus::Up);
    }
}
