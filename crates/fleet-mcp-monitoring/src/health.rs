//! Health status model and the indicator seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Component health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Up,
    Degraded,
    Down,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "UP"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// One probe's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn up() -> Self {
        Self {
            status: HealthStatus::Up,
            detail: None,
            checked_at: Utc::now(),
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            detail: Some(detail.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn down(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Down,
            detail: Some(detail.into()),
            checked_at: Utc::now(),
        }
    }
}

/// A probeable component. Indicators register themselves into the monitor
/// explicitly at bootstrap.
#[async_trait]
pub trait HealthIndicator: Send + Sync {
    /// Stable component name used in status maps and transition logs.
    fn name(&self) -> &str;

    async fn check(&self) -> HealthReport;
}
