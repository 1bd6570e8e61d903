//! # fleet-mcp-monitoring
//!
//! Health monitoring for the control plane: a [`HealthIndicator`] seam,
//! concrete indicators over the server fleet, the language model, the
//! resilience guards and process resources, and a [`HealthMonitor`] running
//! composite/quick/resource probes on their own cadences with
//! status-transition alerting.

pub mod health;
pub mod indicators;
pub mod monitor;

pub use health::{HealthIndicator, HealthReport, HealthStatus};
pub use indicators::{
    LanguageModelIndicator, ResilienceIndicator, ServerFleetIndicator, SystemResourcesIndicator,
};
pub use monitor::{HealthMonitor, MonitorSchedule, SystemStatus};
