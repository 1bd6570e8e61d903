//! The scheduled health monitor.
//!
//! Three cadences: a composite probe over every indicator, a quick
//! connectivity probe, and a resource probe. Status transitions per
//! component are detected against the remembered last value and logged at
//! a severity matching their direction.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::health::{HealthIndicator, HealthReport, HealthStatus};

/// Probe cadences; production defaults per [`MonitorSchedule::default`],
/// tunable for tests.
#[derive(Debug, Clone)]
pub struct MonitorSchedule {
    pub composite_interval: Duration,
    pub quick_interval: Duration,
    pub resource_interval: Duration,
}

impl Default for MonitorSchedule {
    fn default() -> Self {
        Self {
            composite_interval: Duration::from_secs(5 * 60),
            quick_interval: Duration::from_secs(60),
            resource_interval: Duration::from_secs(10 * 60),
        }
    }
}

/// Aggregated snapshot produced by a composite probe.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub overall: HealthStatus,
    pub components: HashMap<String, HealthReport>,
}

/// Process-scoped monitor; indicators are registered explicitly.
pub struct HealthMonitor {
    composite: RwLock<Vec<Arc<dyn HealthIndicator>>>,
    quick: RwLock<Vec<Arc<dyn HealthIndicator>>>,
    resource: RwLock<Vec<Arc<dyn HealthIndicator>>>,
    last_statuses: RwLock<HashMap<String, HealthStatus>>,
    probes_performed: AtomicU64,
    schedule: MonitorSchedule,
}

impl HealthMonitor {
    pub fn new(schedule: MonitorSchedule) -> Self {
        Self {
            composite: RwLock::new(Vec::new()),
            quick: RwLock::new(Vec::new()),
            resource: RwLock::new(Vec::new()),
            last_statuses: RwLock::new(HashMap::new()),
            probes_performed: AtomicU64::new(0),
            schedule,
        }
    }

    /// Register an indicator for the composite probe.
    pub async fn register(&self, indicator: Arc<dyn HealthIndicator>) {
        self.composite.write().await.push(indicator);
    }

    /// Also probe this indicator on the quick cadence.
    pub async fn register_quick(&self, indicator: Arc<dyn HealthIndicator>) {
        self.quick.write().await.push(indicator);
    }

    /// Also probe this indicator on the resource cadence.
    pub async fn register_resource(&self, indicator: Arc<dyn HealthIndicator>) {
        self.resource.write().await.push(indicator);
    }

    /// Probe every composite indicator and aggregate.
    pub async fn run_composite_probe(&self) -> SystemStatus {
        let indicators = self.composite.read().await.clone();
        self.probe(&indicators).await
    }

    /// Connectivity-only probe.
    pub async fn run_quick_probe(&self) -> SystemStatus {
        let indicators = self.quick.read().await.clone();
        self.probe(&indicators).await
    }

    /// Memory/CPU and breaker summary probe.
    pub async fn run_resource_probe(&self) -> SystemStatus {
        let indicators = self.resource.read().await.clone();
        self.probe(&indicators).await
    }

    async fn probe(&self, indicators: &[Arc<dyn HealthIndicator>]) -> SystemStatus {
        let mut components = HashMap::new();
        for indicator in indicators {
            let report = indicator.check().await;
            self.probes_performed.fetch_add(1, Ordering::Relaxed);
            self.record_transition(indicator.name(), report.status).await;
            components.insert(indicator.name().to_string(), report);
        }

        SystemStatus {
            overall: aggregate(components.values().map(|report| report.status)),
            components,
        }
    }

    async fn record_transition(&self, component: &str, status: HealthStatus) {
        let previous = self
            .last_statuses
            .write()
            .await
            .insert(component.to_string(), status);

        match (previous, status) {
            (Some(old), new) if old == new => {}
            (Some(HealthStatus::Up), HealthStatus::Down) | (None, HealthStatus::Down) => {
                error!(component, "health transition to DOWN");
            }
            (Some(HealthStatus::Up), HealthStatus::Degraded)
            | (None, HealthStatus::Degraded) => {
                warn!(component, "health transition to DEGRADED");
            }
            (Some(old), HealthStatus::Up) => {
                info!(component, from = %old, "health recovered to UP");
            }
            (Some(old), new) => {
                warn!(component, from = %old, to = %new, "health transition");
            }
            (None, HealthStatus::Up) => {}
        }
    }

    /// Current remembered status per component.
    pub async fn statuses(&self) -> HashMap<String, HealthStatus> {
        self.last_statuses.read().await.clone()
    }

    /// Cumulative number of indicator probes performed.
    pub fn probe_count(&self) -> u64 {
        self.probes_performed.load(Ordering::Relaxed)
    }

    /// Spawn the three scheduled probe tasks.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let schedule = self.schedule.clone();
        let mut handles = Vec::with_capacity(3);

        let monitor = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(schedule.composite_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = monitor.run_composite_probe().await;
                info!(overall = %status.overall, "composite health probe");
            }
        }));

        let monitor = Arc::clone(self);
        let quick_interval = self.schedule.quick_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(quick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.run_quick_probe().await;
            }
        }));

        let monitor = Arc::clone(self);
        let resource_interval = self.schedule.resource_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(resource_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.run_resource_probe().await;
            }
        }));

        handles
    }
}

fn aggregate(statuses: impl Iterator<Item = HealthStatus>) -> HealthStatus {
    let mut overall = HealthStatus::Up;
    for status in statuses {
        match status {
            HealthStatus::Down => return HealthStatus::Down,
            HealthStatus::Degraded => overall = HealthStatus::Degraded,
            HealthStatus::Up => {}
        }
    }
    overall
}
