//! System health aggregation.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::domain::models::{AgentStatus, SystemHealth, TaskStatus};
use crate::services::assignment::AssignmentManager;
use crate::services::scheduler::DependencyScheduler;

/// Rolling window of recent remote call durations.
#[derive(Debug)]
pub struct LatencyWindow {
    samples: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    /// Average in milliseconds; 0 when nothing was recorded.
    pub fn average_ms(&self) -> f64 {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Start of the current local day, in UTC.
pub fn local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map_or(now, |midnight| midnight.with_timezone(&Utc))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HealthAggregator;

impl HealthAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Derive a fresh snapshot. Nothing is cached between reads.
    pub fn sample(
        &self,
        scheduler: &DependencyScheduler,
        assignments: &AssignmentManager,
        latency: &LatencyWindow,
        sync_degraded: bool,
        now: DateTime<Utc>,
    ) -> SystemHealth {
        let ready_backlog = scheduler.ready_count();
        let capacity = assignments.capacity().max(1);
        let midnight = local_midnight(now);

        let active_workflows = scheduler
            .tasks()
            .filter(|t| !t.archived && !t.is_terminal())
            .map(|t| t.workflow_id)
            .collect::<HashSet<_>>()
            .len();

        let completed_today = scheduler
            .tasks()
            .filter(|t| t.status == TaskStatus::Completed)
            .filter(|t| t.completed_at.is_some_and(|at| at >= midnight))
            .count();

        SystemHealth {
            api_latency_ms: latency.average_ms(),
            queue_usage: ready_backlog as f64 / capacity as f64,
            active_workflows,
            completed_today,
            ready_backlog,
            agents_idle: assignments.count_by_status(AgentStatus::Idle),
            agents_busy: assignments.count_by_status(AgentStatus::Busy),
            agents_offline: assignments.count_by_status(AgentStatus::Offline),
            sync_degraded,
            sampled_at: now,
        }
    }
}
