use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived fleet health snapshot. Recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// Rolling average of recent issue tracker call durations
    pub api_latency_ms: f64,
    /// Ready-but-unassigned tasks over available agent capacity
    pub queue_usage: f64,
    /// Workflows with at least one live task
    pub active_workflows: usize,
    /// Tasks completed since local midnight
    pub completed_today: usize,
    pub ready_backlog: usize,
    pub agents_idle: usize,
    pub agents_busy: usize,
    pub agents_offline: usize,
    pub sync_degraded: bool,
    pub sampled_at: DateTime<Utc>,
}
