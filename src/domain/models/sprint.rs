//! Sprints group tasks for reporting. The scheduler never consults them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
}

impl SprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Planned, Self::Active) | (Self::Active, Self::Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sprint {
    pub id: Uuid,
    pub name: String,
    pub goal: Option<String>,
    pub status: SprintStatus,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Sprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            goal: None,
            status: SprintStatus::Planned,
            starts_on: None,
            ends_on: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }

    pub fn with_window(mut self, starts_on: NaiveDate, ends_on: NaiveDate) -> Self {
        self.starts_on = Some(starts_on);
        self.ends_on = Some(ends_on);
        self
    }

    pub fn transition_to(&mut self, next: SprintStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "Cannot transition sprint from {} to {}",
                self.status.as_str(),
                next.as_str()
            ));
        }
        match next {
            SprintStatus::Active => self.started_at = Some(Utc::now()),
            SprintStatus::Completed => self.completed_at = Some(Utc::now()),
            SprintStatus::Planned => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Sprint name cannot be empty".to_string());
        }
        if let (Some(start), Some(end)) = (self.starts_on, self.ends_on) {
            if end < start {
                return Err(format!("Sprint ends ({end}) before it starts ({start})"));
            }
        }
        Ok(())
    }
}

/// Task counts for one sprint, keyed by status name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintReport {
    pub sprint_id: Uuid,
    pub name: String,
    pub status: SprintStatus,
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
}

impl SprintReport {
    pub fn build<'a>(sprint: &Sprint, tasks: impl Iterator<Item = &'a Task>) -> Self {
        let mut by_status = BTreeMap::new();
        let mut total = 0;
        for task in tasks.filter(|t| t.sprint_id == Some(sprint.id)) {
            *by_status.entry(task.status.as_str().to_string()).or_insert(0) += 1;
            total += 1;
        }
        Self {
            sprint_id: sprint.id,
            name: sprint.name.clone(),
            status: sprint.status,
            total,
            by_status,
        }
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}
