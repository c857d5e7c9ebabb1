//! Table output formatting for CLI commands
//!
//! Renders plans, tasks, agents and health snapshots with comfy-table.
//! Colors are dropped when `NO_COLOR` is set or the terminal is dumb.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::cli::commands::plan::PlanStep;
use crate::domain::models::{Agent, AgentStatus, SystemHealth, Task, TaskStatus};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    fn header(&self, names: &[&str]) -> Vec<Cell> {
        names
            .iter()
            .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
            .collect()
    }

    pub fn format_plan(&self, steps: &[PlanStep]) -> String {
        let mut table = self.create_base_table();
        table.set_header(self.header(&["Wave", "Key", "Title", "Persona", "Priority", "Depends on"]));

        for step in steps {
            let depends = if step.depends_on.is_empty() {
                "-".to_string()
            } else {
                step.depends_on.join(", ")
            };
            let wave = if self.use_colors {
                Cell::new(step.wave).fg(Color::Cyan)
            } else {
                Cell::new(step.wave)
            };
            table.add_row(vec![
                wave,
                Cell::new(&step.key),
                Cell::new(truncate(&step.title, 40)),
                Cell::new(&step.persona),
                Cell::new(&step.priority),
                Cell::new(truncate(&depends, 40)),
            ]);
        }
        table.to_string()
    }

    /// Tasks with an optional short label (workflow key) per row.
    pub fn format_tasks(&self, tasks: &[(String, &Task)]) -> String {
        let mut table = self.create_base_table();
        table.set_header(self.header(&["Task", "Status", "Persona", "Agent time", "Issue"]));

        for (label, task) in tasks {
            let status = if self.use_colors {
                Cell::new(task.status.to_string()).fg(status_color(task.status))
            } else {
                Cell::new(format!("{} {}", status_icon(task.status), task.status))
            };
            let issue = task
                .issue_ref
                .as_ref()
                .map_or_else(|| "-".to_string(), |i| format!("#{}", i.external_id));
            table.add_row(vec![
                Cell::new(truncate(label, 30)),
                status,
                Cell::new(task.persona.as_str()),
                Cell::new(format!("{} ms", task.elapsed_ms)),
                Cell::new(issue),
            ]);
        }
        table.to_string()
    }

    pub fn format_agents(&self, agents: &[Agent]) -> String {
        let mut table = self.create_base_table();
        table.set_header(self.header(&["Agent", "Persona", "Status", "Active", "Last action"]));

        for agent in agents {
            let status = if self.use_colors {
                Cell::new(agent.status.to_string()).fg(agent_status_color(agent.status))
            } else {
                Cell::new(agent.status.to_string())
            };
            table.add_row(vec![
                Cell::new(&agent.name),
                Cell::new(agent.persona.as_str()),
                status,
                Cell::new(format!("{} ms", agent.active_ms)),
                Cell::new(truncate(agent.last_action.as_deref().unwrap_or("-"), 40)),
            ]);
        }
        table.to_string()
    }

    pub fn format_health(&self, health: &SystemHealth) -> String {
        let mut table = self.create_base_table();
        table.set_header(self.header(&["Metric", "Value"]));
        let sync = if health.sync_degraded {
            "degraded"
        } else {
            "ok"
        };
        let rows = [
            ("API latency", format!("{:.1} ms", health.api_latency_ms)),
            ("Queue usage", format!("{:.2}", health.queue_usage)),
            ("Ready backlog", health.ready_backlog.to_string()),
            ("Active workflows", health.active_workflows.to_string()),
            ("Completed today", health.completed_today.to_string()),
            (
                "Agents idle/busy/offline",
                format!(
                    "{}/{}/{}",
                    health.agents_idle, health.agents_busy, health.agents_offline
                ),
            ),
            ("Issue sync", sync.to_string()),
        ];
        for (metric, value) in rows {
            table.add_row(vec![Cell::new(metric), Cell::new(value)]);
        }
        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

const fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::Ready => Color::Yellow,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Blocked => Color::Magenta,
        TaskStatus::Cancelled => Color::DarkGrey,
        TaskStatus::Pending => Color::White,
    }
}

const fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "✓",
        TaskStatus::InProgress => "⟳",
        TaskStatus::Ready => "●",
        TaskStatus::Failed => "✗",
        TaskStatus::Blocked => "⊗",
        TaskStatus::Cancelled => "⊘",
        TaskStatus::Pending => "○",
    }
}

const fn agent_status_color(status: AgentStatus) -> Color {
    match status {
        AgentStatus::Idle => Color::Green,
        AgentStatus::Busy => Color::Cyan,
        AgentStatus::Offline => Color::DarkGrey,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Persona;

    #[test]
    fn test_plain_task_table_uses_icons() {
        let task = Task::new("Write docs", "", Persona::TechWriter);
        let out = TableFormatter::with_config(false, Some(100))
            .format_tasks(&[("docs".to_string(), &task)]);
        assert!(out.contains("○ pending"));
        assert!(out.contains("tech_writer"));
    }

    #[test]
    fn test_plan_table_lists_dependencies() {
        let steps = vec![PlanStep {
            wave: 2,
            key: "build".into(),
            title: "Build API".into(),
            persona: "developer".into(),
            priority: "high".into(),
            depends_on: vec!["design".into(), "schema".into()],
        }];
        let out = TableFormatter::with_config(false, Some(120)).format_plan(&steps);
        assert!(out.contains("design, schema"));
        assert!(out.contains("Build API"));
    }
}
