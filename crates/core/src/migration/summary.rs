//! Run summary: per-task outcome, verification reports and alerts.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::task::{MigrateCounts, TaskState};
use super::verification::VerifyReport;
use crate::errors::Result;

/// A data-quality note raised during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub task: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub name: String,
    pub state: TaskState,
    pub invocations: u32,
    pub counts: MigrateCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerifyReport>,
}

impl TaskSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TaskState::NotPrepared,
            invocations: 0,
            counts: MigrateCounts::default(),
            error: None,
            verification: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.state == TaskState::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub started_at: NaiveDateTime,
    pub elapsed_ms: u64,
    pub dry_run: bool,
    pub iterations: u32,
    pub timed_out: bool,
    pub tasks: Vec<TaskSummary>,
    pub alerts: Vec<Alert>,
}

impl RunSummary {
    pub fn new(started_at: NaiveDateTime, dry_run: bool) -> Self {
        Self {
            started_at,
            elapsed_ms: 0,
            dry_run,
            iterations: 0,
            timed_out: false,
            tasks: Vec::new(),
            alerts: Vec::new(),
        }
    }

    pub fn task(&self, name: &str) -> Option<&TaskSummary> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn task_mut(&mut self, name: &str) -> Option<&mut TaskSummary> {
        self.tasks.iter_mut().find(|t| t.name == name)
    }

    pub fn has_failures(&self) -> bool {
        self.tasks.iter().any(TaskSummary::failed)
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.failed())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn total_changed(&self) -> u64 {
        self.tasks.iter().map(|t| t.counts.changed()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Run started {} took {:.1}s ({} iteration(s){}{})",
            self.started_at.format("%F %T"),
            self.elapsed_ms as f64 / 1000.0,
            self.iterations,
            if self.dry_run { ", dry run" } else { "" },
            if self.timed_out { ", timed out" } else { "" },
        );
        for task in &self.tasks {
            let c = &task.counts;
            let _ = writeln!(
                out,
                "  {:<24} {:<11} created={} updated={} deleted={} unchanged={} skipped={}",
                task.name,
                task.state.to_string(),
                c.created,
                c.updated,
                c.deleted,
                c.unchanged,
                c.skipped
            );
            if let Some(error) = &task.error {
                let _ = writeln!(out, "    error: {}", error);
            }
            if let Some(report) = &task.verification {
                let _ = writeln!(
                    out,
                    "    verification {}: {} partition(s) checked, {} mismatched",
                    if report.passed { "passed" } else { "FAILED" },
                    report.checked_partitions,
                    report.mismatches.len()
                );
                for note in &report.notes {
                    let _ = writeln!(out, "      {}", note);
                }
                for suggestion in &report.suggestions {
                    let _ = writeln!(out, "      {}", suggestion.statement);
                }
            }
        }
        if !self.alerts.is_empty() {
            let _ = writeln!(out, "Alerts ({}):", self.alerts.len());
            for alert in &self.alerts {
                let _ = writeln!(out, "  [{}] {}", alert.task, alert.message);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn summary() -> RunSummary {
        let started = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let mut summary = RunSummary::new(started, true);
        let mut companies = TaskSummary::new("companies");
        companies.state = TaskState::Migrated;
        companies.counts.created = 2;
        let mut logs = TaskSummary::new("portfolio_logs");
        logs.state = TaskState::Failed;
        logs.error = Some("Missing security 'S1'".to_string());
        summary.tasks = vec![companies, logs];
        summary.alerts.push(Alert {
            task: "companies".to_string(),
            message: "Created placeholder company 'C9'".to_string(),
        });
        summary
    }

    #[test]
    fn test_failures() {
        let summary = summary();
        assert!(summary.has_failures());
        assert_eq!(summary.failed_tasks(), vec!["portfolio_logs"]);
        assert_eq!(summary.total_changed(), 2);
    }

    #[test]
    fn test_json_is_camel_case() {
        let json = summary().to_json().unwrap();
        assert!(json.contains("\"startedAt\""));
        assert!(json.contains("\"dryRun\": true"));
        assert!(json.contains("\"state\": \"FAILED\""));
    }

    #[test]
    fn test_text_lists_tasks_and_alerts() {
        let text = summary().render_text();
        assert!(text.contains("dry run"));
        assert!(text.contains("companies"));
        assert!(text.contains("error: Missing security 'S1'"));
        assert!(text.contains("[companies] Created placeholder company 'C9'"));
    }
}
