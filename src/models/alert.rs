//! Alert events raised by the pipeline.

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::AppError;

/// How urgently an alert needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured failure report.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Source (scraper) that raised the alert
    pub source: String,
    /// Pipeline stage, e.g. `scrape_page`
    pub stage: String,
    pub severity: Severity,
    pub message: String,
    /// Identity of the machine running the crawl
    pub machine: String,
    pub timestamp: DateTime<Local>,
}

impl Alert {
    pub fn new(
        source: impl Into<String>,
        stage: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            stage: stage.into(),
            severity,
            message: message.into(),
            machine: machine_identity(),
            timestamp: Local::now(),
        }
    }

    /// Alert for a pipeline error, using the error's own severity.
    pub fn from_error(source: &str, stage: &str, error: &AppError) -> Self {
        Self::new(source, stage, error.severity(), error.to_string())
    }

    /// One-line rendering used for log output.
    pub fn log_line(&self) -> String {
        format!(
            "ERROR - {} - {} - [{}] {}",
            self.stage, self.source, self.severity, self.message
        )
    }
}

/// User running the process, or `unknown`.
pub fn machine_identity() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_from_error_keeps_severity() {
        let err = AppError::pagination("http://example.com/?p=1", "no indicator");
        let alert = Alert::from_error("doctors", "resolve_pages", &err);
        assert_eq!(alert.severity, Severity::Critical);
        assert!(alert.message.contains("no indicator"));
    }

    #[test]
    fn log_line_names_stage_and_source() {
        let alert = Alert::new("doctors", "archive", Severity::High, "disk full");
        assert_eq!(alert.log_line(), "ERROR - archive - doctors - [high] disk full");
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }
}
