//! Human-readable session summary (the status popup).

use chrono::{DateTime, Utc};
use focus_guardian_protocol::SessionStatus;
use std::fmt;

pub const ACTIVE_HEADLINE: &str = "Flow Session Active";
pub const IDLE_HEADLINE: &str = "No active Flow Session";

/// `1h 5m`, `4m 12s`, `9s`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        return format!("{}h {}m", hours, minutes);
    }
    if minutes > 0 {
        return format!("{}m {}s", minutes, secs);
    }
    format!("{}s", secs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub headline: &'static str,
    pub details: Option<ActiveDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDetails {
    pub task_id: String,
    pub elapsed_secs: u64,
    pub distractions: usize,
    pub allowed_sites: usize,
}

impl StatusSummary {
    pub fn from_status(status: &SessionStatus, now: DateTime<Utc>) -> Self {
        match (&status.session, status.is_active) {
            (Some(session), true) => {
                let elapsed = now.signed_duration_since(session.start_time).num_seconds();
                Self {
                    headline: ACTIVE_HEADLINE,
                    details: Some(ActiveDetails {
                        task_id: session.task_id.clone(),
                        elapsed_secs: elapsed.max(0) as u64,
                        distractions: session.distractions.len(),
                        allowed_sites: session.allowed_sites.len(),
                    }),
                }
            }
            _ => Self {
                headline: IDLE_HEADLINE,
                details: None,
            },
        }
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline)?;
        if let Some(details) = &self.details {
            writeln!(f, "Task: {}", details.task_id)?;
            writeln!(f, "Duration: {}", format_duration(details.elapsed_secs))?;
            writeln!(f, "Distractions: {}", details.distractions)?;
            writeln!(f, "Allowed sites: {}", details.allowed_sites)?;
        }
        Ok(())
    }
}
