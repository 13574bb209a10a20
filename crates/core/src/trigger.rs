// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activation rules for agent-document pairs.
//!
//! A trigger decides when an agent attached to a document should run.
//! Evaluation is a pure function of the trigger kind, the current time,
//! and the last-run timestamp; the scan loop lives in the engine.
//! Calendar kinds (daily, weekly) evaluate in UTC.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;
const WEEK_MS: u64 = 7 * DAY_MS;

/// Errors validating a trigger definition.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid time of day {hour:02}:{minute:02}")]
    InvalidTimeOfDay { hour: u8, minute: u8 },
    #[error("invalid interval '{0}': expected forms like '30s', '90m', '2h'")]
    InvalidInterval(String),
}

/// Day of the week for weekly triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    fn matches(self, day: chrono::Weekday) -> bool {
        matches!(
            (self, day),
            (Weekday::Mon, chrono::Weekday::Mon)
                | (Weekday::Tue, chrono::Weekday::Tue)
                | (Weekday::Wed, chrono::Weekday::Wed)
                | (Weekday::Thu, chrono::Weekday::Thu)
                | (Weekday::Fri, chrono::Weekday::Fri)
                | (Weekday::Sat, chrono::Weekday::Sat)
                | (Weekday::Sun, chrono::Weekday::Sun)
        )
    }
}

/// When an attached agent should activate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Fire once per day after the given UTC time.
    Daily { hour: u8, minute: u8 },
    /// Fire when the last run is more than an hour old.
    Hourly,
    /// Fire on the given weekday when the last run is more than a week old.
    Weekly { weekday: Weekday },
    /// Fire when the last run is older than a plain interval ("90m", "2h").
    Every { interval: String },
    /// Only explicit activation; never fired by the scanner.
    Manual,
    /// Only external event activation; never fired by the scanner.
    OnEvent,
}

crate::simple_display! {
    Trigger {
        Daily { .. } => "daily",
        Hourly => "hourly",
        Weekly { .. } => "weekly",
        Every { .. } => "every",
        Manual => "manual",
        OnEvent => "on_event",
    }
}

/// Parse interval specs like "30s", "90m", "2h", "1d".
pub fn parse_interval(spec: &str) -> Result<Duration, TriggerError> {
    let spec = spec.trim();
    let invalid = || TriggerError::InvalidInterval(spec.to_string());
    // strip_suffix keeps this on char boundaries whatever the input is
    let (digits, unit_secs) = if let Some(d) = spec.strip_suffix('s') {
        (d, 1)
    } else if let Some(d) = spec.strip_suffix('m') {
        (d, 60)
    } else if let Some(d) = spec.strip_suffix('h') {
        (d, 3600)
    } else if let Some(d) = spec.strip_suffix('d') {
        (d, 86_400)
    } else {
        return Err(invalid());
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = value.checked_mul(unit_secs).ok_or_else(|| invalid())?;
    if secs == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(secs))
}

impl Trigger {
    /// Validate kind-specific parameters at load time.
    pub fn validate(&self) -> Result<(), TriggerError> {
        match self {
            Trigger::Daily { hour, minute } => {
                if *hour > 23 || *minute > 59 {
                    return Err(TriggerError::InvalidTimeOfDay { hour: *hour, minute: *minute });
                }
                Ok(())
            }
            Trigger::Every { interval } => parse_interval(interval).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Pure evaluation: should this trigger fire now?
    ///
    /// `last_run_ms` is None when the agent has never run. Manual and
    /// event-driven kinds always return false here; only explicit
    /// activation moves them.
    pub fn should_fire(&self, last_run_ms: Option<u64>, now_ms: u64) -> bool {
        match self {
            Trigger::Daily { hour, minute } => {
                let Some(today_target) = daily_target_ms(now_ms, *hour, *minute) else {
                    return false;
                };
                now_ms >= today_target && last_run_ms.is_none_or(|last| last < today_target)
            }
            Trigger::Hourly => last_run_ms.is_none_or(|last| now_ms.saturating_sub(last) > HOUR_MS),
            Trigger::Weekly { weekday } => {
                let Some(now) = DateTime::<Utc>::from_timestamp_millis(now_ms as i64) else {
                    return false;
                };
                weekday.matches(now.weekday())
                    && last_run_ms.is_none_or(|last| now_ms.saturating_sub(last) > WEEK_MS)
            }
            Trigger::Every { interval } => {
                let Ok(interval) = parse_interval(interval) else {
                    return false;
                };
                let interval_ms = interval.as_millis() as u64;
                last_run_ms.is_none_or(|last| now_ms.saturating_sub(last) >= interval_ms)
            }
            Trigger::Manual | Trigger::OnEvent => false,
        }
    }
}

/// Epoch-ms of today's HH:MM in UTC, for the day containing `now_ms`.
fn daily_target_ms(now_ms: u64, hour: u8, minute: u8) -> Option<u64> {
    let now = DateTime::<Utc>::from_timestamp_millis(now_ms as i64)?;
    let target = Utc
        .with_ymd_and_hms(now.year(), now.month(), now.day(), u32::from(hour), u32::from(minute), 0)
        .single()?;
    Some(target.timestamp_millis() as u64)
}

/// Status of one agent attached to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    Pending,
    NeedsRun,
    Running,
    Completed,
    Error,
}

crate::simple_display! {
    AttachmentStatus {
        Pending => "pending",
        NeedsRun => "needs_run",
        Running => "running",
        Completed => "completed",
        Error => "error",
    }
}

/// One agent attached to a document, with its trigger and run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAttachment {
    pub agent: String,
    pub trigger: Trigger,
    pub status: AttachmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl AgentAttachment {
    pub fn new(agent: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            agent: agent.into(),
            trigger,
            status: AttachmentStatus::Pending,
            last_run_ms: None,
            last_error: None,
        }
    }

    /// pending | completed | error → needs_run. An attachment already
    /// queued or running is left alone.
    pub fn mark_needs_run(&mut self) -> bool {
        match self.status {
            AttachmentStatus::Pending
            | AttachmentStatus::Completed
            | AttachmentStatus::Error => {
                self.status = AttachmentStatus::NeedsRun;
                true
            }
            AttachmentStatus::NeedsRun | AttachmentStatus::Running => false,
        }
    }

    /// needs_run → running. Returns false otherwise.
    pub fn start(&mut self) -> bool {
        if self.status == AttachmentStatus::NeedsRun {
            self.status = AttachmentStatus::Running;
            true
        } else {
            false
        }
    }

    /// running → completed | error, recording the run timestamp.
    pub fn finish(&mut self, result: Result<(), String>, now_ms: u64) {
        self.last_run_ms = Some(now_ms);
        match result {
            Ok(()) => {
                self.status = AttachmentStatus::Completed;
                self.last_error = None;
            }
            Err(reason) => {
                self.status = AttachmentStatus::Error;
                self.last_error = Some(reason);
            }
        }
    }

    /// Any state → pending, for re-triggering.
    pub fn reset(&mut self) {
        self.status = AttachmentStatus::Pending;
    }
}

/// All agents attached to one document. Each attachment has independent
/// status; multiple agents on the same document are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAgents {
    pub path: PathBuf,
    #[serde(default)]
    pub attachments: Vec<AgentAttachment>,
}

impl DocumentAgents {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), attachments: Vec::new() }
    }

    pub fn attachment(&self, agent: &str) -> Option<&AgentAttachment> {
        self.attachments.iter().find(|a| a.agent == agent)
    }

    pub fn attachment_mut(&mut self, agent: &str) -> Option<&mut AgentAttachment> {
        self.attachments.iter_mut().find(|a| a.agent == agent)
    }

    /// Attach an agent; replaces an existing attachment with the same name.
    pub fn attach(&mut self, attachment: AgentAttachment) {
        if let Some(existing) = self.attachment_mut(&attachment.agent) {
            *existing = attachment;
        } else {
            self.attachments.push(attachment);
        }
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
