//! Schedule expressions and their compiled cron form.
//!
//! Jobs are normally scheduled at a time of day in a named timezone, e.g.
//! `23:59` in `UTC`, optionally restricted to some weekdays. A raw cron
//! expression is accepted for sub-daily cadences.
//!
//! Cron expressions follow the 6-field format used by the `cron` crate:
//! `second minute hour day_of_month month day_of_week`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schedule parse errors.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("invalid weekday '{0}'")]
    InvalidWeekday(String),

    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// When a job should fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleExpression {
    /// Once a day at `time` (24h `HH:MM`) in `timezone`.
    Daily {
        time: String,
        #[serde(default = "default_timezone")]
        timezone: String,
        /// Weekday names; empty means every day.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        days: Vec<String>,
    },
    /// Raw cron expression evaluated in `timezone`.
    Cron {
        expression: String,
        #[serde(default = "default_timezone")]
        timezone: String,
    },
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl ScheduleExpression {
    /// Daily schedule at `time` in `timezone`.
    pub fn daily(time: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self::Daily {
            time: time.into(),
            timezone: timezone.into(),
            days: Vec::new(),
        }
    }

    /// Raw cron schedule.
    pub fn cron(expression: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self::Cron {
            expression: expression.into(),
            timezone: timezone.into(),
        }
    }

    /// Restrict a daily schedule to the given weekdays. No-op for cron schedules.
    pub fn with_days<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Self::Daily { days, .. } = &mut self {
            *days = names.into_iter().map(Into::into).collect();
        }
        self
    }

    pub fn timezone(&self) -> &str {
        match self {
            Self::Daily { timezone, .. } | Self::Cron { timezone, .. } => timezone,
        }
    }

    /// Parse and validate into a fire-time calculator.
    pub fn compile(&self) -> Result<CompiledSchedule, ScheduleError> {
        let tz = parse_timezone(self.timezone())?;

        let (cron_expr, descriptor) = match self {
            Self::Daily { time, days, .. } => {
                let at = NaiveTime::parse_from_str(time.trim(), "%H:%M")
                    .map_err(|_| ScheduleError::InvalidTime(time.clone()))?;
                let weekdays = days
                    .iter()
                    .map(|d| {
                        Weekday::from_str(d.trim())
                            .map_err(|_| ScheduleError::InvalidWeekday(d.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let dow = if weekdays.is_empty() {
                    "*".to_string()
                } else {
                    weekdays
                        .iter()
                        .map(|w| w.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                };

                let mut descriptor = format!("daily {:02}:{:02} {}", at.hour(), at.minute(), tz);
                if !weekdays.is_empty() {
                    descriptor.push_str(&format!(" on {}", dow));
                }

                (format!("0 {} {} * * {}", at.minute(), at.hour(), dow), descriptor)
            }
            Self::Cron { expression, .. } => {
                let expression = expression.trim().to_string();
                let descriptor = format!("cron '{}' {}", expression, tz);
                (expression, descriptor)
            }
        };

        let schedule = Schedule::from_str(&cron_expr).map_err(|e| ScheduleError::InvalidCron {
            expression: cron_expr.clone(),
            reason: e.to_string(),
        })?;

        Ok(CompiledSchedule {
            schedule,
            timezone: tz,
            descriptor,
        })
    }
}

impl fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily { time, timezone, days } if days.is_empty() => {
                write!(f, "daily {} {}", time, timezone)
            }
            Self::Daily { time, timezone, days } => {
                write!(f, "daily {} {} on {}", time, timezone, days.join(","))
            }
            Self::Cron { expression, timezone } => write!(f, "cron '{}' {}", expression, timezone),
        }
    }
}

fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
}

/// A validated schedule that can compute fire times.
#[derive(Debug, Clone)]
pub struct CompiledSchedule {
    schedule: Schedule,
    timezone: Tz,
    descriptor: String,
}

impl CompiledSchedule {
    /// Human-readable form, e.g. `daily 23:59 UTC`.
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&self.timezone);
        self.schedule
            .after(&local)
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Next fire time from now.
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.next_after(Utc::now())
    }
}

impl fmt::Display for CompiledSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

/// Common schedule presets.
pub mod presets {
    use super::ScheduleExpression;

    /// Every second. Intended for smoke tests of a deployment.
    pub fn every_second() -> ScheduleExpression {
        ScheduleExpression::cron("* * * * * *", "UTC")
    }

    /// Every N minutes.
    pub fn every_minutes(minutes: u32) -> ScheduleExpression {
        ScheduleExpression::cron(format!("0 */{} * * * *", minutes), "UTC")
    }

    /// Weekdays at the given time.
    pub fn weekdays_at(time: &str, timezone: &str) -> ScheduleExpression {
        ScheduleExpression::daily(time, timezone).with_days(["Mon", "Tue", "Wed", "Thu", "Fri"])
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
