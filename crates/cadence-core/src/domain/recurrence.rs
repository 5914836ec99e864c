//! Recurrence configuration and the pure recurrence calculator.
//!
//! Everything here is a pure function of `(config, now)`; the scheduler owns
//! the mutable timestamps and decides when to call these.

use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::errors::SchedulerError;

/// Minimum spacing between two reminders for the same task.
pub const NOTIFY_DEBOUNCE_SECS: i64 = 60;

/// Longest accepted reminder lead time.
pub const MAX_NOTIFICATION_ADVANCE_DAYS: i64 = 366;

/// Granularity of a recurring task.
///
/// Adding a kind means adding an arm to every `match` below; there is no
/// catch-all arm on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RecurrenceKind {
    #[default]
    None,
    Minutes,
    Hours,
    Daily,
    Weekly,
    Monthly,
}

/// Per-task recurrence settings plus the timestamps the scheduler stamps.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceConfig {
    pub kind: RecurrenceKind,

    /// Number of `kind` units between occurrences. Must be positive.
    pub interval: u32,

    pub auto_reset: bool,

    /// Delay after completion before the task is reset.
    pub auto_reset_delay: Option<TimeDelta>,

    pub notifications_enabled: bool,

    /// When set, reminders fire inside `[next_due - advance, next_due)`.
    pub notification_advance: Option<TimeDelta>,

    pub last_notification: Option<DateTime<Utc>>,
    pub last_reset: Option<DateTime<Utc>>,

    /// Only meaningful when `kind != None`.
    pub next_due: Option<DateTime<Utc>>,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            kind: RecurrenceKind::None,
            interval: 1,
            auto_reset: false,
            auto_reset_delay: None,
            notifications_enabled: true,
            notification_advance: None,
            last_notification: None,
            last_reset: None,
            next_due: None,
        }
    }
}

impl RecurrenceConfig {
    pub fn new(kind: RecurrenceKind, interval: u32) -> Self {
        Self {
            kind,
            interval,
            ..Self::default()
        }
    }

    /// Enable auto-reset after `delay`.
    pub fn with_auto_reset(mut self, delay: TimeDelta) -> Self {
        self.auto_reset = true;
        self.auto_reset_delay = Some(delay);
        self
    }

    pub fn with_notification_advance(mut self, advance: TimeDelta) -> Self {
        self.notification_advance = Some(advance);
        self
    }

    pub fn without_notifications(mut self) -> Self {
        self.notifications_enabled = false;
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.kind != RecurrenceKind::None
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval == 0 {
            return Err(SchedulerError::InvalidInterval);
        }
        if self.auto_reset {
            match self.auto_reset_delay {
                Some(delay) if delay >= TimeDelta::zero() => {}
                _ => return Err(SchedulerError::MissingResetDelay),
            }
        }
        if let Some(advance) = self.notification_advance
            && (advance < TimeDelta::zero()
                || advance > TimeDelta::days(MAX_NOTIFICATION_ADVANCE_DAYS))
        {
            return Err(SchedulerError::InvalidAdvance);
        }
        Ok(())
    }

    pub fn next_due_date(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        calculate_next_due_date(self, from)
    }

    pub fn should_notify(&self, now: DateTime<Utc>) -> bool {
        should_notify(self, now)
    }

    pub fn should_reset(&self, now: DateTime<Utc>, is_completed: bool) -> bool {
        should_reset(self, now, is_completed)
    }

    /// Instant at which an armed auto-reset becomes due.
    pub fn reset_due_at(&self) -> Option<DateTime<Utc>> {
        if !self.auto_reset {
            return None;
        }
        let (last_reset, delay) = (self.last_reset?, self.auto_reset_delay?);
        Some(saturating_add(last_reset, delay))
    }

    /// Reminder text for the sweep's notification.
    pub fn reminder_message(&self) -> String {
        match self.kind {
            RecurrenceKind::Minutes => {
                format!("Reminder: task repeats every {} min", self.interval)
            }
            RecurrenceKind::Hours => format!("Reminder: task repeats every {} h", self.interval),
            RecurrenceKind::Daily => "Reminder: daily task".to_string(),
            RecurrenceKind::Weekly => "Reminder: weekly task".to_string(),
            RecurrenceKind::Monthly => "Reminder: monthly task".to_string(),
            RecurrenceKind::None => "Task reminder".to_string(),
        }
    }
}

/// Add `interval` units of the configured granularity to `from`.
///
/// `None` returns `from` unchanged. Months follow calendar arithmetic
/// (Jan 31 + 1 month = last day of February).
pub fn calculate_next_due_date(config: &RecurrenceConfig, from: DateTime<Utc>) -> DateTime<Utc> {
    let n = i64::from(config.interval);
    match config.kind {
        RecurrenceKind::None => from,
        RecurrenceKind::Minutes => saturating_add(from, TimeDelta::minutes(n)),
        RecurrenceKind::Hours => saturating_add(from, TimeDelta::hours(n)),
        RecurrenceKind::Daily => saturating_add(from, TimeDelta::days(n)),
        RecurrenceKind::Weekly => saturating_add(from, TimeDelta::days(n * 7)),
        RecurrenceKind::Monthly => from
            .checked_add_months(Months::new(config.interval))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Is a reminder due at `now`?
///
/// - never without notifications or a due date
/// - never within `NOTIFY_DEBOUNCE_SECS` of the previous reminder
/// - with an advance window: only inside `[next_due - advance, next_due)`
/// - otherwise: once `now >= next_due`
pub fn should_notify(config: &RecurrenceConfig, now: DateTime<Utc>) -> bool {
    if !config.notifications_enabled {
        return false;
    }
    let Some(next_due) = config.next_due else {
        return false;
    };

    if let Some(last) = config.last_notification
        && now - last < TimeDelta::seconds(NOTIFY_DEBOUNCE_SECS)
    {
        return false;
    }

    match config.notification_advance {
        Some(advance) => {
            let window_start = saturating_sub(next_due, advance);
            now >= window_start && now < next_due
        }
        None => now >= next_due,
    }
}

/// Is an auto-reset due at `now`?
pub fn should_reset(config: &RecurrenceConfig, now: DateTime<Utc>, is_completed: bool) -> bool {
    if !is_completed {
        return false;
    }
    config.reset_due_at().is_some_and(|due| now >= due)
}

fn saturating_add(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn saturating_sub(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_sub_signed(delta)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
