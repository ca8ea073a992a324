//! Wall-clock gate before which the reveal stays in `Waiting`

use chrono::{DateTime, Utc};
use regalo_common::events::CountdownData;

use crate::error::{Error, Result};

/// Reveal gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gate {
    /// No gate: the card is available as soon as the assignment resolves
    #[default]
    None,
    /// Closed until the wall clock reaches this instant
    UntilInstant(DateTime<Utc>),
}

impl Gate {
    /// Parse the `reveal_at` setting: empty means no gate, otherwise RFC 3339
    pub fn parse_setting(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Gate::None);
        }

        DateTime::parse_from_rfc3339(value)
            .map(|instant| Gate::UntilInstant(instant.with_timezone(&Utc)))
            .map_err(|e| Error::Config(format!("reveal_at '{}': {}", value, e)))
    }

    /// Whether the reveal may proceed at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self {
            Gate::None => true,
            Gate::UntilInstant(target) => now >= *target,
        }
    }

    /// Countdown to the target, or `None` once the gate is open
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<CountdownData> {
        match self {
            Gate::UntilInstant(target) if now < *target => Some(countdown_until(now, *target)),
            _ => None,
        }
    }
}

/// Split the time left until `target` into days/hours/minutes/seconds
///
/// Whole seconds, rounded down; zero once `now >= target`.
pub fn countdown_until(now: DateTime<Utc>, target: DateTime<Utc>) -> CountdownData {
    let total = (target - now).num_seconds().max(0);

    CountdownData {
        days: total / 86_400,
        hours: (total % 86_400) / 3_600,
        minutes: (total % 3_600) / 60,
        seconds: total % 60,
    }
}
