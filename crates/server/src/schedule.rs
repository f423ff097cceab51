//! Reminder stage calendar.
//!
//! Decides which reminder stage (if any) is due on a given day relative to
//! the RSVP deadline. Pure date arithmetic, no clock access: callers pass
//! `today` in so runs are reproducible and testable.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use time::{Date, Duration};
use utoipa::ToSchema;

/// Reminder stages, in escalation order.
///
/// The four scheduled stages fire at fixed offsets before the RSVP deadline.
/// `Manual` is a pseudo-stage for operator-initiated sends and is never
/// returned by the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initial,
    #[serde(rename = "first")]
    FirstFollowup,
    #[serde(rename = "second")]
    SecondFollowup,
    Final,
    Manual,
}

/// The scheduled stages in calendar order (earliest first).
pub const SCHEDULED_STAGES: [Stage; 4] = [
    Stage::Initial,
    Stage::FirstFollowup,
    Stage::SecondFollowup,
    Stage::Final,
];

impl Stage {
    /// Days before the deadline at which this stage fires. `None` for manual.
    pub fn days_before(&self) -> Option<i64> {
        match self {
            Stage::Initial => Some(30),
            Stage::FirstFollowup => Some(14),
            Stage::SecondFollowup => Some(7),
            Stage::Final => Some(3),
            Stage::Manual => None,
        }
    }

    /// Stage value as stored in `reminder_history.reminder_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::FirstFollowup => "first",
            Stage::SecondFollowup => "second",
            Stage::Final => "final",
            Stage::Manual => "manual",
        }
    }

    /// Ordinal used in operator-facing output and in the remote directory's
    /// "Reminder N" marker fields. `None` for manual.
    pub fn number(&self) -> Option<u8> {
        match self {
            Stage::Initial => Some(1),
            Stage::FirstFollowup => Some(2),
            Stage::SecondFollowup => Some(3),
            Stage::Final => Some(4),
            Stage::Manual => None,
        }
    }

    /// Marker field name in the remote guest directory.
    pub fn remote_field(&self) -> Option<&'static str> {
        match self.number() {
            Some(1) => Some("Reminder 1"),
            Some(2) => Some("Reminder 2"),
            Some(3) => Some("Reminder 3"),
            Some(4) => Some("Reminder 4"),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Stage::Initial),
            "first" => Ok(Stage::FirstFollowup),
            "second" => Ok(Stage::SecondFollowup),
            "final" => Ok(Stage::Final),
            "manual" => Ok(Stage::Manual),
            other => Err(format!("Unknown reminder stage: {other}")),
        }
    }
}

/// Days remaining until the deadline. Negative once the deadline has passed.
pub fn days_until_deadline(deadline: Date, today: Date) -> i64 {
    (deadline - today).whole_days()
}

/// The stage due on `today`, if any.
///
/// The stage offsets are pairwise distinct, so at most one stage can be due
/// on a given day. Days past the deadline never match.
pub fn stage_due_today(deadline: Date, today: Date) -> Option<Stage> {
    let days_left = days_until_deadline(deadline, today);
    SCHEDULED_STAGES
        .iter()
        .copied()
        .find(|stage| stage.days_before() == Some(days_left))
}

/// Calendar dates of every scheduled stage for the given deadline.
pub fn all_reminder_dates(deadline: Date) -> Vec<(Stage, Date)> {
    SCHEDULED_STAGES
        .iter()
        .map(|stage| {
            let days = stage.days_before().unwrap_or(0);
            (*stage, deadline - Duration::days(days))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn stage_offsets_are_distinct() {
        let mut offsets: Vec<i64> = SCHEDULED_STAGES
            .iter()
            .filter_map(|s| s.days_before())
            .collect();
        offsets.sort_unstable();
        offsets.dedup();
        assert_eq!(offsets.len(), SCHEDULED_STAGES.len());
    }

    #[test]
    fn initial_stage_fires_thirty_days_out() {
        let deadline = date!(2026 - 05 - 06);
        assert_eq!(
            stage_due_today(deadline, date!(2026 - 04 - 06)),
            Some(Stage::Initial)
        );
        // One day later nothing is due.
        assert_eq!(stage_due_today(deadline, date!(2026 - 04 - 07)), None);
    }

    #[test]
    fn every_stage_has_exactly_one_trigger_date() {
        let deadline = date!(2026 - 05 - 06);
        assert_eq!(
            stage_due_today(deadline, date!(2026 - 04 - 22)),
            Some(Stage::FirstFollowup)
        );
        assert_eq!(
            stage_due_today(deadline, date!(2026 - 04 - 29)),
            Some(Stage::SecondFollowup)
        );
        assert_eq!(
            stage_due_today(deadline, date!(2026 - 05 - 03)),
            Some(Stage::Final)
        );
    }

    #[test]
    fn past_deadline_is_never_due() {
        let deadline = date!(2026 - 05 - 06);
        assert_eq!(stage_due_today(deadline, date!(2026 - 05 - 07)), None);
        assert_eq!(stage_due_today(deadline, date!(2026 - 06 - 06)), None);
        assert!(days_until_deadline(deadline, date!(2026 - 05 - 07)) < 0);
    }

    #[test]
    fn manual_is_never_scheduled() {
        let deadline = date!(2026 - 05 - 06);
        for offset in 0..120 {
            let today = deadline - Duration::days(offset);
            assert_ne!(stage_due_today(deadline, today), Some(Stage::Manual));
        }
    }

    #[test]
    fn reminder_dates_cover_all_stages_in_order() {
        let deadline = date!(2026 - 05 - 06);
        let dates = all_reminder_dates(deadline);
        assert_eq!(
            dates,
            vec![
                (Stage::Initial, date!(2026 - 04 - 06)),
                (Stage::FirstFollowup, date!(2026 - 04 - 22)),
                (Stage::SecondFollowup, date!(2026 - 04 - 29)),
                (Stage::Final, date!(2026 - 05 - 03)),
            ]
        );
    }

    #[test]
    fn stage_strings_round_trip() {
        for stage in SCHEDULED_STAGES.iter().chain([Stage::Manual].iter()) {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), *stage);
        }
        assert!("bogus".parse::<Stage>().is_err());
    }
}
