//! Recurrence engine.
//!
//! Computes due dates from an anchor and an interval, and drives the
//! occurrence state machine of recurring items. Pure and deterministic: the
//! caller supplies "today".

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, Duration, Month};

use super::types::RecurrenceState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    #[error("next due date after {anchor} is outside the supported calendar range")]
    OutOfRange { anchor: Date },
}

/// Interval family as supplied by clients, before custom days are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    Custom,
}

impl IntervalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for IntervalKind {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            other => Err(ScheduleError::InvalidInterval(format!(
                "unknown interval kind `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interval {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    Custom { days: u32 },
}

impl Interval {
    /// Build an interval from a kind and an optional day count.
    ///
    /// `custom_days` is required (and must be at least 1) for `Custom` and is
    /// ignored for calendar kinds.
    pub fn from_parts(kind: IntervalKind, custom_days: Option<u32>) -> Result<Self, ScheduleError> {
        match kind {
            IntervalKind::Weekly => Ok(Self::Weekly),
            IntervalKind::Monthly => Ok(Self::Monthly),
            IntervalKind::Quarterly => Ok(Self::Quarterly),
            IntervalKind::Yearly => Ok(Self::Yearly),
            IntervalKind::Custom => match custom_days {
                Some(days) if days >= 1 => Ok(Self::Custom { days }),
                Some(_) => Err(ScheduleError::InvalidInterval(
                    "custom interval days must be at least 1".to_string(),
                )),
                None => Err(ScheduleError::InvalidInterval(
                    "custom interval requires a day count".to_string(),
                )),
            },
        }
    }

    pub fn kind(self) -> IntervalKind {
        match self {
            Self::Weekly => IntervalKind::Weekly,
            Self::Monthly => IntervalKind::Monthly,
            Self::Quarterly => IntervalKind::Quarterly,
            Self::Yearly => IntervalKind::Yearly,
            Self::Custom { .. } => IntervalKind::Custom,
        }
    }

    /// Rough length in days, used to normalise amounts to a monthly figure.
    pub fn approximate_days(self) -> f64 {
        match self {
            Self::Weekly => 7.0,
            Self::Monthly => 365.25 / 12.0,
            Self::Quarterly => 365.25 / 4.0,
            Self::Yearly => 365.25,
            Self::Custom { days } => f64::from(days),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom { days } => write!(f, "every {days} days"),
            other => f.write_str(other.kind().as_str()),
        }
    }
}

/// The first due date strictly after `anchor`.
///
/// Calendar intervals keep the anchor's day of month, clamped to the last day
/// of a shorter target month (Jan 31 + 1 month is Feb 28, or Feb 29 in a leap
/// year).
pub fn next_due_date(anchor: Date, interval: Interval) -> Result<Date, ScheduleError> {
    let next = match interval {
        Interval::Weekly => anchor.checked_add(Duration::days(7)),
        Interval::Custom { days } => anchor.checked_add(Duration::days(i64::from(days))),
        Interval::Monthly => add_months(anchor, 1),
        Interval::Quarterly => add_months(anchor, 3),
        Interval::Yearly => add_months(anchor, 12),
    };
    next.ok_or(ScheduleError::OutOfRange { anchor })
}

fn add_months(anchor: Date, months: i32) -> Option<Date> {
    let month_index = anchor.year() * 12 + i32::from(u8::from(anchor.month())) - 1 + months;
    let year = month_index.div_euclid(12);
    let month = Month::try_from(u8::try_from(month_index.rem_euclid(12) + 1).ok()?).ok()?;

    (1..=anchor.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
}

/// Occurrences a single `process_due` call books at most; the rest wait for
/// the next run.
pub const MAX_OCCURRENCES_PER_RUN: usize = 400;

/// A recurring item's position in its occurrence sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSchedule {
    /// Start date, then the most recently processed due date.
    pub anchor_date: Date,
    pub interval: Interval,
    pub occurrences_so_far: u32,
    pub total_occurrences_limit: Option<u32>,
    pub is_active: bool,
}

impl RecurringSchedule {
    pub fn new(anchor_date: Date, interval: Interval, limit: Option<u32>) -> Self {
        Self {
            anchor_date,
            interval,
            occurrences_so_far: 0,
            total_occurrences_limit: limit,
            is_active: true,
        }
    }

    pub fn state(&self) -> RecurrenceState {
        if self.limit_reached() {
            RecurrenceState::Completed
        } else if self.is_active {
            RecurrenceState::Active
        } else {
            RecurrenceState::Paused
        }
    }

    /// Next due date, or `None` once the schedule is completed or paused.
    pub fn next_due_date(&self) -> Result<Option<Date>, ScheduleError> {
        if self.state() != RecurrenceState::Active {
            return Ok(None);
        }
        next_due_date(self.anchor_date, self.interval).map(Some)
    }

    pub fn is_due(&self, today: Date) -> Result<bool, ScheduleError> {
        Ok(self.next_due_date()?.is_some_and(|due| due <= today))
    }

    /// Process occurrences due on or before `today`, at most
    /// `MAX_OCCURRENCES_PER_RUN` of them.
    ///
    /// Each processed due date becomes the new anchor, so calling again with
    /// the same `today` processes nothing once caught up. Returns the
    /// processed due dates in order.
    pub fn process_due(&mut self, today: Date) -> Result<Vec<Date>, ScheduleError> {
        let mut processed = Vec::new();

        while processed.len() < MAX_OCCURRENCES_PER_RUN {
            let Some(due) = self.next_due_date()? else {
                break;
            };
            if due > today {
                break;
            }
            self.anchor_date = due;
            self.occurrences_so_far += 1;
            processed.push(due);

            if self.limit_reached() {
                self.is_active = false;
            }
        }

        Ok(processed)
    }

    /// Re-enable a paused schedule. Completed schedules stay completed.
    pub fn resume(&mut self) -> bool {
        if self.state() == RecurrenceState::Paused {
            self.is_active = true;
            return true;
        }
        false
    }

    pub fn pause(&mut self) {
        self.is_active = false;
    }

    fn limit_reached(&self) -> bool {
        self.total_occurrences_limit
            .is_some_and(|limit| self.occurrences_so_far >= limit)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    const ALL_INTERVALS: [Interval; 6] = [
        Interval::Weekly,
        Interval::Monthly,
        Interval::Quarterly,
        Interval::Yearly,
        Interval::Custom { days: 1 },
        Interval::Custom { days: 45 },
    ];

    #[test]
    fn next_due_is_strictly_after_anchor() {
        let anchors = [
            date!(2023 - 01 - 31),
            date!(2024 - 02 - 29),
            date!(2024 - 12 - 31),
            date!(2025 - 06 - 15),
            date!(2025 - 03 - 01),
        ];
        for anchor in anchors {
            for interval in ALL_INTERVALS {
                let next = next_due_date(anchor, interval).expect("in range");
                assert!(next > anchor, "{interval} from {anchor} gave {next}");
            }
        }
    }

    #[test]
    fn weekly_and_custom_add_days() {
        assert_eq!(
            next_due_date(date!(2025 - 12 - 29), Interval::Weekly),
            Ok(date!(2026 - 01 - 05))
        );
        assert_eq!(
            next_due_date(date!(2025 - 01 - 01), Interval::Custom { days: 10 }),
            Ok(date!(2025 - 01 - 11))
        );
    }

    #[test]
    fn monthly_clamps_to_end_of_february() {
        assert_eq!(
            next_due_date(date!(2023 - 01 - 31), Interval::Monthly),
            Ok(date!(2023 - 02 - 28))
        );
        assert_eq!(
            next_due_date(date!(2024 - 01 - 31), Interval::Monthly),
            Ok(date!(2024 - 02 - 29))
        );
    }

    #[test]
    fn monthly_rolls_over_year_end() {
        assert_eq!(
            next_due_date(date!(2024 - 12 - 15), Interval::Monthly),
            Ok(date!(2025 - 01 - 15))
        );
    }

    #[test]
    fn quarterly_clamps_short_months() {
        assert_eq!(
            next_due_date(date!(2025 - 11 - 30), Interval::Quarterly),
            Ok(date!(2026 - 02 - 28))
        );
        assert_eq!(
            next_due_date(date!(2025 - 05 - 31), Interval::Quarterly),
            Ok(date!(2025 - 08 - 31))
        );
    }

    #[test]
    fn yearly_leap_day_clamps_on_common_years() {
        assert_eq!(
            next_due_date(date!(2024 - 02 - 29), Interval::Yearly),
            Ok(date!(2025 - 02 - 28))
        );
        assert_eq!(
            next_due_date(date!(2023 - 03 - 01), Interval::Yearly),
            Ok(date!(2024 - 03 - 01))
        );
    }

    #[test]
    fn end_of_calendar_is_reported() {
        assert_eq!(
            next_due_date(Date::MAX, Interval::Weekly),
            Err(ScheduleError::OutOfRange { anchor: Date::MAX })
        );
        assert!(next_due_date(Date::MAX, Interval::Monthly).is_err());
    }

    #[test]
    fn from_parts_validates_custom_days() {
        assert_eq!(
            Interval::from_parts(IntervalKind::Custom, Some(14)),
            Ok(Interval::Custom { days: 14 })
        );
        assert!(Interval::from_parts(IntervalKind::Custom, Some(0)).is_err());
        assert!(Interval::from_parts(IntervalKind::Custom, None).is_err());
        assert_eq!(
            Interval::from_parts(IntervalKind::Monthly, Some(3)),
            Ok(Interval::Monthly)
        );
    }

    #[test]
    fn interval_kind_parses_case_insensitively() {
        assert_eq!("Monthly".parse::<IntervalKind>(), Ok(IntervalKind::Monthly));
        assert!("fortnightly".parse::<IntervalKind>().is_err());
    }

    #[test]
    fn processing_advances_anchor_and_is_idempotent() {
        let mut schedule = RecurringSchedule::new(date!(2025 - 01 - 10), Interval::Monthly, None);

        let processed = schedule.process_due(date!(2025 - 02 - 10)).expect("in range");
        assert_eq!(processed, vec![date!(2025 - 02 - 10)]);
        assert_eq!(schedule.anchor_date, date!(2025 - 02 - 10));
        assert_eq!(schedule.occurrences_so_far, 1);

        let rerun = schedule.process_due(date!(2025 - 02 - 10)).expect("in range");
        assert!(rerun.is_empty());
        assert_eq!(schedule.occurrences_so_far, 1);
    }

    #[test]
    fn processing_catches_up_missed_occurrences() {
        let mut schedule = RecurringSchedule::new(date!(2025 - 01 - 01), Interval::Weekly, None);

        let processed = schedule.process_due(date!(2025 - 01 - 25)).expect("in range");
        assert_eq!(
            processed,
            vec![
                date!(2025 - 01 - 08),
                date!(2025 - 01 - 15),
                date!(2025 - 01 - 22)
            ]
        );
        assert_eq!(schedule.next_due_date(), Ok(Some(date!(2025 - 01 - 29))));
    }

    #[test]
    fn limit_completes_schedule() {
        let mut schedule =
            RecurringSchedule::new(date!(2025 - 01 - 01), Interval::Monthly, Some(2));

        let processed = schedule.process_due(date!(2025 - 12 - 31)).expect("in range");
        assert_eq!(processed.len(), 2);
        assert_eq!(schedule.state(), RecurrenceState::Completed);
        assert!(!schedule.is_active);
        assert_eq!(schedule.next_due_date(), Ok(None));
        assert!(!schedule.resume());
    }

    #[test]
    fn paused_schedule_produces_nothing_until_resumed() {
        let mut schedule = RecurringSchedule::new(date!(2025 - 01 - 01), Interval::Weekly, None);
        schedule.pause();

        assert_eq!(schedule.state(), RecurrenceState::Paused);
        assert_eq!(schedule.is_due(date!(2025 - 06 - 01)), Ok(false));
        assert!(schedule.process_due(date!(2025 - 06 - 01)).expect("ok").is_empty());

        assert!(schedule.resume());
        assert_eq!(schedule.is_due(date!(2025 - 06 - 01)), Ok(true));
    }

    #[test]
    fn month_end_anchor_drifts_after_clamping() {
        let mut schedule = RecurringSchedule::new(date!(2025 - 01 - 31), Interval::Monthly, None);
        let processed = schedule.process_due(date!(2025 - 03 - 31)).expect("in range");
        assert_eq!(processed, vec![date!(2025 - 02 - 28), date!(2025 - 03 - 28)]);
    }

    #[test]
    fn catch_up_is_capped_per_run() {
        let mut schedule = RecurringSchedule::new(
            date!(2020 - 01 - 01),
            Interval::Custom { days: 1 },
            None,
        );

        let first = schedule.process_due(date!(2025 - 01 - 01)).expect("in range");
        assert_eq!(first.len(), MAX_OCCURRENCES_PER_RUN);
        assert!(schedule.is_due(date!(2025 - 01 - 01)).expect("in range"));

        let second = schedule.process_due(date!(2025 - 01 - 01)).expect("in range");
        assert_eq!(second.first().copied(), first.last().map(|d| *d + Duration::days(1)));
    }
}
