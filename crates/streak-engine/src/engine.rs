//! Streak and box derivation.

use crate::date::CalendarDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Length of one habit cycle, and the streak cap.
pub const CYCLE_DAYS: u32 = 21;

/// Display state of one day in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBox {
    /// Cycle day, starting at 1.
    pub day: u32,
    /// Day is part of the current streak.
    pub status: bool,
    /// Day is the next one that may be checked in.
    pub can_edit: bool,
}

/// Inputs for one engine evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EngineInput<'a> {
    pub today_utc: CalendarDate,
    pub yesterday_utc: CalendarDate,
    pub checkin_set: &'a HashSet<CalendarDate>,
    /// Cycle already finished; no day is editable.
    pub all_done: bool,
}

/// Derived streak state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    pub checked_in_today: bool,
    pub current_streak: u32,
    pub boxes: Vec<DayBox>,
}

/// Whether a check-in exists on `date`.
pub fn has_checkin_on(date: CalendarDate, checkin_set: &HashSet<CalendarDate>) -> bool {
    checkin_set.contains(&date)
}

/// Count consecutive check-in days walking backward from `anchor`.
///
/// Stops at the first missing day or once `cap` days have been counted.
pub fn compute_current_streak(
    anchor: CalendarDate,
    checkin_set: &HashSet<CalendarDate>,
    cap: u32,
) -> u32 {
    let mut streak = 0;
    let mut cursor = anchor;

    while streak < cap && checkin_set.contains(&cursor) {
        streak += 1;
        cursor = cursor.yesterday();
    }

    streak
}

/// Build the per-day boxes for a cycle of `total_days`.
///
/// Days up to `current_streak` are complete. Only day `current_streak + 1` can
/// be editable, and only while today is unchecked and the cycle is open.
pub fn build_boxes(
    current_streak: u32,
    checked_in_today: bool,
    all_done: bool,
    total_days: u32,
) -> Vec<DayBox> {
    let next_editable = current_streak.saturating_add(1);
    let editable = !checked_in_today && !all_done && current_streak < total_days;

    (1..=total_days)
        .map(|day| DayBox {
            day,
            status: day <= current_streak,
            can_edit: editable && day == next_editable,
        })
        .collect()
}

/// Derive check-in status, streak and boxes for one habit.
///
/// The streak is anchored on today when today is checked in, otherwise on
/// yesterday, so an undecided today neither breaks nor extends the chain.
pub fn compute_engine_state(input: &EngineInput<'_>) -> EngineResult {
    let checked_in_today = has_checkin_on(input.today_utc, input.checkin_set);

    let anchor = if checked_in_today {
        input.today_utc
    } else {
        input.yesterday_utc
    };

    let current_streak = compute_current_streak(anchor, input.checkin_set, CYCLE_DAYS);
    let boxes = build_boxes(current_streak, checked_in_today, input.all_done, CYCLE_DAYS);

    EngineResult {
        checked_in_today,
        current_streak,
        boxes,
    }
}
