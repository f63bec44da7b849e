//! Data models for the habit and its derived state.

use crate::milestone::MilestoneMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streak_engine::{CalendarDate, DayBox, EngineResult};
use uuid::Uuid;

/// Unique habit identifier.
pub type HabitId = Uuid;

/// A user's habit as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Habit {
    /// Unique identifier.
    pub id: HabitId,
    /// Owning user.
    pub user_id: String,
    /// Habit name.
    pub name: String,
    /// Longest streak ever reached.
    pub best_streak: u32,
    /// Whether the 21-day cycle was finished.
    pub all_done: bool,
    /// Highest milestone already celebrated, 0 if none.
    pub last_milestone: u32,
    /// Whether the habit is visible through its slug.
    pub is_public: bool,
    /// Public slug.
    pub public_slug: Option<String>,
    /// When the habit was created.
    pub created_at: DateTime<Utc>,
}

impl Habit {
    /// Create a new, private habit for a user.
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            best_streak: 0,
            all_done: false,
            last_milestone: 0,
            is_public: false,
            public_slug: None,
            created_at: Utc::now(),
        }
    }
}

/// Habit fields exposed alongside its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitMeta {
    pub id: HabitId,
    pub name: String,
    pub best_streak: u32,
    pub all_done: bool,
    pub is_public: bool,
    pub public_slug: Option<String>,
}

impl From<&Habit> for HabitMeta {
    fn from(habit: &Habit) -> Self {
        Self {
            id: habit.id,
            name: habit.name.clone(),
            best_streak: habit.best_streak,
            all_done: habit.all_done,
            is_public: habit.is_public,
            public_slug: habit.public_slug.clone(),
        }
    }
}

/// Full state of a user's habit on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitState {
    pub habit: Option<HabitMeta>,
    #[serde(rename = "todayUTC")]
    pub today_utc: CalendarDate,
    pub checked_in_today: bool,
    pub current_streak: u32,
    pub boxes: Vec<DayBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai: Option<MilestoneMessage>,
}

impl HabitState {
    /// Attach habit metadata to an engine result.
    pub fn new(habit: Option<HabitMeta>, today_utc: CalendarDate, result: EngineResult) -> Self {
        Self {
            habit,
            today_utc,
            checked_in_today: result.checked_in_today,
            current_streak: result.current_streak,
            boxes: result.boxes,
            ai: None,
        }
    }

    /// Same state with every box locked.
    pub fn read_only(mut self) -> Self {
        for b in &mut self.boxes {
            b.can_edit = false;
        }
        self.ai = None;
        self
    }

    /// The day that can be checked in next, if any.
    pub fn editable_day(&self) -> Option<u32> {
        self.boxes.iter().find(|b| b.can_edit).map(|b| b.day)
    }
}
