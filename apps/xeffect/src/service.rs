//! Habit operations on top of the store and the streak engine.
//!
//! The service reads check-ins from the [`Database`], feeds them to the engine
//! together with today's date from a [`DateSource`], and writes back the
//! fields the result implies (best streak, completion, last milestone).

use crate::db::{Database, DbError};
use crate::milestone::Milestone;
use crate::models::{Habit, HabitId, HabitMeta, HabitState};
use std::collections::HashSet;
use streak_engine::{compute_engine_state, DateSource, EngineInput, CYCLE_DAYS};
use thiserror::Error;
use tracing::{debug, info};

/// Service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Habit not found: {0}")]
    NotFound(String),
    #[error("Habit already completed its 21 days")]
    HabitCompleted,
    #[error("Habit name must not be empty")]
    InvalidName,
    #[error("Public slug must not be empty")]
    InvalidSlug,
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::HabitCompleted => "HABIT_COMPLETED",
            Self::InvalidName | Self::InvalidSlug => "VALIDATION_ERROR",
            Self::Db(DbError::SlugTaken(_)) => "SLUG_TAKEN",
            Self::Db(_) => "SERVER_ERROR",
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result of saving today's check-in.
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// State after the save.
    pub state: HabitState,
    /// Whether a new check-in row was written.
    pub inserted: bool,
    /// Milestone reached by this save, not yet celebrated.
    pub milestone: Option<Milestone>,
}

/// Habit operations for one store and date source.
pub struct HabitService<'a, C: DateSource> {
    db: &'a Database,
    clock: C,
}

impl<'a, C: DateSource> HabitService<'a, C> {
    pub fn new(db: &'a Database, clock: C) -> Self {
        Self { db, clock }
    }

    /// Current state of a user's habit; an empty grid if they have none.
    pub fn state_for_user(&self, user_id: &str) -> ServiceResult<HabitState> {
        let habit = self.db.get_habit_for_user(user_id)?;
        self.evaluate(habit.as_ref())
    }

    /// Id of the user's habit.
    pub fn current_habit_id(&self, user_id: &str) -> ServiceResult<HabitId> {
        self.db
            .get_habit_for_user(user_id)?
            .map(|h| h.id)
            .ok_or_else(|| ServiceError::NotFound(format!("no habit for user {}", user_id)))
    }

    /// Start a new habit, replacing the user's previous one.
    pub fn create_habit(&self, user_id: &str, name: &str) -> ServiceResult<HabitState> {
        let name = clean_name(name)?;

        let habit = Habit::new(user_id, name);
        let replaced = self.db.replace_habit_for_user(&habit)?;
        info!(habit_id = %habit.id, replaced, "habit created");

        self.evaluate(Some(&habit))
    }

    /// Rename the user's habit.
    pub fn rename_habit(
        &self,
        user_id: &str,
        habit_id: HabitId,
        name: &str,
    ) -> ServiceResult<HabitState> {
        let name = clean_name(name)?;
        let mut habit = self.owned_habit(user_id, habit_id)?;

        self.db.rename_habit(habit.id, name)?;
        habit.name = name.to_string();
        debug!(habit_id = %habit.id, "habit renamed");

        self.evaluate(Some(&habit))
    }

    /// Record today's check-in and persist the derived progress.
    ///
    /// Saving twice on the same day is harmless: the second call writes
    /// nothing and reports no milestone.
    pub fn save_today(&self, user_id: &str, habit_id: HabitId) -> ServiceResult<SaveOutcome> {
        let mut habit = self.owned_habit(user_id, habit_id)?;
        if habit.all_done {
            return Err(ServiceError::HabitCompleted);
        }

        let today = self.clock.today();
        let inserted = self.db.insert_checkin(habit.id, today)?;

        let state = self.evaluate(Some(&habit))?;
        let streak = state.current_streak;

        let milestone = next_milestone(streak, habit.last_milestone);
        let best_streak = habit.best_streak.max(streak);
        let all_done = streak >= CYCLE_DAYS;
        let last_milestone = milestone.map_or(habit.last_milestone, Milestone::day);

        if (best_streak, all_done, last_milestone)
            == (habit.best_streak, habit.all_done, habit.last_milestone)
        {
            debug!(habit_id = %habit.id, streak, inserted, "check-in saved");
            return Ok(SaveOutcome {
                state,
                inserted,
                milestone,
            });
        }

        self.db
            .update_progress(habit.id, best_streak, all_done, last_milestone)?;
        habit.best_streak = best_streak;
        habit.all_done = all_done;
        habit.last_milestone = last_milestone;
        info!(
            habit_id = %habit.id,
            streak,
            best_streak,
            all_done,
            milestone = milestone.map(Milestone::day),
            "check-in saved"
        );

        Ok(SaveOutcome {
            state: self.evaluate(Some(&habit))?,
            inserted,
            milestone,
        })
    }

    /// Publish the habit under `slug`, or make it private with `None`.
    pub fn set_public(
        &self,
        user_id: &str,
        habit_id: HabitId,
        slug: Option<&str>,
    ) -> ServiceResult<HabitState> {
        let slug = match slug {
            Some(s) if s.trim().is_empty() => return Err(ServiceError::InvalidSlug),
            Some(s) => Some(s.trim()),
            None => None,
        };
        let mut habit = self.owned_habit(user_id, habit_id)?;

        self.db.set_public(habit.id, slug)?;
        habit.is_public = slug.is_some();
        habit.public_slug = slug.map(str::to_string);
        debug!(habit_id = %habit.id, public = habit.is_public, "visibility changed");

        self.evaluate(Some(&habit))
    }

    /// Read-only state of a published habit.
    pub fn public_state(&self, slug: &str) -> ServiceResult<HabitState> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(ServiceError::InvalidSlug);
        }

        let habit = self
            .db
            .get_public_habit(slug)?
            .ok_or_else(|| ServiceError::NotFound(format!("no public habit '{}'", slug)))?;

        Ok(self.evaluate(Some(&habit))?.read_only())
    }

    fn owned_habit(&self, user_id: &str, habit_id: HabitId) -> ServiceResult<Habit> {
        self.db
            .get_habit(habit_id)?
            .filter(|h| h.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound(habit_id.to_string()))
    }

    fn evaluate(&self, habit: Option<&Habit>) -> ServiceResult<HabitState> {
        let today = self.clock.today();
        let yesterday = self.clock.yesterday();

        // Only the last cycle's worth of days can affect a capped streak.
        let checkins = match habit {
            Some(h) => self
                .db
                .checkins_between(h.id, today.add_days(-i64::from(CYCLE_DAYS)), today)?,
            None => HashSet::new(),
        };

        let result = compute_engine_state(&EngineInput {
            today_utc: today,
            yesterday_utc: yesterday,
            checkin_set: &checkins,
            all_done: habit.map_or(false, |h| h.all_done),
        });

        Ok(HabitState::new(habit.map(HabitMeta::from), today, result))
    }
}

/// Milestone to celebrate for `streak`, given the last one celebrated.
///
/// Each milestone is celebrated at most once per habit; a broken chain does
/// not make earlier milestones count again.
fn next_milestone(streak: u32, last_milestone: u32) -> Option<Milestone> {
    Milestone::from_streak(streak).filter(|m| m.day() > last_milestone)
}

fn clean_name(name: &str) -> ServiceResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::InvalidName);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use streak_engine::{CalendarDate, FixedClock};

    const USER: &str = "user-1";

    fn day(s: &str) -> CalendarDate {
        CalendarDate::parse(s).unwrap()
    }

    fn service_on<'a>(db: &'a Database, today: &str) -> HabitService<'a, FixedClock> {
        HabitService::new(db, FixedClock(day(today)))
    }

    /// Save on each of `days` consecutive days starting at `start`.
    fn save_days(db: &Database, habit_id: HabitId, start: &str, days: i64) -> Vec<SaveOutcome> {
        (0..days)
            .map(|i| {
                let today = day(start).add_days(i).to_string();
                service_on(db, &today).save_today(USER, habit_id).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_state_without_habit() {
        let db = Database::in_memory().unwrap();
        let state = service_on(&db, "2026-01-15").state_for_user(USER).unwrap();

        assert!(state.habit.is_none());
        assert_eq!(state.today_utc, day("2026-01-15"));
        assert!(!state.checked_in_today);
        assert_eq!(state.current_streak, 0);
        assert_eq!(state.boxes.len(), 21);
        assert_eq!(state.editable_day(), Some(1));
    }

    #[test]
    fn test_create_replaces_previous_habit() {
        let db = Database::in_memory().unwrap();
        let service = service_on(&db, "2026-01-15");

        let first = service.create_habit(USER, "  Cold showers ").unwrap();
        let first_id = first.habit.unwrap().id;
        service.save_today(USER, first_id).unwrap();

        let second = service.create_habit(USER, "No sugar").unwrap();
        let meta = second.habit.unwrap();
        assert_ne!(meta.id, first_id);
        assert_eq!(meta.name, "No sugar");
        assert_eq!(second.current_streak, 0);
        assert!(db.get_habit(first_id).unwrap().is_none());
        assert_eq!(db.count_checkins(first_id).unwrap(), 0);
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let db = Database::in_memory().unwrap();
        let err = service_on(&db, "2026-01-15").create_habit(USER, "   ").unwrap_err();
        assert!(matches!(err, ServiceError::InvalidName));
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_save_today_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let service = service_on(&db, "2026-01-15");
        let habit_id = service.create_habit(USER, "Cold showers").unwrap().habit.unwrap().id;

        let first = service.save_today(USER, habit_id).unwrap();
        assert!(first.inserted);
        assert!(first.state.checked_in_today);
        assert_eq!(first.state.current_streak, 1);
        assert!(first.state.boxes[0].status);
        assert_eq!(first.state.editable_day(), None);
        assert_eq!(first.milestone, Some(Milestone::Day1));

        let second = service.save_today(USER, habit_id).unwrap();
        assert!(!second.inserted);
        assert!(second.state.checked_in_today);
        assert_eq!(second.state.current_streak, 1);
        assert_eq!(second.milestone, None);
        assert_eq!(db.count_checkins(habit_id).unwrap(), 1);
    }

    #[test]
    fn test_next_day_extends_streak() {
        let db = Database::in_memory().unwrap();
        let habit_id = service_on(&db, "2026-01-14")
            .create_habit(USER, "Reading")
            .unwrap()
            .habit
            .unwrap()
            .id;
        service_on(&db, "2026-01-14").save_today(USER, habit_id).unwrap();

        let before = service_on(&db, "2026-01-15").state_for_user(USER).unwrap();
        assert!(!before.checked_in_today);
        assert_eq!(before.current_streak, 1);
        assert_eq!(before.editable_day(), Some(2));

        let after = service_on(&db, "2026-01-15").save_today(USER, habit_id).unwrap();
        assert_eq!(after.state.current_streak, 2);
        assert_eq!(after.state.habit.unwrap().best_streak, 2);
    }

    #[test]
    fn test_missed_day_resets_but_keeps_best() {
        let db = Database::in_memory().unwrap();
        let habit_id = service_on(&db, "2026-01-01")
            .create_habit(USER, "Reading")
            .unwrap()
            .habit
            .unwrap()
            .id;
        save_days(&db, habit_id, "2026-01-01", 4);

        let gap = service_on(&db, "2026-01-06").state_for_user(USER).unwrap();
        assert_eq!(gap.current_streak, 0);
        assert_eq!(gap.editable_day(), Some(1));

        let restarted = service_on(&db, "2026-01-06").save_today(USER, habit_id).unwrap();
        assert_eq!(restarted.state.current_streak, 1);
        assert_eq!(restarted.state.habit.unwrap().best_streak, 4);
        assert_eq!(restarted.milestone, None);
        assert_eq!(db.get_habit(habit_id).unwrap().unwrap().last_milestone, 3);
    }

    #[test]
    fn test_restart_milestone_does_not_depend_on_broken_run_length() {
        let db = Database::in_memory().unwrap();
        let short = service_on(&db, "2026-01-01")
            .create_habit("user-a", "Reading")
            .unwrap()
            .habit
            .unwrap()
            .id;
        let long = service_on(&db, "2026-01-01")
            .create_habit("user-b", "Running")
            .unwrap()
            .habit
            .unwrap()
            .id;

        for (user, habit_id, days) in [("user-a", short, 2), ("user-b", long, 4)] {
            for offset in 0..days {
                let today = day("2026-01-01").add_days(offset).to_string();
                service_on(&db, &today).save_today(user, habit_id).unwrap();
            }
        }

        let short_restart = service_on(&db, "2026-01-04").save_today("user-a", short).unwrap();
        let long_restart = service_on(&db, "2026-01-06").save_today("user-b", long).unwrap();
        assert_eq!(short_restart.state.current_streak, 1);
        assert_eq!(long_restart.state.current_streak, 1);
        assert_eq!(short_restart.milestone, None);
        assert_eq!(long_restart.milestone, short_restart.milestone);
    }

    #[test]
    fn test_milestones_fire_once_each() {
        let db = Database::in_memory().unwrap();
        let habit_id = service_on(&db, "2026-01-01")
            .create_habit(USER, "Reading")
            .unwrap()
            .habit
            .unwrap()
            .id;

        let outcomes = save_days(&db, habit_id, "2026-01-01", 8);
        let reached: Vec<_> = outcomes
            .iter()
            .filter_map(|o| o.milestone.map(Milestone::day))
            .collect();
        assert_eq!(reached, vec![1, 3, 7]);
        assert_eq!(db.get_habit(habit_id).unwrap().unwrap().last_milestone, 7);
    }

    #[test]
    fn test_twenty_one_days_completes_habit() {
        let db = Database::in_memory().unwrap();
        let habit_id = service_on(&db, "2026-01-01")
            .create_habit(USER, "Meditate")
            .unwrap()
            .habit
            .unwrap()
            .id;

        let outcomes = save_days(&db, habit_id, "2026-01-01", 21);
        let last = outcomes.last().unwrap();
        assert_eq!(last.state.current_streak, 21);
        assert_eq!(last.milestone, Some(Milestone::Day21));
        let meta = last.state.habit.clone().unwrap();
        assert!(meta.all_done);
        assert_eq!(meta.best_streak, 21);
        assert!(last.state.boxes.iter().all(|b| b.status && !b.can_edit));

        let next_day = service_on(&db, "2026-01-22");
        assert!(matches!(
            next_day.save_today(USER, habit_id),
            Err(ServiceError::HabitCompleted)
        ));
        let frozen = next_day.state_for_user(USER).unwrap();
        assert_eq!(frozen.current_streak, 21);
        assert_eq!(frozen.editable_day(), None);
    }

    #[test]
    fn test_other_users_habit_is_not_found() {
        let db = Database::in_memory().unwrap();
        let service = service_on(&db, "2026-01-15");
        let habit_id = service.create_habit(USER, "Reading").unwrap().habit.unwrap().id;

        let err = service.save_today("intruder", habit_id).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(matches!(
            service.rename_habit("intruder", habit_id, "Mine now"),
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(db.count_checkins(habit_id).unwrap(), 0);
    }

    #[test]
    fn test_rename_keeps_progress() {
        let db = Database::in_memory().unwrap();
        let service = service_on(&db, "2026-01-15");
        let habit_id = service.create_habit(USER, "Reading").unwrap().habit.unwrap().id;
        service.save_today(USER, habit_id).unwrap();

        let state = service.rename_habit(USER, habit_id, "Reading 20 pages").unwrap();
        assert_eq!(state.habit.unwrap().name, "Reading 20 pages");
        assert_eq!(state.current_streak, 1);
        assert!(state.checked_in_today);
    }

    #[test]
    fn test_public_state_is_read_only() {
        let db = Database::in_memory().unwrap();
        let service = service_on(&db, "2026-01-15");
        let habit_id = service.create_habit(USER, "Reading").unwrap().habit.unwrap().id;
        service_on(&db, "2026-01-14").save_today(USER, habit_id).unwrap();

        // Private habits are not visible.
        assert!(matches!(
            service.public_state("reader"),
            Err(ServiceError::NotFound(_))
        ));

        let published = service.set_public(USER, habit_id, Some(" reader ")).unwrap();
        let meta = published.habit.clone().unwrap();
        assert!(meta.is_public);
        assert_eq!(meta.public_slug.as_deref(), Some("reader"));
        assert_eq!(published.editable_day(), Some(2));

        let public = service.public_state("reader").unwrap();
        assert_eq!(public.current_streak, 1);
        assert!(public.boxes[0].status);
        assert_eq!(public.editable_day(), None);
        assert!(public.ai.is_none());

        service.set_public(USER, habit_id, None).unwrap();
        assert!(service.public_state("reader").is_err());
    }

    #[test]
    fn test_public_slug_validation_and_conflict() {
        let db = Database::in_memory().unwrap();
        let service = service_on(&db, "2026-01-15");
        let first = service.create_habit("user-a", "Reading").unwrap().habit.unwrap().id;
        let second = service.create_habit("user-b", "Running").unwrap().habit.unwrap().id;

        assert!(matches!(
            service.set_public("user-a", first, Some("  ")),
            Err(ServiceError::InvalidSlug)
        ));
        assert!(matches!(service.public_state(" "), Err(ServiceError::InvalidSlug)));

        service.set_public("user-a", first, Some("shared")).unwrap();
        let err = service.set_public("user-b", second, Some("shared")).unwrap_err();
        assert_eq!(err.code(), "SLUG_TAKEN");
    }

    #[test]
    fn test_next_milestone_rules() {
        assert_eq!(next_milestone(1, 0), Some(Milestone::Day1));
        assert_eq!(next_milestone(2, 1), None);
        assert_eq!(next_milestone(3, 1), Some(Milestone::Day3));
        assert_eq!(next_milestone(3, 3), None);
        assert_eq!(next_milestone(1, 7), None);
        assert_eq!(next_milestone(1, 1), None);
        assert_eq!(next_milestone(14, 7), Some(Milestone::Day14));
    }
}
