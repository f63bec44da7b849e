//! Database operations for habits and check-ins.

use crate::models::{Habit, HabitId};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqlResult};
use std::collections::HashSet;
use std::path::Path;
use streak_engine::CalendarDate;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Public slug already taken: {0}")]
    SlugTaken(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
///
/// Owned by whoever runs a command and handed to the service by reference.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at path.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Close the connection, reporting any error from SQLite.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, e)| DbError::Sqlite(e))
    }

    /// Initialize database schema.
    fn init(&self) -> DbResult<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS habits (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                best_streak INTEGER NOT NULL DEFAULT 0,
                all_done INTEGER NOT NULL DEFAULT 0,
                last_milestone INTEGER NOT NULL DEFAULT 0,
                is_public INTEGER NOT NULL DEFAULT 0,
                public_slug TEXT UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS habit_checkins (
                id TEXT PRIMARY KEY,
                habit_id TEXT NOT NULL REFERENCES habits(id) ON DELETE CASCADE,
                checkin_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(habit_id, checkin_date)
            );

            CREATE INDEX IF NOT EXISTS idx_checkins_habit_date
                ON habit_checkins(habit_id, checkin_date);
            "#,
        )?;
        Ok(())
    }

    /// Insert a new habit.
    pub fn insert_habit(&self, habit: &Habit) -> DbResult<()> {
        insert_habit_row(&self.conn, habit)
    }

    /// Replace the user's habits, and their check-ins, with `habit` in one
    /// transaction.
    ///
    /// Returns how many habits were removed. Nothing changes if the insert fails.
    pub fn replace_habit_for_user(&self, habit: &Habit) -> DbResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = delete_user_habits(&tx, &habit.user_id)?;
        insert_habit_row(&tx, habit)?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Get a habit by ID.
    pub fn get_habit(&self, id: HabitId) -> DbResult<Option<Habit>> {
        self.query_habit("SELECT * FROM habits WHERE id = ?1", &id.to_string())
    }

    /// Get the habit a user owns.
    pub fn get_habit_for_user(&self, user_id: &str) -> DbResult<Option<Habit>> {
        self.query_habit("SELECT * FROM habits WHERE user_id = ?1", user_id)
    }

    /// Get a public habit by slug. Private habits are not returned.
    pub fn get_public_habit(&self, slug: &str) -> DbResult<Option<Habit>> {
        self.query_habit(
            "SELECT * FROM habits WHERE public_slug = ?1 AND is_public = 1",
            slug,
        )
    }

    fn query_habit(&self, sql: &str, key: &str) -> DbResult<Option<Habit>> {
        let mut stmt = self.conn.prepare(sql)?;
        let habit = stmt
            .query_row(params![key], |row| parse_habit_row(row))
            .optional()?;
        Ok(habit)
    }

    /// Rename a habit.
    pub fn rename_habit(&self, id: HabitId, name: &str) -> DbResult<()> {
        self.conn.execute(
            "UPDATE habits SET name = ?2 WHERE id = ?1",
            params![id.to_string(), name],
        )?;
        Ok(())
    }

    /// Publish a habit under a slug, or make it private when `slug` is `None`.
    pub fn set_public(&self, id: HabitId, slug: Option<&str>) -> DbResult<()> {
        self.conn
            .execute(
                "UPDATE habits SET is_public = ?2, public_slug = ?3 WHERE id = ?1",
                params![id.to_string(), slug.is_some() as i32, slug],
            )
            .map_err(|e| slug_conflict(e, slug))?;
        Ok(())
    }

    /// Store the fields derived from the latest streak.
    pub fn update_progress(
        &self,
        id: HabitId,
        best_streak: u32,
        all_done: bool,
        last_milestone: u32,
    ) -> DbResult<()> {
        self.conn.execute(
            "UPDATE habits SET best_streak = ?2, all_done = ?3, last_milestone = ?4 WHERE id = ?1",
            params![id.to_string(), best_streak, all_done as i32, last_milestone],
        )?;
        Ok(())
    }

    /// Record a check-in. Returns `false` if one already exists for that day.
    pub fn insert_checkin(&self, habit_id: HabitId, date: CalendarDate) -> DbResult<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO habit_checkins (id, habit_id, checkin_date, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                Uuid::new_v4().to_string(),
                habit_id.to_string(),
                date.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Check-in dates for a habit within `[from, to]`.
    pub fn checkins_between(
        &self,
        habit_id: HabitId,
        from: CalendarDate,
        to: CalendarDate,
    ) -> DbResult<HashSet<CalendarDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT checkin_date FROM habit_checkins
             WHERE habit_id = ?1 AND checkin_date >= ?2 AND checkin_date <= ?3",
        )?;

        let dates = stmt
            .query_map(
                params![habit_id.to_string(), from.to_string(), to.to_string()],
                |row| text_column(row, "checkin_date", CalendarDate::parse),
            )?
            .collect::<SqlResult<HashSet<_>>>()?;

        Ok(dates)
    }
}

#[cfg(test)]
impl Database {
    /// Number of check-ins recorded for a habit.
    pub fn count_checkins(&self, habit_id: HabitId) -> DbResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM habit_checkins WHERE habit_id = ?1",
            params![habit_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// Helper functions

fn insert_habit_row(conn: &Connection, habit: &Habit) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO habits (id, user_id, name, best_streak, all_done, last_milestone,
                            is_public, public_slug, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            habit.id.to_string(),
            habit.user_id,
            habit.name,
            habit.best_streak,
            habit.all_done as i32,
            habit.last_milestone,
            habit.is_public as i32,
            habit.public_slug,
            habit.created_at.to_rfc3339(),
        ],
    )
    .map_err(|e| slug_conflict(e, habit.public_slug.as_deref()))?;
    Ok(())
}

fn delete_user_habits(conn: &Connection, user_id: &str) -> DbResult<usize> {
    conn.execute(
        "DELETE FROM habit_checkins WHERE habit_id IN (SELECT id FROM habits WHERE user_id = ?1)",
        params![user_id],
    )?;
    let deleted = conn.execute("DELETE FROM habits WHERE user_id = ?1", params![user_id])?;
    Ok(deleted)
}

fn slug_conflict(err: rusqlite::Error, slug: Option<&str>) -> DbError {
    if let (rusqlite::Error::SqliteFailure(e, Some(msg)), Some(slug)) = (&err, slug) {
        if e.code == ErrorCode::ConstraintViolation && msg.contains("public_slug") {
            return DbError::SlugTaken(slug.to_string());
        }
    }
    DbError::Sqlite(err)
}

fn text_column<T, E>(
    row: &rusqlite::Row,
    name: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> SqlResult<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let idx = row.as_ref().column_index(name)?;
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_habit_row(row: &rusqlite::Row) -> SqlResult<Habit> {
    let all_done: i32 = row.get("all_done")?;
    let is_public: i32 = row.get("is_public")?;

    Ok(Habit {
        id: text_column(row, "id", Uuid::parse_str)?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        best_streak: row.get("best_streak")?,
        all_done: all_done != 0,
        last_milestone: row.get("last_milestone")?,
        is_public: is_public != 0,
        public_slug: row.get("public_slug")?,
        created_at: text_column(row, "created_at", |s| {
            DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
        })?,
    })
}
