//! Command-line arguments and text output.

use crate::models::HabitState;
use clap::{Parser, Subcommand};
use std::fmt::Write;
use std::path::PathBuf;
use streak_engine::{CalendarDate, DayBox, EngineResult};

#[derive(Debug, Parser)]
#[command(name = "xeffect", version, about = "Build one habit in 21 days")]
pub struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Act as this user instead of the configured one.
    #[arg(long, global = true, env = "XEFFECT_USER")]
    pub user: Option<String>,

    /// Pretend today is this UTC date (YYYY-MM-DD).
    #[arg(long, global = true)]
    pub today: Option<CalendarDate>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show your habit, streak and grid.
    Status,
    /// Start a new habit, replacing the current one.
    Create {
        /// Habit name.
        name: String,
    },
    /// Rename your habit.
    Rename {
        /// New name.
        name: String,
    },
    /// Check in for today.
    Save,
    /// Share your progress under a public slug.
    Publish {
        /// Public slug.
        slug: String,
    },
    /// Stop sharing your progress.
    Unpublish,
    /// Show someone's public progress.
    Public {
        /// Public slug.
        slug: String,
    },
    /// Run the streak engine on a list of dates, without a database.
    Engine {
        /// Check-in dates, comma separated.
        #[arg(long, value_delimiter = ',')]
        checkins: Vec<CalendarDate>,
        /// Treat the cycle as finished.
        #[arg(long)]
        all_done: bool,
    },
}

/// One character per day: `#` done, `+` can check in, `.` pending.
pub fn render_boxes(boxes: &[DayBox]) -> String {
    boxes
        .iter()
        .map(|b| match (b.status, b.can_edit) {
            (true, _) => '#',
            (false, true) => '+',
            (false, false) => '.',
        })
        .collect()
}

/// Human-readable summary of a habit state.
pub fn render_state(state: &HabitState) -> String {
    let mut out = String::new();

    match &state.habit {
        Some(habit) => {
            let _ = write!(out, "{}", habit.name);
            if let Some(slug) = habit.public_slug.as_deref().filter(|_| habit.is_public) {
                let _ = write!(out, " (public: {})", slug);
            }
            if habit.all_done {
                out.push_str(" [complete]");
            }
            out.push('\n');
            let _ = writeln!(
                out,
                "{}  streak {}/{}  best {}  {}",
                state.today_utc,
                state.current_streak,
                state.boxes.len(),
                habit.best_streak,
                if state.checked_in_today {
                    "checked in today"
                } else {
                    "not checked in today"
                }
            );
            if let Some(day) = state.editable_day() {
                let _ = writeln!(out, "Day {} is open for check-in", day);
            }
        }
        None => {
            let _ = writeln!(out, "No habit yet. Start one with `xeffect create <name>`.");
        }
    }

    let _ = write!(out, "[{}]", render_boxes(&state.boxes));

    if let Some(ai) = &state.ai {
        let _ = write!(out, "\nDay {}: {}", ai.milestone_day.day(), ai.message);
    }

    out
}

/// Summary of a bare engine result.
pub fn render_engine(result: &EngineResult) -> String {
    format!(
        "streak {}  {}\n[{}]",
        result.current_streak,
        if result.checked_in_today {
            "checked in today"
        } else {
            "not checked in today"
        },
        render_boxes(&result.boxes)
    )
}
