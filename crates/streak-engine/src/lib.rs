//! # streak-engine
//!
//! Streak and progress-grid derivation for 21-day habit cycles.
//!
//! The engine is a pure function of its inputs: "today", "yesterday", the set
//! of days with a recorded check-in, and whether the cycle is already finished.
//! It never reads the clock or touches storage; callers supply dates through a
//! [`DateSource`] and persist whatever the result implies.
//!
//! ## Modules
//!
//! - [`CalendarDate`] - the one canonical UTC `YYYY-MM-DD` date type
//! - [`compute_engine_state`] - check-in status, capped streak and the 21 boxes

mod date;
mod engine;

pub use date::{CalendarDate, DateError, DateSource, FixedClock, SystemClock};
pub use engine::{
    build_boxes, compute_current_streak, compute_engine_state, has_checkin_on, DayBox,
    EngineInput, EngineResult, CYCLE_DAYS,
};
