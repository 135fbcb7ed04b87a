#![forbid(unsafe_code)]

//! Core domain model and business logic for fittrack.
//!
//! This crate provides:
//! - Domain types (plans, exercises, workout records)
//! - The in-progress session state machine
//! - Derived metrics over the workout log
//! - Achievement tiers and unlock evaluation
//! - Persistence (JSONL log, unlocks, resumable sessions, CSV export)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod session;
pub mod metrics;
pub mod achievements;
pub mod store;
pub mod plans;
pub mod session_file;
pub mod export;
pub mod tracker;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, RestPolicy};
pub use session::{FinishMode, Phase, Rejection, SessionEvent, SessionOutcome, SessionSettings, SessionState};
pub use metrics::MetricsSummary;
pub use achievements::{AchievementProgress, AchievementType, AchievementUnlocked, ExternalCounts, Tier};
pub use store::{JsonlUnlockStore, JsonlWorkoutLog, PlanSource, UnlockStore, WorkoutLog};
pub use plans::PlanLibrary;
pub use session_file::{SessionFile, SessionLock};
pub use tracker::{finish_and_record, refresh_achievements};
