//! Orchestration of the session → log → metrics → achievements flow.
//!
//! These functions tie the pure components to the persistence collaborators:
//! 1. A finished session's record is appended to the workout log
//! 2. Metrics are recomputed from the full log
//! 3. Achievement tiers reached for the first time are recorded
//!
//! Nothing here retries; collaborator failures are returned to the caller.

use crate::achievements::{
    pending_unlocks, AchievementMetrics, AchievementUnlocked, ExternalCounts,
};
use crate::metrics::MetricsSummary;
use crate::session::{FinishMode, SessionState};
use crate::store::{UnlockStore, WorkoutLog};
use crate::{CompletedWorkout, Error, Result};
use chrono::{DateTime, Utc};

/// Finish `session` and store its record
///
/// The session is only marked completed after the append succeeds; if the
/// log write fails the session is left running so the caller can retry.
pub fn finish_and_record<L: WorkoutLog + ?Sized>(
    session: &mut SessionState,
    mode: FinishMode,
    user: &str,
    log: &mut L,
    now: DateTime<Utc>,
) -> Result<CompletedWorkout> {
    let pending = session
        .draft_record(mode, now)
        .map_err(|rejection| Error::Session(rejection.to_string()))?;

    if !pending.all_sets_completed {
        tracing::info!(
            "Finishing '{}' early with {} sets outstanding",
            pending.title,
            session.incomplete_sets()
        );
    }

    let stored = log.append(user, pending)?;
    session.mark_completed();
    Ok(stored)
}

/// Metrics over the user's full log
pub fn summarize<L: WorkoutLog + ?Sized>(log: &L, user: &str) -> Result<MetricsSummary> {
    let records = log.fetch_all(user)?;
    Ok(MetricsSummary::from_log(&records))
}

/// Recompute achievements and record every tier reached for the first time
///
/// Returns the newly recorded unlocks. Running it again without new
/// workouts returns an empty list.
pub fn refresh_achievements<L, U>(
    user: &str,
    log: &L,
    unlocks: &mut U,
    external: &ExternalCounts,
    now: DateTime<Utc>,
) -> Result<Vec<AchievementUnlocked>>
where
    L: WorkoutLog + ?Sized,
    U: UnlockStore + ?Sized,
{
    let summary = summarize(log, user)?;
    let metrics = AchievementMetrics::from_summary(&summary, external);
    let existing = unlocks.fetch_unlocks(user)?;

    let mut recorded = Vec::new();
    for unlock in pending_unlocks(&metrics, &existing, now) {
        if unlocks.record_unlock(user, &unlock.to_record())? {
            recorded.push(unlock);
        }
    }
    Ok(recorded)
}
