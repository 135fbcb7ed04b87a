//! In-progress workout session state machine.
//!
//! A [`SessionState`] tracks one attempt at a [`WorkoutPlan`]:
//! - which exercise is current
//! - how many sets of each exercise are done
//! - the elapsed and rest timers, driven by one-second ticks
//! - the running total of weight moved
//!
//! Phases move `NotStarted → Active ⇄ Resting → Completed`. Pausing is an
//! orthogonal flag that freezes both timers. Every mutation goes through
//! `&mut self`, so operations on one session are applied strictly in call
//! order. Operations that would break an invariant return a [`Rejection`]
//! and leave the state untouched.

use crate::config::{CalorieConfig, Config, RestPolicy};
use crate::metrics::estimate_calories;
use crate::{Error, ExerciseResult, ExerciseSpec, PendingWorkout, Result, WorkoutPlan};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session is in its lifecycle
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Active,
    Resting,
    Completed,
}

/// Inputs to [`SessionState::apply`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    Pause,
    Resume,
    Tick,
    CompleteSet(usize),
    GoTo(usize),
    Next,
    Previous,
}

/// Why an operation was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Exercise index outside `[0, len)`
    OutOfBounds { index: usize, len: usize },
    /// Every target set of the exercise is already done
    AlreadyComplete { index: usize },
    /// The session has not been started or is already completed
    NotRunning,
    /// Finishing without force requires at least one completed set
    NothingCompleted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::OutOfBounds { index, len } => {
                write!(f, "exercise {} is out of range (0..{})", index, len)
            }
            Rejection::AlreadyComplete { index } => {
                write!(f, "all sets of exercise {} are already complete", index)
            }
            Rejection::NotRunning => f.write_str("session is not running"),
            Rejection::NothingCompleted => f.write_str("no sets have been completed"),
        }
    }
}

/// Result of applying one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// State changed
    Applied,
    /// Valid but nothing to do (e.g. ticking while paused)
    Unchanged,
    /// Refused; state is exactly as before
    Rejected(Rejection),
}

impl SessionOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, SessionOutcome::Rejected(_))
    }
}

/// How strictly `finish` treats a session with no completed sets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishMode {
    /// Refuse unless at least one set is complete
    RequireProgress,
    /// The user confirmed; finish regardless
    Force,
}

/// Session tuning captured when the session is created
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    pub default_rest_seconds: i32,
    pub rest_policy: RestPolicy,
    pub calories: CalorieConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_rest_seconds: config.session.default_rest_seconds,
            rest_policy: config.session.rest_policy,
            calories: config.calories.clone(),
        }
    }
}

/// State of one in-progress workout attempt
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    plan: WorkoutPlan,
    settings: SessionSettings,
    phase: Phase,
    current_exercise: usize,
    completed_sets: Vec<u32>,
    elapsed_seconds: u64,
    rest_remaining_seconds: u32,
    paused: bool,
    accumulated_weight: f64,
    /// Wall-clock instant the timers were last brought up to date
    #[serde(default)]
    clock: Option<DateTime<Utc>>,
}

/// Longest wall-clock gap [`SessionState::catch_up`] turns into ticks
pub const MAX_CATCH_UP_SECONDS: u64 = 4 * 60 * 60;

impl SessionState {
    /// Create a session for `plan`, with exercises in their execution order
    pub fn new(plan: &WorkoutPlan, settings: SessionSettings) -> Result<Self> {
        let errors = plan.validate();
        if !errors.is_empty() {
            return Err(Error::PlanValidation(errors.join("; ")));
        }

        let mut plan = plan.clone();
        plan.exercises = plan.ordered_exercises();
        let completed_sets = vec![0; plan.exercises.len()];

        Ok(Self {
            plan,
            settings,
            phase: Phase::NotStarted,
            current_exercise: 0,
            completed_sets,
            elapsed_seconds: 0,
            rest_remaining_seconds: 0,
            paused: false,
            accumulated_weight: 0.0,
            clock: None,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn exercises(&self) -> &[ExerciseSpec] {
        &self.plan.exercises
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_exercise(&self) -> usize {
        self.current_exercise
    }

    pub fn completed_sets(&self, index: usize) -> Option<u32> {
        self.completed_sets.get(index).copied()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn rest_remaining_seconds(&self) -> u32 {
        self.rest_remaining_seconds
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_resting(&self) -> bool {
        self.phase == Phase::Resting
    }

    pub fn accumulated_weight(&self) -> f64 {
        self.accumulated_weight
    }

    fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Active | Phase::Resting)
    }

    /// Target sets not yet done across the whole plan
    pub fn incomplete_sets(&self) -> u32 {
        self.plan
            .exercises
            .iter()
            .zip(&self.completed_sets)
            .map(|(spec, done)| spec.target_sets.saturating_sub(*done))
            .sum()
    }

    pub fn total_completed_sets(&self) -> u32 {
        self.completed_sets.iter().sum()
    }

    /// Every set is done and no rest is pending
    pub fn is_ready_to_finish(&self) -> bool {
        self.phase == Phase::Active && self.incomplete_sets() == 0
    }

    /// Tick once for every whole second of wall-clock time since the last call
    ///
    /// The first call only records `now`. Leftover fractions of a second
    /// carry over to the next call, and gaps longer than
    /// [`MAX_CATCH_UP_SECONDS`] are clamped. Returns the seconds applied.
    pub fn catch_up(&mut self, now: DateTime<Utc>) -> u64 {
        let Some(last) = self.clock else {
            self.clock = Some(now);
            return 0;
        };

        let elapsed = (now - last).num_seconds();
        if elapsed < 0 {
            tracing::warn!("Clock moved backwards by {}s; resyncing", elapsed.unsigned_abs());
            self.clock = Some(now);
            return 0;
        }
        let gap = elapsed.unsigned_abs();

        let applied = if gap > MAX_CATCH_UP_SECONDS {
            tracing::info!("Clamping {}s idle gap to {}s", gap, MAX_CATCH_UP_SECONDS);
            self.clock = Some(now);
            MAX_CATCH_UP_SECONDS
        } else {
            self.clock = Some(last + Duration::seconds(elapsed));
            gap
        };

        for _ in 0..applied {
            self.tick();
        }
        applied
    }

    // ------------------------------------------------------------------
    // Reducer
    // ------------------------------------------------------------------

    /// Apply one event, returning what happened
    pub fn apply(&mut self, event: SessionEvent) -> SessionOutcome {
        let outcome = match event {
            SessionEvent::Start => self.start(),
            SessionEvent::Pause => self.pause(),
            SessionEvent::Resume => self.resume(),
            SessionEvent::Tick => self.tick(),
            SessionEvent::CompleteSet(index) => self.complete_set(index),
            SessionEvent::GoTo(index) => self.go_to_exercise(index),
            SessionEvent::Next => self.next(),
            SessionEvent::Previous => self.previous(),
        };
        tracing::debug!("Session {:?} -> {:?} ({:?})", event, outcome, self.phase);
        outcome
    }

    pub fn start(&mut self) -> SessionOutcome {
        if self.phase != Phase::NotStarted {
            return SessionOutcome::Unchanged;
        }
        self.phase = Phase::Active;
        self.elapsed_seconds = 0;
        tracing::info!("Started session for plan '{}'", self.plan.id);
        SessionOutcome::Applied
    }

    pub fn pause(&mut self) -> SessionOutcome {
        if !self.is_running() {
            return SessionOutcome::Rejected(Rejection::NotRunning);
        }
        if self.paused {
            return SessionOutcome::Unchanged;
        }
        self.paused = true;
        SessionOutcome::Applied
    }

    pub fn resume(&mut self) -> SessionOutcome {
        if !self.is_running() {
            return SessionOutcome::Rejected(Rejection::NotRunning);
        }
        if !self.paused {
            return SessionOutcome::Unchanged;
        }
        self.paused = false;
        SessionOutcome::Applied
    }

    /// Advance timers by one second
    pub fn tick(&mut self) -> SessionOutcome {
        if self.paused {
            return SessionOutcome::Unchanged;
        }
        match self.phase {
            Phase::NotStarted | Phase::Completed => SessionOutcome::Unchanged,
            Phase::Resting => {
                self.rest_remaining_seconds = self.rest_remaining_seconds.saturating_sub(1);
                if self.rest_remaining_seconds == 0 {
                    self.end_rest();
                }
                SessionOutcome::Applied
            }
            Phase::Active => {
                self.elapsed_seconds += 1;
                SessionOutcome::Applied
            }
        }
    }

    /// Mark one more set of exercise `index` as done
    pub fn complete_set(&mut self, index: usize) -> SessionOutcome {
        if !self.is_running() {
            return SessionOutcome::Rejected(Rejection::NotRunning);
        }
        let len = self.plan.exercises.len();
        let Some(spec) = self.plan.exercises.get(index) else {
            return SessionOutcome::Rejected(Rejection::OutOfBounds { index, len });
        };
        let done = self.completed_sets[index];
        if done >= spec.target_sets {
            return SessionOutcome::Rejected(Rejection::AlreadyComplete { index });
        }

        let target_sets = spec.target_sets;
        let rest = spec.rest_seconds.unwrap_or(self.settings.default_rest_seconds);
        self.completed_sets[index] = done + 1;
        self.accumulated_weight += spec.weight_per_set();
        self.current_exercise = index;

        tracing::debug!(
            "Completed set {}/{} of '{}'",
            done + 1,
            target_sets,
            spec.name
        );

        if self.incomplete_sets() == 0 {
            // Last set of the workout: nothing to rest for.
            self.phase = Phase::Active;
            self.rest_remaining_seconds = 0;
            tracing::info!("All sets complete for plan '{}'", self.plan.id);
            return SessionOutcome::Applied;
        }

        let exercise_done = done + 1 == target_sets;
        let take_rest = match self.settings.rest_policy {
            RestPolicy::AfterEverySet => true,
            RestPolicy::BetweenExercises => exercise_done,
        };

        if take_rest {
            self.begin_rest(rest);
        } else if exercise_done {
            self.end_rest();
        }

        SessionOutcome::Applied
    }

    pub fn go_to_exercise(&mut self, index: usize) -> SessionOutcome {
        let len = self.plan.exercises.len();
        if index >= len {
            return SessionOutcome::Rejected(Rejection::OutOfBounds { index, len });
        }
        if index == self.current_exercise {
            return SessionOutcome::Unchanged;
        }
        self.current_exercise = index;
        SessionOutcome::Applied
    }

    pub fn next(&mut self) -> SessionOutcome {
        self.go_to_exercise(self.current_exercise + 1)
    }

    pub fn previous(&mut self) -> SessionOutcome {
        match self.current_exercise.checked_sub(1) {
            Some(index) => self.go_to_exercise(index),
            None => SessionOutcome::Rejected(Rejection::OutOfBounds {
                index: 0,
                len: self.plan.exercises.len(),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Finishing
    // ------------------------------------------------------------------

    /// Build the record this session would produce, without changing state
    pub fn draft_record(
        &self,
        mode: FinishMode,
        completed_at: DateTime<Utc>,
    ) -> std::result::Result<PendingWorkout, Rejection> {
        if self.phase == Phase::Completed {
            return Err(Rejection::NotRunning);
        }
        if mode == FinishMode::RequireProgress && self.total_completed_sets() == 0 {
            return Err(Rejection::NothingCompleted);
        }

        let duration_minutes = if self.elapsed_seconds > 0 {
            u32::try_from(self.elapsed_seconds / 60).unwrap_or(u32::MAX)
        } else {
            self.plan.target_duration_minutes.unwrap_or(0)
        };

        let calories = self.plan.estimated_calories.unwrap_or_else(|| {
            estimate_calories(duration_minutes, self.plan.intensity, &self.settings.calories)
        });

        let exercises = self
            .plan
            .exercises
            .iter()
            .zip(&self.completed_sets)
            .map(|(spec, done)| ExerciseResult {
                name: spec.name.clone(),
                sets_completed: *done,
                reps: spec.target_reps.clone(),
                weight: spec.target_weight.clone(),
                duration_seconds: spec.target_duration_seconds,
            })
            .collect();

        Ok(PendingWorkout {
            plan_id: Some(self.plan.id.clone()),
            title: self.plan.title.clone(),
            workout_type: self.plan.workout_type.clone(),
            intensity: self.plan.intensity,
            duration_minutes,
            calories: Some(calories),
            exercises,
            total_weight: Some(self.accumulated_weight),
            all_sets_completed: self.incomplete_sets() == 0,
            completed_at,
        })
    }

    /// Move to the terminal phase; only call once the record is stored
    pub fn mark_completed(&mut self) {
        self.phase = Phase::Completed;
        self.paused = false;
        self.rest_remaining_seconds = 0;
    }

    /// Draft the record and complete the session in one step
    pub fn finish(
        &mut self,
        mode: FinishMode,
        completed_at: DateTime<Utc>,
    ) -> std::result::Result<PendingWorkout, Rejection> {
        let record = self.draft_record(mode, completed_at)?;
        self.mark_completed();
        Ok(record)
    }

    /// Verify a deserialized session is consistent and can be resumed
    pub fn check_invariants(&self) -> Result<()> {
        if self.phase == Phase::Completed {
            return Err(Error::Session("session is already completed".into()));
        }
        if self.paused && !self.is_running() {
            return Err(Error::Session("paused flag set on a session that is not running".into()));
        }
        let len = self.plan.exercises.len();
        if self.completed_sets.len() != len {
            return Err(Error::Session(format!(
                "session tracks {} exercises but plan has {}",
                self.completed_sets.len(),
                len
            )));
        }
        if len > 0 && self.current_exercise >= len {
            return Err(Error::Session(format!(
                "current exercise {} out of range",
                self.current_exercise
            )));
        }
        for (spec, done) in self.plan.exercises.iter().zip(&self.completed_sets) {
            if *done > spec.target_sets {
                return Err(Error::Session(format!(
                    "'{}' has {} sets done but only {} targeted",
                    spec.name, done, spec.target_sets
                )));
            }
        }
        if (self.phase == Phase::Resting) != (self.rest_remaining_seconds > 0) {
            return Err(Error::Session("rest timer does not match phase".into()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rest handling
    // ------------------------------------------------------------------

    fn begin_rest(&mut self, seconds: i32) {
        if seconds <= 0 {
            self.end_rest();
            return;
        }
        self.phase = Phase::Resting;
        self.rest_remaining_seconds = seconds.unsigned_abs();
    }

    fn end_rest(&mut self) {
        self.phase = Phase::Active;
        self.rest_remaining_seconds = 0;
        if let Some(next) = self.next_incomplete_from(self.current_exercise) {
            self.current_exercise = next;
        }
    }

    /// First exercise with sets remaining, scanning forward from `start` and wrapping
    fn next_incomplete_from(&self, start: usize) -> Option<usize> {
        let len = self.plan.exercises.len();
        (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| self.completed_sets[i] < self.plan.exercises[i].target_sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Intensity, Load, Reps, WorkoutType};

    fn exercise(name: &str, sets: u32, reps: u32, weight: Option<f64>, rest: Option<i32>) -> ExerciseSpec {
        ExerciseSpec {
            name: name.into(),
            target_sets: sets,
            target_reps: Reps::Count(reps),
            target_weight: weight.map(Load::Kg),
            target_duration_seconds: None,
            rest_seconds: rest,
            order: 0,
        }
    }

    fn plan_with(exercises: Vec<ExerciseSpec>) -> WorkoutPlan {
        let exercises = exercises
            .into_iter()
            .enumerate()
            .map(|(i, mut e)| {
                e.order = i as u32;
                e
            })
            .collect();
        WorkoutPlan {
            id: "test_plan".into(),
            title: "Test Plan".into(),
            workout_type: WorkoutType::Strength,
            intensity: Intensity::Moderate,
            target_duration_minutes: Some(30),
            estimated_calories: None,
            exercises,
        }
    }

    fn started(plan: &WorkoutPlan) -> SessionState {
        let mut session = SessionState::new(plan, SessionSettings::default()).unwrap();
        assert_eq!(session.start(), SessionOutcome::Applied);
        session
    }

    fn tick_n(session: &mut SessionState, n: u32) {
        for _ in 0..n {
            session.tick();
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        crate::logging::init_test();
        let plan = plan_with(vec![exercise("Squats", 3, 10, Some(50.0), None)]);
        let mut session = SessionState::new(&plan, SessionSettings::default()).unwrap();
        assert_eq!(session.phase(), Phase::NotStarted);

        assert_eq!(session.apply(SessionEvent::Start), SessionOutcome::Applied);
        tick_n(&mut session, 5);
        assert_eq!(session.apply(SessionEvent::Start), SessionOutcome::Unchanged);
        assert_eq!(session.elapsed_seconds(), 5);
    }

    #[test]
    fn test_tick_before_start_does_nothing() {
        let plan = plan_with(vec![exercise("Squats", 3, 10, Some(50.0), None)]);
        let mut session = SessionState::new(&plan, SessionSettings::default()).unwrap();
        assert_eq!(session.tick(), SessionOutcome::Unchanged);
        assert_eq!(session.elapsed_seconds(), 0);
        assert_eq!(
            session.complete_set(0),
            SessionOutcome::Rejected(Rejection::NotRunning)
        );
    }

    #[test]
    fn test_squats_accumulate_weight_and_finish() {
        let plan = plan_with(vec![exercise("Squats", 3, 10, Some(50.0), Some(0))]);
        let mut session = started(&plan);

        for _ in 0..3 {
            assert_eq!(session.complete_set(0), SessionOutcome::Applied);
        }
        assert_eq!(session.accumulated_weight(), 1500.0);
        assert!(session.is_ready_to_finish());

        let record = session.finish(FinishMode::RequireProgress, Utc::now()).unwrap();
        assert_eq!(record.total_weight, Some(1500.0));
        assert!(record.all_sets_completed);
        assert_eq!(record.exercises[0].sets_completed, 3);
        assert_eq!(session.phase(), Phase::Completed);
    }

    #[test]
    fn test_complete_set_on_full_exercise_is_noop() {
        let plan = plan_with(vec![
            exercise("Squats", 2, 10, Some(50.0), Some(0)),
            exercise("Rows", 2, 10, Some(30.0), Some(0)),
        ]);
        let mut session = started(&plan);
        session.complete_set(0);
        session.complete_set(0);

        let before = session.clone();
        assert_eq!(
            session.complete_set(0),
            SessionOutcome::Rejected(Rejection::AlreadyComplete { index: 0 })
        );
        assert_eq!(session, before);
    }

    #[test]
    fn test_completed_sets_never_exceed_target() {
        let plan = plan_with(vec![
            exercise("A", 2, 5, Some(10.0), Some(3)),
            exercise("B", 1, 5, None, Some(0)),
            exercise("C", 3, 5, Some(20.0), None),
        ]);
        let mut session = started(&plan);

        // Deterministic pseudo-random walk over operations
        let mut seed: u64 = 0x9e37_79b9;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let roll = (seed >> 33) % 7;
            let index = ((seed >> 40) % 4) as usize;
            let event = match roll {
                0 | 1 => SessionEvent::CompleteSet(index),
                2 => SessionEvent::Tick,
                3 => SessionEvent::GoTo(index),
                4 => SessionEvent::Pause,
                5 => SessionEvent::Resume,
                _ => SessionEvent::Next,
            };
            session.apply(event);

            for (i, spec) in session.exercises().iter().enumerate() {
                assert!(session.completed_sets(i).unwrap() <= spec.target_sets);
            }
            session.check_invariants().unwrap();
        }
    }

    #[test]
    fn test_rest_between_sets_and_advance() {
        let plan = plan_with(vec![
            exercise("Bench", 2, 8, Some(60.0), Some(3)),
            exercise("Rows", 1, 8, Some(40.0), Some(3)),
        ]);
        let mut session = started(&plan);

        session.complete_set(0);
        assert_eq!(session.phase(), Phase::Resting);
        assert_eq!(session.rest_remaining_seconds(), 3);

        // Elapsed does not advance while resting
        tick_n(&mut session, 3);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.elapsed_seconds(), 0);
        // Sets remain on the same exercise, so stay on it
        assert_eq!(session.current_exercise(), 0);

        session.complete_set(0);
        assert_eq!(session.phase(), Phase::Resting);
        tick_n(&mut session, 3);
        assert_eq!(session.current_exercise(), 1);

        session.complete_set(1);
        assert_eq!(session.phase(), Phase::Active);
        assert!(session.is_ready_to_finish());
    }

    #[test]
    fn test_default_rest_when_unset() {
        let plan = plan_with(vec![exercise("Curls", 2, 12, Some(10.0), None)]);
        let mut session = started(&plan);
        session.complete_set(0);
        assert_eq!(session.rest_remaining_seconds(), 60);
    }

    #[test]
    fn test_zero_or_negative_rest_skips_resting() {
        let plan = plan_with(vec![
            exercise("A", 1, 5, None, Some(-10)),
            exercise("B", 1, 5, None, Some(0)),
            exercise("C", 1, 5, None, None),
        ]);
        let mut session = started(&plan);

        session.complete_set(0);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.current_exercise(), 1);

        session.complete_set(1);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.current_exercise(), 2);
    }

    #[test]
    fn test_between_exercises_policy() {
        let plan = plan_with(vec![
            exercise("A", 2, 5, None, Some(30)),
            exercise("B", 1, 5, None, Some(30)),
        ]);
        let settings = SessionSettings {
            rest_policy: RestPolicy::BetweenExercises,
            ..SessionSettings::default()
        };
        let mut session = SessionState::new(&plan, settings).unwrap();
        session.start();

        session.complete_set(0);
        assert_eq!(session.phase(), Phase::Active);

        session.complete_set(0);
        assert_eq!(session.phase(), Phase::Resting);
        assert_eq!(session.rest_remaining_seconds(), 30);
    }

    #[test]
    fn test_pause_freezes_timers() {
        let plan = plan_with(vec![exercise("A", 2, 5, None, Some(10))]);
        let mut session = started(&plan);
        tick_n(&mut session, 4);

        assert_eq!(session.pause(), SessionOutcome::Applied);
        tick_n(&mut session, 10);
        assert_eq!(session.elapsed_seconds(), 4);

        session.resume();
        session.complete_set(0);
        session.pause();
        tick_n(&mut session, 10);
        assert_eq!(session.rest_remaining_seconds(), 10);

        session.resume();
        tick_n(&mut session, 10);
        assert_eq!(session.phase(), Phase::Active);
    }

    #[test]
    fn test_rest_wraps_to_earlier_incomplete_exercise() {
        let plan = plan_with(vec![
            exercise("A", 1, 5, None, Some(1)),
            exercise("B", 1, 5, None, Some(1)),
            exercise("C", 1, 5, None, Some(1)),
        ]);
        let mut session = started(&plan);

        session.complete_set(2);
        session.complete_set(1);
        tick_n(&mut session, 1);
        assert_eq!(session.current_exercise(), 0);
    }

    #[test]
    fn test_navigation_bounds() {
        let plan = plan_with(vec![
            exercise("A", 1, 5, None, None),
            exercise("B", 1, 5, None, None),
        ]);
        let mut session = started(&plan);

        assert!(session.previous().is_rejected());
        assert_eq!(session.next(), SessionOutcome::Applied);
        assert_eq!(session.current_exercise(), 1);
        assert!(session.next().is_rejected());
        assert_eq!(
            session.go_to_exercise(7),
            SessionOutcome::Rejected(Rejection::OutOfBounds { index: 7, len: 2 })
        );
        assert_eq!(session.go_to_exercise(0), SessionOutcome::Applied);
        assert_eq!(session.completed_sets(0), Some(0));
    }

    #[test]
    fn test_finish_requires_progress_unless_forced() {
        let plan = plan_with(vec![exercise("A", 3, 5, Some(20.0), None)]);
        let mut session = started(&plan);

        assert_eq!(
            session.finish(FinishMode::RequireProgress, Utc::now()),
            Err(Rejection::NothingCompleted)
        );
        assert_eq!(session.phase(), Phase::Active);

        let record = session.finish(FinishMode::Force, Utc::now()).unwrap();
        assert!(!record.all_sets_completed);
        assert_eq!(record.total_weight, Some(0.0));
        assert_eq!(
            session.finish(FinishMode::Force, Utc::now()),
            Err(Rejection::NotRunning)
        );
    }

    #[test]
    fn test_early_finish_reports_incomplete() {
        let plan = plan_with(vec![
            exercise("A", 3, 5, Some(20.0), Some(0)),
            exercise("B", 2, 5, Some(20.0), Some(0)),
        ]);
        let mut session = started(&plan);
        session.complete_set(0);
        assert_eq!(session.incomplete_sets(), 4);

        let record = session.draft_record(FinishMode::RequireProgress, Utc::now()).unwrap();
        assert!(!record.all_sets_completed);
        assert_eq!(record.exercises.len(), 2);
        assert_eq!(record.exercises[1].sets_completed, 0);
        // Drafting leaves the session running
        assert_eq!(session.phase(), Phase::Active);
    }

    #[test]
    fn test_duration_rounds_down_and_falls_back_to_target() {
        let plan = plan_with(vec![exercise("A", 1, 5, None, None)]);

        let mut session = started(&plan);
        session.complete_set(0);
        let record = session.draft_record(FinishMode::Force, Utc::now()).unwrap();
        assert_eq!(record.duration_minutes, 30);

        tick_n(&mut session, 179);
        let record = session.draft_record(FinishMode::Force, Utc::now()).unwrap();
        assert_eq!(record.duration_minutes, 2);
        // 2 minutes at the moderate default rate
        assert_eq!(record.calories, Some(16.0));
    }

    #[test]
    fn test_plan_calories_take_precedence() {
        let mut plan = plan_with(vec![exercise("A", 1, 5, None, None)]);
        plan.estimated_calories = Some(250.0);
        let mut session = started(&plan);
        let record = session.finish(FinishMode::Force, Utc::now()).unwrap();
        assert_eq!(record.calories, Some(250.0));
    }

    #[test]
    fn test_new_rejects_empty_plan() {
        let plan = plan_with(vec![]);
        let result = SessionState::new(&plan, SessionSettings::default());
        assert!(matches!(result, Err(Error::PlanValidation(_))));
    }

    #[test]
    fn test_completed_or_idle_paused_sessions_are_not_resumable() {
        let plan = plan_with(vec![exercise("A", 2, 5, None, None)]);
        let mut session = started(&plan);
        session.complete_set(0);
        session.finish(FinishMode::Force, Utc::now()).unwrap();
        assert!(matches!(session.check_invariants(), Err(Error::Session(_))));

        let mut json = serde_json::to_value(SessionState::new(&plan, SessionSettings::default()).unwrap())
            .unwrap();
        json["paused"] = serde_json::json!(true);
        let idle: SessionState = serde_json::from_value(json).unwrap();
        assert!(idle.check_invariants().is_err());
    }

    #[test]
    fn test_catch_up_ticks_whole_seconds() {
        let plan = plan_with(vec![exercise("A", 2, 5, None, Some(10))]);
        let mut session = started(&plan);
        let t0 = Utc::now();

        assert_eq!(session.catch_up(t0), 0);
        assert_eq!(session.catch_up(t0 + Duration::milliseconds(1500)), 1);
        assert_eq!(session.elapsed_seconds(), 1);
        // The leftover half second is not lost
        assert_eq!(session.catch_up(t0 + Duration::milliseconds(2600)), 1);
        assert_eq!(session.elapsed_seconds(), 2);

        session.complete_set(0);
        assert_eq!(session.catch_up(t0 + Duration::seconds(7)), 5);
        assert_eq!(session.rest_remaining_seconds(), 5);
        assert_eq!(session.elapsed_seconds(), 2);
    }

    #[test]
    fn test_catch_up_respects_pause_and_clamps_gaps() {
        let plan = plan_with(vec![exercise("A", 2, 5, None, None)]);
        let mut session = started(&plan);
        let t0 = Utc::now();
        session.catch_up(t0);

        session.pause();
        assert_eq!(session.catch_up(t0 + Duration::seconds(30)), 30);
        assert_eq!(session.elapsed_seconds(), 0);
        session.resume();

        session.catch_up(t0 + Duration::days(2));
        assert_eq!(session.elapsed_seconds(), MAX_CATCH_UP_SECONDS);

        // A clock that jumps backwards resyncs without ticking
        assert_eq!(session.catch_up(t0), 0);
        assert_eq!(session.catch_up(t0 + Duration::seconds(3)), 3);
    }

    #[test]
    fn test_serde_roundtrip_preserves_state() {
        let plan = plan_with(vec![exercise("A", 3, 8, Some(40.0), Some(45))]);
        let mut session = started(&plan);
        session.complete_set(0);
        tick_n(&mut session, 5);

        let json = serde_json::to_string(&session).unwrap();
        let restored: SessionState = serde_json::from_str(&json).unwrap();
        restored.check_invariants().unwrap();
        assert_eq!(restored, session);
        assert_eq!(restored.rest_remaining_seconds(), 40);
    }
}
