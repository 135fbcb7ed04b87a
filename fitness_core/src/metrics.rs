//! Derived metrics over a user's workout log.
//!
//! Every function here is a pure reduction over a slice of
//! [`CompletedWorkout`] records in any order. Missing optional fields count
//! as zero and an empty log yields the identity value; nothing here fails.

use crate::config::CalorieConfig;
use crate::{CompletedWorkout, ExerciseResult, Intensity, WorkoutType};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Sum of `total_weight` across all records
pub fn total_weight_lifted(records: &[CompletedWorkout]) -> f64 {
    records.iter().map(|r| r.total_weight.unwrap_or(0.0)).sum()
}

/// Sum of workout durations in minutes
pub fn total_duration(records: &[CompletedWorkout]) -> u64 {
    records.iter().map(|r| u64::from(r.duration_minutes)).sum()
}

pub fn total_calories(records: &[CompletedWorkout]) -> f64 {
    records.iter().map(|r| r.calories.unwrap_or(0.0)).sum()
}

/// Number of exercise results logged across all workouts
pub fn total_exercises(records: &[CompletedWorkout]) -> usize {
    records.iter().map(|r| r.exercises.len()).sum()
}

/// Workouts where every target set was done
pub fn fully_completed_workouts(records: &[CompletedWorkout]) -> usize {
    records.iter().filter(|r| r.all_sets_completed).count()
}

pub fn distinct_workout_types(records: &[CompletedWorkout]) -> usize {
    records
        .iter()
        .map(|r| &r.workout_type)
        .collect::<HashSet<_>>()
        .len()
}

/// Distinct exercise names, ignoring case and surrounding whitespace
pub fn distinct_exercises(records: &[CompletedWorkout]) -> usize {
    records
        .iter()
        .flat_map(|r| &r.exercises)
        .map(|e| e.name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

/// Weight moved by one logged exercise: `weight × sets × average reps`
///
/// Bodyweight or otherwise non-numeric loads contribute 0.
pub fn exercise_weight_for_entry(exercise: &ExerciseResult) -> f64 {
    let kg = exercise.weight.as_ref().map(|w| w.kilograms()).unwrap_or(0.0);
    kg * f64::from(exercise.sets_completed) * exercise.reps.average()
}

/// Estimated calories for a workout of the given length and intensity
pub fn estimate_calories(duration_minutes: u32, intensity: Intensity, rates: &CalorieConfig) -> f64 {
    f64::from(duration_minutes) * rates.rate_for(intensity)
}

/// Calendar days (UTC) with at least one workout, oldest first
fn workout_days(records: &[CompletedWorkout]) -> BTreeSet<NaiveDate> {
    records.iter().map(|r| r.completed_at.date_naive()).collect()
}

/// Consecutive workout days ending at the most recent workout day
///
/// Several workouts on one day count once; the run stops at the first
/// missing day.
pub fn current_streak(records: &[CompletedWorkout]) -> u32 {
    let days = workout_days(records);
    let mut newest_first = days.iter().rev();
    let Some(mut latest) = newest_first.next() else {
        return 0;
    };

    let mut streak = 1;
    for day in newest_first {
        if day.succ_opt().as_ref() != Some(latest) {
            break;
        }
        streak += 1;
        latest = day;
    }
    streak
}

/// Longest run of consecutive workout days anywhere in the log
pub fn longest_streak(records: &[CompletedWorkout]) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for day in workout_days(records) {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

/// Records completed within the last `days` days, newest first
///
/// A window reaching past the representable date range covers everything
/// up to `now`.
pub fn recent(records: &[CompletedWorkout], now: DateTime<Utc>, days: i64) -> Vec<&CompletedWorkout> {
    let cutoff = Duration::try_days(days).and_then(|window| now.checked_sub_signed(window));
    let mut window: Vec<_> = records
        .iter()
        .filter(|r| r.completed_at <= now && cutoff.map_or(true, |c| r.completed_at >= c))
        .collect();
    window.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    window
}

/// Totals for one calendar day
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub workouts: u32,
    pub minutes: u64,
    pub calories: f64,
    pub weight: f64,
}

/// Per-day totals, newest day first
pub fn daily_history(records: &[CompletedWorkout]) -> Vec<DailyTotals> {
    let mut by_day: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();

    for record in records {
        let date = record.completed_at.date_naive();
        let totals = by_day.entry(date).or_insert_with(|| DailyTotals {
            date,
            workouts: 0,
            minutes: 0,
            calories: 0.0,
            weight: 0.0,
        });
        totals.workouts += 1;
        totals.minutes += u64::from(record.duration_minutes);
        totals.calories += record.calories.unwrap_or(0.0);
        totals.weight += record.total_weight.unwrap_or(0.0);
    }

    by_day.into_values().rev().collect()
}

/// Every aggregate the rest of the system needs, computed in one pass
#[derive(Clone, Debug, PartialEq, Serialize, Default)]
pub struct MetricsSummary {
    pub total_workouts: usize,
    pub fully_completed_workouts: usize,
    pub total_exercises: usize,
    pub total_weight: f64,
    pub total_duration_minutes: u64,
    pub total_calories: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub distinct_workout_types: usize,
    pub distinct_exercises: usize,
    pub meditation_sessions: usize,
}

impl MetricsSummary {
    pub fn from_log(records: &[CompletedWorkout]) -> Self {
        let summary = Self {
            total_workouts: records.len(),
            fully_completed_workouts: fully_completed_workouts(records),
            total_exercises: total_exercises(records),
            total_weight: total_weight_lifted(records),
            total_duration_minutes: total_duration(records),
            total_calories: total_calories(records),
            current_streak: current_streak(records),
            longest_streak: longest_streak(records),
            distinct_workout_types: distinct_workout_types(records),
            distinct_exercises: distinct_exercises(records),
            meditation_sessions: records
                .iter()
                .filter(|r| r.workout_type == WorkoutType::Meditation)
                .count(),
        };
        tracing::debug!("Computed metrics over {} workouts", records.len());
        summary
    }
}
