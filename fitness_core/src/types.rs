//! Core domain types for fittrack.
//!
//! This module defines the fundamental types used throughout the system:
//! - Rep and load prescriptions (numeric or free text)
//! - Exercise specs and workout plans
//! - Pending and completed workout records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Prescription Values
// ============================================================================

/// Repetition target for an exercise
///
/// Stored either as a plain count or as text such as `"10"` or `"8-12"`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Reps {
    Count(u32),
    Text(String),
}

impl Reps {
    /// Average number of reps this prescription represents
    ///
    /// A `"low-high"` range averages its two bounds. Anything that is not a
    /// single number or exactly two hyphen-separated numbers yields 0.
    pub fn average(&self) -> f64 {
        match self {
            Reps::Count(n) => f64::from(*n),
            Reps::Text(text) => parse_reps_text(text),
        }
    }
}

impl Default for Reps {
    fn default() -> Self {
        Reps::Count(0)
    }
}

impl fmt::Display for Reps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reps::Count(n) => write!(f, "{}", n),
            Reps::Text(text) => f.write_str(text),
        }
    }
}

fn parse_reps_text(text: &str) -> f64 {
    let parts: Vec<&str> = text.split('-').map(str::trim).collect();
    match parts.as_slice() {
        [single] => single.parse::<u32>().map(f64::from).unwrap_or(0.0),
        [low, high] => match (low.parse::<u32>(), high.parse::<u32>()) {
            (Ok(low), Ok(high)) => (f64::from(low) + f64::from(high)) / 2.0,
            _ => 0.0,
        },
        _ => {
            tracing::debug!("Unrecognised rep prescription {:?}, counting as 0", text);
            0.0
        }
    }
}

/// Load used for an exercise
///
/// Kilograms, or a text token such as `"Bodyweight"`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Load {
    Kg(f64),
    Text(String),
}

impl Load {
    pub const BODYWEIGHT: &'static str = "Bodyweight";

    pub fn bodyweight() -> Self {
        Load::Text(Self::BODYWEIGHT.into())
    }

    /// Weight in kilograms that counts toward lifted totals
    ///
    /// Non-numeric text (including `"Bodyweight"`), negative and non-finite
    /// values all count as 0.
    pub fn kilograms(&self) -> f64 {
        let value = match self {
            Load::Kg(kg) => *kg,
            Load::Text(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        };
        if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        }
    }
}

impl fmt::Display for Load {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Load::Kg(kg) => write!(f, "{} kg", kg),
            Load::Text(text) => f.write_str(text),
        }
    }
}

// ============================================================================
// Plan Types
// ============================================================================

/// Kind of workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
    Strength,
    Cardio,
    Hiit,
    Yoga,
    Flexibility,
    Meditation,
    Other(String),
}

/// Overall effort of a workout
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    #[default]
    Moderate,
    High,
}

/// One exercise within a plan; immutable once a session starts
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSpec {
    pub name: String,
    pub target_sets: u32,
    pub target_reps: Reps,
    #[serde(default)]
    pub target_weight: Option<Load>,
    #[serde(default)]
    pub target_duration_seconds: Option<u32>,
    /// Rest after a set; zero or negative means no rest, unset uses the configured default
    #[serde(default)]
    pub rest_seconds: Option<i32>,
    #[serde(default)]
    pub order: u32,
}

impl ExerciseSpec {
    /// Weight moved by a single set at the prescribed reps and load
    pub fn weight_per_set(&self) -> f64 {
        let kg = self
            .target_weight
            .as_ref()
            .map(Load::kilograms)
            .unwrap_or(0.0);
        kg * self.target_reps.average()
    }
}

/// A workout template made of ordered exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutPlan {
    pub id: String,
    pub title: String,
    pub workout_type: WorkoutType,
    #[serde(default)]
    pub intensity: Intensity,
    #[serde(default)]
    pub target_duration_minutes: Option<u32>,
    #[serde(default)]
    pub estimated_calories: Option<f64>,
    pub exercises: Vec<ExerciseSpec>,
}

impl WorkoutPlan {
    /// Check the plan for problems that would make a session meaningless
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("Plan has an empty id".to_string());
        }

        if self.exercises.is_empty() {
            errors.push(format!("Plan '{}' has no exercises", self.id));
        }

        for exercise in &self.exercises {
            if exercise.name.trim().is_empty() {
                errors.push(format!("Plan '{}': exercise with empty name", self.id));
            }
            if exercise.target_sets == 0 {
                errors.push(format!(
                    "Plan '{}': exercise '{}' has zero target sets",
                    self.id, exercise.name
                ));
            }
        }

        errors
    }

    /// Exercises in execution order
    pub fn ordered_exercises(&self) -> Vec<ExerciseSpec> {
        let mut exercises = self.exercises.clone();
        exercises.sort_by_key(|e| e.order);
        exercises
    }
}

// ============================================================================
// Workout Records
// ============================================================================

/// Outcome of one exercise in a finished workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseResult {
    pub name: String,
    #[serde(default)]
    pub sets_completed: u32,
    #[serde(default)]
    pub reps: Reps,
    #[serde(default)]
    pub weight: Option<Load>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

fn default_true() -> bool {
    true
}

/// A finished workout that has not been stored yet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PendingWorkout {
    pub plan_id: Option<String>,
    pub title: String,
    pub workout_type: WorkoutType,
    pub intensity: Intensity,
    pub duration_minutes: u32,
    pub calories: Option<f64>,
    pub exercises: Vec<ExerciseResult>,
    pub total_weight: Option<f64>,
    pub all_sets_completed: bool,
    pub completed_at: DateTime<Utc>,
}

impl PendingWorkout {
    /// Attach the identifier assigned by the store
    pub fn into_completed(self, id: Uuid) -> CompletedWorkout {
        CompletedWorkout {
            id,
            plan_id: self.plan_id,
            title: self.title,
            workout_type: self.workout_type,
            intensity: self.intensity,
            duration_minutes: self.duration_minutes,
            calories: self.calories,
            exercises: self.exercises,
            total_weight: self.total_weight,
            all_sets_completed: self.all_sets_completed,
            completed_at: self.completed_at,
        }
    }
}

/// The durable, append-only record of a finished workout
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedWorkout {
    pub id: Uuid,
    #[serde(default)]
    pub plan_id: Option<String>,
    pub title: String,
    pub workout_type: WorkoutType,
    #[serde(default)]
    pub intensity: Intensity,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub exercises: Vec<ExerciseResult>,
    #[serde(default)]
    pub total_weight: Option<f64>,
    #[serde(default = "default_true")]
    pub all_sets_completed: bool,
    pub completed_at: DateTime<Utc>,
}
