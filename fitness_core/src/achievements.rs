//! Achievement tiers and unlock evaluation.
//!
//! Progress is recomputed from scratch from a [`MetricsSummary`] on every
//! evaluation; nothing is counted incrementally. Unlock emission compares the
//! tiers reached against previously recorded unlocks, so running it again
//! with the same metrics emits nothing new.

use crate::metrics::MetricsSummary;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kind of accomplishment being tracked
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    WorkoutCompleted,
    Streak,
    TotalWorkouts,
    TotalExercises,
    TotalDuration,
    TotalCalories,
    WorkoutType,
    ExerciseType,
    Social,
    Meditation,
}

impl AchievementType {
    pub const ALL: [AchievementType; 10] = [
        AchievementType::WorkoutCompleted,
        AchievementType::Streak,
        AchievementType::TotalWorkouts,
        AchievementType::TotalExercises,
        AchievementType::TotalDuration,
        AchievementType::TotalCalories,
        AchievementType::WorkoutType,
        AchievementType::ExerciseType,
        AchievementType::Social,
        AchievementType::Meditation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementType::WorkoutCompleted => "workout_completed",
            AchievementType::Streak => "streak",
            AchievementType::TotalWorkouts => "total_workouts",
            AchievementType::TotalExercises => "total_exercises",
            AchievementType::TotalDuration => "total_duration",
            AchievementType::TotalCalories => "total_calories",
            AchievementType::WorkoutType => "workout_type",
            AchievementType::ExerciseType => "exercise_type",
            AchievementType::Social => "social",
            AchievementType::Meditation => "meditation",
        }
    }
}

impl fmt::Display for AchievementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Achievement level, ordered bronze < silver < gold < platinum
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        };
        f.write_str(name)
    }
}

/// One tier of an achievement
#[derive(Clone, Debug)]
pub struct TierDefinition {
    pub tier: Tier,
    pub target: f64,
    pub title: String,
    pub description: String,
    pub icon: String,
}

/// The four tiers of one achievement type, lowest first
#[derive(Clone, Debug)]
pub struct AchievementDefinition {
    pub achievement: AchievementType,
    pub tiers: Vec<TierDefinition>,
}

impl AchievementDefinition {
    /// Highest tier whose target is met by `value`
    pub fn tier_for(&self, value: f64) -> Option<Tier> {
        self.tiers
            .iter()
            .take_while(|t| t.target <= value)
            .last()
            .map(|t| t.tier)
    }

    pub fn tier(&self, tier: Tier) -> Option<&TierDefinition> {
        self.tiers.iter().find(|t| t.tier == tier)
    }
}

/// Cached achievement table - built once and reused
static DEFINITIONS: Lazy<BTreeMap<AchievementType, AchievementDefinition>> =
    Lazy::new(build_definitions);

/// The fixed achievement table
pub fn definitions() -> &'static BTreeMap<AchievementType, AchievementDefinition> {
    &DEFINITIONS
}

pub fn definition(achievement: AchievementType) -> &'static AchievementDefinition {
    // Every type is inserted by build_definitions; validate_definitions checks it.
    &DEFINITIONS[&achievement]
}

fn tiers(targets: [f64; 4], titles: [&str; 4], describe: impl Fn(f64) -> String, icon: &str) -> Vec<TierDefinition> {
    Tier::ALL
        .iter()
        .zip(targets.iter().zip(titles.iter()))
        .map(|(tier, (target, title))| TierDefinition {
            tier: *tier,
            target: *target,
            title: (*title).to_string(),
            description: describe(*target),
            icon: icon.to_string(),
        })
        .collect()
}

fn build_definitions() -> BTreeMap<AchievementType, AchievementDefinition> {
    let table = [
        (
            AchievementType::WorkoutCompleted,
            tiers(
                [1.0, 10.0, 50.0, 100.0],
                ["First Finish", "Finisher", "Closer", "Never Quits"],
                |n| format!("Complete every set of {} workouts", n),
                "✅",
            ),
        ),
        (
            AchievementType::Streak,
            tiers(
                [3.0, 7.0, 30.0, 100.0],
                ["Warming Up", "Week Warrior", "Month Master", "Unstoppable"],
                |n| format!("Work out {} days in a row", n),
                "🔥",
            ),
        ),
        (
            AchievementType::TotalWorkouts,
            tiers(
                [5.0, 25.0, 100.0, 500.0],
                ["Getting Started", "Regular", "Dedicated", "Legend"],
                |n| format!("Log {} workouts", n),
                "🏋️",
            ),
        ),
        (
            AchievementType::TotalExercises,
            tiers(
                [25.0, 100.0, 500.0, 2000.0],
                ["Mover", "Grinder", "Workhorse", "Machine"],
                |n| format!("Log {} exercises", n),
                "💪",
            ),
        ),
        (
            AchievementType::TotalDuration,
            tiers(
                [60.0, 600.0, 3000.0, 6000.0],
                ["First Hour", "Ten Hours", "Fifty Hours", "Hundred Hours"],
                |n| format!("Train for {} minutes in total", n),
                "⏱️",
            ),
        ),
        (
            AchievementType::TotalCalories,
            tiers(
                [1000.0, 10000.0, 50000.0, 100000.0],
                ["Spark", "Furnace", "Inferno", "Supernova"],
                |n| format!("Burn {} calories in total", n),
                "⚡",
            ),
        ),
        (
            AchievementType::WorkoutType,
            tiers(
                [2.0, 3.0, 5.0, 7.0],
                ["Curious", "Explorer", "All-Rounder", "Polymath"],
                |n| format!("Try {} different workout types", n),
                "🧭",
            ),
        ),
        (
            AchievementType::ExerciseType,
            tiers(
                [5.0, 15.0, 30.0, 50.0],
                ["Sampler", "Variety Seeker", "Repertoire", "Encyclopedia"],
                |n| format!("Perform {} different exercises", n),
                "📚",
            ),
        ),
        (
            AchievementType::Social,
            tiers(
                [1.0, 10.0, 50.0, 100.0],
                ["Hello World", "Motivator", "Influencer", "Community Pillar"],
                |n| format!("Share {} posts with the community", n),
                "🤝",
            ),
        ),
        (
            AchievementType::Meditation,
            tiers(
                [1.0, 10.0, 50.0, 100.0],
                ["First Breath", "Mindful", "Centered", "Zen Master"],
                |n| format!("Complete {} meditation sessions", n),
                "🧘",
            ),
        ),
    ];

    table
        .into_iter()
        .map(|(achievement, tiers)| (achievement, AchievementDefinition { achievement, tiers }))
        .collect()
}

/// Check the table: every type present with four strictly increasing tiers
pub fn validate_definitions(table: &BTreeMap<AchievementType, AchievementDefinition>) -> Vec<String> {
    let mut errors = Vec::new();

    for achievement in AchievementType::ALL {
        let Some(def) = table.get(&achievement) else {
            errors.push(format!("Achievement '{}' has no definition", achievement));
            continue;
        };
        let tiers: Vec<Tier> = def.tiers.iter().map(|t| t.tier).collect();
        if tiers != Tier::ALL {
            errors.push(format!(
                "Achievement '{}' tiers are {:?}, expected bronze..platinum",
                achievement, tiers
            ));
        }
        for pair in def.tiers.windows(2) {
            if pair[1].target <= pair[0].target {
                errors.push(format!(
                    "Achievement '{}': {} target {} is not above {} target {}",
                    achievement, pair[1].tier, pair[1].target, pair[0].tier, pair[0].target
                ));
            }
        }
    }

    errors
}

/// Counts tracked outside the workout log
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExternalCounts {
    pub social_posts: u32,
    pub meditation_sessions: u32,
}

/// Current value per achievement type; absent types count as 0
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AchievementMetrics {
    values: BTreeMap<AchievementType, f64>,
}

impl AchievementMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the derived log metrics onto achievement types
    pub fn from_summary(summary: &MetricsSummary, external: &ExternalCounts) -> Self {
        let mut metrics = Self::new();
        metrics.set(
            AchievementType::WorkoutCompleted,
            summary.fully_completed_workouts as f64,
        );
        metrics.set(AchievementType::Streak, f64::from(summary.current_streak));
        metrics.set(AchievementType::TotalWorkouts, summary.total_workouts as f64);
        metrics.set(AchievementType::TotalExercises, summary.total_exercises as f64);
        metrics.set(
            AchievementType::TotalDuration,
            summary.total_duration_minutes as f64,
        );
        metrics.set(AchievementType::TotalCalories, summary.total_calories);
        metrics.set(
            AchievementType::WorkoutType,
            summary.distinct_workout_types as f64,
        );
        metrics.set(
            AchievementType::ExerciseType,
            summary.distinct_exercises as f64,
        );
        metrics.set(AchievementType::Social, f64::from(external.social_posts));
        metrics.set(
            AchievementType::Meditation,
            summary.meditation_sessions as f64 + f64::from(external.meditation_sessions),
        );
        metrics
    }

    pub fn set(&mut self, achievement: AchievementType, value: f64) {
        self.values.insert(achievement, value);
    }

    pub fn get(&self, achievement: AchievementType) -> f64 {
        self.values
            .get(&achievement)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

/// Where one achievement type stands
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AchievementProgress {
    pub achievement: AchievementType,
    pub current: f64,
    /// Target of the next tier, or the platinum target once completed
    pub next_target: f64,
    pub tier: Option<Tier>,
    pub completed: bool,
}

/// Compute progress for every achievement type
pub fn evaluate(metrics: &AchievementMetrics) -> Vec<AchievementProgress> {
    AchievementType::ALL
        .iter()
        .map(|&achievement| {
            let def = definition(achievement);
            let current = metrics.get(achievement);
            let tier = def.tier_for(current);
            let next = def.tiers.iter().find(|t| t.target > current);
            let platinum_target = def.tiers.last().map(|t| t.target).unwrap_or(0.0);

            AchievementProgress {
                achievement,
                current,
                next_target: next.map(|t| t.target).unwrap_or(platinum_target),
                tier,
                completed: tier == Some(Tier::Platinum),
            }
        })
        .collect()
}

/// Persisted fact that a tier was reached
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UnlockRecord {
    pub achievement: AchievementType,
    pub tier: Tier,
    pub unlocked_at: DateTime<Utc>,
}

/// Event emitted when a tier is reached for the first time
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AchievementUnlocked {
    pub achievement: AchievementType,
    pub tier: Tier,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

impl AchievementUnlocked {
    pub fn to_record(&self) -> UnlockRecord {
        UnlockRecord {
            achievement: self.achievement,
            tier: self.tier,
            unlocked_at: self.unlocked_at,
        }
    }
}

/// Every (type, tier) reached by `metrics` that has no unlock record yet
///
/// Tiers below the current one are included, so each tier crossed is
/// reported exactly once over the lifetime of the unlock records.
pub fn pending_unlocks(
    metrics: &AchievementMetrics,
    existing: &[UnlockRecord],
    now: DateTime<Utc>,
) -> Vec<AchievementUnlocked> {
    let recorded: HashSet<(AchievementType, Tier)> = existing
        .iter()
        .map(|r| (r.achievement, r.tier))
        .collect();

    let mut unlocked = Vec::new();
    for achievement in AchievementType::ALL {
        let current = metrics.get(achievement);
        for tier in &definition(achievement).tiers {
            if tier.target > current {
                break;
            }
            if recorded.contains(&(achievement, tier.tier)) {
                continue;
            }
            unlocked.push(AchievementUnlocked {
                achievement,
                tier: tier.tier,
                title: tier.title.clone(),
                description: tier.description.clone(),
                icon: tier.icon.clone(),
                unlocked_at: now,
            });
        }
    }

    if !unlocked.is_empty() {
        tracing::info!("{} new achievement tiers reached", unlocked.len());
    }
    unlocked
}
