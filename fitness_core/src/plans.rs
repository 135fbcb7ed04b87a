//! Built-in workout plans and the plan library.
//!
//! The library serves user-authored plans from `plans/<id>.toml` or
//! `plans/<id>.json` under the data directory, falling back to the built-in
//! plans below. A user plan with the same id as a built-in one wins.

use crate::store::PlanSource;
use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Cached built-in plans, keyed by id
static BUILTIN_PLANS: Lazy<BTreeMap<String, WorkoutPlan>> = Lazy::new(build_builtin_plans);

/// Get a reference to the cached built-in plans
pub fn builtin_plans() -> &'static BTreeMap<String, WorkoutPlan> {
    &BUILTIN_PLANS
}

fn exercise(
    order: u32,
    name: &str,
    sets: u32,
    reps: Reps,
    weight: Option<Load>,
    rest_seconds: Option<i32>,
) -> ExerciseSpec {
    ExerciseSpec {
        name: name.into(),
        target_sets: sets,
        target_reps: reps,
        target_weight: weight,
        target_duration_seconds: None,
        rest_seconds,
        order,
    }
}

fn build_builtin_plans() -> BTreeMap<String, WorkoutPlan> {
    let plans = vec![
        WorkoutPlan {
            id: "full_body_strength".into(),
            title: "Full Body Strength".into(),
            workout_type: WorkoutType::Strength,
            intensity: Intensity::Moderate,
            target_duration_minutes: Some(45),
            estimated_calories: None,
            exercises: vec![
                exercise(0, "Squats", 3, Reps::Count(10), Some(Load::Kg(50.0)), Some(90)),
                exercise(1, "Bench Press", 3, Reps::Text("8-12".into()), Some(Load::Kg(40.0)), Some(90)),
                exercise(2, "Bent-over Rows", 3, Reps::Count(10), Some(Load::Kg(35.0)), Some(60)),
                exercise(3, "Push-ups", 2, Reps::Count(15), Some(Load::bodyweight()), Some(45)),
            ],
        },
        WorkoutPlan {
            id: "upper_push".into(),
            title: "Upper Body Push".into(),
            workout_type: WorkoutType::Strength,
            intensity: Intensity::High,
            target_duration_minutes: Some(40),
            estimated_calories: None,
            exercises: vec![
                exercise(0, "Overhead Press", 4, Reps::Text("6-8".into()), Some(Load::Kg(30.0)), Some(120)),
                exercise(1, "Incline Dumbbell Press", 3, Reps::Text("8-12".into()), Some(Load::Kg(18.0)), Some(90)),
                exercise(2, "Dips", 3, Reps::Count(10), Some(Load::bodyweight()), Some(60)),
            ],
        },
        WorkoutPlan {
            id: "hiit_circuit".into(),
            title: "HIIT Circuit".into(),
            workout_type: WorkoutType::Hiit,
            intensity: Intensity::High,
            target_duration_minutes: Some(20),
            estimated_calories: Some(260.0),
            exercises: vec![
                ExerciseSpec {
                    target_duration_seconds: Some(40),
                    ..exercise(0, "Burpees", 4, Reps::Count(12), None, Some(20))
                },
                ExerciseSpec {
                    target_duration_seconds: Some(40),
                    ..exercise(1, "Mountain Climbers", 4, Reps::Count(30), None, Some(20))
                },
                ExerciseSpec {
                    target_duration_seconds: Some(40),
                    ..exercise(2, "Jump Squats", 4, Reps::Count(15), None, Some(20))
                },
            ],
        },
        WorkoutPlan {
            id: "morning_yoga".into(),
            title: "Morning Yoga Flow".into(),
            workout_type: WorkoutType::Yoga,
            intensity: Intensity::Low,
            target_duration_minutes: Some(25),
            estimated_calories: None,
            exercises: vec![
                ExerciseSpec {
                    target_duration_seconds: Some(60),
                    ..exercise(0, "Sun Salutation", 3, Reps::Count(1), None, Some(0))
                },
                ExerciseSpec {
                    target_duration_seconds: Some(90),
                    ..exercise(1, "Warrior Sequence", 2, Reps::Count(1), None, Some(0))
                },
            ],
        },
        WorkoutPlan {
            id: "mindful_breathing".into(),
            title: "Mindful Breathing".into(),
            workout_type: WorkoutType::Meditation,
            intensity: Intensity::Low,
            target_duration_minutes: Some(10),
            estimated_calories: Some(15.0),
            exercises: vec![ExerciseSpec {
                target_duration_seconds: Some(600),
                ..exercise(0, "Box Breathing", 1, Reps::Count(1), None, Some(0))
            }],
        },
    ];

    plans.into_iter().map(|p| (p.id.clone(), p)).collect()
}

/// Parse a plan file by extension (`.toml` or `.json`) and validate it
pub fn load_plan_file(path: &Path) -> Result<WorkoutPlan> {
    let contents = std::fs::read_to_string(path)?;
    let plan: WorkoutPlan = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        _ => toml::from_str(&contents)?,
    };

    let errors = plan.validate();
    if !errors.is_empty() {
        return Err(Error::PlanValidation(format!(
            "{:?}: {}",
            path,
            errors.join("; ")
        )));
    }
    Ok(plan)
}

/// Built-in plans plus user plan files
pub struct PlanLibrary {
    plans_dir: PathBuf,
}

impl PlanLibrary {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            plans_dir: data_dir.join("plans"),
        }
    }

    fn user_plan_path(&self, id: &str) -> Option<PathBuf> {
        ["toml", "json"]
            .iter()
            .map(|ext| self.plans_dir.join(format!("{}.{}", id, ext)))
            .find(|p| p.is_file())
    }

    /// All available plans sorted by id; unreadable user plans are skipped
    pub fn list(&self) -> Result<Vec<WorkoutPlan>> {
        let mut plans: BTreeMap<String, WorkoutPlan> = builtin_plans().clone();

        if self.plans_dir.is_dir() {
            for entry in std::fs::read_dir(&self.plans_dir)? {
                let path = entry?.path();
                let is_plan_file = matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("toml") | Some("json")
                );
                if !is_plan_file {
                    continue;
                }
                match load_plan_file(&path) {
                    Ok(plan) => {
                        plans.insert(plan.id.clone(), plan);
                    }
                    Err(e) => tracing::warn!("Skipping plan file {:?}: {}", path, e),
                }
            }
        }

        Ok(plans.into_values().collect())
    }
}

impl PlanSource for PlanLibrary {
    fn fetch_plan(&self, id: &str) -> Result<Option<WorkoutPlan>> {
        // Ids become file names; anything path-like cannot be a user plan.
        let path_safe = !id.is_empty() && !id.contains(['/', '\\']) && !id.starts_with('.');
        if path_safe {
            if let Some(path) = self.user_plan_path(id) {
                let plan = load_plan_file(&path)?;
                tracing::debug!("Loaded plan '{}' from {:?}", id, path);
                return Ok(Some(plan));
            }
        }
        Ok(builtin_plans().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_plans_validate() {
        for plan in builtin_plans().values() {
            let errors = plan.validate();
            assert!(errors.is_empty(), "Plan {} invalid: {:?}", plan.id, errors);
        }
        assert_eq!(builtin_plans().len(), 5);
    }

    #[test]
    fn test_builtin_plans_cover_types() {
        let types: std::collections::HashSet<_> =
            builtin_plans().values().map(|p| &p.workout_type).collect();
        assert!(types.contains(&WorkoutType::Strength));
        assert!(types.contains(&WorkoutType::Meditation));
    }

    #[test]
    fn test_fetch_builtin_and_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let library = PlanLibrary::new(temp_dir.path());

        let plan = library.fetch_plan("full_body_strength").unwrap().unwrap();
        assert_eq!(plan.exercises[0].name, "Squats");
        assert!(library.fetch_plan("no_such_plan").unwrap().is_none());
        assert!(library.fetch_plan("../etc/passwd").unwrap().is_none());
    }

    #[test]
    fn test_user_toml_plan() {
        let temp_dir = tempfile::tempdir().unwrap();
        let plans_dir = temp_dir.path().join("plans");
        std::fs::create_dir_all(&plans_dir).unwrap();
        std::fs::write(
            plans_dir.join("leg_day.toml"),
            r#"
id = "leg_day"
title = "Leg Day"
workout_type = "strength"
intensity = "high"

[[exercises]]
name = "Squats"
target_sets = 3
target_reps = 10
target_weight = 50
rest_seconds = 0

[[exercises]]
name = "Lunges"
target_sets = 3
target_reps = "8-12"
target_weight = "Bodyweight"
order = 1
"#,
        )
        .unwrap();

        let library = PlanLibrary::new(temp_dir.path());
        let plan = library.fetch_plan("leg_day").unwrap().unwrap();
        assert_eq!(plan.exercises.len(), 2);
        assert_eq!(plan.exercises[0].target_weight, Some(Load::Kg(50.0)));
        assert_eq!(plan.exercises[1].target_reps, Reps::Text("8-12".into()));

        let listed = library.list().unwrap();
        assert_eq!(listed.len(), 6);
    }

    #[test]
    fn test_invalid_user_plan_errors_on_fetch_and_skipped_on_list() {
        let temp_dir = tempfile::tempdir().unwrap();
        let plans_dir = temp_dir.path().join("plans");
        std::fs::create_dir_all(&plans_dir).unwrap();
        std::fs::write(
            plans_dir.join("broken.json"),
            r#"{"id":"broken","title":"Broken","workout_type":"cardio","exercises":[]}"#,
        )
        .unwrap();

        let library = PlanLibrary::new(temp_dir.path());
        assert!(matches!(
            library.fetch_plan("broken"),
            Err(Error::PlanValidation(_))
        ));
        assert_eq!(library.list().unwrap().len(), 5);
    }
}
