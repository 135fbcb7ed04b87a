//! CSV export of the workout log.
//!
//! One row per workout, oldest first, for use in spreadsheets.

use crate::metrics::exercise_weight_for_entry;
use crate::{CompletedWorkout, Result};
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    completed_at: String,
    title: String,
    workout_type: String,
    intensity: String,
    duration_minutes: u32,
    calories: Option<f64>,
    total_weight: Option<f64>,
    exercises: usize,
    sets_completed: u32,
    all_sets_completed: bool,
}

impl From<&CompletedWorkout> for CsvRow {
    fn from(record: &CompletedWorkout) -> Self {
        CsvRow {
            id: record.id.to_string(),
            completed_at: record.completed_at.to_rfc3339(),
            title: record.title.clone(),
            workout_type: label(&record.workout_type),
            intensity: label(&record.intensity),
            duration_minutes: record.duration_minutes,
            calories: record.calories,
            // Older records may lack a total; rebuild it from the exercises.
            total_weight: record.total_weight.or_else(|| {
                let rebuilt: f64 = record.exercises.iter().map(exercise_weight_for_entry).sum();
                (rebuilt > 0.0).then_some(rebuilt)
            }),
            exercises: record.exercises.len(),
            sets_completed: record.exercises.iter().map(|e| e.sets_completed).sum(),
            all_sets_completed: record.all_sets_completed,
        }
    }
}

/// snake_case name as used in the JSON log
fn label<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .next()
            .and_then(|(_, v)| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Write `records` to `csv_path`, replacing any existing file
///
/// Returns the number of rows written. The file is synced before returning.
pub fn export_csv(records: &[CompletedWorkout], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut sorted: Vec<&CompletedWorkout> = records.iter().collect();
    sorted.sort_by_key(|r| r.completed_at);

    let file = std::fs::File::create(csv_path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(file);

    for record in &sorted {
        writer.serialize(CsvRow::from(*record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} workouts to {:?}", sorted.len(), csv_path);
    Ok(sorted.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExerciseResult, Intensity, Load, Reps, WorkoutType};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn record(title: &str, days_ago: i64, total_weight: Option<f64>) -> CompletedWorkout {
        CompletedWorkout {
            id: Uuid::new_v4(),
            plan_id: None,
            title: title.into(),
            workout_type: WorkoutType::Other("climbing".into()),
            intensity: Intensity::High,
            duration_minutes: 45,
            calories: None,
            exercises: vec![ExerciseResult {
                name: "Deadlift".into(),
                sets_completed: 2,
                reps: Reps::Count(5),
                weight: Some(Load::Kg(100.0)),
                duration_seconds: None,
            }],
            total_weight,
            all_sets_completed: true,
            completed_at: Utc::now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn test_export_writes_sorted_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("out").join("workouts.csv");

        let records = vec![record("newer", 1, Some(1000.0)), record("older", 3, None)];
        let count = export_csv(&records, &csv_path).unwrap();
        assert_eq!(count, 2);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][2], "older");
        assert_eq!(&rows[0][3], "climbing");
        assert_eq!(&rows[0][4], "high");
        // Rebuilt from 100 kg x 2 sets x 5 reps
        assert_eq!(&rows[0][7], "1000.0");
        assert_eq!(&rows[1][2], "newer");
    }

    #[test]
    fn test_export_empty_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let csv_path = temp_dir.path().join("workouts.csv");
        assert_eq!(export_csv(&[], &csv_path).unwrap(), 0);
        assert!(csv_path.exists());
    }
}
