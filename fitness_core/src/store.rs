//! Persistence collaborators for workout records and achievement unlocks.
//!
//! The core only talks to the traits defined here. The bundled
//! implementations append JSON lines to per-user files with file locking so
//! that concurrent processes never interleave partial lines.
//!
//! Layout under the data directory:
//! ```text
//! users/<user>/workouts.jsonl
//! users/<user>/unlocks.jsonl
//! users/<user>/sessions/<plan>.json
//! plans/<plan>.toml | <plan>.json
//! ```

use crate::achievements::UnlockRecord;
use crate::{CompletedWorkout, Error, PendingWorkout, Result, WorkoutPlan};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Read access to workout plans
pub trait PlanSource {
    fn fetch_plan(&self, id: &str) -> Result<Option<WorkoutPlan>>;
}

/// Append-only log of completed workouts per user
pub trait WorkoutLog {
    /// Store a finished workout and return it with its assigned id
    fn append(&mut self, user: &str, workout: PendingWorkout) -> Result<CompletedWorkout>;

    /// Every stored workout for `user`, in no particular order
    fn fetch_all(&self, user: &str) -> Result<Vec<CompletedWorkout>>;
}

/// Record of achievement tiers already unlocked per user
pub trait UnlockStore {
    fn fetch_unlocks(&self, user: &str) -> Result<Vec<UnlockRecord>>;

    /// Persist an unlock; returns `false` if that (type, tier) was already recorded
    fn record_unlock(&mut self, user: &str, unlock: &UnlockRecord) -> Result<bool>;
}

/// Directory for one user's files
///
/// User names become path components, so only ASCII letters, digits, `-`,
/// `_` and `.` are accepted.
pub fn user_dir(data_dir: &Path, user: &str) -> Result<PathBuf> {
    let valid = !user.is_empty()
        && user != "."
        && user != ".."
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(Error::InvalidUser(format!("{:?}", user)));
    }
    Ok(data_dir.join("users").join(user))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Append one JSON line under an exclusive lock
fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;

    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    file.lock_exclusive()?;

    let line = serde_json::to_string(value)?;
    let result = (|| -> Result<()> {
        // A crash mid-append leaves a line without its newline; start fresh.
        let needs_newline = ends_without_newline(&file)?;
        let mut writer = std::io::BufWriter::new(&file);
        if needs_newline {
            writer.write_all(b"\n")?;
        }
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    })();
    let synced = result.and_then(|_| file.sync_all().map_err(Error::from));

    file.unlock()?;
    synced
}

fn ends_without_newline(mut file: &File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Parse one JSON value per line, skipping lines that do not parse
///
/// Lines are read as raw bytes so that invalid UTF-8 only costs that line.
fn parse_lines<T: DeserializeOwned, R: BufRead>(mut reader: R, path: &Path) -> Result<Vec<T>> {
    let mut values = Vec::new();
    let mut line = Vec::new();
    let mut line_num = 0;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_num += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<T>(&line) {
            Ok(value) => values.push(value),
            Err(e) => {
                tracing::warn!(
                    "Skipping unreadable line {} in {:?}: {}",
                    line_num,
                    path,
                    e
                );
            }
        }
    }
    Ok(values)
}

/// Report a failed read or write of a store file as a storage failure
fn storage_failure(action: &str, path: &Path, err: Error) -> Error {
    match err {
        Error::Storage(_) => err,
        other => Error::Storage(format!("failed to {} {:?}: {}", action, path, other)),
    }
}

/// Read every parseable JSON line under a shared lock
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;
    let values = parse_lines(BufReader::new(&file), path);
    file.unlock()?;
    values
}

/// JSONL-backed workout log
pub struct JsonlWorkoutLog {
    data_dir: PathBuf,
}

impl JsonlWorkoutLog {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, user: &str) -> Result<PathBuf> {
        Ok(user_dir(&self.data_dir, user)?.join("workouts.jsonl"))
    }
}

impl WorkoutLog for JsonlWorkoutLog {
    fn append(&mut self, user: &str, workout: PendingWorkout) -> Result<CompletedWorkout> {
        let path = self.path_for(user)?;
        let record = workout.into_completed(Uuid::new_v4());
        append_line(&path, &record).map_err(|e| storage_failure("append to", &path, e))?;
        tracing::info!("Appended workout {} for user '{}'", record.id, user);
        Ok(record)
    }

    fn fetch_all(&self, user: &str) -> Result<Vec<CompletedWorkout>> {
        let path = self.path_for(user)?;
        let records: Vec<CompletedWorkout> =
            read_lines(&path).map_err(|e| storage_failure("read", &path, e))?;
        tracing::debug!("Read {} workouts from {:?}", records.len(), path);
        Ok(records)
    }
}

/// JSONL-backed unlock records, one line per (type, tier)
pub struct JsonlUnlockStore {
    data_dir: PathBuf,
}

impl JsonlUnlockStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, user: &str) -> Result<PathBuf> {
        Ok(user_dir(&self.data_dir, user)?.join("unlocks.jsonl"))
    }
}

impl UnlockStore for JsonlUnlockStore {
    fn fetch_unlocks(&self, user: &str) -> Result<Vec<UnlockRecord>> {
        let path = self.path_for(user)?;
        read_lines(&path).map_err(|e| storage_failure("read", &path, e))
    }

    fn record_unlock(&mut self, user: &str, unlock: &UnlockRecord) -> Result<bool> {
        let path = self.path_for(user)?;
        record_unlock_at(&path, user, unlock)
            .map_err(|e| storage_failure("record unlock in", &path, e))
    }
}

fn record_unlock_at(path: &Path, user: &str, unlock: &UnlockRecord) -> Result<bool> {
    ensure_parent_dir(path)?;

    // Check and append under one exclusive lock so two writers cannot
    // both record the same tier.
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    file.lock_exclusive()?;

    let result = (|| -> Result<bool> {
        let existing: Vec<UnlockRecord> = parse_lines(BufReader::new(&file), path)?;
        if existing
            .iter()
            .any(|r| r.achievement == unlock.achievement && r.tier == unlock.tier)
        {
            tracing::debug!(
                "Unlock {} {} already recorded for '{}'",
                unlock.achievement,
                unlock.tier,
                user
            );
            return Ok(false);
        }

        let needs_newline = ends_without_newline(&file)?;
        let mut writer = std::io::BufWriter::new(&file);
        if needs_newline {
            writer.write_all(b"\n")?;
        }
        writer.write_all(serde_json::to_string(unlock)?.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        Ok(true)
    })();

    file.unlock()?;
    if let Ok(true) = result {
        tracing::info!(
            "Recorded unlock {} {} for '{}'",
            unlock.achievement,
            unlock.tier,
            user
        );
    }
    result
}
