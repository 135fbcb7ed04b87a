//! In-progress session persistence with file locking.
//!
//! A running session is saved to `users/<user>/sessions/<plan>.json` so it
//! can be resumed by a later process. The file is only a resume point; the
//! workout log stays the system of record.
//!
//! Read-modify-write cycles across processes are serialized by
//! [`SessionLock`], an exclusive lock on `sessions/.lock` held for the whole
//! load, apply, save (and append/remove on finish) sequence.

use crate::session::SessionState;
use crate::store::user_dir;
use crate::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Resume file for one plan's session
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(data_dir: &Path, user: &str, plan_id: &str) -> Result<Self> {
        if plan_id.is_empty() || plan_id.contains(['/', '\\']) || plan_id.starts_with('.') {
            return Err(Error::PlanValidation(format!("invalid plan id {:?}", plan_id)));
        }
        Ok(Self {
            path: sessions_dir(data_dir, user)?.join(format!("{}.json", plan_id)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the saved session with a shared lock
    ///
    /// Returns `None` if there is no file. An unreadable or inconsistent file
    /// is logged and also treated as `None`.
    pub fn load(&self) -> Result<Option<SessionState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open session file {:?}: {}", self.path, e);
                return Ok(None);
            }
        };

        file.lock_shared()?;
        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;

        if let Err(e) = read {
            tracing::warn!("Failed to read session file {:?}: {}", self.path, e);
            return Ok(None);
        }

        let session = match serde_json::from_str::<SessionState>(&contents) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Failed to parse session file {:?}: {}", self.path, e);
                return Ok(None);
            }
        };

        if let Err(e) = session.check_invariants() {
            tracing::warn!("Discarding inconsistent session {:?}: {}", self.path, e);
            return Ok(None);
        }

        tracing::debug!("Loaded session from {:?}", self.path);
        Ok(Some(session))
    }

    /// Save the session atomically
    ///
    /// Writes to a temp file in the same directory under an exclusive lock,
    /// syncs it, then renames it over the previous file.
    pub fn save(&self, session: &SessionState) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Storage("session path missing parent".into()))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(session)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved session to {:?}", self.path);
        Ok(())
    }

    /// Delete the resume file; missing files are fine
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Removed session file {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn sessions_dir(data_dir: &Path, user: &str) -> Result<PathBuf> {
    Ok(user_dir(data_dir, user)?.join("sessions"))
}

const LOCK_FILE: &str = ".lock";

/// Exclusive hold on one user's sessions, released on drop
///
/// The lock lives on a sidecar file that is never renamed, so it stays valid
/// while session files are replaced underneath it.
pub struct SessionLock {
    file: File,
}

impl SessionLock {
    /// Block until no other process holds the user's session lock
    pub fn acquire(data_dir: &Path, user: &str) -> Result<Self> {
        let dir = sessions_dir(data_dir, user)?;
        std::fs::create_dir_all(&dir)?;

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;

        tracing::debug!("Acquired session lock for '{}'", user);
        Ok(Self { file })
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release session lock: {}", e);
        }
    }
}

/// Find the user's saved session, if any
///
/// At most one session is expected; if several exist the most recently
/// modified one is returned.
pub fn find_active(data_dir: &Path, user: &str) -> Result<Option<(SessionFile, SessionState)>> {
    let dir = sessions_dir(data_dir, user)?;
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        candidates.push((modified, path));
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    for (_, path) in candidates {
        let file = SessionFile { path };
        if let Some(session) = file.load()? {
            return Ok(Some((file, session)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionSettings, SessionState};
    use crate::store::PlanSource;
    use crate::PlanLibrary;

    fn sample_session(data_dir: &Path) -> SessionState {
        let plan = PlanLibrary::new(data_dir)
            .fetch_plan("full_body_strength")
            .unwrap()
            .unwrap();
        let mut session = SessionState::new(&plan, SessionSettings::default()).unwrap();
        session.start();
        session.complete_set(0);
        session
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let session = sample_session(temp_dir.path());
        let file = SessionFile::new(temp_dir.path(), "alice", "full_body_strength").unwrap();

        file.save(&session).unwrap();
        let loaded = file.load().unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.completed_sets(0), Some(1));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(temp_dir.path(), "alice", "full_body_strength").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_session_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(temp_dir.path(), "alice", "x").unwrap();
        std::fs::create_dir_all(file.path().parent().unwrap()).unwrap();
        std::fs::write(file.path(), "{ invalid json }").unwrap();

        assert!(file.load().unwrap().is_none());
        assert!(find_active(temp_dir.path(), "alice").unwrap().is_none());
    }

    #[test]
    fn test_inconsistent_session_discarded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let session = sample_session(temp_dir.path());
        let file = SessionFile::new(temp_dir.path(), "alice", "full_body_strength").unwrap();

        let mut json: serde_json::Value = serde_json::to_value(&session).unwrap();
        json["completed_sets"][0] = serde_json::json!(99);
        std::fs::create_dir_all(file.path().parent().unwrap()).unwrap();
        std::fs::write(file.path(), json.to_string()).unwrap();

        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_atomic_save_and_remove() {
        let temp_dir = tempfile::tempdir().unwrap();
        let session = sample_session(temp_dir.path());
        let file = SessionFile::new(temp_dir.path(), "alice", "full_body_strength").unwrap();
        file.save(&session).unwrap();

        // Only the session file remains; no stray temp files
        let dir = file.path().parent().unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);

        let (found, _) = find_active(temp_dir.path(), "alice").unwrap().unwrap();
        assert_eq!(found.path(), file.path());

        file.remove().unwrap();
        assert!(!file.exists());
        file.remove().unwrap();
    }

    #[test]
    fn test_completed_session_is_not_active() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut session = sample_session(temp_dir.path());
        let file = SessionFile::new(temp_dir.path(), "alice", "full_body_strength").unwrap();

        session
            .finish(crate::FinishMode::Force, chrono::Utc::now())
            .unwrap();
        file.save(&session).unwrap();

        assert!(file.load().unwrap().is_none());
        assert!(find_active(temp_dir.path(), "alice").unwrap().is_none());
    }

    #[test]
    fn test_lock_serializes_concurrent_updates() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().to_path_buf();

        let plan = crate::WorkoutPlan {
            id: "ladder".into(),
            title: "Ladder".into(),
            workout_type: crate::WorkoutType::Strength,
            intensity: crate::Intensity::Moderate,
            target_duration_minutes: None,
            estimated_calories: None,
            exercises: vec![crate::ExerciseSpec {
                name: "Pull-ups".into(),
                target_sets: 40,
                target_reps: crate::Reps::Count(5),
                target_weight: None,
                target_duration_seconds: None,
                rest_seconds: Some(0),
                order: 0,
            }],
        };
        let mut session = SessionState::new(&plan, SessionSettings::default()).unwrap();
        session.start();
        SessionFile::new(&data_dir, "alice", "ladder")
            .unwrap()
            .save(&session)
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let data_dir = data_dir.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        let _lock = SessionLock::acquire(&data_dir, "alice").unwrap();
                        let (file, mut session) =
                            find_active(&data_dir, "alice").unwrap().unwrap();
                        assert!(!session.complete_set(0).is_rejected());
                        file.save(&session).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (_, session) = find_active(&data_dir, "alice").unwrap().unwrap();
        assert_eq!(session.completed_sets(0), Some(40));
    }

    #[test]
    fn test_invalid_plan_id_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(SessionFile::new(temp_dir.path(), "alice", "../x").is_err());
    }
}
