use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::model::store::GoalStore;
use crate::parse::{FormatError, WriteError, parse_goal_bytes, serialize_goals};

/// Error type for loading and saving goal files
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("{path}: {source}")]
    Format { path: PathBuf, source: FormatError },
    #[error("could not serialize goals: {0}")]
    Serialize(#[from] WriteError),
}

/// Outcome of [`GoalFile::load`]
#[derive(Debug)]
pub struct LoadReport {
    /// Records that made it into the store
    pub loaded: usize,
    /// Why loading stopped early, if it did
    pub error: Option<PersistError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a successful [`GoalFile::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed since the last load or save
    Unchanged,
    Written { records: usize },
}

/// A goal file on disk, remembered between load and save.
#[derive(Debug, Clone)]
pub struct GoalFile {
    path: PathBuf,
    backup: bool,
}

impl GoalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        GoalFile {
            path: path.into(),
            backup: true,
        }
    }

    /// Whether save copies the previous file to `<path>.bak` first
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Directory holding the file, and its recovery log
    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    /// Replace the store's contents with the records in this file.
    ///
    /// Loading keeps every record decoded before the first error. A missing
    /// file leaves the store empty and is not an error. Duplicate names
    /// after the first are dropped. The store is clean afterwards.
    pub fn load(&self, store: &mut GoalStore) -> LoadReport {
        store.reset();

        let source = match fs::read(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no goal file yet");
                return LoadReport {
                    loaded: 0,
                    error: None,
                };
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read goal file");
                return LoadReport {
                    loaded: 0,
                    error: Some(PersistError::ReadError {
                        path: self.path.clone(),
                        source: e,
                    }),
                };
            }
        };

        let parsed = parse_goal_bytes(&source);
        let mut loaded = 0;
        for goal in parsed.goals {
            match store.insert(goal) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::debug!(error = %e, "skipped record"),
            }
        }
        store.mark_clean();

        let error = parsed.error.map(|source| {
            tracing::warn!(
                path = %self.path.display(),
                line = source.line(),
                error = %source,
                loaded,
                "goal file is malformed; keeping the records read before the error"
            );
            log_recovery(
                self.dir(),
                RecoveryEntry::new(RecoveryCategory::Parser, "partial load")
                    .field("Source", self.path.display())
                    .field("Line", source.line())
                    .field("Error", &source)
                    .field("Loaded", loaded)
                    .body(parsed.unread),
            );
            PersistError::Format {
                path: self.path.clone(),
                source,
            }
        });

        if error.is_none() {
            tracing::info!(path = %self.path.display(), loaded, "goals loaded");
        }
        LoadReport { loaded, error }
    }

    /// Write the live records back, in arena order.
    ///
    /// Does nothing when the store is clean. On failure the store stays
    /// dirty.
    pub fn save(&self, store: &mut GoalStore) -> Result<SaveOutcome, PersistError> {
        if !store.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }

        if self.backup && self.path.exists() {
            let backup = self.backup_path();
            if let Err(e) = fs::copy(&self.path, &backup) {
                tracing::warn!(path = %backup.display(), error = %e, "could not write backup");
            }
        }

        let content = serialize_goals(store.active().map(|(_, g)| g))?;
        if let Err(e) = atomic_write(&self.path, content.as_bytes()) {
            tracing::warn!(path = %self.path.display(), error = %e, "save failed");
            return Err(PersistError::WriteError {
                path: self.path.clone(),
                source: e,
            });
        }

        store.mark_clean();
        let records = store.active_count();
        tracing::info!(path = %self.path.display(), records, "goals saved");
        Ok(SaveOutcome::Written { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::recovery::read_recovery_entries;
    use crate::model::goal::Goal;
    use crate::model::options::UserOptions;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn names(store: &GoalStore) -> Vec<String> {
        store.active().map(|(_, g)| g.name.clone()).collect()
    }

    fn filled_store() -> GoalStore {
        let mut store = GoalStore::new();
        store.insert(Goal::new("Sample goal", 100, 50, 0.01)).unwrap();
        store.insert(Goal::new("Create Goals app", 100, 10, 0.1)).unwrap();
        store.insert(Goal::new("Learn Rust", 80, 35, 1.5)).unwrap();
        store
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let file = GoalFile::new(tmp.path().join("goals.xml"));

        let mut store = filled_store();
        assert_eq!(
            file.save(&mut store).unwrap(),
            SaveOutcome::Written { records: 3 }
        );
        assert!(!store.is_dirty());

        let mut reloaded = GoalStore::new();
        let report = file.load(&mut reloaded);
        assert!(report.is_complete());
        assert_eq!(report.loaded, 3);
        assert!(!reloaded.is_dirty());
        assert_eq!(names(&reloaded), names(&store));
        assert_eq!(
            reloaded.active().map(|(_, g)| g.clone()).collect::<Vec<_>>(),
            store.active().map(|(_, g)| g.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let file = GoalFile::new(tmp.path().join("nope.xml"));
        let mut store = filled_store();
        let report = file.load(&mut store);
        assert_eq!(report.loaded, 0);
        assert!(report.is_complete());
        assert_eq!(store.size(), 0);

        // The path is kept for the first save
        store.insert(Goal::new("first", 1, 1, 1.0)).unwrap();
        file.save(&mut store).unwrap();
        assert!(file.path().exists());
    }

    #[test]
    fn test_save_is_noop_when_clean() {
        let tmp = TempDir::new().unwrap();
        let file = GoalFile::new(tmp.path().join("goals.xml"));
        let mut store = GoalStore::new();
        assert_eq!(file.save(&mut store).unwrap(), SaveOutcome::Unchanged);
        assert!(!file.path().exists());
    }

    #[test]
    fn test_malformed_tail_keeps_leading_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("goals.xml");
        fs::write(
            &path,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <goalkeeper>\n\
             \t<goal>\n\t\t<name>kept</name>\n\t\t<priority>1</priority>\n\t</goal>\n\
             \t<goal>\n\t\t<name>broken</name>\n\t\t<priority>high</priority>\n\t</goal>\n\
             </goalkeeper>\n",
        )
        .unwrap();

        let mut store = GoalStore::new();
        let report = GoalFile::new(&path).load(&mut store);
        assert_eq!(report.loaded, 1);
        assert!(matches!(
            report.error,
            Some(PersistError::Format {
                source: FormatError::BadValue { line: 9, .. },
                ..
            })
        ));
        assert_eq!(names(&store), vec!["kept"]);

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Parser);
        assert!(entries[0].body.contains("</goalkeeper>"));
    }

    #[test]
    fn test_out_of_range_value_stops_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("goals.xml");
        fs::write(
            &path,
            "<?xml version=\"1.0\"?>\n<goalkeeper>\n\
             <goal><name>fine</name><priority>100</priority></goal>\n\
             <goal><name>too eager</name><priority>500</priority></goal>\n\
             </goalkeeper>\n",
        )
        .unwrap();

        let mut store = GoalStore::new();
        let report = GoalFile::new(&path).load(&mut store);
        assert_eq!(report.loaded, 1);
        assert!(matches!(
            report.error,
            Some(PersistError::Format {
                source: FormatError::BadValue { line: 4, .. },
                ..
            })
        ));
        assert_eq!(names(&store), vec!["fine"]);
    }

    #[test]
    fn test_invalid_utf8_keeps_valid_head() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("goals.xml");
        let mut bytes = b"<?xml version=\"1.0\"?>\n<goalkeeper>\n\
             <goal><name>kept</name></goal>\n\
             <goal><name>Caf"
            .to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</name></goal>\n</goalkeeper>\n");
        fs::write(&path, &bytes).unwrap();

        let mut store = GoalStore::new();
        let report = GoalFile::new(&path).load(&mut store);
        assert_eq!(report.loaded, 1);
        assert!(matches!(
            report.error,
            Some(PersistError::Format {
                source: FormatError::InvalidEncoding { line: 4 },
                ..
            })
        ));
        assert_eq!(names(&store), vec!["kept"]);

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].body.starts_with("<goal><name>Caf\u{fffd}</name>"));
    }

    #[test]
    fn test_unreadable_path_is_read_error() {
        let tmp = TempDir::new().unwrap();
        // A directory where the goal file should be
        let path = tmp.path().join("goals.xml");
        fs::create_dir(&path).unwrap();

        let mut store = GoalStore::new();
        let report = GoalFile::new(&path).load(&mut store);
        assert_eq!(report.loaded, 0);
        assert!(matches!(report.error, Some(PersistError::ReadError { .. })));
    }

    #[test]
    fn test_duplicate_names_dropped_on_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("goals.xml");
        fs::write(
            &path,
            "<?xml version=\"1.0\"?>\n<goalkeeper>\n\
             <goal><name>same</name><priority>1</priority></goal>\n\
             <goal><name>same</name><priority>2</priority></goal>\n\
             </goalkeeper>\n",
        )
        .unwrap();
        let mut store = GoalStore::new();
        let report = GoalFile::new(&path).load(&mut store);
        assert!(report.is_complete());
        assert_eq!(report.loaded, 1);
        assert_eq!(store.raw(0).unwrap().priority, 1);
    }

    #[test]
    fn test_delete_save_reload() {
        let tmp = TempDir::new().unwrap();
        let file = GoalFile::new(tmp.path().join("goals.xml"));
        let mut store = filled_store();
        file.save(&mut store).unwrap();

        let opts = UserOptions::default();
        store.refresh(&opts);
        let removed = store.delete(0).unwrap();
        assert_eq!(removed.name, "Sample goal");
        file.save(&mut store).unwrap();

        let mut reloaded = GoalStore::new();
        assert_eq!(file.load(&mut reloaded).loaded, 2);
        assert_eq!(reloaded.find_name("Sample goal"), None);
        reloaded.insert(Goal::new("Sample goal", 1, 1, 1.0)).unwrap();
    }

    #[test]
    fn test_backup_holds_previous_content() {
        let tmp = TempDir::new().unwrap();
        let file = GoalFile::new(tmp.path().join("goals.xml"));
        let mut store = filled_store();
        file.save(&mut store).unwrap();
        let first = fs::read_to_string(file.path()).unwrap();
        assert!(!file.backup_path().exists());

        store.insert(Goal::new("another", 1, 1, 1.0)).unwrap();
        file.save(&mut store).unwrap();
        assert_eq!(fs::read_to_string(file.backup_path()).unwrap(), first);
        assert_eq!(
            file.backup_path().file_name().unwrap().to_str(),
            Some("goals.xml.bak")
        );
    }

    #[test]
    fn test_backup_disabled() {
        let tmp = TempDir::new().unwrap();
        let file = GoalFile::new(tmp.path().join("goals.xml")).with_backup(false);
        let mut store = filled_store();
        file.save(&mut store).unwrap();
        store.insert(Goal::new("another", 1, 1, 1.0)).unwrap();
        file.save(&mut store).unwrap();
        assert!(!file.backup_path().exists());
    }

    #[test]
    fn test_failed_save_keeps_dirty() {
        let tmp = TempDir::new().unwrap();
        // The target's directory does not exist
        let file = GoalFile::new(tmp.path().join("missing").join("goals.xml"));
        let mut store = filled_store();
        let err = file.save(&mut store).unwrap_err();
        assert!(matches!(err, PersistError::WriteError { .. }));
        assert!(store.is_dirty());
        // Only loads write to the recovery log
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
        assert!(read_recovery_entries(&tmp.path().join("missing"), None).is_empty());
    }
}
