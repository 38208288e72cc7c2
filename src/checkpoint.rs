//! Append-only record of completed units (`checkpoint.csv`).
//!
//! One unit name per line, newline-terminated. Names are compared verbatim and
//! never escaped, so a name containing a newline cannot be recorded safely.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;

pub const DEFAULT_CHECKPOINT_FILE: &str = "checkpoint.csv";

#[derive(Debug)]
pub struct CheckpointLedger {
    path: PathBuf,
    completed: HashSet<String>,
    /// The store's last line was left unterminated (hand-edited file).
    needs_newline: bool,
}

impl CheckpointLedger {
    /// Read the store, creating an empty one if it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let err = |source| LedgerError { path: path.clone(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(err)?;
        }
        // Opening in append mode creates the file without touching existing content.
        OpenOptions::new().create(true).append(true).open(&path).map_err(err)?;
        let bytes = fs::read(&path).map_err(err)?;
        let needs_newline = !bytes.is_empty() && !bytes.ends_with(b"\n");

        let completed = String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect::<HashSet<_>>();
        tracing::debug!("Loaded {} completed unit(s) from {}", completed.len(), path.display());
        Ok(Self { path, completed, needs_newline })
    }

    pub fn is_complete(&self, unit: &str) -> bool {
        self.completed.contains(unit)
    }

    /// Append `unit` and sync it to disk before returning.
    pub fn mark_complete(&mut self, unit: &str) -> Result<(), LedgerError> {
        let err = |source| LedgerError { path: self.path.clone(), source };
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).map_err(err)?;
        let line = if self.needs_newline { format!("\n{unit}\n") } else { format!("{unit}\n") };
        file.write_all(line.as_bytes()).map_err(err)?;
        file.sync_data().map_err(err)?;
        self.needs_newline = false;
        self.completed.insert(unit.to_string());
        Ok(())
    }

    pub fn completed(&self) -> &HashSet<String> {
        &self.completed
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_store_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("checkpoint.csv");
        let ledger = CheckpointLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn load_trims_and_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.csv");
        fs::write(&path, "car-01\n\n  car-02 \r\ncar-01\n").unwrap();
        let ledger = CheckpointLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_complete("car-01"));
        assert!(ledger.is_complete("car-02"));
    }

    #[test]
    fn identities_compared_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.csv");
        fs::write(&path, "Car-01\n").unwrap();
        let ledger = CheckpointLedger::load(&path).unwrap();
        assert!(!ledger.is_complete("car-01"));
    }

    #[test]
    fn mark_complete_appends_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.csv");
        fs::write(&path, "old\nold\n").unwrap();
        let mut ledger = CheckpointLedger::load(&path).unwrap();
        ledger.mark_complete("粤A车辆").unwrap();
        assert!(ledger.is_complete("粤A车辆"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nold\n粤A车辆\n");

        let reloaded = CheckpointLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn unterminated_last_line_stays_separate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.csv");
        fs::write(&path, "A").unwrap();
        let mut ledger = CheckpointLedger::load(&path).unwrap();
        ledger.mark_complete("B").unwrap();
        ledger.mark_complete("C").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A\nB\nC\n");

        let reloaded = CheckpointLedger::load(&path).unwrap();
        assert!(reloaded.is_complete("A"));
        assert!(reloaded.is_complete("B"));
        assert!(reloaded.is_complete("C"));
    }

    #[test]
    fn unwritable_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let path = dir.path().join("checkpoint.csv");
        fs::create_dir(&path).unwrap();
        assert!(CheckpointLedger::load(&path).is_err());
    }
}
