//! Install journal
//!
//! Append-only JSON-lines record of every copy, undo, redo and delete, one
//! file per local day (`dd-mm-YYYY.log`) in the log directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

use crate::error::DeskError;
use crate::transfer::TransferAction;

/// Journaled action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    Copy,
    Undo,
    Redo,
    Delete,
}

/// One journal line
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Local>,
    pub action: JournalAction,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Employee full name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Error kind and message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JournalEntry {
    pub fn new(action: JournalAction) -> Self {
        Self {
            timestamp: Local::now(),
            action,
            success: true,
            client: None,
            employee: None,
            source: None,
            destination: None,
            detail: None,
        }
    }

    /// Entry describing `transfer`.
    pub fn for_transfer(action: JournalAction, transfer: &TransferAction) -> Self {
        let mut entry = Self::new(action);
        entry.client = Some(transfer.client.clone());
        entry.employee = Some(transfer.employee.full_name());
        entry.source = Some(transfer.source.clone());
        entry.destination = Some(transfer.destination.clone());
        entry
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_employee(mut self, employee: impl Into<String>) -> Self {
        self.employee = Some(employee.into());
        self
    }

    /// Mark as failed with `error`.
    pub fn failed(mut self, error: &DeskError) -> Self {
        self.success = false;
        self.detail = Some(format!("{}: {}", error.kind(), error));
        self
    }
}

/// Daily JSON-lines journal
#[derive(Debug, Clone)]
pub struct InstallJournal {
    dir: Option<PathBuf>,
}

impl InstallJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Journal that records nothing
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn from_dir(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::new(dir),
            None => Self::disabled(),
        }
    }

    /// Journal file for the given day
    pub fn file_for(&self, day: DateTime<Local>) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", day.format("%d-%m-%Y"))))
    }

    /// Append `entry`; failures are logged, never returned.
    pub fn record(&self, entry: &JournalEntry) {
        let Some(path) = self.file_for(entry.timestamp) else {
            return;
        };
        if let Err(e) = append_line(&path, entry) {
            warn!(path = %path.display(), "Install journal write failed: {}", e);
        }
    }
}

fn append_line(path: &Path, entry: &JournalEntry) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(entry)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_record_appends_lines() {
        let tmp = TempDir::new().unwrap();
        let journal = InstallJournal::new(tmp.path().join("logs"));

        let ok = JournalEntry::new(JournalAction::Delete).with_destination("/crypto/acme");
        let failed = JournalEntry::new(JournalAction::Undo)
            .failed(&DeskError::NotFound("/crypto/acme".into()));
        journal.record(&ok);
        journal.record(&failed);

        let path = journal.file_for(ok.timestamp).unwrap();
        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["action"], "delete");
        assert_eq!(lines[0]["success"], true);
        assert_eq!(lines[1]["success"], false);
        assert!(lines[1]["detail"].as_str().unwrap().starts_with("not_found"));
    }

    #[test]
    fn test_file_name_is_daily() {
        let journal = InstallJournal::new("/var/log/certdesk");
        let day = Local.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).unwrap();
        assert_eq!(
            journal.file_for(day).unwrap(),
            PathBuf::from("/var/log/certdesk/07-03-2025.log")
        );
    }

    #[test]
    fn test_disabled_journal_writes_nothing() {
        let journal = InstallJournal::disabled();
        assert!(journal.file_for(Local::now()).is_none());
        journal.record(&JournalEntry::new(JournalAction::Copy));
    }
}
