//! One-slot undo/redo of the last certificate copy.

use tracing::info;

use crate::error::{DeskError, DeskResult};
use crate::store::ClientCertificateStore;
use crate::transfer::TransferAction;

/// History state. Exactly one action is held in the non-empty states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HistoryState {
    #[default]
    Empty,
    UndoAvailable(TransferAction),
    RedoAvailable(TransferAction),
}

#[derive(Debug, Default)]
pub struct ActionHistory {
    state: HistoryState,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.state, HistoryState::UndoAvailable(_))
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.state, HistoryState::RedoAvailable(_))
    }

    /// Remember a successful copy, discarding any pending redo.
    pub fn record_success(&mut self, action: TransferAction) {
        self.state = HistoryState::UndoAvailable(action);
    }

    /// Remove the last copied bundle.
    ///
    /// On failure the state is left as it was, so the undo can be retried.
    pub fn undo(&mut self, store: &ClientCertificateStore) -> DeskResult<TransferAction> {
        let HistoryState::UndoAvailable(action) = &self.state else {
            return Err(DeskError::NothingToUndo);
        };

        store.delete_certificate(&action.destination)?;
        let action = action.clone();
        info!(destination = %action.destination.display(), "Copy undone");
        self.state = HistoryState::RedoAvailable(action.clone());
        Ok(action)
    }

    /// Copy the undone bundle again.
    ///
    /// On failure (e.g. the destination was repopulated meanwhile) the state
    /// is left as it was.
    pub fn redo(&mut self, store: &ClientCertificateStore) -> DeskResult<TransferAction> {
        let HistoryState::RedoAvailable(action) = &self.state else {
            return Err(DeskError::NothingToRedo);
        };

        store.copy_certificate(&action.source, &action.destination)?;
        let action = action.clone();
        info!(destination = %action.destination.display(), "Copy redone");
        self.state = HistoryState::UndoAvailable(action.clone());
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::employee::EmployeeRecord;
    use crate::expiry::ExpiryPolicy;
    use chrono::Local;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup(tmp: &TempDir) -> (ClientCertificateStore, TransferAction) {
        let source = tmp.path().join("primary/Acme/bundle");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("key"), "secret").unwrap();
        let destination = tmp.path().join("crypto/bundle");

        let store = ClientCertificateStore::new(
            tmp.path().join("primary"),
            tmp.path().join("archive"),
            ExpiryPolicy::default(),
        );
        store.copy_certificate(&source, &destination).unwrap();

        let action = TransferAction {
            source,
            destination,
            employee: EmployeeRecord {
                surname: "Ivanov".into(),
                given_names: "I.I.".into(),
                extension: String::new(),
                room: String::new(),
                workstation: "PC01".into(),
                username: "ivanov.i".into(),
            },
            client: "Acme".into(),
            certificate: "bundle".into(),
            timestamp: Local::now(),
        };
        (store, action)
    }

    fn read_key(dir: &Path) -> String {
        fs::read_to_string(dir.join("key")).unwrap()
    }

    #[test]
    fn test_empty_history_reports_nothing() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = setup(&tmp);
        let mut history = ActionHistory::new();

        assert_eq!(history.undo(&store), Err(DeskError::NothingToUndo));
        assert_eq!(history.redo(&store), Err(DeskError::NothingToRedo));
        assert_eq!(history.state(), &HistoryState::Empty);
    }

    #[test]
    fn test_undo_then_redo() {
        let tmp = TempDir::new().unwrap();
        let (store, action) = setup(&tmp);
        let mut history = ActionHistory::new();
        history.record_success(action.clone());
        assert!(history.can_undo());

        history.undo(&store).unwrap();
        assert!(!action.destination.exists());
        assert_eq!(history.state(), &HistoryState::RedoAvailable(action.clone()));
        assert_eq!(history.undo(&store), Err(DeskError::NothingToUndo));

        history.redo(&store).unwrap();
        assert_eq!(read_key(&action.destination), "secret");
        assert_eq!(history.state(), &HistoryState::UndoAvailable(action));
    }

    #[test]
    fn test_failed_undo_keeps_state() {
        let tmp = TempDir::new().unwrap();
        let (store, action) = setup(&tmp);
        let mut history = ActionHistory::new();
        history.record_success(action.clone());

        fs::remove_dir_all(&action.destination).unwrap();
        assert!(matches!(history.undo(&store), Err(DeskError::NotFound(_))));
        assert!(history.can_undo());
    }

    #[test]
    fn test_failed_redo_keeps_state() {
        let tmp = TempDir::new().unwrap();
        let (store, action) = setup(&tmp);
        let mut history = ActionHistory::new();
        history.record_success(action.clone());
        history.undo(&store).unwrap();

        // Something else claimed the destination meanwhile
        fs::create_dir_all(&action.destination).unwrap();
        fs::write(action.destination.join("key"), "other").unwrap();

        assert!(matches!(history.redo(&store), Err(DeskError::AlreadyExists(_))));
        assert!(history.can_redo());
        assert_eq!(read_key(&action.destination), "other");
    }

    #[test]
    fn test_new_record_clears_redo() {
        let tmp = TempDir::new().unwrap();
        let (store, action) = setup(&tmp);
        let mut history = ActionHistory::new();
        history.record_success(action.clone());
        history.undo(&store).unwrap();

        let mut next = action.clone();
        next.certificate = "other".into();
        history.record_success(next.clone());
        assert!(!history.can_redo());
        assert_eq!(history.state(), &HistoryState::UndoAvailable(next));
    }
}
