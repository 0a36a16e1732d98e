//! Desk workflow
//!
//! Ties the employee directory, client store, transfer engine, undo history
//! and install journal together. Blocking filesystem work runs on tokio's
//! blocking pool, one task per operation.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::employee::{EmployeeDirectory, EmployeeRecord};
use crate::error::{DeskError, DeskResult};
use crate::history::{ActionHistory, HistoryState};
use crate::journal::{InstallJournal, JournalAction, JournalEntry};
use crate::resolver::{Selection, check_choice};
use crate::source::SpreadsheetSource;
use crate::store::{CertificateEntry, ClientCertificateStore, ClientEntry};
use crate::transfer::{AdminShare, DestinationResolver, TransferAction, TransferEngine};

/// A request to install a client's certificate for an employee.
///
/// When a lookup is ambiguous the desk answers with the sorted candidates;
/// the caller fills in the chosen index and sends the same request again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub surname: String,
    pub client: String,
    pub enforce_expiry: bool,
    pub employee_choice: Option<usize>,
    pub client_choice: Option<usize>,
}

impl TransferRequest {
    pub fn new(surname: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            surname: surname.into(),
            client: client.into(),
            enforce_expiry: true,
            employee_choice: None,
            client_choice: None,
        }
    }

    pub fn enforce_expiry(mut self, enforce: bool) -> Self {
        self.enforce_expiry = enforce;
        self
    }

    pub fn choose_employee(mut self, index: usize) -> Self {
        self.employee_choice = Some(index);
        self
    }

    pub fn choose_client(mut self, index: usize) -> Self {
        self.client_choice = Some(index);
        self
    }
}

/// Result of [`CertDesk::transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Several employees matched; pick one and retry.
    ChooseEmployee(Vec<EmployeeRecord>),
    /// Several clients matched; pick one and retry.
    ChooseClient(Vec<ClientEntry>),
    Copied(TransferAction),
}

pub struct CertDesk {
    directory: EmployeeDirectory,
    engine: TransferEngine,
    history: Arc<Mutex<ActionHistory>>,
    journal: InstallJournal,
    operator: Option<(String, String)>,
}

impl CertDesk {
    pub fn new(directory: EmployeeDirectory, engine: TransferEngine, journal: InstallJournal) -> Self {
        Self {
            directory,
            engine,
            history: Arc::new(Mutex::new(ActionHistory::new())),
            journal,
            operator: None,
        }
    }

    /// Production wiring: spreadsheet source, admin-share destinations.
    pub fn from_config(config: &Config) -> Self {
        let directory = EmployeeDirectory::new(SpreadsheetSource::new(&config.employee_source));
        let engine = TransferEngine::new(ClientCertificateStore::from_config(config), AdminShare);
        let journal = InstallJournal::from_dir(config.log_dir.as_deref());

        let desk = Self::new(directory, engine, journal);
        if config.has_operator() {
            desk.with_operator(&config.operator_workstation, &config.operator_user)
        } else {
            desk
        }
    }

    /// Crypto store used by [`Self::remove_from_operator_store`].
    pub fn with_operator(mut self, workstation: impl Into<String>, user: impl Into<String>) -> Self {
        self.operator = Some((workstation.into(), user.into()));
        self
    }

    pub fn store(&self) -> &ClientCertificateStore {
        self.engine.store()
    }

    pub fn history_state(&self) -> HistoryState {
        self.history.lock().state().clone()
    }

    pub async fn find_employees(&self, query: &str) -> DeskResult<Vec<EmployeeRecord>> {
        let directory = self.directory.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || directory.search_by_surname(&query)).await?
    }

    pub async fn suggest_employees(&self, prefix: &str, limit: usize) -> DeskResult<Vec<String>> {
        let directory = self.directory.clone();
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || directory.suggest(&prefix, limit)).await?
    }

    pub async fn find_clients(&self, query: &str) -> DeskResult<Vec<ClientEntry>> {
        self.store().find_clients(query).await
    }

    pub async fn list_certificates(&self, client: &ClientEntry) -> DeskResult<Vec<CertificateEntry>> {
        let store = self.store().clone();
        let path = client.path.clone();
        tokio::task::spawn_blocking(move || store.list_certificates(&path)).await?
    }

    pub async fn search_certificates(
        &self,
        query: &str,
    ) -> DeskResult<Vec<(ClientEntry, CertificateEntry)>> {
        self.store().search_certificates(query).await
    }

    /// Resolve employee and client, then copy the selected certificate.
    pub async fn transfer(&self, request: &TransferRequest) -> DeskResult<TransferOutcome> {
        let surname = request.surname.trim();
        let client_query = request.client.trim();
        if surname.is_empty() || client_query.is_empty() {
            return Err(DeskError::Validation(
                "Employee surname and client name are required".into(),
            ));
        }

        let employees = self.find_employees(surname).await?;
        check_choice(request.employee_choice, employees.len(), "employee")?;
        let employee = match Selection::resolve_with(employees, request.employee_choice) {
            Selection::NoMatch => {
                return Err(DeskError::NoMatch(format!("Employee '{}' not found", surname)));
            }
            Selection::Ambiguous(candidates) => {
                return Ok(TransferOutcome::ChooseEmployee(candidates));
            }
            Selection::Single(employee) => employee,
        };

        let clients = self.find_clients(client_query).await?;
        check_choice(request.client_choice, clients.len(), "client")?;
        let client = match Selection::resolve_with(clients, request.client_choice) {
            Selection::NoMatch => {
                return Err(DeskError::NoMatch(format!(
                    "Client '{}' not found",
                    client_query
                )));
            }
            Selection::Ambiguous(candidates) => return Ok(TransferOutcome::ChooseClient(candidates)),
            Selection::Single(client) => client,
        };

        let engine = self.engine.clone();
        let enforce = request.enforce_expiry;
        let (employee_name, client_name) = (employee.full_name(), client.name.clone());
        let result =
            tokio::task::spawn_blocking(move || engine.transfer(&employee, &client, enforce))
                .await?;

        match result {
            Ok(action) => {
                self.journal
                    .record(&JournalEntry::for_transfer(JournalAction::Copy, &action));
                self.history.lock().record_success(action.clone());
                Ok(TransferOutcome::Copied(action))
            }
            Err(e) => {
                warn!(client = %client_name, employee = %employee_name, "Transfer failed: {}", e);
                self.journal.record(
                    &JournalEntry::new(JournalAction::Copy)
                        .with_client(client_name)
                        .with_employee(employee_name)
                        .failed(&e),
                );
                Err(e)
            }
        }
    }

    /// Delete the destination of the last copy.
    pub async fn undo(&self) -> DeskResult<TransferAction> {
        self.replay(JournalAction::Undo).await
    }

    /// Copy the last undone certificate again.
    pub async fn redo(&self) -> DeskResult<TransferAction> {
        self.replay(JournalAction::Redo).await
    }

    async fn replay(&self, kind: JournalAction) -> DeskResult<TransferAction> {
        let pending = match (kind, self.history_state()) {
            (JournalAction::Undo, HistoryState::UndoAvailable(action)) => action,
            (JournalAction::Redo, HistoryState::RedoAvailable(action)) => action,
            (JournalAction::Redo, _) => return Err(DeskError::NothingToRedo),
            _ => return Err(DeskError::NothingToUndo),
        };

        let history = Arc::clone(&self.history);
        let store = self.store().clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut history = history.lock();
            match kind {
                JournalAction::Redo => history.redo(&store),
                _ => history.undo(&store),
            }
        })
        .await?;

        let entry = JournalEntry::for_transfer(kind, &pending);
        match result {
            Ok(action) => {
                self.journal.record(&entry);
                Ok(action)
            }
            Err(e) => {
                self.journal.record(&entry.failed(&e));
                Err(e)
            }
        }
    }

    /// Delete a certificate folder from the operator's crypto store.
    pub async fn remove_from_operator_store(&self, certificate: &str) -> DeskResult<PathBuf> {
        let Some((workstation, user)) = &self.operator else {
            return Err(DeskError::Validation(
                "Operator crypto store is not configured".into(),
            ));
        };
        let path = self
            .engine
            .resolver()
            .destination(workstation, user, certificate.trim())?;

        let store = self.store().clone();
        let target = path.clone();
        let result = tokio::task::spawn_blocking(move || store.delete_certificate(&target)).await?;

        let entry = JournalEntry::new(JournalAction::Delete).with_destination(&path);
        match result {
            Ok(()) => {
                info!(path = %path.display(), "Removed from operator store");
                self.journal.record(&entry);
                Ok(path)
            }
            Err(e) => {
                self.journal.record(&entry.failed(&e));
                Err(e)
            }
        }
    }
}
