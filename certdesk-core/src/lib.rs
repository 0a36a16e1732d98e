//! # certdesk-core
//!
//! Certificate provisioning for IT support desks: look up an employee in the
//! staff spreadsheet, find a client's certificate bundles on the shared
//! stores, copy the right bundle into the employee's crypto-store folder and
//! undo or redo the last copy.
//!
//! ## Scope
//!
//! This crate owns lookups, selection, guarded copy/delete and the one-slot
//! history. Presentation (console, GUI) stays in the caller, which receives
//! ambiguous matches as [`TransferOutcome`] values and answers with a choice.
//!
//! ## Example
//!
//! ```ignore
//! use certdesk_core::{CertDesk, Config, TransferOutcome, TransferRequest};
//!
//! let desk = CertDesk::from_config(&Config::from_env());
//! match desk.transfer(&TransferRequest::new("ivanov", "acme")).await? {
//!     TransferOutcome::Copied(action) => println!("{}", action.destination.display()),
//!     TransferOutcome::ChooseEmployee(list) => { /* ask, then .choose_employee(i) */ }
//!     TransferOutcome::ChooseClient(list) => { /* ask, then .choose_client(i) */ }
//! }
//! desk.undo().await?;
//! ```

mod config;
mod desk;
mod employee;
mod error;
mod expiry;
mod history;
mod journal;
mod resolver;
mod source;
mod store;
mod transfer;

pub use config::{Config, DEFAULT_EXPIRY_DAYS};
pub use desk::{CertDesk, TransferOutcome, TransferRequest};
pub use employee::{EmployeeDirectory, EmployeeRecord, normalize_name, resolve_crypto_path};
pub use error::{DeskError, DeskResult};
pub use expiry::{CertStatus, ExpiryPolicy};
pub use history::{ActionHistory, HistoryState};
pub use journal::{InstallJournal, JournalAction, JournalEntry};
pub use resolver::{Selection, check_choice};
pub use source::{EmployeeSource, SpreadsheetSource, Table, TableSource};
pub use store::{CertificateEntry, ClientCertificateStore, ClientEntry, StoreRoot};
pub use transfer::{
    AdminShare, DestinationResolver, MirrorRoot, TransferAction, TransferEngine, TransferPlan,
    select_certificate, validate_bundle_name,
};
