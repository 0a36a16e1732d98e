//! Error types for desk operations

use std::io;
use std::path::Path;
use thiserror::Error;

/// Desk error taxonomy.
///
/// Every filesystem or data-source failure is converted into one of these
/// kinds where it happens, with a human-readable detail string for the
/// operator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeskError {
    /// Source or target path does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Destination is already populated
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Access denied by the filesystem
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Target exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// Bad or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Employee source malformed or unreadable
    #[error("Data source error: {0}")]
    DataSource(String),

    /// Client has no certificate folders at all
    #[error("No certificates for client {0}")]
    NoCertificates(String),

    /// Client has certificates but none pass the expiry filter
    #[error("No valid certificate for client {0}")]
    NoValidCertificate(String),

    /// Query matched nothing
    #[error("No match: {0}")]
    NoMatch(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    /// Any other I/O failure
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for desk operations
pub type DeskResult<T> = Result<T, DeskError>;

impl DeskError {
    /// Maps an I/O error on `path` into the taxonomy.
    pub fn from_io(err: &io::Error, path: &Path) -> Self {
        let detail = format!("{}: {}", path.display(), err);
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(detail),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(detail),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(detail),
            _ => Self::Io(detail),
        }
    }

    /// Short machine-friendly kind name, used by the install journal.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::PermissionDenied(_) => "permission_denied",
            Self::NotADirectory(_) => "not_a_directory",
            Self::Validation(_) => "validation",
            Self::DataSource(_) => "data_source",
            Self::NoCertificates(_) => "no_certificates",
            Self::NoValidCertificate(_) => "no_valid_certificate",
            Self::NoMatch(_) => "no_match",
            Self::NothingToUndo => "nothing_to_undo",
            Self::NothingToRedo => "nothing_to_redo",
            Self::Io(_) => "io",
        }
    }
}

impl From<tokio::task::JoinError> for DeskError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(format!("Task join failed: {}", err))
    }
}
