use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Desk configuration - every path and policy knob the core needs
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | CERTDESK_PRIMARY_STORE | \\nas\certificates\clients | primary client store |
/// | CERTDESK_ARCHIVE_STORE | \\nas\certificates\archive | archive client store |
/// | CERTDESK_EMPLOYEE_SOURCE | employees.xlsx | employee spreadsheet |
/// | CERTDESK_EXPIRY_DAYS | 450 | expiry window (days) |
/// | CERTDESK_LOG_DIR | logs | log and install-journal directory |
/// | CERTDESK_OPERATOR_WORKSTATION | (empty) | certificate operator's PC |
/// | CERTDESK_OPERATOR_USER | (empty) | certificate operator's username |
/// | CERTDESK_CACHE_TTL_SECS | 60 | client scan cache window |
/// | CERTDESK_CACHE_CAPACITY | 100 | client scan cache entries |
///
/// # Example
///
/// ```ignore
/// CERTDESK_PRIMARY_STORE=/mnt/certs CERTDESK_EXPIRY_DAYS=365 certdesk
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Active client store root
    pub primary_store: PathBuf,
    /// Archived client store root
    pub archive_store: PathBuf,
    /// Employee spreadsheet
    pub employee_source: PathBuf,
    /// Certificates older than this are expired
    pub expiry_days: u32,
    /// Log directory; `None` disables file logging and the install journal
    pub log_dir: Option<PathBuf>,
    /// Workstation hosting the certificate operator's crypto store
    pub operator_workstation: String,
    /// Username of the certificate operator
    pub operator_user: String,
    /// Lifetime of a cached client scan
    pub cache_ttl: Duration,
    /// Maximum cached client queries
    pub cache_capacity: u64,
}

pub const DEFAULT_EXPIRY_DAYS: u32 = 450;
const DEFAULT_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_CACHE_CAPACITY: u64 = 100;

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup
    ///
    /// Used by tests so the process environment is never touched.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            primary_store: PathBuf::from(text(
                "CERTDESK_PRIMARY_STORE",
                r"\\nas\certificates\clients",
            )),
            archive_store: PathBuf::from(text(
                "CERTDESK_ARCHIVE_STORE",
                r"\\nas\certificates\archive",
            )),
            employee_source: PathBuf::from(text("CERTDESK_EMPLOYEE_SOURCE", "employees.xlsx")),
            expiry_days: parse_or(&lookup, "CERTDESK_EXPIRY_DAYS", DEFAULT_EXPIRY_DAYS),
            log_dir: match lookup("CERTDESK_LOG_DIR") {
                Some(dir) if dir.trim().is_empty() => None,
                Some(dir) => Some(PathBuf::from(dir)),
                None => Some(PathBuf::from("logs")),
            },
            operator_workstation: text("CERTDESK_OPERATOR_WORKSTATION", ""),
            operator_user: text("CERTDESK_OPERATOR_USER", ""),
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "CERTDESK_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            cache_capacity: parse_or(&lookup, "CERTDESK_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY),
        }
    }

    pub fn with_expiry_days(mut self, days: u32) -> Self {
        self.expiry_days = days;
        self
    }

    /// Whether an operator crypto store is configured
    pub fn has_operator(&self) -> bool {
        !self.operator_workstation.trim().is_empty() && !self.operator_user.trim().is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparseable config value, using default");
            default
        }),
        None => default,
    }
}
