//! Employee directory.
//!
//! A read-only view over the employee spreadsheet. The table is re-read on
//! every query, so edits to the spreadsheet are visible immediately.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{DeskError, DeskResult};
use crate::source::{EmployeeSource, Table};

pub const COL_SURNAME: &str = "Фамилия";
pub const COL_GIVEN_NAMES: &str = "ИО";
pub const COL_EXTENSION: &str = "ВН";
pub const COL_ROOM: &str = "Каб.";
pub const COL_WORKSTATION: &str = "ПК";
pub const COL_USERNAME: &str = "Username";

const REQUIRED_COLUMNS: [&str; 4] = [COL_SURNAME, COL_GIVEN_NAMES, COL_WORKSTATION, COL_USERNAME];

/// One spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EmployeeRecord {
    pub surname: String,
    pub given_names: String,
    pub extension: String,
    pub room: String,
    pub workstation: String,
    pub username: String,
}

impl EmployeeRecord {
    /// "Surname Given-names", as typed by operators.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.surname, self.given_names)
            .trim()
            .to_string()
    }

    /// One-line card shown after a lookup or a copy.
    pub fn summary(&self) -> String {
        format!(
            "{} | ВН: {} | Каб: {} | ПК: {} | User: {}",
            self.full_name(),
            or_na(&self.extension),
            or_na(&self.room),
            or_na(&self.workstation),
            or_na(&self.username),
        )
    }

    /// Crypto-store directory for this employee.
    pub fn crypto_path(&self) -> DeskResult<PathBuf> {
        resolve_crypto_path(&self.workstation, &self.username)
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

/// Trim, collapse internal whitespace, lowercase.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `\\<workstation>\c$\users\<username>\AppData\Local\Crypto Pro`
pub fn resolve_crypto_path(workstation: &str, username: &str) -> DeskResult<PathBuf> {
    let workstation = workstation.trim();
    let username = username.trim();
    if workstation.is_empty() || username.is_empty() {
        return Err(DeskError::Validation(
            "Workstation and username are required".into(),
        ));
    }
    Ok(PathBuf::from(format!(
        r"\\{}\c$\users\{}\AppData\Local\Crypto Pro",
        workstation, username
    )))
}

/// Name lookups over an [`EmployeeSource`].
#[derive(Clone)]
pub struct EmployeeDirectory {
    source: Arc<dyn EmployeeSource>,
}

impl EmployeeDirectory {
    pub fn new(source: impl EmployeeSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Read and validate every row.
    pub fn load(&self) -> DeskResult<Vec<EmployeeRecord>> {
        let table = self.source.read_table()?;
        let records = records_from_table(&table)?;
        debug!(count = records.len(), "Employee table loaded");
        Ok(records)
    }

    /// Substring match on surname, or exact match on the full name.
    pub fn search_by_surname(&self, query: &str) -> DeskResult<Vec<EmployeeRecord>> {
        let query = normalize_name(query);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .load()?
            .into_iter()
            .filter(|emp| {
                normalize_name(&emp.surname).contains(&query)
                    || normalize_name(&emp.full_name()) == query
            })
            .collect())
    }

    /// Distinct full names whose surname starts with `prefix`, for completion.
    pub fn suggest(&self, prefix: &str, limit: usize) -> DeskResult<Vec<String>> {
        let prefix = normalize_name(prefix);
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let names: BTreeSet<String> = self
            .load()?
            .iter()
            .filter(|emp| normalize_name(&emp.surname).starts_with(&prefix))
            .map(EmployeeRecord::full_name)
            .collect();
        Ok(names.into_iter().take(limit).collect())
    }
}

fn records_from_table(table: &Table) -> DeskResult<Vec<EmployeeRecord>> {
    let column = |name: &str| table.headers.iter().position(|h| h.trim() == name);

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|name| column(*name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(DeskError::DataSource(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    let surname = column(COL_SURNAME);
    let given = column(COL_GIVEN_NAMES);
    let extension = column(COL_EXTENSION);
    let room = column(COL_ROOM);
    let workstation = column(COL_WORKSTATION);
    let username = column(COL_USERNAME);

    let records = table
        .rows
        .iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            let cell = |idx: Option<usize>| {
                idx.and_then(|i| row.get(i))
                    .map(|c| c.trim().to_string())
                    .unwrap_or_default()
            };
            EmployeeRecord {
                surname: cell(surname),
                given_names: cell(given),
                extension: cell(extension),
                room: cell(room),
                workstation: cell(workstation),
                username: cell(username),
            }
        })
        .collect();
    Ok(records)
}
