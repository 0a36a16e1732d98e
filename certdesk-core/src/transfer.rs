//! Certificate selection and transfer into a user's crypto store.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::employee::{EmployeeRecord, resolve_crypto_path};
use crate::error::{DeskError, DeskResult};
use crate::store::{CertificateEntry, ClientCertificateStore, ClientEntry};

/// Maps a workstation/user pair to the crypto-store directory on disk.
pub trait DestinationResolver: Send + Sync {
    fn crypto_dir(&self, workstation: &str, username: &str) -> DeskResult<PathBuf>;

    /// Full destination of a bundle named `certificate`.
    fn destination(
        &self,
        workstation: &str,
        username: &str,
        certificate: &str,
    ) -> DeskResult<PathBuf> {
        validate_bundle_name(certificate)?;
        Ok(self.crypto_dir(workstation, username)?.join(certificate))
    }
}

/// `\\<workstation>\c$\users\<username>\AppData\Local\Crypto Pro`
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminShare;

impl DestinationResolver for AdminShare {
    fn crypto_dir(&self, workstation: &str, username: &str) -> DeskResult<PathBuf> {
        resolve_crypto_path(workstation, username)
    }

    fn destination(
        &self,
        workstation: &str,
        username: &str,
        certificate: &str,
    ) -> DeskResult<PathBuf> {
        validate_bundle_name(certificate)?;
        let dir = self.crypto_dir(workstation, username)?;
        // UNC paths keep backslashes regardless of the host separator
        Ok(PathBuf::from(format!(r"{}\{}", dir.display(), certificate)))
    }
}

/// Local mirror of the admin-share layout under `root`:
/// `root/<workstation>/users/<username>/AppData/Local/Crypto Pro`.
#[derive(Debug, Clone)]
pub struct MirrorRoot {
    root: PathBuf,
}

impl MirrorRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DestinationResolver for MirrorRoot {
    fn crypto_dir(&self, workstation: &str, username: &str) -> DeskResult<PathBuf> {
        // Same validation as the admin share
        resolve_crypto_path(workstation, username)?;
        validate_path_component(workstation.trim(), "workstation")?;
        validate_path_component(username.trim(), "username")?;
        Ok(self
            .root
            .join(workstation.trim())
            .join("users")
            .join(username.trim())
            .join("AppData")
            .join("Local")
            .join("Crypto Pro"))
    }
}

/// Reject names that would escape the crypto-store directory.
pub fn validate_bundle_name(name: &str) -> DeskResult<()> {
    if name.trim().is_empty() {
        return Err(DeskError::Validation("Certificate name is empty".into()));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(DeskError::Validation(format!(
            "Invalid certificate name: {}",
            name
        )));
    }
    Ok(())
}

fn validate_path_component(value: &str, what: &str) -> DeskResult<()> {
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(DeskError::Validation(format!("Invalid {}: {}", what, value)));
    }
    Ok(())
}

/// A completed copy, kept for undo/redo and the install journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferAction {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub employee: EmployeeRecord,
    pub client: String,
    pub certificate: String,
    pub timestamp: DateTime<Local>,
}

/// What a transfer would do, before any filesystem mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub employee: EmployeeRecord,
    pub client: ClientEntry,
    pub certificate: CertificateEntry,
    pub destination: PathBuf,
}

/// Pick the bundle to install.
///
/// With `enforce_expiry` the list is filtered to valid bundles first and the
/// newest remaining one wins, so an older valid bundle beats a newer expired
/// one. `certs` must already be newest-first.
pub fn select_certificate<'a>(
    client: &str,
    certs: &'a [CertificateEntry],
    enforce_expiry: bool,
) -> DeskResult<&'a CertificateEntry> {
    if certs.is_empty() {
        return Err(DeskError::NoCertificates(client.to_string()));
    }
    if enforce_expiry {
        certs
            .iter()
            .find(|c| c.status.is_valid())
            .ok_or_else(|| DeskError::NoValidCertificate(client.to_string()))
    } else {
        Ok(&certs[0])
    }
}

/// Plans and performs certificate copies.
#[derive(Clone)]
pub struct TransferEngine {
    store: ClientCertificateStore,
    resolver: Arc<dyn DestinationResolver>,
}

impl TransferEngine {
    pub fn new(store: ClientCertificateStore, resolver: impl DestinationResolver + 'static) -> Self {
        Self {
            store,
            resolver: Arc::new(resolver),
        }
    }

    pub fn store(&self) -> &ClientCertificateStore {
        &self.store
    }

    pub fn resolver(&self) -> &dyn DestinationResolver {
        self.resolver.as_ref()
    }

    /// Select a bundle of `client` for `employee` and compute its destination.
    pub fn plan(
        &self,
        employee: &EmployeeRecord,
        client: &ClientEntry,
        enforce_expiry: bool,
    ) -> DeskResult<TransferPlan> {
        let certs = self.store.list_certificates(&client.path)?;
        self.plan_from(employee, client, &certs, enforce_expiry)
    }

    /// Same as [`Self::plan`] over an existing listing.
    pub fn plan_from(
        &self,
        employee: &EmployeeRecord,
        client: &ClientEntry,
        certs: &[CertificateEntry],
        enforce_expiry: bool,
    ) -> DeskResult<TransferPlan> {
        let chosen = select_certificate(&client.name, certs, enforce_expiry)?;
        let destination =
            self.resolver
                .destination(&employee.workstation, &employee.username, &chosen.name)?;

        Ok(TransferPlan {
            employee: employee.clone(),
            client: client.clone(),
            certificate: chosen.clone(),
            destination,
        })
    }

    /// Copy the planned bundle.
    pub fn execute(&self, plan: &TransferPlan) -> DeskResult<TransferAction> {
        let destination = self
            .store
            .copy_certificate(&plan.certificate.path, &plan.destination)?;

        info!(
            client = %plan.client.name,
            certificate = %plan.certificate.name,
            employee = %plan.employee.full_name(),
            "Certificate installed"
        );

        Ok(TransferAction {
            source: plan.certificate.path.clone(),
            destination,
            employee: plan.employee.clone(),
            client: plan.client.name.clone(),
            certificate: plan.certificate.name.clone(),
            timestamp: Local::now(),
        })
    }

    /// Plan and execute in one step.
    pub fn transfer(
        &self,
        employee: &EmployeeRecord,
        client: &ClientEntry,
        enforce_expiry: bool,
    ) -> DeskResult<TransferAction> {
        let plan = self.plan(employee, client, enforce_expiry)?;
        self.execute(&plan)
    }
}
