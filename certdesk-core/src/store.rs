//! Client certificate storage on the shared drives.
//!
//! Two roots are scanned: the primary store and the archive. Each holds one
//! directory per client, and each client directory holds one directory per
//! certificate bundle. Bundles are opaque and copied wholesale.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use moka::sync::Cache;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{DeskError, DeskResult};
use crate::expiry::{CertStatus, ExpiryPolicy};

const DEFAULT_CACHE_CAPACITY: u64 = 100;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Which root a client directory was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRoot {
    Primary,
    Archive,
}

impl StoreRoot {
    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Archive => "archive",
        }
    }
}

/// A client directory. Same-named clients under different roots stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClientEntry {
    pub name: String,
    pub root: StoreRoot,
    pub path: PathBuf,
}

/// A certificate bundle directory inside a client directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateEntry {
    pub name: String,
    pub path: PathBuf,
    pub modified: DateTime<Local>,
    pub status: CertStatus,
}

impl CertificateEntry {
    pub fn display_date(&self) -> String {
        self.modified.format("%d.%m.%Y %H:%M").to_string()
    }
}

/// Lookups and guarded mutations over the two client roots.
#[derive(Clone)]
pub struct ClientCertificateStore {
    primary: PathBuf,
    archive: PathBuf,
    policy: ExpiryPolicy,
    scans: Cache<String, Arc<Vec<ClientEntry>>>,
}

impl ClientCertificateStore {
    pub fn new(primary: impl Into<PathBuf>, archive: impl Into<PathBuf>, policy: ExpiryPolicy) -> Self {
        Self {
            primary: primary.into(),
            archive: archive.into(),
            policy,
            scans: build_cache(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.primary_store.clone(),
            config.archive_store.clone(),
            ExpiryPolicy::from_days(config.expiry_days),
        )
        .with_cache(config.cache_capacity, config.cache_ttl)
    }

    /// Replace the scan cache bounds.
    pub fn with_cache(mut self, capacity: u64, ttl: Duration) -> Self {
        self.scans = build_cache(capacity, ttl);
        self
    }

    /// Drop every cached scan.
    pub fn invalidate(&self) {
        self.scans.invalidate_all();
    }

    /// Client directories whose name contains `query` (case-insensitive).
    ///
    /// An empty query lists every client. Both roots are scanned in
    /// parallel; a missing or unreadable root contributes nothing.
    /// Results are unique by path and sorted by name, then root.
    pub async fn find_clients(&self, query: &str) -> DeskResult<Vec<ClientEntry>> {
        let needle = query.trim().to_lowercase();
        if let Some(hit) = self.scans.get(needle.as_str()) {
            debug!(query = %needle, "Client scan served from cache");
            return Ok(hit.as_ref().clone());
        }

        let primary = {
            let (root, needle) = (self.primary.clone(), needle.clone());
            tokio::task::spawn_blocking(move || scan_root(&root, StoreRoot::Primary, &needle))
        };
        let archive = {
            let (root, needle) = (self.archive.clone(), needle.clone());
            tokio::task::spawn_blocking(move || scan_root(&root, StoreRoot::Archive, &needle))
        };
        let (mut clients, archived) = tokio::try_join!(primary, archive)?;

        clients.extend(archived);
        clients.sort();
        clients.dedup_by(|a, b| a.path == b.path);

        debug!(query = %needle, count = clients.len(), "Client scan finished");
        self.scans.insert(needle, Arc::new(clients.clone()));
        Ok(clients)
    }

    /// Certificate bundles of a client, newest first.
    pub fn list_certificates(&self, client_path: &Path) -> DeskResult<Vec<CertificateEntry>> {
        self.list_certificates_at(client_path, Local::now())
    }

    /// Same as [`Self::list_certificates`] with an explicit clock.
    pub fn list_certificates_at(
        &self,
        client_path: &Path,
        now: DateTime<Local>,
    ) -> DeskResult<Vec<CertificateEntry>> {
        let entries = match fs::read_dir(client_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DeskError::from_io(&e, client_path)),
        };

        let mut certs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DeskError::from_io(&e, client_path))?;
            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), "Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let modified: DateTime<Local> = metadata
                .modified()
                .map_err(|e| DeskError::from_io(&e, &path))?
                .into();

            certs.push(CertificateEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                status: self.policy.classify(modified, now),
                path,
                modified,
            });
        }

        certs.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(certs)
    }

    /// Certificates across every client whose bundle name contains `query`
    /// (case-insensitive), in client order then newest first.
    pub async fn search_certificates(
        &self,
        query: &str,
    ) -> DeskResult<Vec<(ClientEntry, CertificateEntry)>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let clients = self.find_clients("").await?;
        let store = self.clone();
        tokio::task::spawn_blocking(move || -> DeskResult<Vec<(ClientEntry, CertificateEntry)>> {
            let mut found = Vec::new();
            for client in clients {
                for cert in store.list_certificates(&client.path)? {
                    if cert.name.to_lowercase().contains(&needle) {
                        found.push((client.clone(), cert));
                    }
                }
            }
            Ok(found)
        })
        .await?
    }

    /// Recursively copy a bundle to `destination`.
    ///
    /// Never overwrites: an existing destination is `AlreadyExists` and
    /// nothing is touched. Missing parent directories are created. The copy
    /// is not atomic; a failure part-way leaves a partial destination that
    /// later copies will report as `AlreadyExists`.
    pub fn copy_certificate(&self, source: &Path, destination: &Path) -> DeskResult<PathBuf> {
        let source_meta = fs::metadata(source).map_err(|e| DeskError::from_io(&e, source))?;
        if !source_meta.is_dir() {
            return Err(DeskError::NotADirectory(source.display().to_string()));
        }
        if exists(destination)? {
            return Err(DeskError::AlreadyExists(destination.display().to_string()));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| DeskError::from_io(&e, parent))?;
        }
        // create_dir fails if the destination appeared since the check above
        fs::create_dir(destination).map_err(|e| DeskError::from_io(&e, destination))?;

        if let Err(e) = copy_contents(source, destination) {
            warn!(
                source = %source.display(),
                destination = %destination.display(),
                "Copy interrupted, partial destination left in place: {}", e
            );
            return Err(e);
        }

        info!(
            source = %source.display(),
            destination = %destination.display(),
            "Certificate copied"
        );
        Ok(destination.to_path_buf())
    }

    /// Recursively remove a bundle directory.
    pub fn delete_certificate(&self, path: &Path) -> DeskResult<()> {
        let metadata = fs::symlink_metadata(path).map_err(|e| DeskError::from_io(&e, path))?;
        if !metadata.is_dir() {
            return Err(DeskError::NotADirectory(path.display().to_string()));
        }
        fs::remove_dir_all(path).map_err(|e| DeskError::from_io(&e, path))?;
        info!(path = %path.display(), "Certificate removed");
        Ok(())
    }
}

fn build_cache(capacity: u64, ttl: Duration) -> Cache<String, Arc<Vec<ClientEntry>>> {
    Cache::builder()
        .max_capacity(capacity)
        .time_to_live(ttl)
        .build()
}

fn scan_root(root: &Path, kind: StoreRoot, needle: &str) -> Vec<ClientEntry> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(root = %root.display(), store = kind.label(), "Store unavailable: {}", e);
            return Vec::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.to_lowercase().contains(needle).then(|| ClientEntry {
                name,
                root: kind,
                path: entry.path(),
            })
        })
        .collect()
}

fn exists(path: &Path) -> DeskResult<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DeskError::from_io(&e, path)),
    }
}

fn copy_contents(source: &Path, destination: &Path) -> DeskResult<()> {
    for entry in fs::read_dir(source).map_err(|e| DeskError::from_io(&e, source))? {
        let entry = entry.map_err(|e| DeskError::from_io(&e, source))?;
        let from = entry.path();
        let to = destination.join(entry.file_name());
        let metadata = fs::metadata(&from).map_err(|e| DeskError::from_io(&e, &from))?;

        if metadata.is_dir() {
            fs::create_dir(&to).map_err(|e| DeskError::from_io(&e, &to))?;
            copy_contents(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| DeskError::from_io(&e, &to))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn make_bundle(dir: &Path, files: &[(&str, &str)]) {
        fs::create_dir_all(dir).unwrap();
        for (name, body) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, body).unwrap();
        }
    }

    fn set_mtime(dir: &Path, when: SystemTime) {
        File::open(dir).unwrap().set_modified(when).unwrap();
    }

    fn store(tmp: &TempDir) -> ClientCertificateStore {
        ClientCertificateStore::new(
            tmp.path().join("primary"),
            tmp.path().join("archive"),
            ExpiryPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_find_clients_across_roots() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("primary/Acme")).unwrap();
        fs::create_dir_all(tmp.path().join("primary/Globex")).unwrap();
        fs::create_dir_all(tmp.path().join("archive/Acme")).unwrap();
        fs::write(tmp.path().join("primary/acme-notes.txt"), "x").unwrap();

        let clients = store(&tmp).find_clients("ACME").await.unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].root, StoreRoot::Primary);
        assert_eq!(clients[1].root, StoreRoot::Archive);
        assert!(clients.iter().all(|c| c.name == "Acme"));
    }

    #[tokio::test]
    async fn test_empty_query_lists_everything_sorted() {
        let tmp = TempDir::new().unwrap();
        for path in ["primary/Zeta", "primary/Alpha", "archive/Beta"] {
            fs::create_dir_all(tmp.path().join(path)).unwrap();
        }

        let names: Vec<String> = store(&tmp)
            .find_clients("")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Zeta"]);
    }

    #[tokio::test]
    async fn test_missing_roots_are_empty() {
        let tmp = TempDir::new().unwrap();
        let clients = store(&tmp).find_clients("").await.unwrap();
        assert!(clients.is_empty());
    }

    #[tokio::test]
    async fn test_scan_cache_and_invalidate() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("primary/Acme")).unwrap();
        let store = store(&tmp);

        assert_eq!(store.find_clients("acme").await.unwrap().len(), 1);
        fs::create_dir_all(tmp.path().join("archive/Acme")).unwrap();
        assert_eq!(store.find_clients("acme").await.unwrap().len(), 1);

        store.invalidate();
        assert_eq!(store.find_clients("acme").await.unwrap().len(), 2);
    }

    #[test]
    fn test_list_certificates_newest_first() {
        let tmp = TempDir::new().unwrap();
        let client = tmp.path().join("primary/Acme");
        make_bundle(&client.join("old"), &[("key.pem", "a")]);
        make_bundle(&client.join("new"), &[("key.pem", "b")]);
        fs::write(client.join("readme.txt"), "ignored").unwrap();

        let now = SystemTime::now();
        set_mtime(&client.join("old"), now - Duration::from_secs(3600 * 24 * 30));
        set_mtime(&client.join("new"), now - Duration::from_secs(3600));

        let store = store(&tmp);
        let certs = store.list_certificates(&client).unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].name, "new");
        assert_eq!(certs[1].name, "old");
        assert!(certs.iter().all(|c| c.status == CertStatus::Valid));

        // Unchanged directory lists identically
        assert_eq!(store.list_certificates(&client).unwrap(), certs);
    }

    #[test]
    fn test_list_certificates_marks_expired() {
        let tmp = TempDir::new().unwrap();
        let client = tmp.path().join("primary/Acme");
        make_bundle(&client.join("ancient"), &[("key.pem", "a")]);
        set_mtime(
            &client.join("ancient"),
            SystemTime::now() - Duration::from_secs(3600 * 24 * 500),
        );

        let certs = store(&tmp).list_certificates(&client).unwrap();
        assert_eq!(certs[0].status, CertStatus::Expired);
    }

    #[tokio::test]
    async fn test_same_root_twice_dedups_by_path() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("clients/Acme")).unwrap();
        fs::create_dir_all(tmp.path().join("clients/Globex")).unwrap();
        let store = ClientCertificateStore::new(
            tmp.path().join("clients"),
            tmp.path().join("clients"),
            ExpiryPolicy::default(),
        );

        let clients = store.find_clients("").await.unwrap();
        let names: Vec<_> = clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Acme", "Globex"]);
        assert_eq!(clients[0].root, StoreRoot::Primary);
    }

    #[test]
    fn test_expiry_boundary_on_disk() {
        let tmp = TempDir::new().unwrap();
        let client = tmp.path().join("primary/Acme");
        make_bundle(&client.join("edge"), &[("key.pem", "a")]);
        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&client.join("edge"), stamp);

        let store = store(&tmp);
        let boundary = DateTime::<Local>::from(stamp) + chrono::Duration::days(450);

        let certs = store.list_certificates_at(&client, boundary).unwrap();
        assert_eq!(certs[0].status, CertStatus::Valid);

        let later = boundary + chrono::Duration::microseconds(1);
        let certs = store.list_certificates_at(&client, later).unwrap();
        assert_eq!(certs[0].status, CertStatus::Expired);
    }

    #[test]
    fn test_huge_expiry_window_lists_without_panic() {
        let tmp = TempDir::new().unwrap();
        let client = tmp.path().join("primary/Acme");
        make_bundle(&client.join("bundle"), &[("key.pem", "a")]);

        let config = Config::from_lookup(|key| {
            (key == "CERTDESK_EXPIRY_DAYS").then(|| "4000000000".to_string())
        });
        let store = ClientCertificateStore::new(
            tmp.path().join("primary"),
            tmp.path().join("archive"),
            ExpiryPolicy::from_days(config.expiry_days),
        );

        let certs = store.list_certificates(&client).unwrap();
        assert_eq!(certs[0].status, CertStatus::Valid);
    }

    #[test]
    fn test_list_certificates_missing_client() {
        let tmp = TempDir::new().unwrap();
        let certs = store(&tmp)
            .list_certificates(&tmp.path().join("nope"))
            .unwrap();
        assert!(certs.is_empty());
    }

    #[test]
    fn test_copy_then_delete_round_trip() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("primary/Acme/bundle");
        make_bundle(&source, &[("header.key", "h"), ("nested/masks.key", "m")]);
        let crypto = tmp.path().join("crypto");
        fs::create_dir_all(&crypto).unwrap();
        fs::create_dir_all(crypto.join("existing")).unwrap();

        let store = store(&tmp);
        let dest = crypto.join("bundle");
        let copied = store.copy_certificate(&source, &dest).unwrap();
        assert_eq!(copied, dest);
        assert_eq!(fs::read_to_string(dest.join("nested/masks.key")).unwrap(), "m");

        store.delete_certificate(&dest).unwrap();
        let left: Vec<_> = fs::read_dir(&crypto)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("existing")]);
    }

    #[test]
    fn test_copy_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        make_bundle(&source, &[("key", "new")]);
        let dest = tmp.path().join("dest");
        make_bundle(&dest, &[("key", "old")]);

        let err = store(&tmp).copy_certificate(&source, &dest).unwrap_err();
        assert!(matches!(err, DeskError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(dest.join("key")).unwrap(), "old");
        assert_eq!(fs::read_to_string(source.join("key")).unwrap(), "new");
    }

    #[test]
    fn test_copy_missing_source() {
        let tmp = TempDir::new().unwrap();
        let err = store(&tmp)
            .copy_certificate(&tmp.path().join("nope"), &tmp.path().join("dest"))
            .unwrap_err();
        assert!(matches!(err, DeskError::NotFound(_)));
        assert!(!tmp.path().join("dest").exists());
    }

    #[test]
    fn test_delete_errors() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(matches!(
            store.delete_certificate(&tmp.path().join("nope")),
            Err(DeskError::NotFound(_))
        ));

        let file = tmp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            store.delete_certificate(&file),
            Err(DeskError::NotADirectory(_))
        ));
        assert!(file.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_reaches_caller() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("primary/Acme/bundle");
        make_bundle(&source, &[("key", "k")]);
        let locked = tmp.path().join("locked");
        fs::create_dir_all(locked.join("installed")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

        // Privileged users bypass mode bits; nothing to observe then
        if fs::create_dir(locked.join("canary")).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let store = store(&tmp);
        let copy = store.copy_certificate(&source, &locked.join("bundle"));
        let delete = store.delete_certificate(&locked.join("installed"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(copy, Err(DeskError::PermissionDenied(_))));
        assert!(matches!(delete, Err(DeskError::PermissionDenied(_))));
        assert!(!locked.join("bundle").exists());
        assert!(locked.join("installed").exists());
    }

    #[tokio::test]
    async fn test_search_certificates() {
        let tmp = TempDir::new().unwrap();
        make_bundle(&tmp.path().join("primary/Acme/ivanov-2025"), &[("k", "1")]);
        make_bundle(&tmp.path().join("archive/Globex/IVANOV-2023"), &[("k", "2")]);
        make_bundle(&tmp.path().join("archive/Globex/petrov"), &[("k", "3")]);

        let store = store(&tmp);
        let found = store.search_certificates("ivanov").await.unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|(client, cert)| format!("{}/{}", client.name, cert.name))
            .collect();
        assert_eq!(names, vec!["Acme/ivanov-2025", "Globex/IVANOV-2023"]);

        assert!(store.search_certificates(" ").await.unwrap().is_empty());
    }
}
