//! The file host service.
//!
//! [`FileHost`] owns the identity store, the ownership registry and the
//! content store, and exposes the operations request handlers call. It is
//! shared between handlers behind an `Arc`. Each component does its own
//! locking; operations that change files also hold a host-wide write lock
//! from the ownership check through the registry update.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use chrono::Utc;
use identity::{Credential, IdentityStore};
use serde::Serialize;

use crate::config::Config;
use crate::error::{HostError, HostResult};
use crate::files::{
    validate_file_name, AccessDecision, AccessPolicy, ContentStore, DenyReason, FileAction,
    FileRecord, FileRegistry,
};

/// A file as shown to one requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileListing {
    #[serde(flatten)]
    pub record: FileRecord,
    /// Whether the requester may edit or delete this file.
    pub can_delete: bool,
}

/// What the main page shows for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub authorized: bool,
    pub username: Option<String>,
    pub is_admin: bool,
    pub files: Vec<FileListing>,
}

impl Dashboard {
    fn anonymous() -> Self {
        Self {
            authorized: false,
            username: None,
            is_admin: false,
            files: Vec::new(),
        }
    }
}

/// Shared-file host: authentication, ownership and file content.
pub struct FileHost {
    identity: Arc<dyn IdentityStore>,
    registry: FileRegistry,
    content: ContentStore,
    /// Serializes upload, save and delete across check, content and registry.
    writes: Mutex<()>,
}

impl FileHost {
    /// Assembles a host from already-opened components.
    pub fn new(identity: Arc<dyn IdentityStore>, registry: FileRegistry, content: ContentStore) -> Self {
        Self {
            identity,
            registry,
            content,
            writes: Mutex::new(()),
        }
    }

    /// Opens every component described by the configuration.
    ///
    /// Fails if the identity store cannot be loaded; the server must not
    /// start without one.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let location = config.identity.location();
        let identity = identity::open_store(&location)
            .with_context(|| format!("Failed to open identity store: {:?}", location))?;

        let content = ContentStore::new(&config.files.dir, config.files.max_size);
        content.ensure_root().with_context(|| {
            format!("Failed to create files directory: {}", config.files.dir.display())
        })?;

        let registry_path = config.files.registry_path();
        let registry = FileRegistry::open(&registry_path).with_context(|| {
            format!("Failed to load file registry: {}", registry_path.display())
        })?;

        Ok(Self::new(identity, registry, content))
    }

    /// The identity store.
    pub fn identity(&self) -> &dyn IdentityStore {
        self.identity.as_ref()
    }

    /// The ownership registry.
    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    /// Maximum accepted file size in bytes.
    pub fn max_file_size(&self) -> u64 {
        self.content.max_size()
    }

    fn lock_writes(&self) -> HostResult<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| HostError::Internal("file write lock poisoned".to_string()))
    }

    fn access(&self) -> AccessPolicy<'_> {
        AccessPolicy::new(self.identity.as_ref(), &self.registry)
    }

    /// Admin flag for an authenticated user; lookup failures count as not admin.
    fn is_admin(&self, username: &str) -> bool {
        self.identity.is_admin(username).unwrap_or_else(|e| {
            tracing::warn!("Admin lookup for {} failed: {}", username, e);
            false
        })
    }

    /// Checks an ownership-gated action, mapping refusals to errors.
    fn require(&self, requester: &str, name: &str, action: FileAction) -> HostResult<AccessDecision> {
        match self.access().authorize(requester, name, action) {
            AccessDecision::Denied(DenyReason::NoRecord) => Err(HostError::NotFound(name.to_string())),
            AccessDecision::Denied(reason) => {
                tracing::info!(
                    "Denied {:?} on {} for {} ({:?})",
                    action,
                    name,
                    requester,
                    reason
                );
                Err(HostError::PermissionDenied(format!(
                    "{} may not {:?} {}",
                    requester, action, name
                )))
            }
            decision => Ok(decision),
        }
    }

    /// Resolves the caller from the `auth` cookie value.
    ///
    /// Missing, malformed or wrong credentials all yield `None`.
    pub fn authenticate(&self, cookie_value: Option<&str>) -> Option<Credential> {
        let credential = Credential::from_cookie_value(cookie_value?)?;
        if self.identity.validate(&credential.username, &credential.password) {
            Some(credential)
        } else {
            tracing::debug!("Rejected cookie credential for {}", credential.username);
            None
        }
    }

    /// Checks a login form submission.
    pub fn login(&self, username: &str, password: &str) -> HostResult<Credential> {
        if self.identity.validate(username, password) {
            tracing::info!("User {} logged in", username);
            Ok(Credential::new(username, password))
        } else {
            tracing::warn!("Failed login for {}", username);
            Err(HostError::InvalidCredentials)
        }
    }

    /// Registers a new regular user and returns their credential.
    pub fn register(&self, username: &str, password: &str) -> HostResult<Credential> {
        self.identity.register(username, password)?;
        Ok(Credential::new(username, password))
    }

    /// Lists every file with the requester's edit/delete permission.
    ///
    /// Admin status is looked up once for the whole listing.
    pub fn list_for(&self, requester: &str) -> HostResult<Vec<FileListing>> {
        let records = self.registry.list()?;
        let is_admin = self.is_admin(requester);

        Ok(records
            .into_iter()
            .map(|record| {
                let can_delete = is_admin || record.owner == requester;
                FileListing { record, can_delete }
            })
            .collect())
    }

    /// Builds the main page view for whoever holds the cookie.
    ///
    /// Anonymous callers see no files.
    pub fn dashboard(&self, cookie_value: Option<&str>) -> HostResult<Dashboard> {
        let Some(credential) = self.authenticate(cookie_value) else {
            return Ok(Dashboard::anonymous());
        };

        Ok(Dashboard {
            authorized: true,
            is_admin: self.is_admin(&credential.username),
            files: self.list_for(&credential.username)?,
            username: Some(credential.username),
        })
    }

    /// Stores an uploaded file and records the requester as its owner.
    ///
    /// Uploading over an existing file counts as editing it and needs the
    /// same permission.
    pub fn upload(&self, requester: &str, name: &str, data: &[u8]) -> HostResult<FileRecord> {
        validate_file_name(name)?;
        self.content.check_size(data.len() as u64)?;

        let _writes = self.lock_writes()?;
        let existing = self.registry.get(name)?;
        if existing.is_some() {
            self.require(requester, name, FileAction::Save)?;
        }

        self.content.write(name, data)?;

        let created_at = Utc::now();
        if let Err(e) = self.registry.record(name, requester, created_at) {
            // A brand-new file must not outlive its missing owner record.
            if existing.is_none() {
                if let Err(cleanup) = self.content.delete(name) {
                    tracing::error!(
                        "Failed to remove {} after registry error: {}",
                        name,
                        cleanup
                    );
                }
            }
            return Err(e.into());
        }

        tracing::info!("User {} uploaded {} ({} bytes)", requester, name, data.len());
        Ok(FileRecord::new(name, requester, created_at))
    }

    /// Deletes a file and then its ownership record.
    ///
    /// If the content is already gone the record is still removed, so a
    /// retry after a partial failure converges. If deleting the content
    /// fails, the record is kept.
    pub fn delete(&self, requester: &str, name: &str) -> HostResult<FileRecord> {
        let _writes = self.lock_writes()?;
        let decision = self.require(requester, name, FileAction::Delete)?;

        if !self.content.delete(name)? {
            tracing::warn!("Content for {} was already missing, clearing stale record", name);
        }

        let removed = self.registry.remove(name)?;
        tracing::info!(
            "User {} deleted {} (owner: {}, as {:?})",
            requester,
            name,
            removed.owner,
            decision
        );
        Ok(removed)
    }

    /// Reads a file for editing. Owner or admin only.
    pub fn open_file(&self, requester: &str, name: &str) -> HostResult<Vec<u8>> {
        validate_file_name(name)?;
        self.require(requester, name, FileAction::Open)?;
        Ok(self.content.read(name)?)
    }

    /// Replaces a file's content. Owner or admin only; ownership is unchanged.
    pub fn save_file(&self, requester: &str, name: &str, data: &[u8]) -> HostResult<()> {
        validate_file_name(name)?;
        self.content.check_size(data.len() as u64)?;

        let _writes = self.lock_writes()?;
        self.require(requester, name, FileAction::Save)?;

        self.content.write(name, data)?;
        tracing::info!("User {} saved {} ({} bytes)", requester, name, data.len());
        Ok(())
    }

    /// Reads a file for download. Any authenticated user may download any file.
    pub fn download(&self, requester: &str, name: &str) -> HostResult<Vec<u8>> {
        validate_file_name(name)?;
        let data = self.content.read(name)?;
        tracing::debug!("User {} downloaded {}", requester, name);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity::JsonIdentityStore;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_host(temp_dir: &TempDir) -> FileHost {
        let identity = Arc::new(JsonIdentityStore::new(temp_dir.path().join("users.json")));
        identity.register_with_role("root", "toor", true).unwrap();

        let files_dir = temp_dir.path().join("files");
        let content = ContentStore::new(&files_dir, 1024);
        content.ensure_root().unwrap();
        let registry = FileRegistry::new(files_dir.join(".fileinfo.json"));

        FileHost::new(identity, registry, content)
    }

    #[test]
    fn test_authenticate() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.register("alice", "pw1").unwrap();

        let cred = host.authenticate(Some("alice:pw1")).unwrap();
        assert_eq!(cred.username, "alice");

        assert!(host.authenticate(None).is_none());
        assert!(host.authenticate(Some("alice:wrong")).is_none());
        assert!(host.authenticate(Some("garbage")).is_none());
        assert!(host.authenticate(Some("")).is_none());
    }

    #[test]
    fn test_login() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.register("alice", "pw1").unwrap();

        assert_eq!(
            host.login("alice", "pw1").unwrap().to_cookie_value(),
            "alice:pw1"
        );
        assert!(matches!(
            host.login("alice", "nope"),
            Err(HostError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_register_conflict_and_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);

        host.register("alice", "pw1").unwrap();
        assert!(matches!(
            host.register("alice", "pw2"),
            Err(HostError::Conflict(_))
        ));
        assert!(matches!(
            host.register("", "pw"),
            Err(HostError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_upload_records_owner() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);

        let record = host.upload("alice", "notes.txt", b"hello").unwrap();
        assert_eq!(record.owner, "alice");
        assert_eq!(host.registry().get("notes.txt").unwrap().unwrap().owner, "alice");
        assert_eq!(host.download("bob", "notes.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_upload_rejects_bad_names_and_sizes() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);

        assert!(matches!(
            host.upload("alice", ".fileinfo.json", b"[]"),
            Err(HostError::InvalidRequest(_))
        ));
        assert!(matches!(
            host.upload("alice", "big.bin", &vec![0u8; 2048]),
            Err(HostError::TooLarge { .. })
        ));
        assert!(host.registry().is_empty().unwrap());
    }

    #[test]
    fn test_upload_over_other_users_file_denied() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);

        host.upload("alice", "notes.txt", b"alice's").unwrap();
        assert!(matches!(
            host.upload("bob", "notes.txt", b"bob's"),
            Err(HostError::PermissionDenied(_))
        ));
        assert_eq!(host.download("alice", "notes.txt").unwrap(), b"alice's");
        assert_eq!(host.registry().get("notes.txt").unwrap().unwrap().owner, "alice");
    }

    #[test]
    fn test_concurrent_uploads_of_new_name_one_owner() {
        use std::sync::Barrier;
        use std::thread;

        for round in 0..50 {
            let temp_dir = TempDir::new().unwrap();
            let host = Arc::new(create_test_host(&temp_dir));
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = ["alice", "bob"]
                .into_iter()
                .map(|user| {
                    let host = Arc::clone(&host);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        host.upload(user, "notes.txt", user.as_bytes()).is_ok()
                    })
                })
                .collect();
            let succeeded = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count();

            // The second uploader finds the first one's record and is refused.
            assert_eq!(succeeded, 1, "round {}", round);

            let owner = host.registry().get("notes.txt").unwrap().unwrap().owner;
            assert_eq!(
                host.download("root", "notes.txt").unwrap(),
                owner.as_bytes(),
                "round {}",
                round
            );
        }
    }

    #[test]
    fn test_concurrent_delete_and_reupload_keep_record_with_content() {
        use std::sync::Barrier;
        use std::thread;

        for round in 0..50 {
            let temp_dir = TempDir::new().unwrap();
            let host = Arc::new(create_test_host(&temp_dir));
            host.upload("alice", "notes.txt", b"v1").unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let deleter = {
                let host = Arc::clone(&host);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let _ = host.delete("root", "notes.txt");
                })
            };
            let uploader = {
                let host = Arc::clone(&host);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let _ = host.upload("alice", "notes.txt", b"v2");
                })
            };
            deleter.join().unwrap();
            uploader.join().unwrap();

            // Record and content are either both present or both gone.
            let has_record = host.registry().get("notes.txt").unwrap().is_some();
            let has_content = temp_dir.path().join("files").join("notes.txt").exists();
            assert_eq!(has_record, has_content, "round {}", round);
        }
    }

    #[test]
    fn test_reupload_by_owner_keeps_single_record() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);

        host.upload("alice", "notes.txt", b"v1").unwrap();
        host.upload("alice", "notes.txt", b"v2").unwrap();

        assert_eq!(host.registry().len().unwrap(), 1);
        assert_eq!(host.download("alice", "notes.txt").unwrap(), b"v2");
    }

    #[test]
    fn test_delete_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.upload("alice", "notes.txt", b"hello").unwrap();

        assert!(matches!(
            host.delete("bob", "notes.txt"),
            Err(HostError::PermissionDenied(_))
        ));
        assert!(host.registry().get("notes.txt").unwrap().is_some());

        host.delete("root", "notes.txt").unwrap();
        assert!(host.registry().get("notes.txt").unwrap().is_none());
        assert!(matches!(
            host.download("alice", "notes.txt"),
            Err(HostError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);

        assert!(matches!(
            host.delete("root", "ghost.txt"),
            Err(HostError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_clears_stale_record() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.upload("alice", "notes.txt", b"hello").unwrap();

        // Content vanished behind the registry's back.
        fs::remove_file(temp_dir.path().join("files").join("notes.txt")).unwrap();

        host.delete("alice", "notes.txt").unwrap();
        assert!(host.registry().is_empty().unwrap());
    }

    #[test]
    fn test_delete_keeps_record_when_content_removal_fails() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.upload("alice", "notes.txt", b"hello").unwrap();

        // A non-empty directory cannot be removed with remove_file.
        let path = temp_dir.path().join("files").join("notes.txt");
        fs::remove_file(&path).unwrap();
        fs::create_dir_all(path.join("inner")).unwrap();

        assert!(matches!(
            host.delete("alice", "notes.txt"),
            Err(HostError::Content(_))
        ));
        assert!(host.registry().get("notes.txt").unwrap().is_some());
    }

    #[test]
    fn test_open_and_save_gated() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.upload("alice", "notes.txt", b"v1").unwrap();

        assert_eq!(host.open_file("alice", "notes.txt").unwrap(), b"v1");
        assert!(matches!(
            host.open_file("bob", "notes.txt"),
            Err(HostError::PermissionDenied(_))
        ));
        assert!(matches!(
            host.save_file("bob", "notes.txt", b"hacked"),
            Err(HostError::PermissionDenied(_))
        ));

        host.save_file("root", "notes.txt", b"v2").unwrap();
        assert_eq!(host.open_file("alice", "notes.txt").unwrap(), b"v2");
        // Saving does not transfer ownership.
        assert_eq!(host.registry().get("notes.txt").unwrap().unwrap().owner, "alice");
    }

    #[test]
    fn test_save_without_record_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);

        assert!(matches!(
            host.save_file("root", "ghost.txt", b"x"),
            Err(HostError::NotFound(_))
        ));
        assert!(!temp_dir.path().join("files").join("ghost.txt").exists());
    }

    #[test]
    fn test_list_for_sets_can_delete() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.upload("alice", "a.txt", b"a").unwrap();
        host.upload("bob", "b.txt", b"b").unwrap();

        let for_alice = host.list_for("alice").unwrap();
        let flags: Vec<(String, bool)> = for_alice
            .iter()
            .map(|l| (l.record.name.clone(), l.can_delete))
            .collect();
        assert_eq!(
            flags,
            vec![("a.txt".to_string(), true), ("b.txt".to_string(), false)]
        );

        assert!(host.list_for("root").unwrap().iter().all(|l| l.can_delete));
    }

    #[test]
    fn test_file_listing_json_shape() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.upload("alice", "a.txt", b"a").unwrap();

        let json = serde_json::to_value(host.list_for("alice").unwrap()).unwrap();
        assert_eq!(json[0]["name"], "a.txt");
        assert_eq!(json[0]["owner"], "alice");
        assert!(json[0]["created"].is_string());
        assert_eq!(json[0]["can_delete"], true);
    }

    #[test]
    fn test_dashboard() {
        let temp_dir = TempDir::new().unwrap();
        let host = create_test_host(&temp_dir);
        host.register("alice", "pw1").unwrap();
        host.upload("alice", "a.txt", b"a").unwrap();

        let anonymous = host.dashboard(None).unwrap();
        assert!(!anonymous.authorized);
        assert!(anonymous.files.is_empty());

        let bad = host.dashboard(Some("alice:wrong")).unwrap();
        assert!(!bad.authorized);

        let alice = host.dashboard(Some("alice:pw1")).unwrap();
        assert!(alice.authorized);
        assert_eq!(alice.username.as_deref(), Some("alice"));
        assert!(!alice.is_admin);
        assert_eq!(alice.files.len(), 1);

        let root = host.dashboard(Some("root:toor")).unwrap();
        assert!(root.is_admin);
    }

    #[test]
    fn test_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.files.dir = temp_dir.path().join("files");
        config.identity.user_file = temp_dir.path().join("users.json");

        let host = FileHost::from_config(&config).unwrap();
        assert!(temp_dir.path().join("files").is_dir());
        assert!(host.registry().is_empty().unwrap());
        assert_eq!(host.max_file_size(), config.files.max_size);
    }

    #[test]
    fn test_from_config_fails_on_corrupt_user_file() {
        let temp_dir = TempDir::new().unwrap();
        let users = temp_dir.path().join("users.json");
        fs::write(&users, "not json").unwrap();

        let mut config = Config::default();
        config.files.dir = temp_dir.path().join("files");
        config.identity.user_file = users;

        assert!(FileHost::from_config(&config).is_err());
    }
}
