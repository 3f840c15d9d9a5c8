//! Ownership-based access control for file operations.
//!
//! Reading (list, download) is open to every authenticated user. Editing
//! and deleting require that the requester owns the file or is an admin.
//! Admin status is looked up on every check, so a revoked admin loses
//! access on the next request.

use identity::IdentityStore;

use super::registry::FileRegistry;

/// An operation on a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// List files and their metadata.
    List,
    /// Download file bytes.
    Download,
    /// Open a file for editing.
    Open,
    /// Save edited content.
    Save,
    /// Delete a file.
    Delete,
}

impl FileAction {
    /// Check if this action is limited to the owner or an admin.
    pub fn requires_ownership(&self) -> bool {
        matches!(self, Self::Open | Self::Save | Self::Delete)
    }
}

/// Why an action was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No registry record exists for the file.
    NoRecord,
    /// The requester neither owns the file nor is an admin.
    NotOwner,
    /// The registry or identity store could not answer.
    LookupFailed,
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The action is not ownership-gated.
    Open,
    /// The requester owns the file.
    Owner,
    /// The requester is an admin.
    Admin,
    /// The action is refused.
    Denied(DenyReason),
}

impl AccessDecision {
    /// Check if the action may proceed.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied(_))
    }
}

/// Evaluates access using the registry and the identity store.
pub struct AccessPolicy<'a> {
    identity: &'a dyn IdentityStore,
    registry: &'a FileRegistry,
}

impl<'a> AccessPolicy<'a> {
    /// Creates a policy over the given stores.
    pub fn new(identity: &'a dyn IdentityStore, registry: &'a FileRegistry) -> Self {
        Self { identity, registry }
    }

    /// Decides whether `requester` may perform `action` on file `name`.
    ///
    /// The requester must already be authenticated. Any lookup failure
    /// denies.
    pub fn authorize(&self, requester: &str, name: &str, action: FileAction) -> AccessDecision {
        if !action.requires_ownership() {
            return AccessDecision::Open;
        }

        let record = match self.registry.get(name) {
            Ok(Some(record)) => record,
            Ok(None) => return AccessDecision::Denied(DenyReason::NoRecord),
            Err(e) => {
                tracing::warn!("Registry lookup for {} failed: {}", name, e);
                return AccessDecision::Denied(DenyReason::LookupFailed);
            }
        };

        if record.owner == requester {
            return AccessDecision::Owner;
        }

        match self.identity.is_admin(requester) {
            Ok(true) => AccessDecision::Admin,
            Ok(false) => AccessDecision::Denied(DenyReason::NotOwner),
            Err(e) => {
                tracing::warn!("Admin lookup for {} failed: {}", requester, e);
                AccessDecision::Denied(DenyReason::LookupFailed)
            }
        }
    }

    /// Returns true if `requester` may edit or delete file `name`.
    pub fn can_modify(&self, requester: &str, name: &str) -> bool {
        self.authorize(requester, name, FileAction::Delete).is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use identity::{IdentityError, JsonIdentityStore, StorageMode, UserRecord};
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        identity: JsonIdentityStore,
        registry: FileRegistry,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let identity = JsonIdentityStore::new(temp_dir.path().join("users.json"));
        identity.register("alice", "pw1").unwrap();
        identity.register("bob", "pw2").unwrap();
        identity.register_with_role("root", "toor", true).unwrap();

        let registry = FileRegistry::new(temp_dir.path().join(".fileinfo.json"));
        registry.record("notes.txt", "alice", Utc::now()).unwrap();

        Fixture {
            _temp_dir: temp_dir,
            identity,
            registry,
        }
    }

    /// An identity store whose lookups always fail.
    struct BrokenStore;

    impl IdentityStore for BrokenStore {
        fn load_all(&self) -> identity::Result<()> {
            Ok(())
        }
        fn validate(&self, _: &str, _: &str) -> bool {
            false
        }
        fn register_with_role(&self, _: &str, _: &str, _: bool) -> identity::Result<()> {
            Err(IdentityError::InvalidInput("broken".to_string()))
        }
        fn is_admin(&self, _: &str) -> identity::Result<bool> {
            Err(IdentityError::Io(std::io::Error::other("backend down")))
        }
        fn list_users(&self) -> identity::Result<Vec<UserRecord>> {
            Ok(Vec::new())
        }
        fn mode(&self) -> StorageMode {
            StorageMode::Json
        }
    }

    #[test]
    fn test_requires_ownership() {
        assert!(!FileAction::List.requires_ownership());
        assert!(!FileAction::Download.requires_ownership());
        assert!(FileAction::Open.requires_ownership());
        assert!(FileAction::Save.requires_ownership());
        assert!(FileAction::Delete.requires_ownership());
    }

    #[test]
    fn test_owner_can_modify() {
        let f = fixture();
        let policy = AccessPolicy::new(&f.identity, &f.registry);

        assert_eq!(
            policy.authorize("alice", "notes.txt", FileAction::Delete),
            AccessDecision::Owner
        );
        assert!(policy.can_modify("alice", "notes.txt"));
    }

    #[test]
    fn test_other_user_cannot_modify() {
        let f = fixture();
        let policy = AccessPolicy::new(&f.identity, &f.registry);

        assert_eq!(
            policy.authorize("bob", "notes.txt", FileAction::Save),
            AccessDecision::Denied(DenyReason::NotOwner)
        );
        assert!(!policy.can_modify("bob", "notes.txt"));
    }

    #[test]
    fn test_admin_can_modify_any_file() {
        let f = fixture();
        let policy = AccessPolicy::new(&f.identity, &f.registry);

        assert_eq!(
            policy.authorize("root", "notes.txt", FileAction::Open),
            AccessDecision::Admin
        );
        assert!(policy.can_modify("root", "notes.txt"));
    }

    #[test]
    fn test_missing_record_denies_everyone() {
        let f = fixture();
        let policy = AccessPolicy::new(&f.identity, &f.registry);

        assert_eq!(
            policy.authorize("root", "ghost.txt", FileAction::Delete),
            AccessDecision::Denied(DenyReason::NoRecord)
        );
        assert!(!policy.can_modify("alice", "ghost.txt"));
    }

    #[test]
    fn test_read_actions_are_open() {
        let f = fixture();
        let policy = AccessPolicy::new(&f.identity, &f.registry);

        assert_eq!(
            policy.authorize("bob", "notes.txt", FileAction::Download),
            AccessDecision::Open
        );
        assert!(policy
            .authorize("bob", "ghost.txt", FileAction::List)
            .is_allowed());
    }

    #[test]
    fn test_admin_lookup_failure_denies() {
        let f = fixture();
        let broken = BrokenStore;
        let policy = AccessPolicy::new(&broken, &f.registry);

        assert_eq!(
            policy.authorize("root", "notes.txt", FileAction::Delete),
            AccessDecision::Denied(DenyReason::LookupFailed)
        );
        // Ownership does not need the identity store.
        assert!(policy.can_modify("alice", "notes.txt"));
    }

    #[test]
    fn test_admin_status_resolved_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let users_path = temp_dir.path().join("users.json");
        let registry = FileRegistry::new(temp_dir.path().join(".fileinfo.json"));
        registry.record("notes.txt", "alice", Utc::now()).unwrap();

        let identity = JsonIdentityStore::new(&users_path);
        identity.register("carol", "pw").unwrap();
        assert!(!AccessPolicy::new(&identity, &registry).can_modify("carol", "notes.txt"));

        // Promote carol by editing the backing file and reloading.
        std::fs::write(
            &users_path,
            r#"{"users":[{"username":"carol","password":"pw","is_admin":true}]}"#,
        )
        .unwrap();
        identity.load_all().unwrap();
        assert!(AccessPolicy::new(&identity, &registry).can_modify("carol", "notes.txt"));
    }
}
