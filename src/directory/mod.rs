//! Remote directory boundary — contact and group operations.

pub mod telegram;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

pub use telegram::TelegramDirectory;

/// An account resolved by the platform for one identity.
///
/// Owned by the directory adapter; the pipeline only reads fields for the
/// duration of one identity's processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAccount {
    #[serde(alias = "id")]
    pub user_id: i64,
    #[serde(default)]
    pub access_hash: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Pre-existing contacts captured once at batch start.
///
/// Read-only for the whole batch. Contacts added by concurrent external
/// actors are not visible — an accepted race.
#[derive(Debug, Clone, Default)]
pub struct ContactSnapshot {
    ids: HashSet<i64>,
    names: HashMap<i64, (String, String)>,
}

impl ContactSnapshot {
    pub fn from_contacts(contacts: &[RemoteAccount]) -> Self {
        let mut ids = HashSet::new();
        let mut names = HashMap::new();
        for contact in contacts {
            ids.insert(contact.user_id);
            names.insert(
                contact.user_id,
                (
                    contact.first_name.clone().unwrap_or_default(),
                    contact.last_name.clone().unwrap_or_default(),
                ),
            );
        }
        Self { ids, names }
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.ids.contains(&user_id)
    }

    /// Display names for a known contact; empty strings when unknown.
    pub fn names(&self, user_id: i64) -> (String, String) {
        self.names.get(&user_id).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Remote directory operations the pipeline depends on — pure I/O, no batch
/// logic. Any fallible operation may signal `DirectoryError::FloodWait`;
/// callers route through [`crate::throttle::with_flood_wait`].
#[async_trait]
pub trait Directory: Send + Sync {
    /// Verify the session is authorized. Fatal for the whole run on failure.
    async fn authorize(&self) -> Result<(), DirectoryError>;

    /// Import `identity` as a contact to probe registration; `Ok(None)` when
    /// the platform reports no matching account.
    async fn import_contact(
        &self,
        identity: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<RemoteAccount>, DirectoryError>;

    /// Ask the platform to add `account` to `group`. A privacy-restricted
    /// account may no-op silently, so membership must be re-verified.
    async fn invite_to_group(
        &self,
        account: &RemoteAccount,
        group: &str,
    ) -> Result<(), DirectoryError>;

    /// Membership predicate by exact user id. Paging through the member list
    /// is this adapter's concern; callers only see the boolean.
    async fn is_group_member(&self, group: &str, user_id: i64) -> Result<bool, DirectoryError>;

    async fn send_direct_message(
        &self,
        account: &RemoteAccount,
        text: &str,
    ) -> Result<(), DirectoryError>;

    async fn delete_contact(&self, account: &RemoteAccount) -> Result<(), DirectoryError>;

    /// All contacts currently saved to the operator account's directory.
    async fn list_contacts(&self) -> Result<Vec<RemoteAccount>, DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(user_id: i64, first: Option<&str>, last: Option<&str>) -> RemoteAccount {
        RemoteAccount {
            user_id,
            access_hash: user_id * 10,
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            phone: None,
        }
    }

    #[test]
    fn snapshot_membership() {
        let snapshot =
            ContactSnapshot::from_contacts(&[account(1, Some("Ada"), None), account(2, None, None)]);
        assert!(snapshot.contains(1));
        assert!(snapshot.contains(2));
        assert!(!snapshot.contains(3));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn snapshot_names_fall_back_to_empty() {
        let snapshot = ContactSnapshot::from_contacts(&[account(7, Some("Ada"), None)]);
        assert_eq!(snapshot.names(7), ("Ada".to_string(), String::new()));
        assert_eq!(snapshot.names(99), (String::new(), String::new()));
    }

    #[test]
    fn remote_account_accepts_wire_id_alias() {
        let account: RemoteAccount = serde_json::from_value(serde_json::json!({
            "id": 42,
            "access_hash": 777,
            "first_name": "Grace",
        }))
        .unwrap();
        assert_eq!(account.user_id, 42);
        assert_eq!(account.access_hash, 777);
        assert_eq!(account.first_name.as_deref(), Some("Grace"));
        assert!(account.last_name.is_none());
        assert!(account.phone.is_none());
    }
}
