//! Per-identity outcome classification.
//!
//! Drives the directory through import → invite → verify → fallback and
//! decides the terminal status. Identities are isolated from each other:
//! everything short of a critical error still reaches the cleanup step, and
//! no error below fatal-for-batch escapes `classify`.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::InviteMessages;
use crate::directory::{ContactSnapshot, Directory, RemoteAccount};
use crate::error::DirectoryError;
use crate::pipeline::types::{MatchRecord, Outcome};
use crate::throttle::{FloodPolicy, Sleeper, with_flood_wait};

/// Placeholder names for probe imports. The reconciler restores the real
/// names of contacts that already existed.
const PROBE_FIRST_NAME: &str = "Temp";
const PROBE_LAST_NAME: &str = "Contact";

/// Result of classifying one identity.
#[derive(Debug)]
pub struct Classified {
    pub outcome: Outcome,
    /// Present when the identity resolved to a pre-existing contact.
    pub matched: Option<MatchRecord>,
}

/// The per-identity state machine. Holds only borrowed collaborators; the
/// driver owns the batch state.
pub struct Classifier<'a> {
    pub directory: &'a dyn Directory,
    pub sleeper: &'a dyn Sleeper,
    pub policy: FloodPolicy,
    pub group: &'a str,
    pub invite_link: &'a str,
    pub messages: &'a InviteMessages,
    pub snapshot: &'a ContactSnapshot,
}

impl Classifier<'_> {
    /// Classify one identity. Never fails: unclassified errors become
    /// `critical_error` and skip cleanup for this identity only.
    pub async fn classify<R: Rng>(&self, identity: &str, rng: &mut R) -> Classified {
        match self.run_pipeline(identity, rng).await {
            Ok(classified) => classified,
            Err(e) => {
                warn!(identity, error = %e, "Critical error; cleanup skipped for this identity");
                Classified {
                    outcome: Outcome::CriticalError,
                    matched: None,
                }
            }
        }
    }

    async fn run_pipeline<R: Rng>(
        &self,
        identity: &str,
        rng: &mut R,
    ) -> Result<Classified, DirectoryError> {
        // Registration probe: importing the number tells us whether an
        // account exists at all.
        let account = match with_flood_wait(self.policy, self.sleeper, || {
            self.directory
                .import_contact(identity, PROBE_FIRST_NAME, PROBE_LAST_NAME)
        })
        .await
        {
            Ok(Some(account)) => account,
            Ok(None) => {
                info!(identity, "Not registered on the platform");
                return Ok(Classified {
                    outcome: Outcome::NotRegistered,
                    matched: None,
                });
            }
            Err(DirectoryError::FloodExhausted { attempts }) => {
                warn!(identity, attempts, "Abandoned while flood-limited on import");
                return Ok(Classified {
                    outcome: Outcome::RateLimitedAbandoned,
                    matched: None,
                });
            }
            Err(e) => return Err(e),
        };

        // Temporary-vs-existing is fixed here and never re-evaluated, even
        // if contact data changes later in the batch.
        let is_temp = !self.snapshot.contains(account.user_id);
        debug!(
            identity,
            user_id = account.user_id,
            is_temp,
            "Resolved account"
        );

        let outcome = self.invite_and_verify(identity, &account, rng).await;
        let matched = self.cleanup(identity, &account, is_temp).await;

        Ok(Classified { outcome, matched })
    }

    /// Invite the account, verify membership, and fall back to a direct
    /// message. Every failure mode here maps to a terminal status — only
    /// the import step can escalate to a critical error.
    async fn invite_and_verify<R: Rng>(
        &self,
        identity: &str,
        account: &RemoteAccount,
        rng: &mut R,
    ) -> Outcome {
        match with_flood_wait(self.policy, self.sleeper, || {
            self.directory.invite_to_group(account, self.group)
        })
        .await
        {
            Ok(()) => {}
            Err(DirectoryError::PrivacyRestricted) => {
                // The membership check below settles it either way.
                debug!(identity, "Invite reported a privacy restriction");
            }
            Err(DirectoryError::FloodExhausted { attempts }) => {
                warn!(identity, attempts, "Abandoned while flood-limited on invite");
                return Outcome::RateLimitedAbandoned;
            }
            Err(e) => {
                warn!(identity, error = %e, "Invite failed");
                return Outcome::InviteError;
            }
        }

        // A successful invite call does not guarantee membership: restricted
        // accounts no-op the invite silently. Only the member list decides.
        let is_member = match with_flood_wait(self.policy, self.sleeper, || {
            self.directory.is_group_member(self.group, account.user_id)
        })
        .await
        {
            Ok(is_member) => is_member,
            Err(DirectoryError::FloodExhausted { attempts }) => {
                warn!(
                    identity,
                    attempts, "Abandoned while flood-limited on membership check"
                );
                return Outcome::RateLimitedAbandoned;
            }
            Err(e) => {
                warn!(identity, error = %e, "Membership check failed");
                return Outcome::InviteError;
            }
        };

        if is_member {
            info!(identity, "Added to group");
            return Outcome::Added;
        }

        info!(identity, "Add restricted; sending a direct invite instead");
        let text = self.messages.pick(rng, self.invite_link);
        match with_flood_wait(self.policy, self.sleeper, || {
            self.directory.send_direct_message(account, &text)
        })
        .await
        {
            Ok(()) => Outcome::RestrictedDmSent,
            Err(DirectoryError::FloodExhausted { attempts }) => {
                warn!(identity, attempts, "Abandoned while flood-limited on direct message");
                Outcome::RateLimitedAbandoned
            }
            Err(e) => {
                warn!(identity, error = %e, "Direct invite failed");
                Outcome::RestrictedDmFailed
            }
        }
    }

    /// Cleanup step: delete probe contacts, or record a rename for contacts
    /// that already existed. Failures here are logged and skipped — the
    /// identity's status is already decided.
    async fn cleanup(
        &self,
        identity: &str,
        account: &RemoteAccount,
        is_temp: bool,
    ) -> Option<MatchRecord> {
        if is_temp {
            if let Err(e) = with_flood_wait(self.policy, self.sleeper, || {
                self.directory.delete_contact(account)
            })
            .await
            {
                warn!(identity, error = %e, "Failed to delete temporary contact");
            }
            return None;
        }

        let (first_name, last_name) = self.snapshot.names(account.user_id);
        Some(MatchRecord {
            identity: identity.to_string(),
            user_id: account.user_id,
            first_name,
            last_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    // ── Scripted fake directory ─────────────────────────────────────

    type Script<T> = Mutex<VecDeque<Result<T, DirectoryError>>>;

    /// Scripted directory: each operation pops its next scripted result and
    /// logs the call. An empty script yields a benign default.
    #[derive(Default)]
    struct ScriptedDirectory {
        import: Script<Option<RemoteAccount>>,
        invite: Script<()>,
        member: Script<bool>,
        dm: Script<()>,
        delete: Script<()>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedDirectory {
        fn log(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn push_import(&self, result: Result<Option<RemoteAccount>, DirectoryError>) {
            self.import.lock().unwrap().push_back(result);
        }

        fn push_invite(&self, result: Result<(), DirectoryError>) {
            self.invite.lock().unwrap().push_back(result);
        }

        fn push_member(&self, result: Result<bool, DirectoryError>) {
            self.member.lock().unwrap().push_back(result);
        }

        fn push_dm(&self, result: Result<(), DirectoryError>) {
            self.dm.lock().unwrap().push_back(result);
        }

        fn push_delete(&self, result: Result<(), DirectoryError>) {
            self.delete.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl Directory for ScriptedDirectory {
        async fn authorize(&self) -> Result<(), DirectoryError> {
            Ok(())
        }

        async fn import_contact(
            &self,
            identity: &str,
            first_name: &str,
            last_name: &str,
        ) -> Result<Option<RemoteAccount>, DirectoryError> {
            self.log(format!("import:{identity}:{first_name}:{last_name}"));
            self.import
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        async fn invite_to_group(
            &self,
            account: &RemoteAccount,
            group: &str,
        ) -> Result<(), DirectoryError> {
            self.log(format!("invite:{}:{group}", account.user_id));
            self.invite.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn is_group_member(
            &self,
            group: &str,
            user_id: i64,
        ) -> Result<bool, DirectoryError> {
            self.log(format!("member:{user_id}:{group}"));
            self.member.lock().unwrap().pop_front().unwrap_or(Ok(true))
        }

        async fn send_direct_message(
            &self,
            account: &RemoteAccount,
            text: &str,
        ) -> Result<(), DirectoryError> {
            self.log(format!("dm:{}:{text}", account.user_id));
            self.dm.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn delete_contact(&self, account: &RemoteAccount) -> Result<(), DirectoryError> {
            self.log(format!("delete:{}", account.user_id));
            self.delete.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn list_contacts(&self) -> Result<Vec<RemoteAccount>, DirectoryError> {
            Ok(Vec::new())
        }
    }

    struct NoopSleeper;

    #[async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn account(user_id: i64) -> RemoteAccount {
        RemoteAccount {
            user_id,
            access_hash: user_id * 10,
            first_name: Some("Temp".into()),
            last_name: Some("Contact".into()),
            phone: None,
        }
    }

    fn messages() -> InviteMessages {
        InviteMessages::from_templates(vec!["Join: {invite_link}".into()]).unwrap()
    }

    async fn classify_with(
        directory: &ScriptedDirectory,
        snapshot: &ContactSnapshot,
        max_retries: u32,
    ) -> Classified {
        let sleeper = NoopSleeper;
        let msgs = messages();
        let classifier = Classifier {
            directory,
            sleeper: &sleeper,
            policy: FloodPolicy { max_retries },
            group: "@grp",
            invite_link: "https://t.me/+abc",
            messages: &msgs,
            snapshot,
        };
        let mut rng = StdRng::seed_from_u64(1);
        classifier.classify("+1555000", &mut rng).await
    }

    fn flood(secs: u64) -> DirectoryError {
        DirectoryError::FloodWait {
            retry_after: Duration::from_secs(secs),
        }
    }

    fn api_error() -> DirectoryError {
        DirectoryError::Api {
            code: 400,
            description: "PEER_ID_INVALID".into(),
        }
    }

    // ── Status taxonomy ─────────────────────────────────────────────

    #[tokio::test]
    async fn unregistered_identity_touches_nothing_else() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(None));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::NotRegistered);
        assert!(result.matched.is_none());
        // Exactly one remote call: the registration probe.
        assert_eq!(directory.calls(), vec!["import:+1555000:Temp:Contact"]);
    }

    #[tokio::test]
    async fn verified_member_is_added_and_probe_deleted() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_member(Ok(true));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::Added);
        assert!(result.matched.is_none());
        assert_eq!(
            directory.calls(),
            vec![
                "import:+1555000:Temp:Contact",
                "invite:42:@grp",
                "member:42:@grp",
                "delete:42",
            ]
        );
    }

    #[tokio::test]
    async fn restricted_account_gets_exactly_one_dm() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_member(Ok(false));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::RestrictedDmSent);

        let calls = directory.calls();
        let dm_calls: Vec<_> = calls.iter().filter(|c| c.starts_with("dm:")).collect();
        assert_eq!(dm_calls.len(), 1);
        assert_eq!(dm_calls[0], "dm:42:Join: https://t.me/+abc");
    }

    #[tokio::test]
    async fn dm_failure_is_its_own_status() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_member(Ok(false));
        directory.push_dm(Err(api_error()));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::RestrictedDmFailed);
        // Cleanup still ran.
        assert!(directory.calls().iter().any(|c| c == "delete:42"));
    }

    #[tokio::test]
    async fn invite_error_still_cleans_up() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_invite(Err(api_error()));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::InviteError);
        assert!(directory.calls().iter().any(|c| c == "delete:42"));
        // No membership check and no DM after a hard invite failure.
        assert!(!directory.calls().iter().any(|c| c.starts_with("member:")));
        assert!(!directory.calls().iter().any(|c| c.starts_with("dm:")));
    }

    #[tokio::test]
    async fn privacy_restricted_invite_still_verifies_membership() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_invite(Err(DirectoryError::PrivacyRestricted));
        directory.push_member(Ok(false));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::RestrictedDmSent);
        assert!(directory.calls().iter().any(|c| c.starts_with("member:")));
    }

    #[tokio::test]
    async fn critical_import_error_skips_cleanup() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Err(api_error()));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::CriticalError);
        assert!(result.matched.is_none());
        assert_eq!(directory.calls().len(), 1);
    }

    // ── Flood-wait behavior ─────────────────────────────────────────

    #[tokio::test]
    async fn flood_wait_retries_the_same_call_before_advancing() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_invite(Err(flood(3)));
        directory.push_invite(Ok(()));
        directory.push_member(Ok(true));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::Added);

        let calls = directory.calls();
        // The invite was re-issued before the membership check ran.
        assert_eq!(calls[1], "invite:42:@grp");
        assert_eq!(calls[2], "invite:42:@grp");
        assert_eq!(calls[3], "member:42:@grp");
    }

    #[tokio::test]
    async fn persistent_flood_wait_abandons_but_cleans_up() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_invite(Err(flood(1)));
        directory.push_invite(Err(flood(1)));

        let result = classify_with(&directory, &ContactSnapshot::default(), 1).await;
        assert_eq!(result.outcome, Outcome::RateLimitedAbandoned);
        assert!(directory.calls().iter().any(|c| c == "delete:42"));
    }

    // ── Contact reconciliation inputs ───────────────────────────────

    #[tokio::test]
    async fn existing_contact_yields_match_record_not_delete() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_member(Ok(true));

        let snapshot = ContactSnapshot::from_contacts(&[RemoteAccount {
            user_id: 42,
            access_hash: 420,
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            phone: Some("+1555000".into()),
        }]);

        let result = classify_with(&directory, &snapshot, 3).await;
        assert_eq!(result.outcome, Outcome::Added);
        assert_eq!(
            result.matched,
            Some(MatchRecord {
                identity: "+1555000".into(),
                user_id: 42,
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
            })
        );
        assert!(!directory.calls().iter().any(|c| c.starts_with("delete:")));
    }

    #[tokio::test]
    async fn missing_names_fall_back_to_empty_strings() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_member(Ok(true));

        let snapshot = ContactSnapshot::from_contacts(&[RemoteAccount {
            user_id: 42,
            access_hash: 420,
            first_name: None,
            last_name: None,
            phone: None,
        }]);

        let result = classify_with(&directory, &snapshot, 3).await;
        let matched = result.matched.unwrap();
        assert_eq!(matched.first_name, "");
        assert_eq!(matched.last_name, "");
    }

    #[tokio::test]
    async fn failed_probe_delete_keeps_the_decided_status() {
        let directory = ScriptedDirectory::default();
        directory.push_import(Ok(Some(account(42))));
        directory.push_member(Ok(true));
        directory.push_delete(Err(api_error()));

        let result = classify_with(&directory, &ContactSnapshot::default(), 3).await;
        assert_eq!(result.outcome, Outcome::Added);
        assert!(result.matched.is_none());
    }
}
