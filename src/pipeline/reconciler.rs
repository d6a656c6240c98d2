//! End-of-batch contact reconciliation.

use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::pipeline::types::MatchRecord;
use crate::throttle::{FloodPolicy, Sleeper, with_flood_wait};

/// Flush the update ledger: re-import each matched contact with its resolved
/// names, restoring the display name the probe import overwrote. Records are
/// independent and best-effort — failures are logged and skipped, never
/// escalated. Returns the number of contacts actually updated.
pub async fn apply_matches(
    directory: &dyn Directory,
    sleeper: &dyn Sleeper,
    policy: FloodPolicy,
    matches: &[MatchRecord],
) -> usize {
    if matches.is_empty() {
        return 0;
    }

    info!(count = matches.len(), "Reconciling matched contact names");
    let mut applied = 0;

    for record in matches {
        match with_flood_wait(policy, sleeper, || {
            directory.import_contact(&record.identity, &record.first_name, &record.last_name)
        })
        .await
        {
            Ok(_) => {
                debug!(
                    identity = %record.identity,
                    first_name = %record.first_name,
                    last_name = %record.last_name,
                    "Contact name restored"
                );
                applied += 1;
            }
            Err(e) => {
                warn!(identity = %record.identity, error = %e, "Failed to update contact");
            }
        }
    }

    applied
}
