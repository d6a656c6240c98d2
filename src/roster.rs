//! Input roster loading.

use std::path::Path;

use tracing::info;

use crate::error::RosterError;
use crate::identity;

/// Load identities from the roster CSV.
///
/// The phone column is matched case-insensitively after header trimming.
/// Every row yields one normalized identity — duplicates are kept and
/// processed independently.
pub fn load_identities(path: &Path) -> Result<Vec<String>, RosterError> {
    if !path.exists() {
        return Err(RosterError::NotFound(path.display().to_string()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let phone_idx = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("phone"))
        .ok_or(RosterError::MissingPhoneColumn)?;

    let mut identities = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(raw) = record.get(phone_idx) {
            identities.push(identity::normalize(raw));
        }
    }

    info!(count = identities.len(), path = %path.display(), "Roster loaded");
    Ok(identities)
}
