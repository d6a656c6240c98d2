//! Outcome ledger and report serialization.

use std::path::Path;

use tracing::info;

use crate::error::ReportError;
use crate::pipeline::types::OutcomeRecord;

/// Append-only outcome ledger, flushed to a CSV report at end of batch.
#[derive(Debug, Default)]
pub struct Reporter {
    records: Vec<OutcomeRecord>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one outcome row. Called exactly once per processed identity.
    pub fn append(&mut self, record: OutcomeRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[OutcomeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the report in arrival order and flush it. A zero-identity batch
    /// still produces a header-only file.
    pub fn write_csv(&self, path: &Path) -> Result<(), ReportError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["identity", "status"])?;
        for record in &self.records {
            writer.write_record([record.identity.as_str(), record.status.label()])?;
        }
        writer.flush()?;
        info!(rows = self.records.len(), path = %path.display(), "Report written");
        Ok(())
    }
}
