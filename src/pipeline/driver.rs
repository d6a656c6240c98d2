//! Batch sequencing over the identity list.

use std::time::Duration;

use rand::Rng;
use tracing::info;

use crate::pipeline::classifier::Classifier;
use crate::pipeline::types::{MatchRecord, OutcomeRecord};
use crate::report::Reporter;
use crate::throttle::Sleeper;

/// Upper bound on the random jitter added to the politeness delay.
const JITTER_MAX_SECS: f64 = 2.0;

/// Drives the identity list in input order — no dedup, no reordering, no
/// parallelism. Overlapping identity processing would trip the platform's
/// abuse detection.
pub struct BatchDriver<'a, R: Rng> {
    pub classifier: Classifier<'a>,
    pub sleeper: &'a dyn Sleeper,
    /// Base delay between identities; jitter is added per identity.
    pub delay: Duration,
    pub rng: R,
}

impl<R: Rng> BatchDriver<'_, R> {
    /// Process every identity, appending one outcome row per identity to the
    /// reporter as it completes. Returns the update ledger for the
    /// post-batch reconciliation pass. Individual failures never abort the
    /// batch.
    pub async fn run(mut self, identities: &[String], reporter: &mut Reporter) -> Vec<MatchRecord> {
        let total = identities.len();
        let mut matches = Vec::new();

        for (index, identity) in identities.iter().enumerate() {
            info!(index = index + 1, total, identity = %identity, "Processing identity");

            let classified = self.classifier.classify(identity, &mut self.rng).await;
            info!(
                identity = %identity,
                status = classified.outcome.label(),
                "Identity processed"
            );

            reporter.append(OutcomeRecord::new(identity.clone(), classified.outcome));
            if let Some(record) = classified.matched {
                matches.push(record);
            }

            // Politeness throttle between identities, independent of any
            // flood-wait backoff inside the pipeline.
            let jitter = self.rng.gen_range(0.0..JITTER_MAX_SECS);
            self.sleeper
                .sleep(self.delay + Duration::from_secs_f64(jitter))
                .await;
        }

        matches
    }
}
