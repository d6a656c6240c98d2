//! The per-identity batch pipeline.
//!
//! Every identity flows through:
//! 1. `identity::normalize` — canonical phone form
//! 2. `Classifier::classify` — import → invite → verify → fallback → cleanup
//! 3. `BatchDriver` — sequencing, politeness delay, ledger aggregation
//! 4. `reconciler::apply_matches` — post-batch contact rename pass
//!
//! Identities are strictly sequential; nothing here overlaps remote calls.

pub mod classifier;
pub mod driver;
pub mod reconciler;
pub mod types;

pub use classifier::{Classified, Classifier};
pub use driver::BatchDriver;
pub use types::{MatchRecord, Outcome, OutcomeRecord};
