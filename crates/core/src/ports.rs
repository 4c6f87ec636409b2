use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::summary::SummaryRecord;
use crate::types::{Identifier, Lookup};

/// Read side of the document store: identifiers submitted since a cutoff.
#[async_trait]
pub trait IdentifierSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the distinct identifiers whose creation time is after `since`.
    async fn fetch_pending_identifiers(
        &self,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<Identifier>, Self::Error>;
}

/// External threat-intelligence lookup for one identifier.
///
/// Implementations never fail: transport and status problems are folded into
/// the returned [`Lookup`].
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, identifier: &Identifier) -> Lookup;
}

/// Write side of the document store: persists the run summary.
#[async_trait]
pub trait SummarySink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts or replaces the summary keyed by `record.id`.
    async fn upsert_summary(&self, record: &SummaryRecord) -> Result<(), Self::Error>;
}
