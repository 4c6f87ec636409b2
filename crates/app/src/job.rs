use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use url_triage_core::{
    aggregate, build_summary, partition, AggregateReport, Classifier, IdentifierSource,
    KnownCategory, Partition, SummarySink,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One pass of the reconciliation: identifiers in, one summary record out.
pub struct ReconcileJob<S, C, K> {
    source: S,
    classifier: C,
    sink: K,
    lookback: Duration,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl<S, C, K> ReconcileJob<S, C, K>
where
    S: IdentifierSource,
    C: Classifier,
    K: SummarySink,
{
    /// Creates a job using the system clock.
    pub fn new(source: S, classifier: C, sink: K, lookback: Duration) -> Self {
        Self {
            source,
            classifier,
            sink,
            lookback,
            clock: Arc::new(Utc::now),
        }
    }

    /// Overrides the clock used for the cutoff and the summary timestamp.
    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the job once. Nothing is written unless every step before the sink succeeded.
    pub async fn run_once(&self) -> Result<RunReport, RunError> {
        let now = (self.clock)();
        let since = ChronoDuration::from_std(self.lookback)
            .ok()
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .ok_or(RunError::Lookback(self.lookback))?;

        info!(stage = "run", now = %now.to_rfc3339(), since = since.timestamp(), "starting reconciliation run");

        let identifiers = self
            .source
            .fetch_pending_identifiers(since)
            .await
            .map_err(|err| RunError::Source(Box::new(err)))?;

        let aggregation = aggregate(&identifiers, &self.classifier).await;
        let partition = partition(&aggregation.map);
        log_partition(&partition);

        let record = build_summary(&partition, now);
        self.sink
            .upsert_summary(&record)
            .await
            .map_err(|err| RunError::Sink {
                id: record.id.clone(),
                source: Box::new(err),
            })?;

        Ok(RunReport {
            identifiers: identifiers.len(),
            lookups: aggregation.report,
            distinct_urls: aggregation.map.len(),
            unrecognized_urls: partition.other_total(),
            summary_id: record.id,
        })
    }
}

fn log_partition(partition: &Partition) {
    for category in KnownCategory::ALL {
        let urls = partition.bucket(category);
        info!(stage = "summary", category = category.field_name(), count = urls.len(), "bucket");
        if !urls.is_empty() {
            debug!(stage = "summary", category = category.field_name(), urls = %urls.join(" "), "bucket urls");
        }
    }

    for (label, urls) in partition.other() {
        warn!(
            stage = "summary",
            category = %label,
            count = urls.len(),
            "urls with unrecognized category are excluded from the summary"
        );
    }
}

/// What one run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub identifiers: usize,
    pub lookups: AggregateReport,
    pub distinct_urls: usize,
    pub unrecognized_urls: usize,
    pub summary_id: String,
}

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("lookback of {0:?} cannot be subtracted from the current time")]
    Lookback(Duration),
    #[error("failed to load pending identifiers: {0}")]
    Source(#[source] BoxError),
    #[error("failed to persist summary {id}: {source}")]
    Sink {
        id: String,
        #[source]
        source: BoxError,
    },
}
