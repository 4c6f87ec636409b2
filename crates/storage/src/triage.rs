use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use url_triage_core::{Identifier, IdentifierSource, SummaryRecord, SummarySink};
use url_triage_util::StoreConfig;

use crate::{Database, DocumentKey, DocumentRepository, StorageError};

/// Reads submission identifiers from the configured source container.
#[derive(Clone)]
pub struct SubmissionSource {
    documents: DocumentRepository,
    database_id: String,
    container_id: String,
}

impl SubmissionSource {
    pub fn new(database: &Database, config: &StoreConfig) -> Self {
        Self {
            documents: database.documents(),
            database_id: config.database_id.clone(),
            container_id: config.source_container.clone(),
        }
    }
}

#[async_trait]
impl IdentifierSource for SubmissionSource {
    type Error = StorageError;

    async fn fetch_pending_identifiers(
        &self,
        since: DateTime<Utc>,
    ) -> Result<BTreeSet<Identifier>, StorageError> {
        let ids = self
            .documents
            .ids_modified_after(&self.database_id, &self.container_id, since)
            .await?;

        let identifiers: BTreeSet<Identifier> = ids.into_iter().map(Identifier::from).collect();
        info!(
            stage = "source",
            database = %self.database_id,
            container = %self.container_id,
            since = since.timestamp(),
            count = identifiers.len(),
            "loaded pending identifiers"
        );
        Ok(identifiers)
    }
}

/// Writes run summaries into the configured results container.
#[derive(Clone)]
pub struct SummaryStore {
    documents: DocumentRepository,
    database_id: String,
    container_id: String,
}

impl SummaryStore {
    pub fn new(database: &Database, config: &StoreConfig) -> Self {
        Self {
            documents: database.documents(),
            database_id: config.database_id.clone(),
            container_id: config.results_container.clone(),
        }
    }
}

#[async_trait]
impl SummarySink for SummaryStore {
    type Error = StorageError;

    async fn upsert_summary(&self, record: &SummaryRecord) -> Result<(), StorageError> {
        let key = DocumentKey {
            database_id: &self.database_id,
            container_id: &self.container_id,
            id: &record.id,
        };
        let payload = record.to_document()?;
        self.documents
            .upsert(key, &payload, record.generated_at)
            .await?;

        info!(
            stage = "sink",
            database = %self.database_id,
            container = %self.container_id,
            id = %record.id,
            urls = record.total(),
            "summary upserted"
        );
        Ok(())
    }
}
