use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::aggregate::Partition;
use crate::types::KnownCategory;

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
const URL_SEPARATOR: &str = " ";

/// Count and joined URL list of one named category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTally {
    pub category: KnownCategory,
    pub count: usize,
    pub urls: String,
}

impl CategoryTally {
    /// Splits the joined list back into its URLs.
    pub fn url_list(&self) -> Vec<&str> {
        if self.urls.is_empty() {
            return Vec::new();
        }
        self.urls.split(URL_SEPARATOR).collect()
    }
}

/// Aggregate record persisted once per run.
///
/// Serializes to the flat document shape
/// `{ id, date_time, date, n_<category>, <category>, ... }` with counts as
/// decimal strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub id: String,
    pub date_time: String,
    pub date: String,
    /// Run timestamp the id and dates derive from; not part of the document.
    pub generated_at: DateTime<Utc>,
    tallies: [CategoryTally; 8],
}

impl SummaryRecord {
    pub fn tally(&self, category: KnownCategory) -> &CategoryTally {
        &self.tallies[category.index()]
    }

    pub fn tallies(&self) -> &[CategoryTally] {
        &self.tallies
    }

    pub fn total(&self) -> usize {
        self.tallies.iter().map(|tally| tally.count).sum()
    }

    /// Renders the record as the JSON document written to the results container.
    pub fn to_document(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Serialize for SummaryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.tallies.len() * 2))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("date_time", &self.date_time)?;
        map.serialize_entry("date", &self.date)?;
        for tally in &self.tallies {
            let field = tally.category.field_name();
            map.serialize_entry(&format!("n_{field}"), &tally.count.to_string())?;
            map.serialize_entry(field, &tally.urls)?;
        }
        map.end()
    }
}

/// Builds the run summary from partitioned buckets. Pure; no I/O.
pub fn build_summary(partition: &Partition, now: DateTime<Utc>) -> SummaryRecord {
    let tallies = KnownCategory::ALL.map(|category| {
        let bucket = partition.bucket(category);
        CategoryTally {
            category,
            count: bucket.len(),
            urls: bucket.join(URL_SEPARATOR),
        }
    });

    SummaryRecord {
        id: now.timestamp().to_string(),
        date_time: now.format(DATE_TIME_FORMAT).to_string(),
        date: now.format(DATE_FORMAT).to_string(),
        generated_at: now,
        tallies,
    }
}
