use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, warn};

use crate::ports::Classifier;
use crate::types::{Category, CharacterizationMap, Identifier, KnownCategory, Lookup, LookupStatus};

/// Counters describing how the lookups of one run went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateReport {
    pub identifiers: usize,
    pub with_results: usize,
    pub empty: usize,
    pub non_success: usize,
    pub failed: usize,
    pub malformed_entries: usize,
    pub overwritten_urls: usize,
}

/// Running merge of lookups into a [`CharacterizationMap`].
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub map: CharacterizationMap,
    pub report: AggregateReport,
}

impl Aggregation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one lookup into the map. Results of later lookups overwrite earlier ones.
    pub fn absorb(&mut self, lookup: Lookup) {
        self.report.identifiers += 1;
        let identifier = lookup.identifier;

        for entry in &lookup.malformed {
            error!(stage = "aggregate", identifier = %identifier, error = %entry, "malformed url entry skipped");
        }
        self.report.malformed_entries += lookup.malformed.len();

        match lookup.status {
            LookupStatus::Results => {
                self.report.with_results += 1;
                debug!(stage = "aggregate", identifier = %identifier, urls = lookup.results.len(), "merging results");
                self.report.overwritten_urls += self.map.merge(lookup.results);
            }
            LookupStatus::Empty => {
                self.report.empty += 1;
                debug!(stage = "aggregate", identifier = %identifier, "no results available");
            }
            LookupStatus::NonSuccess(status) => {
                self.report.non_success += 1;
                warn!(stage = "aggregate", identifier = %identifier, status, "classification returned non-success status");
            }
            LookupStatus::Failed(reason) => {
                self.report.failed += 1;
                warn!(stage = "aggregate", identifier = %identifier, reason = %reason, "classification request failed");
            }
        }
    }
}

impl FromIterator<Lookup> for Aggregation {
    fn from_iter<T: IntoIterator<Item = Lookup>>(iter: T) -> Self {
        let mut aggregation = Self::new();
        for lookup in iter {
            aggregation.absorb(lookup);
        }
        aggregation
    }
}

/// Classifies every identifier sequentially and merges the results.
///
/// Identifiers are visited in ascending order so the last-write-wins merge is
/// a function of the identifier set alone.
pub async fn aggregate<C>(identifiers: &BTreeSet<Identifier>, classifier: &C) -> Aggregation
where
    C: Classifier + ?Sized,
{
    let mut aggregation = Aggregation::new();
    for identifier in identifiers {
        let lookup = classifier.classify(identifier).await;
        aggregation.absorb(lookup);
    }
    aggregation
}

/// URLs of a [`CharacterizationMap`] grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    buckets: [Vec<String>; 8],
    other: BTreeMap<String, Vec<String>>,
}

impl Partition {
    /// Sorted URLs for one of the eight named categories.
    pub fn bucket(&self, category: KnownCategory) -> &[String] {
        &self.buckets[category.index()]
    }

    /// Sorted URLs for unrecognized categories, keyed by the label as returned.
    pub fn other(&self) -> &BTreeMap<String, Vec<String>> {
        &self.other
    }

    pub fn named_total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn other_total(&self) -> usize {
        self.other.values().map(Vec::len).sum()
    }

    pub fn total(&self) -> usize {
        self.named_total() + self.other_total()
    }
}

/// Groups URLs by category. Every URL lands in exactly one bucket.
pub fn partition(map: &CharacterizationMap) -> Partition {
    let mut partition = Partition::default();
    // The map iterates in URL order, so every bucket is filled already sorted.
    for (url, category) in map.iter() {
        match category {
            Category::Known(known) => partition.buckets[known.index()].push(url.clone()),
            Category::Other(label) => partition
                .other
                .entry(label.clone())
                .or_default()
                .push(url.clone()),
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MalformedEntry, UrlResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedClassifier {
        responses: HashMap<String, Lookup>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedClassifier {
        fn with(mut self, lookup: Lookup) -> Self {
            self.responses
                .insert(lookup.identifier.as_str().to_string(), lookup);
            self
        }
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(&self, identifier: &Identifier) -> Lookup {
            self.calls
                .lock()
                .expect("calls guard")
                .push(identifier.as_str().to_string());
            self.responses
                .get(identifier.as_str())
                .cloned()
                .unwrap_or_else(|| Lookup::empty(identifier.clone()))
        }
    }

    fn ids(values: &[&str]) -> BTreeSet<Identifier> {
        values.iter().map(|value| Identifier::from(*value)).collect()
    }

    #[tokio::test]
    async fn empty_identifier_set_yields_empty_map() {
        let classifier = ScriptedClassifier::default();
        let aggregation = aggregate(&BTreeSet::new(), &classifier).await;

        assert!(aggregation.map.is_empty());
        assert_eq!(aggregation.report, AggregateReport::default());
        assert!(classifier.calls.lock().expect("calls guard").is_empty());
    }

    #[tokio::test]
    async fn later_identifier_wins_for_shared_url() {
        let classifier = ScriptedClassifier::default()
            .with(Lookup::with_results(
                "A".into(),
                vec![UrlResult::new("http://x.com", "phishing")],
                Vec::new(),
            ))
            .with(Lookup::with_results(
                "B".into(),
                vec![
                    UrlResult::new("http://y.com", "malware"),
                    UrlResult::new("http://x.com", "no threats"),
                ],
                Vec::new(),
            ));

        // Inserted out of order on purpose; processing follows identifier order.
        let aggregation = aggregate(&ids(&["B", "A"]), &classifier).await;

        assert_eq!(
            *classifier.calls.lock().expect("calls guard"),
            vec!["A".to_string(), "B".to_string()]
        );
        assert_eq!(aggregation.map.len(), 2);
        assert_eq!(
            aggregation.map.get("http://x.com"),
            Some(&Category::Known(KnownCategory::NoThreats))
        );
        assert_eq!(
            aggregation.map.get("http://y.com"),
            Some(&Category::Known(KnownCategory::Malware))
        );
        assert_eq!(aggregation.report.overwritten_urls, 1);
        assert_eq!(aggregation.report.with_results, 2);
    }

    #[tokio::test]
    async fn failed_lookups_contribute_nothing() {
        let classifier = ScriptedClassifier::default()
            .with(Lookup::non_success("A".into(), 500))
            .with(Lookup::failed("B".into(), "connection refused"))
            .with(Lookup::with_results(
                "C".into(),
                vec![UrlResult::new("http://z.com", "suspicious")],
                Vec::new(),
            ));

        let aggregation = aggregate(&ids(&["A", "B", "C", "D"]), &classifier).await;

        assert_eq!(aggregation.map.len(), 1);
        assert_eq!(aggregation.report.identifiers, 4);
        assert_eq!(aggregation.report.non_success, 1);
        assert_eq!(aggregation.report.failed, 1);
        assert_eq!(aggregation.report.empty, 1);
        assert_eq!(aggregation.report.with_results, 1);
    }

    #[test]
    fn malformed_entries_are_counted_but_valid_results_kept() {
        let aggregation: Aggregation = [Lookup::with_results(
            "A".into(),
            vec![UrlResult::new("http://ok.com", "phishing")],
            vec![MalformedEntry::MissingField {
                index: 1,
                field: "url_state",
            }],
        )]
        .into_iter()
        .collect();

        assert_eq!(aggregation.map.len(), 1);
        assert_eq!(aggregation.report.malformed_entries, 1);
    }

    #[test]
    fn partition_covers_every_url_exactly_once() {
        let map: CharacterizationMap = [
            UrlResult::new("http://d.com", "phishing"),
            UrlResult::new("http://a.com", "phishing"),
            UrlResult::new("http://b.com", "already blocked"),
            UrlResult::new("http://c.com", "rejected"),
            UrlResult::new("http://e.com", "brand abuse"),
            UrlResult::new("http://f.com", "processing"),
        ]
        .into_iter()
        .collect();

        let partition = partition(&map);

        assert_eq!(partition.total(), map.len());
        assert_eq!(partition.named_total() + partition.other_total(), map.len());
        assert_eq!(
            partition.bucket(KnownCategory::Phishing),
            &["http://a.com".to_string(), "http://d.com".to_string()]
        );
        assert_eq!(partition.bucket(KnownCategory::AlreadyBlocked).len(), 1);
        assert!(partition.bucket(KnownCategory::Malware).is_empty());
        assert_eq!(
            partition.other().get("brand abuse"),
            Some(&vec!["http://e.com".to_string()])
        );

        let mut seen = BTreeSet::new();
        for category in KnownCategory::ALL {
            for url in partition.bucket(category) {
                assert!(seen.insert(url.clone()), "{url} appears in two buckets");
            }
        }
        for urls in partition.other().values() {
            for url in urls {
                assert!(seen.insert(url.clone()), "{url} appears in two buckets");
            }
        }
        assert_eq!(seen.len(), map.len());
    }

    #[test]
    fn partition_of_empty_map_has_all_buckets_empty() {
        let partition = partition(&CharacterizationMap::new());
        for category in KnownCategory::ALL {
            assert!(partition.bucket(category).is_empty());
        }
        assert!(partition.other().is_empty());
        assert_eq!(partition.total(), 0);
    }
}
