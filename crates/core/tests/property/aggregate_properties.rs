use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use url_triage_core::{
    build_summary, partition, Aggregation, Category, CharacterizationMap, Identifier,
    KnownCategory, Lookup, UrlResult,
};

fn label() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(KnownCategory::ALL.to_vec())
            .prop_map(|category| category.as_str().to_string()),
        prop::sample::select(KnownCategory::ALL.to_vec())
            .prop_map(|category| category.field_name().to_string()),
        "[a-z][a-z ]{0,10}",
    ]
}

// Space-free so joined lists split back unambiguously.
fn url() -> impl Strategy<Value = String> {
    "http://[a-z0-9]{1,5}\\.(com|net|org)(/[a-z0-9]{1,4})?"
}

fn results() -> impl Strategy<Value = Vec<UrlResult>> {
    prop::collection::vec((url(), label()), 0..40).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(url, label)| UrlResult::new(url, label.as_str()))
            .collect()
    })
}

fn at() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
}

proptest! {
    #[test]
    fn partition_covers_every_url_exactly_once(results in results()) {
        let map: CharacterizationMap = results.into_iter().collect();
        let partition = partition(&map);

        let mut seen = BTreeSet::new();
        for category in KnownCategory::ALL {
            let bucket = partition.bucket(category);
            prop_assert!(bucket.windows(2).all(|pair| pair[0] < pair[1]));
            for url in bucket {
                prop_assert!(seen.insert(url.clone()), "{} listed twice", url);
                prop_assert_eq!(map.get(url), Some(&Category::Known(category)));
            }
        }
        for (label, urls) in partition.other() {
            prop_assert!(urls.windows(2).all(|pair| pair[0] < pair[1]));
            for url in urls {
                prop_assert!(seen.insert(url.clone()), "{} listed twice", url);
                prop_assert_eq!(map.get(url), Some(&Category::Other(label.clone())));
            }
        }

        prop_assert_eq!(seen.len(), map.len());
        prop_assert_eq!(partition.named_total() + partition.other_total(), map.len());
    }

    #[test]
    fn summary_counts_match_lists_and_split_back(results in results()) {
        let map: CharacterizationMap = results.into_iter().collect();
        let partition = partition(&map);
        let record = build_summary(&partition, at());

        for tally in record.tallies() {
            let urls = tally.url_list();
            prop_assert_eq!(tally.count, urls.len());
            let bucket: Vec<&str> = partition
                .bucket(tally.category)
                .iter()
                .map(String::as_str)
                .collect();
            prop_assert_eq!(urls, bucket);
        }
        prop_assert_eq!(record.total(), partition.named_total());
        prop_assert_eq!(build_summary(&partition, at()), record);
    }

    #[test]
    fn merge_matches_sequential_fold(batches in prop::collection::vec(results(), 0..6)) {
        let mut expected: BTreeMap<String, Category> = BTreeMap::new();
        for result in batches.iter().flatten() {
            expected.insert(result.url.clone(), result.category.clone());
        }

        let aggregation: Aggregation = batches
            .into_iter()
            .enumerate()
            .map(|(index, results)| {
                Lookup::with_results(Identifier::new(format!("id-{index:02}")), results, Vec::new())
            })
            .collect();

        prop_assert_eq!(aggregation.map.len(), expected.len());
        for (url, category) in &expected {
            prop_assert_eq!(aggregation.map.get(url), Some(category));
        }
    }
}
