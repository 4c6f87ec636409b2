//! Domain types and pure logic for reconciling URL classification results.
//!
//! The crate owns the merge of per-identifier lookups into a single
//! characterization map, its partition into category buckets and the summary
//! record built from those buckets. I/O lives behind the traits in [`ports`].

pub mod aggregate;
pub mod ports;
pub mod summary;
pub mod types;

pub use aggregate::{aggregate, partition, AggregateReport, Aggregation, Partition};
pub use ports::{Classifier, IdentifierSource, SummarySink};
pub use summary::{build_summary, CategoryTally, SummaryRecord};
pub use types::{
    Category, CharacterizationMap, Identifier, KnownCategory, Lookup, LookupStatus,
    MalformedEntry, UrlResult,
};
