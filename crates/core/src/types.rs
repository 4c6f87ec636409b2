use std::{
    collections::{btree_map, BTreeMap},
    fmt,
};

use thiserror::Error;

/// Opaque token naming one classification submission batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The eight classification outcomes that always appear in a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KnownCategory {
    Processing,
    NoThreats,
    Unavailable,
    Phishing,
    AlreadyBlocked,
    Suspicious,
    Malware,
    Rejected,
}

impl KnownCategory {
    /// All named categories in summary field order.
    pub const ALL: [KnownCategory; 8] = [
        Self::Processing,
        Self::NoThreats,
        Self::Unavailable,
        Self::Phishing,
        Self::AlreadyBlocked,
        Self::Suspicious,
        Self::Malware,
        Self::Rejected,
    ];

    /// Returns the label used by the classification service.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::NoThreats => "no threats",
            Self::Unavailable => "unavailable",
            Self::Phishing => "phishing",
            Self::AlreadyBlocked => "already blocked",
            Self::Suspicious => "suspicious",
            Self::Malware => "malware",
            Self::Rejected => "rejected",
        }
    }

    /// Returns the snake_case name used for summary record fields.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::NoThreats => "no_threats",
            Self::Unavailable => "unavailable",
            Self::Phishing => "phishing",
            Self::AlreadyBlocked => "already_blocked",
            Self::Suspicious => "suspicious",
            Self::Malware => "malware",
            Self::Rejected => "rejected",
        }
    }

    /// Position of the category within [`KnownCategory::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Matches a label in either the service spelling (`no threats`) or the
    /// field spelling (`no_threats`). Matching is exact otherwise: case and
    /// surrounding whitespace are significant, so `MALWARE` is not `malware`.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| {
            category.as_str() == label || category.field_name() == label
        })
    }
}

impl fmt::Display for KnownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification assigned to a URL. Unrecognized labels are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Known(KnownCategory),
    Other(String),
}

impl Category {
    pub fn parse(label: &str) -> Self {
        match KnownCategory::from_label(label) {
            Some(known) => Self::Known(known),
            None => Self::Other(label.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(known) => known.as_str(),
            Self::Other(label) => label,
        }
    }

    pub fn known(&self) -> Option<KnownCategory> {
        match self {
            Self::Known(known) => Some(*known),
            Self::Other(_) => None,
        }
    }
}

impl From<KnownCategory> for Category {
    fn from(value: KnownCategory) -> Self {
        Self::Known(value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One URL reported by the classification service together with its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResult {
    pub url: String,
    pub category: Category,
}

impl UrlResult {
    pub fn new(url: impl Into<String>, category: impl Into<Category>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

/// Accumulated URL to category mapping for one run.
///
/// Keys are unique; inserting an existing URL replaces its category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterizationMap {
    entries: BTreeMap<String, Category>,
}

impl CharacterizationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a result, returning the category it replaced if the URL was already present.
    pub fn insert(&mut self, result: UrlResult) -> Option<Category> {
        self.entries.insert(result.url, result.category)
    }

    /// Merges results in iteration order; later results win.
    pub fn merge(&mut self, results: impl IntoIterator<Item = UrlResult>) -> usize {
        let mut overwritten = 0;
        for result in results {
            if self.insert(result).is_some() {
                overwritten += 1;
            }
        }
        overwritten
    }

    pub fn get(&self, url: &str) -> Option<&Category> {
        self.entries.get(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries ordered by URL.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Category> {
        self.entries.iter()
    }
}

impl FromIterator<UrlResult> for CharacterizationMap {
    fn from_iter<T: IntoIterator<Item = UrlResult>>(iter: T) -> Self {
        let mut map = Self::new();
        map.merge(iter);
        map
    }
}

/// Outcome of a single classification lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupStatus {
    /// Success with a list of URL entries.
    Results,
    /// Success without any usable entries.
    Empty,
    /// The service answered with a non-success HTTP status.
    NonSuccess(u16),
    /// The request could not be sent or its body could not be decoded.
    Failed(String),
}

impl LookupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Results => "results",
            Self::Empty => "empty",
            Self::NonSuccess(_) => "non_success",
            Self::Failed(_) => "failed",
        }
    }
}

/// Data-integrity problem found in one URL entry of a classification response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEntry {
    #[error("entry {index} is not an object")]
    NotAnObject { index: usize },
    #[error("entry {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },
    #[error("entry {index} has a non-string `{field}`")]
    NotAString { index: usize, field: &'static str },
}

/// Everything a single classification call contributed to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub identifier: Identifier,
    pub status: LookupStatus,
    pub results: Vec<UrlResult>,
    pub malformed: Vec<MalformedEntry>,
}

impl Lookup {
    pub fn with_results(
        identifier: Identifier,
        results: Vec<UrlResult>,
        malformed: Vec<MalformedEntry>,
    ) -> Self {
        Self {
            identifier,
            status: LookupStatus::Results,
            results,
            malformed,
        }
    }

    pub fn empty(identifier: Identifier) -> Self {
        Self::without_results(identifier, LookupStatus::Empty)
    }

    pub fn non_success(identifier: Identifier, status: u16) -> Self {
        Self::without_results(identifier, LookupStatus::NonSuccess(status))
    }

    pub fn failed(identifier: Identifier, reason: impl Into<String>) -> Self {
        Self::without_results(identifier, LookupStatus::Failed(reason.into()))
    }

    fn without_results(identifier: Identifier, status: LookupStatus) -> Self {
        Self {
            identifier,
            status,
            results: Vec::new(),
            malformed: Vec::new(),
        }
    }
}
