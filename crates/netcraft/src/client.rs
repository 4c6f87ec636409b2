use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use url_triage_core::{Category, Classifier, Identifier, Lookup, MalformedEntry, UrlResult};

/// Client for the Netcraft report API submission endpoints.
#[derive(Clone)]
pub struct NetcraftClient {
    http: Client,
    base_url: Url,
}

impl NetcraftClient {
    /// Creates a new client. `base_url` must end with a slash so paths join beneath it.
    pub fn new(base_url: Url, http: Client) -> Self {
        Self { http, base_url }
    }

    /// Builds `<base>/submission/<identifier>/urls`.
    ///
    /// Empty and dot-only identifiers are rejected: the URL parser would
    /// collapse `.`/`..` as path navigation and reach another resource.
    pub fn submission_urls_endpoint(&self, identifier: &Identifier) -> Result<Url, ClassifyError> {
        if matches!(identifier.as_str(), "" | "." | "..") {
            return Err(ClassifyError::InvalidIdentifier(
                identifier.as_str().to_string(),
            ));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClassifyError::CannotBeABase(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["submission", identifier.as_str(), "urls"]);
        Ok(url)
    }

    /// Fetches the URL states reported for one submission.
    ///
    /// Unlike [`Classifier::classify`] this surfaces every failure to the caller.
    pub async fn fetch_submission_urls(
        &self,
        identifier: &Identifier,
    ) -> Result<SubmissionUrls, ClassifyError> {
        let url = self.submission_urls_endpoint(identifier)?;
        debug!(stage = "classify", identifier = %identifier, %url, "requesting submission urls");

        let response = self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        info!(stage = "classify", identifier = %identifier, status = response.status().as_u16(), "submission check responded");
        parse_submission(response).await
    }
}

#[async_trait]
impl Classifier for NetcraftClient {
    async fn classify(&self, identifier: &Identifier) -> Lookup {
        match self.fetch_submission_urls(identifier).await {
            Ok(SubmissionUrls::Empty) => Lookup::empty(identifier.clone()),
            Ok(SubmissionUrls::Entries { results, malformed }) => {
                if results.is_empty() && malformed.is_empty() {
                    Lookup::empty(identifier.clone())
                } else {
                    Lookup::with_results(identifier.clone(), results, malformed)
                }
            }
            Err(ClassifyError::Status { status, body }) => {
                warn!(stage = "classify", identifier = %identifier, status = status.as_u16(), %body, "submission check rejected");
                Lookup::non_success(identifier.clone(), status.as_u16())
            }
            Err(err) => {
                warn!(stage = "classify", identifier = %identifier, error = %err, "submission check failed");
                Lookup::failed(identifier.clone(), err.to_string())
            }
        }
    }
}

/// Decoded body of a successful submission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionUrls {
    /// Empty body, `{}`, or an object without URL entries.
    Empty,
    Entries {
        results: Vec<UrlResult>,
        malformed: Vec<MalformedEntry>,
    },
}

#[derive(Debug, Deserialize)]
struct SubmissionUrlsResponse {
    #[serde(default)]
    urls: Option<Vec<Value>>,
}

/// Errors produced by the Netcraft client.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("identifier '{0}' cannot be used as a path segment")]
    InvalidIdentifier(String),
    #[error("base url cannot carry path segments: {0}")]
    CannotBeABase(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

async fn parse_submission(response: Response) -> Result<SubmissionUrls, ClassifyError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ClassifyError::Status { status, body });
    }

    let body = response.text().await?;
    decode_submission(&body)
}

/// Decodes a success body into URL results, collecting malformed entries separately.
pub fn decode_submission(body: &str) -> Result<SubmissionUrls, ClassifyError> {
    if body.trim().is_empty() {
        return Ok(SubmissionUrls::Empty);
    }

    let decoded: SubmissionUrlsResponse = serde_json::from_str(body)?;
    let Some(entries) = decoded.urls else {
        return Ok(SubmissionUrls::Empty);
    };
    if entries.is_empty() {
        return Ok(SubmissionUrls::Empty);
    }

    let mut results = Vec::with_capacity(entries.len());
    let mut malformed = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match url_result_from_entry(index, entry) {
            Ok(result) => results.push(result),
            Err(err) => malformed.push(err),
        }
    }

    Ok(SubmissionUrls::Entries { results, malformed })
}

fn url_result_from_entry(index: usize, entry: &Value) -> Result<UrlResult, MalformedEntry> {
    let object = entry
        .as_object()
        .ok_or(MalformedEntry::NotAnObject { index })?;
    let url = string_field(index, object, "url")?;
    let state = string_field(index, object, "url_state")?;
    Ok(UrlResult {
        url: url.to_string(),
        category: Category::parse(state),
    })
}

fn string_field<'a>(
    index: usize,
    object: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, MalformedEntry> {
    match object.get(field) {
        None | Some(Value::Null) => Err(MalformedEntry::MissingField { index, field }),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(MalformedEntry::NotAString { index, field }),
    }
}
