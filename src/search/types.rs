use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Neural,
    Keyword,
}

/// Per-call knobs for `ExaClient::search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub search_type: SearchType,
    pub use_autoprompt: bool,
    pub num_results: u32,
    pub published_after: Option<DateTime<Utc>>,
    pub include_domains: Option<Vec<String>>,
    pub exclude_domains: Option<Vec<String>>,
    pub include_text: bool,
    pub text_length: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            search_type: SearchType::Neural,
            use_autoprompt: true,
            num_results: 10,
            published_after: None,
            include_domains: None,
            exclude_domains: None,
            include_text: true,
            text_length: 1000,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchRequest<'a> {
    pub query: &'a str,
    #[serde(rename = "type")]
    pub search_type: SearchType,
    pub use_autoprompt: bool,
    pub num_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_domains: Option<&'a [String]>,
    pub contents: ContentsOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ContentsOptions {
    pub text: bool,
    pub text_length: u32,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a str, options: &'a SearchOptions) -> Self {
        Self {
            query,
            search_type: options.search_type,
            use_autoprompt: options.use_autoprompt,
            num_results: options.num_results,
            published_after: options
                .published_after
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            include_domains: options.include_domains.as_deref(),
            exclude_domains: options.exclude_domains.as_deref(),
            contents: ContentsOptions {
                text: options.include_text,
                text_length: options.text_length,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub highlights: Option<Vec<String>>,
    #[serde(default)]
    pub highlight_scores: Option<Vec<f64>>,
    #[serde(default)]
    pub score: Option<f64>,
}

impl SearchResult {
    pub fn display_title(&self) -> String {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
            .to_string()
    }

    /// Parsed publish date; the API sends either a full timestamp or a bare date.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.published_date.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub autoprompt_string: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ContentsRequest<'a> {
    pub ids: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentsResult {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentsResponse {
    pub results: Vec<ContentsResult>,
    #[serde(default)]
    pub request_id: Option<String>,
}
