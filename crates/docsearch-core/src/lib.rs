//! Backend-agnostic types, traits and domain logic for `docsearch`.
//!
//! This crate has no network code. Search providers, fetchers and extractors are
//! traits here; `docsearch-local` supplies the reqwest-backed implementations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod config;
pub mod pipeline;
pub mod registry;
pub mod resolve;

pub use config::DocsConfig;
pub use pipeline::{DocsAnswer, FetchFailure, PageOutcome, Pipeline, SearchStrategy};
pub use registry::{LibraryEntry, Registry};
pub use resolve::Resolver;

/// Prefix carried by every user-facing failure string.
pub const FAILURE_MARKER: &str = "❌";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Domain failures of a `get_docs` call.
///
/// The `Display` text is what the caller sees after [`FAILURE_MARKER`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DocsError {
    #[error("Library not supported: {input}. Available libraries: {}", .available.join(", "))]
    UnsupportedLibrary {
        input: String,
        available: Vec<String>,
    },
    #[error("Documentation URL not found for library: {input}")]
    MissingDocUrl { input: String },
    #[error("No results found for {query}")]
    NoSearchResults { query: String },
    #[error("Could not fetch content for {query} ({attempted} pages failed)")]
    AllFetchesFailed { query: String, attempted: usize },
    #[error("Search timed out after {elapsed_ms}ms for {query}")]
    DeadlineExceeded { query: String, elapsed_ms: u128 },
}

impl DocsError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedLibrary { .. } => "unsupported_library",
            Self::MissingDocUrl { .. } => "missing_doc_url",
            Self::NoSearchResults { .. } => "no_search_results",
            Self::AllFetchesFailed { .. } => "all_fetches_failed",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
        }
    }

    /// Render for the tool boundary: marker, space, message.
    pub fn to_user_message(&self) -> String {
        format!("{FAILURE_MARKER} {self}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the operation (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
}

impl FetchRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub timings_ms: BTreeMap<String, u128>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

impl SearchResponse {
    pub fn urls(&self) -> Vec<String> {
        self.results.iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

/// Markup-to-text conversion. Best-effort; output is not expected to be stable
/// across implementations.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, body: &str, content_type: Option<&str>) -> String;
}
