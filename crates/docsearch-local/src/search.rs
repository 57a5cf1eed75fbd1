use docsearch_core::{
    DocsConfig, Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const BRAVE_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

fn max_results_from_query(q: &SearchQuery) -> usize {
    q.max_results.unwrap_or(10).clamp(1, 20)
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_var(k: &str) -> Option<String> {
    std::env::var(k).ok()
}

fn brave_api_key_from(get: &impl Fn(&str) -> Option<String>) -> Option<String> {
    non_empty(get("DOCSEARCH_BRAVE_API_KEY")).or_else(|| non_empty(get("BRAVE_SEARCH_API_KEY")))
}

/// Configured SearXNG base URLs, deduplicated, list variable first.
pub fn searxng_endpoints_from(get: &impl Fn(&str) -> Option<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    // Comma/whitespace-separated list, for simple load spreading.
    if let Some(v) = get("DOCSEARCH_SEARXNG_ENDPOINTS") {
        for raw in v.split(|c: char| c == ',' || c.is_whitespace()) {
            let s = raw.trim();
            if s.is_empty() {
                continue;
            }
            let s = s.to_string();
            if !out.contains(&s) {
                out.push(s);
            }
        }
    }
    if let Some(s) = non_empty(get("DOCSEARCH_SEARXNG_ENDPOINT")) {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

/// Pick a provider by name. `auto` prefers Brave when a key is present, then
/// SearXNG when an endpoint is configured, and falls back to DuckDuckGo.
pub fn search_provider_from_config(
    cfg: &DocsConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn SearchProvider>> {
    search_provider_from_vars(&cfg.search_provider, client, env_var)
}

pub fn search_provider_from_vars(
    kind: &str,
    client: reqwest::Client,
    get: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn SearchProvider>> {
    let kind = kind.trim().to_ascii_lowercase();
    let provider: Arc<dyn SearchProvider> = match kind.as_str() {
        "" | "auto" => {
            if brave_api_key_from(&get).is_some() {
                Arc::new(BraveSearchProvider::from_vars(client, &get)?)
            } else if !searxng_endpoints_from(&get).is_empty() {
                Arc::new(SearxngSearchProvider::from_vars(client, &get)?)
            } else {
                Arc::new(DuckDuckGoSearchProvider::from_vars(client, &get))
            }
        }
        "duckduckgo" | "ddg" => Arc::new(DuckDuckGoSearchProvider::from_vars(client, &get)),
        "searxng" => Arc::new(SearxngSearchProvider::from_vars(client, &get)?),
        "brave" => Arc::new(BraveSearchProvider::from_vars(client, &get)?),
        other => {
            return Err(Error::InvalidConfig(format!(
                "unknown search provider {other:?} (expected auto, duckduckgo, searxng or brave)"
            )))
        }
    };
    tracing::debug!(requested = %kind, provider = provider.name(), "search provider selected");
    Ok(provider)
}

// --- DuckDuckGo (HTML endpoint, no key) ---

#[derive(Debug, Clone)]
pub struct DuckDuckGoSearchProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearchProvider {
    pub fn new(client: reqwest::Client, endpoint: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.unwrap_or_else(|| DDG_HTML_ENDPOINT.to_string()),
        }
    }

    fn from_vars(client: reqwest::Client, get: &impl Fn(&str) -> Option<String>) -> Self {
        Self::new(client, non_empty(get("DOCSEARCH_DDG_ENDPOINT")))
    }
}

/// Resolve a result anchor's `href` to the destination URL.
///
/// DDG wraps most links as `//duckduckgo.com/l/?uddg=<percent-encoded>&rut=...`;
/// anything else on a duckduckgo host (ads, internal links) is dropped.
fn ddg_result_url(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let u = url::Url::parse(&absolute).ok()?;
    let host = u.host_str().unwrap_or("").to_ascii_lowercase();
    let target = if host == "duckduckgo.com" || host.ends_with(".duckduckgo.com") {
        if !u.path().starts_with("/l/") {
            return None;
        }
        let (_, dest) = u.query_pairs().find(|(k, _)| k == "uddg")?;
        url::Url::parse(&dest).ok()?
    } else {
        u
    };
    matches!(target.scheme(), "http" | "https").then(|| target.to_string())
}

/// `Html` is !Send, so parsing stays in a sync fn and never spans an await.
fn parse_ddg_html(body: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = html_scraper::Html::parse_document(body);
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        html_scraper::Selector::parse(".result"),
        html_scraper::Selector::parse("a.result__a"),
        html_scraper::Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut out: Vec<SearchResult> = Vec::new();
    for result in doc.select(&result_sel) {
        if out.len() >= max_results {
            break;
        }
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(url) = link.value().attr("href").and_then(ddg_result_url) else {
            continue;
        };
        if out.iter().any(|r| r.url == url) {
            continue;
        }
        let title = link.text().collect::<String>().trim().to_string();
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty());
        out.push(SearchResult {
            url,
            title: (!title.is_empty()).then_some(title),
            snippet,
            source: "duckduckgo".to_string(),
        });
    }
    out
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoSearchProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let resp = self
            .client
            .post(&self.endpoint)
            .form(&[("q", q.query.as_str())])
            .header(reqwest::header::ACCEPT, "text/html")
            .timeout(Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("duckduckgo search HTTP {status}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results = parse_ddg_html(&body, max_results_from_query(q));

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        Ok(SearchResponse {
            results,
            provider: "duckduckgo".to_string(),
            timings_ms,
        })
    }
}

// --- SearXNG (self-hosted JSON API) ---

#[derive(Debug, Clone)]
pub struct SearxngSearchProvider {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl SearxngSearchProvider {
    pub fn new(client: reqwest::Client, endpoints: Vec<String>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::NotConfigured(
                "missing DOCSEARCH_SEARXNG_ENDPOINT (or DOCSEARCH_SEARXNG_ENDPOINTS)".to_string(),
            ));
        }
        Ok(Self { client, endpoints })
    }

    fn from_vars(client: reqwest::Client, get: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::new(client, searxng_endpoints_from(get))
    }

    fn endpoint_search_for(base_endpoint: &str) -> String {
        // Accept either a base URL (…/), or a full /search endpoint.
        let mut base = base_endpoint.trim().trim_end_matches('/').to_string();
        if !base.ends_with("/search") {
            base.push_str("/search");
        }
        base
    }

    fn stable_hash64(query: &str) -> u64 {
        // FNV-1a; stable across runs (unlike HashMap's RandomState).
        let mut h: u64 = 1469598103934665603;
        for b in query.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(1099511628211);
        }
        h
    }

    fn pick_endpoint(&self, q: &SearchQuery) -> &str {
        let idx = (Self::stable_hash64(&q.query) as usize) % self.endpoints.len();
        self.endpoints[idx].as_str()
    }
}

#[derive(Debug, Deserialize)]
struct SearxngSearchResponse {
    results: Option<Vec<SearxngResult>>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: Option<String>,
    title: Option<String>,
    // SearXNG uses `content` for snippets in JSON format.
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SearxngSearchProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let endpoint = Self::endpoint_search_for(self.pick_endpoint(q));
        let resp = self
            .client
            .get(endpoint)
            .query(&[("q", q.query.as_str()), ("format", "json")])
            .timeout(Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("searxng search HTTP {status}")));
        }
        let parsed: SearxngSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let results = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Some(SearchResult {
                    url: r.url?,
                    title: r.title,
                    snippet: r.content,
                    source: "searxng".to_string(),
                })
            })
            .take(max_results_from_query(q))
            .collect();

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        Ok(SearchResponse {
            results,
            provider: "searxng".to_string(),
            timings_ms,
        })
    }
}

// --- Brave Search API ---

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl BraveSearchProvider {
    pub fn new(client: reqwest::Client, api_key: String, endpoint: Option<String>) -> Self {
        Self {
            client,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| BRAVE_ENDPOINT.to_string()),
        }
    }

    fn from_vars(client: reqwest::Client, get: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = brave_api_key_from(get).ok_or_else(|| {
            Error::NotConfigured(
                "missing DOCSEARCH_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        Ok(Self::new(
            client,
            api_key,
            non_empty(get("DOCSEARCH_BRAVE_ENDPOINT")),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let resp = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", q.query.clone()),
                ("count", max_results_from_query(q).to_string()),
            ])
            .timeout(Duration::from_millis(timeout_ms_from_query(q)))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("brave search HTTP {status}")));
        }
        let parsed: BraveWebSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let results = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.description,
                source: "brave".to_string(),
            })
            .collect();

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        Ok(SearchResponse {
            results,
            provider: "brave".to_string(),
            timings_ms,
        })
    }
}
