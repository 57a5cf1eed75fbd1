//! Search → fetch → extract over one documentation site.
//!
//! Each call is independent: the pipeline holds only shared, read-only handles.
//! Search strategies are tried in order until one yields URLs; pages are then
//! fetched with bounded parallelism and composed in search-result order.

use crate::config::DocsConfig;
use crate::{
    DocsError, Error, FetchBackend, FetchRequest, SearchProvider, SearchQuery, TextExtractor,
};
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::Instant as TokioInstant;

/// Appended after every successful page in the composed answer.
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// `site:<doc_root_url> <query>`
    SiteUrl,
    /// `<query> site:<bare_site>`
    SiteBare,
    /// `<query> <doc_root_url>`
    Mention,
    /// `<query> documentation`, filtered client-side to on-site URLs.
    Fallback,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 4] = [
        SearchStrategy::SiteUrl,
        SearchStrategy::SiteBare,
        SearchStrategy::Mention,
        SearchStrategy::Fallback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SiteUrl => "site_url",
            Self::SiteBare => "site_bare",
            Self::Mention => "mention",
            Self::Fallback => "fallback",
        }
    }

    pub fn build_query(self, query: &str, site_url: &str, bare: &str) -> String {
        match self {
            Self::SiteUrl => format!("site:{site_url} {query}"),
            Self::SiteBare => format!("{query} site:{bare}"),
            Self::Mention => format!("{query} {site_url}"),
            Self::Fallback => format!("{query} documentation"),
        }
    }
}

/// Doc root without scheme or trailing slash (`https://nextjs.org/docs/` → `nextjs.org/docs`).
pub fn bare_site(site_url: &str) -> String {
    let s = site_url.trim();
    if let Ok(u) = url::Url::parse(s) {
        if let Some(host) = u.host_str() {
            let mut out = host.to_ascii_lowercase();
            if let Some(port) = u.port() {
                out.push_str(&format!(":{port}"));
            }
            out.push_str(u.path().trim_end_matches('/'));
            return out;
        }
    }
    let lower = s.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    rest.trim_end_matches('/').to_string()
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("HTTP error: status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("Request error: {0}")]
    Request(String),
}

#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub url: String,
    pub result: std::result::Result<String, FetchFailure>,
}

impl PageOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct DocsAnswer {
    pub text: String,
    pub strategy: SearchStrategy,
    pub pages: Vec<PageOutcome>,
}

#[derive(Debug, Clone)]
struct PipelineSettings {
    max_search_results: usize,
    http_timeout: Duration,
    deadline: Duration,
    max_parallel_fetches: usize,
    max_bytes: u64,
}

#[derive(Clone)]
pub struct Pipeline {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn FetchBackend>,
    extractor: Arc<dyn TextExtractor>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        cfg: &DocsConfig,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn FetchBackend>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            search,
            fetcher,
            extractor,
            settings: PipelineSettings {
                max_search_results: cfg.max_search_results.max(1),
                http_timeout: cfg.http_timeout,
                deadline: cfg.deadline,
                max_parallel_fetches: cfg.max_parallel_fetches.max(1),
                max_bytes: cfg.max_bytes,
            },
        }
    }

    pub fn search_provider_name(&self) -> &'static str {
        self.search.name()
    }

    /// Composed text of all successfully fetched pages.
    pub async fn search_documentation(
        &self,
        query: &str,
        site_url: &str,
    ) -> Result<String, DocsError> {
        self.run(query, site_url).await.map(|a| a.text)
    }

    pub async fn run(&self, query: &str, site_url: &str) -> Result<DocsAnswer, DocsError> {
        let t0 = Instant::now();
        let deadline = TokioInstant::now() + self.settings.deadline;
        let bare = bare_site(site_url);

        let found =
            match tokio::time::timeout_at(deadline, self.find_urls(query, site_url, &bare)).await {
                Ok(found) => found,
                Err(_) => {
                    tracing::warn!(query, site_url, "pipeline deadline elapsed during search");
                    return Err(DocsError::DeadlineExceeded {
                        query: query.to_string(),
                        elapsed_ms: t0.elapsed().as_millis(),
                    });
                }
            };
        let Some((strategy, urls)) = found else {
            return Err(DocsError::NoSearchResults {
                query: query.to_string(),
            });
        };

        let pages = self.fetch_all(&urls, deadline).await;
        let answer = compose(query, strategy, pages)?;
        tracing::info!(
            query,
            site_url,
            strategy = strategy.name(),
            pages = answer.pages.len(),
            ok = answer.pages.iter().filter(|p| p.is_ok()).count(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "documentation search done"
        );
        Ok(answer)
    }

    async fn find_urls(
        &self,
        query: &str,
        site_url: &str,
        bare: &str,
    ) -> Option<(SearchStrategy, Vec<String>)> {
        for strategy in SearchStrategy::ALL {
            let q = strategy.build_query(query, site_url, bare);
            let mut urls = self.search_urls(&q).await;
            if strategy == SearchStrategy::Fallback {
                let needle = bare.to_ascii_lowercase();
                urls.retain(|u| u.to_ascii_lowercase().contains(&needle));
            }
            tracing::debug!(
                strategy = strategy.name(),
                search_query = %q,
                results = urls.len(),
                "search strategy tried"
            );
            if !urls.is_empty() {
                return Some((strategy, urls));
            }
        }
        None
    }

    /// Provider errors degrade to an empty result set.
    async fn search_urls(&self, q: &str) -> Vec<String> {
        let sq = SearchQuery {
            query: q.to_string(),
            max_results: Some(self.settings.max_search_results),
            timeout_ms: None,
        };
        match self.search.search(&sq).await {
            Ok(resp) => {
                let mut out: Vec<String> = Vec::new();
                for u in resp.urls() {
                    if !u.trim().is_empty() && !out.contains(&u) {
                        out.push(u);
                    }
                }
                out.truncate(self.settings.max_search_results);
                out
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.search.name(),
                    search_query = %q,
                    error = %e,
                    "search provider failed; treating as no results"
                );
                Vec::new()
            }
        }
    }

    async fn fetch_all(&self, urls: &[String], deadline: TokioInstant) -> Vec<PageOutcome> {
        // `buffered` yields in input order regardless of completion order.
        futures_util::stream::iter(urls.iter().cloned())
            .map(|url| self.fetch_page(url, deadline))
            .buffered(self.settings.max_parallel_fetches)
            .collect()
            .await
    }

    async fn fetch_page(&self, url: String, deadline: TokioInstant) -> PageOutcome {
        let timeout = self.settings.http_timeout;
        let req = FetchRequest {
            url: url.clone(),
            timeout_ms: Some(timeout.as_millis().min(u64::MAX as u128) as u64),
            max_bytes: Some(self.settings.max_bytes),
        };
        let own_limit = TokioInstant::now() + timeout;
        let cut_by_deadline = deadline < own_limit;
        let page_deadline = deadline.min(own_limit);
        let result = match tokio::time::timeout_at(page_deadline, self.fetcher.fetch(&req)).await
        {
            Err(_) if cut_by_deadline => Err(FetchFailure::Timeout(
                "pipeline deadline reached before a response".to_string(),
            )),
            Err(_) => Err(FetchFailure::Timeout(format!(
                "no response within {}ms",
                timeout.as_millis()
            ))),
            Ok(Err(Error::Timeout(m))) => Err(FetchFailure::Timeout(m)),
            Ok(Err(e)) => Err(FetchFailure::Request(e.to_string())),
            Ok(Ok(resp)) if !resp.is_success() => Err(FetchFailure::HttpStatus {
                status: resp.status,
                url: resp.final_url.clone(),
            }),
            Ok(Ok(resp)) => Ok(self
                .extractor
                .extract_text(&resp.text_lossy(), resp.content_type.as_deref())),
        };
        if let Err(e) = &result {
            tracing::warn!(url = %url, error = %e, "page fetch failed; skipping");
        } else {
            tracing::debug!(url = %url, "page fetched");
        }
        PageOutcome { url, result }
    }
}

fn compose(
    query: &str,
    strategy: SearchStrategy,
    pages: Vec<PageOutcome>,
) -> Result<DocsAnswer, DocsError> {
    if pages.is_empty() {
        return Err(DocsError::NoSearchResults {
            query: query.to_string(),
        });
    }
    let mut text = String::new();
    let mut ok = 0usize;
    for p in &pages {
        if let Ok(t) = &p.result {
            text.push_str(t);
            text.push_str(PAGE_SEPARATOR);
            ok += 1;
        }
    }
    if ok == 0 {
        return Err(DocsError::AllFetchesFailed {
            query: query.to_string(),
            attempted: pages.len(),
        });
    }
    Ok(DocsAnswer {
        text,
        strategy,
        pages,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const SITE: &str = "http://test.com/docs";

    fn cfg() -> DocsConfig {
        DocsConfig {
            max_search_results: 3,
            ..DocsConfig::default()
        }
    }

    fn pipeline(
        search: Arc<ScriptedSearch>,
        fetcher: Arc<MapFetcher>,
        cfg: &DocsConfig,
    ) -> Pipeline {
        Pipeline::new(cfg, search, fetcher, Arc::new(Verbatim))
    }

    #[test]
    fn bare_site_strips_scheme_and_trailing_slash() {
        assert_eq!(bare_site("https://nextjs.org/docs"), "nextjs.org/docs");
        assert_eq!(bare_site("https://motion.dev/docs/"), "motion.dev/docs");
        assert_eq!(bare_site("https://docs.fastmcp.com"), "docs.fastmcp.com");
        assert_eq!(bare_site("http://127.0.0.1:8080/x/"), "127.0.0.1:8080/x");
        assert_eq!(bare_site("HTTPS://Example.COM/"), "example.com");
        assert_eq!(bare_site("example.com/docs/"), "example.com/docs");
    }

    #[test]
    fn strategy_queries_have_documented_shape() {
        let b = bare_site(SITE);
        let got: Vec<String> = SearchStrategy::ALL
            .iter()
            .map(|s| s.build_query("hooks", SITE, &b))
            .collect();
        assert_eq!(
            got,
            vec![
                "site:http://test.com/docs hooks",
                "hooks site:test.com/docs",
                "hooks http://test.com/docs",
                "hooks documentation",
            ]
        );
    }

    #[tokio::test]
    async fn first_strategy_hit_is_fetched_and_returned() {
        let search = Arc::new(
            ScriptedSearch::default()
                .answer("site:http://test.com/docs test query", &["http://test.com/docs/a"]),
        );
        let fetcher = Arc::new(
            MapFetcher::default().page("http://test.com/docs/a", Page::Ok("Documentation content")),
        );
        let p = pipeline(search.clone(), fetcher.clone(), &cfg());

        let answer = p.run("test query", SITE).await.unwrap();
        assert_eq!(answer.strategy, SearchStrategy::SiteUrl);
        assert_eq!(answer.text, "Documentation content\n\n");
        assert_eq!(search.queries(), vec!["site:http://test.com/docs test query"]);
        assert_eq!(fetcher.fetched(), vec!["http://test.com/docs/a"]);
        let seen = search.seen.lock().unwrap();
        assert_eq!(seen[0].max_results, Some(3));
    }

    #[tokio::test]
    async fn empty_strategies_fall_through_in_order() {
        let search = Arc::new(
            ScriptedSearch::default().answer("q http://test.com/docs", &["http://test.com/docs/m"]),
        );
        let fetcher = Arc::new(MapFetcher::default().page("http://test.com/docs/m", Page::Ok("M")));
        let p = pipeline(search.clone(), fetcher, &cfg());

        let answer = p.run("q", SITE).await.unwrap();
        assert_eq!(answer.strategy, SearchStrategy::Mention);
        assert_eq!(
            search.queries(),
            vec![
                "site:http://test.com/docs q",
                "q site:test.com/docs",
                "q http://test.com/docs",
            ]
        );
    }

    #[tokio::test]
    async fn provider_errors_are_swallowed_and_next_strategy_runs() {
        let search = Arc::new(
            ScriptedSearch::default()
                .fail_on("site:http://test.com/docs q")
                .answer("q site:test.com/docs", &["http://test.com/docs/b"]),
        );
        let fetcher = Arc::new(MapFetcher::default().page("http://test.com/docs/b", Page::Ok("B")));
        let p = pipeline(search, fetcher, &cfg());
        let answer = p.run("q", SITE).await.unwrap();
        assert_eq!(answer.strategy, SearchStrategy::SiteBare);
        assert_eq!(answer.text, "B\n\n");
    }

    #[tokio::test]
    async fn fallback_keeps_only_on_site_urls() {
        let search = Arc::new(ScriptedSearch::default().answer(
            "q documentation",
            &[
                "https://elsewhere.dev/test.com",
                "https://test.com/docs/guide",
                "https://test.com/blog/post",
            ],
        ));
        let fetcher = Arc::new(
            MapFetcher::default()
                .page("https://test.com/docs/guide", Page::Ok("guide"))
                .page("https://elsewhere.dev/test.com", Page::Ok("offsite")),
        );
        let p = pipeline(search.clone(), fetcher.clone(), &cfg());

        let answer = p.run("q", SITE).await.unwrap();
        assert_eq!(answer.strategy, SearchStrategy::Fallback);
        assert_eq!(search.queries().len(), 4);
        assert_eq!(fetcher.fetched(), vec!["https://test.com/docs/guide"]);
        assert_eq!(answer.text, "guide\n\n");
    }

    #[tokio::test]
    async fn no_results_anywhere_is_no_search_results() {
        let search = Arc::new(ScriptedSearch::default().answer(
            "q documentation",
            &["https://unrelated.example/page"],
        ));
        let fetcher = Arc::new(MapFetcher::default());
        let p = pipeline(search.clone(), fetcher.clone(), &cfg());

        let err = p.search_documentation("q", SITE).await.unwrap_err();
        assert_eq!(
            err,
            DocsError::NoSearchResults {
                query: "q".to_string()
            }
        );
        assert!(err.to_user_message().starts_with("❌ No results found"));
        assert!(fetcher.fetched().is_empty());
    }

    #[tokio::test]
    async fn partial_failures_are_skipped_in_composition() {
        let urls = [
            "http://test.com/docs/1",
            "http://test.com/docs/2",
            "http://test.com/docs/3",
        ];
        let search =
            Arc::new(ScriptedSearch::default().answer("site:http://test.com/docs q", &urls));
        let fetcher = Arc::new(
            MapFetcher::default()
                .page(urls[0], Page::Status(404))
                .page(urls[1], Page::Ok("only good page"))
                .page(urls[2], Page::Timeout),
        );
        let p = pipeline(search, fetcher, &cfg());

        let answer = p.run("q", SITE).await.unwrap();
        assert_eq!(answer.text, "only good page\n\n");
        assert!(!answer.text.contains("error"));
        assert!(!answer.text.contains('❌'));
        assert_eq!(answer.pages.len(), 3);
        assert!(matches!(
            answer.pages[0].result,
            Err(FetchFailure::HttpStatus { status: 404, .. })
        ));
        assert!(matches!(answer.pages[2].result, Err(FetchFailure::Timeout(_))));
    }

    #[tokio::test]
    async fn all_failures_are_distinct_from_no_results() {
        let urls = ["http://test.com/docs/1", "http://test.com/docs/2"];
        let search =
            Arc::new(ScriptedSearch::default().answer("site:http://test.com/docs q", &urls));
        let fetcher = Arc::new(
            MapFetcher::default()
                .page(urls[0], Page::Status(500))
                .page(urls[1], Page::Refused),
        );
        let p = pipeline(search, fetcher, &cfg());

        let err = p.search_documentation("q", SITE).await.unwrap_err();
        assert_eq!(
            err,
            DocsError::AllFetchesFailed {
                query: "q".to_string(),
                attempted: 2
            }
        );
        assert!(!err.to_user_message().contains("No results found"));
    }

    #[tokio::test]
    async fn composition_follows_search_order_not_completion_order() {
        let urls = ["http://test.com/docs/slow", "http://test.com/docs/fast"];
        let search =
            Arc::new(ScriptedSearch::default().answer("site:http://test.com/docs q", &urls));
        let fetcher = Arc::new(
            MapFetcher::default()
                .page(urls[0], Page::Slow(Duration::from_millis(80), "first"))
                .page(urls[1], Page::Ok("second")),
        );
        let p = pipeline(search, fetcher, &cfg());
        let answer = p.run("q", SITE).await.unwrap();
        assert_eq!(answer.text, "first\n\nsecond\n\n");
    }

    #[tokio::test]
    async fn duplicate_result_urls_are_fetched_once() {
        let urls = ["http://test.com/docs/a", "http://test.com/docs/a"];
        let search =
            Arc::new(ScriptedSearch::default().answer("site:http://test.com/docs q", &urls));
        let fetcher = Arc::new(MapFetcher::default().page(urls[0], Page::Ok("A")));
        let p = pipeline(search, fetcher.clone(), &cfg());
        let answer = p.run("q", SITE).await.unwrap();
        assert_eq!(answer.text, "A\n\n");
        assert_eq!(fetcher.fetched().len(), 1);
    }

    #[tokio::test]
    async fn slow_page_hits_per_fetch_timeout() {
        let urls = ["http://test.com/docs/slow"];
        let search =
            Arc::new(ScriptedSearch::default().answer("site:http://test.com/docs q", &urls));
        let fetcher = Arc::new(
            MapFetcher::default().page(urls[0], Page::Slow(Duration::from_secs(5), "late")),
        );
        let c = DocsConfig {
            http_timeout: Duration::from_millis(50),
            ..cfg()
        };
        let p = pipeline(search.clone(), fetcher.clone(), &c);
        let err = p.run("q", SITE).await.unwrap_err();
        assert_eq!(err.kind(), "all_fetches_failed");

        let p = pipeline(search, fetcher, &c);
        let page = p
            .fetch_page(urls[0].to_string(), TokioInstant::now() + Duration::from_secs(60))
            .await;
        match page.result {
            Err(FetchFailure::Timeout(m)) => assert_eq!(m, "no response within 50ms"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_during_fetch_keeps_pages_already_fetched() {
        let urls = ["http://test.com/docs/fast", "http://test.com/docs/stuck"];
        let search =
            Arc::new(ScriptedSearch::default().answer("site:http://test.com/docs q", &urls));
        let fetcher = Arc::new(
            MapFetcher::default()
                .page(urls[0], Page::Ok("fast page"))
                .page(urls[1], Page::Slow(Duration::from_secs(5), "never")),
        );
        let c = DocsConfig {
            deadline: Duration::from_millis(200),
            ..cfg()
        };
        let p = pipeline(search, fetcher, &c);

        let t0 = Instant::now();
        let answer = p.run("q", SITE).await.unwrap();
        assert!(t0.elapsed() < Duration::from_secs(2), "{:?}", t0.elapsed());
        assert_eq!(answer.text, "fast page\n\n");
        assert_eq!(answer.pages.len(), 2);
        match &answer.pages[1].result {
            Err(FetchFailure::Timeout(m)) => assert!(m.contains("deadline"), "{m}"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_during_search_is_reported() {
        let search = Arc::new(ScriptedSearch {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedSearch::default()
        });
        let fetcher = Arc::new(MapFetcher::default());
        let c = DocsConfig {
            deadline: Duration::from_millis(50),
            ..cfg()
        };
        let p = pipeline(search, fetcher, &c);
        let err = p.run("q", SITE).await.unwrap_err();
        assert!(matches!(err, DocsError::DeadlineExceeded { .. }), "{err:?}");
        assert!(err.to_user_message().starts_with("❌ Search timed out"));
    }

    #[tokio::test]
    async fn sequential_mode_still_fetches_every_url() {
        let urls = ["http://test.com/docs/1", "http://test.com/docs/2"];
        let search =
            Arc::new(ScriptedSearch::default().answer("site:http://test.com/docs q", &urls));
        let fetcher = Arc::new(
            MapFetcher::default()
                .page(urls[0], Page::Ok("one"))
                .page(urls[1], Page::Ok("two")),
        );
        let c = DocsConfig {
            max_parallel_fetches: 1,
            ..cfg()
        };
        let p = pipeline(search, fetcher.clone(), &c);
        let answer = p.run("q", SITE).await.unwrap();
        assert_eq!(answer.text, "one\n\ntwo\n\n");
        assert_eq!(fetcher.fetched(), urls.to_vec());
    }
}
