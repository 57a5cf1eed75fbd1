//! Startup configuration.
//!
//! Built once (usually from the process environment) and shared read-only.

use crate::registry::Registry;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 2;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(90);
pub const DEFAULT_MAX_PARALLEL_FETCHES: usize = 2;
pub const DEFAULT_MAX_BYTES: u64 = 5_000_000;
pub const DEFAULT_TEXT_WIDTH: usize = 100;

#[derive(Debug, Clone)]
pub struct DocsConfig {
    pub registry: Registry,
    /// Per-fetch timeout.
    pub http_timeout: Duration,
    /// Results requested from the search provider per strategy.
    pub max_search_results: usize,
    /// Ceiling on one whole search+fetch pipeline run.
    pub deadline: Duration,
    pub max_parallel_fetches: usize,
    pub max_bytes: u64,
    pub text_width: usize,
    /// `auto`, `duckduckgo`, `searxng` or `brave`.
    pub search_provider: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            registry: Registry::builtin(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            deadline: DEFAULT_DEADLINE,
            max_parallel_fetches: DEFAULT_MAX_PARALLEL_FETCHES,
            max_bytes: DEFAULT_MAX_BYTES,
            text_width: DEFAULT_TEXT_WIDTH,
            search_provider: "auto".to_string(),
        }
    }
}

impl DocsConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary variable source (the environment, or a map in tests).
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |k: &str| {
            get(k)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let mut cfg = Self::default();

        if let Some(p) = var("DOCSEARCH_REGISTRY_FILE") {
            cfg.registry = Registry::from_file(&PathBuf::from(p))?;
        }
        if let Some(s) = var("DOCSEARCH_HTTP_TIMEOUT_S") {
            match s.parse::<f64>().map(Duration::try_from_secs_f64) {
                Ok(Ok(d)) if !d.is_zero() => cfg.http_timeout = d,
                _ => invalid("DOCSEARCH_HTTP_TIMEOUT_S", &s),
            }
        }
        if let Some(s) = var("DOCSEARCH_MAX_SEARCH_RESULTS") {
            match s.parse::<usize>() {
                Ok(n) if n > 0 => cfg.max_search_results = n.min(20),
                _ => invalid("DOCSEARCH_MAX_SEARCH_RESULTS", &s),
            }
        }
        if let Some(s) = var("DOCSEARCH_DEADLINE_MS") {
            match s.parse::<u64>() {
                Ok(n) if n > 0 => cfg.deadline = Duration::from_millis(n),
                _ => invalid("DOCSEARCH_DEADLINE_MS", &s),
            }
        }
        if let Some(s) = var("DOCSEARCH_MAX_PARALLEL_FETCHES") {
            match s.parse::<usize>() {
                Ok(n) if n > 0 => cfg.max_parallel_fetches = n.min(16),
                _ => invalid("DOCSEARCH_MAX_PARALLEL_FETCHES", &s),
            }
        }
        if let Some(s) = var("DOCSEARCH_MAX_BYTES") {
            match s.parse::<u64>() {
                Ok(n) if n > 0 => cfg.max_bytes = n,
                _ => invalid("DOCSEARCH_MAX_BYTES", &s),
            }
        }
        if let Some(s) = var("DOCSEARCH_TEXT_WIDTH") {
            match s.parse::<usize>() {
                Ok(n) => cfg.text_width = n.clamp(20, 240),
                _ => invalid("DOCSEARCH_TEXT_WIDTH", &s),
            }
        }
        if let Some(s) = var("DOCSEARCH_SEARCH_PROVIDER") {
            cfg.search_provider = s.to_ascii_lowercase();
        }
        Ok(cfg)
    }

    pub fn http_timeout_ms(&self) -> u64 {
        self.http_timeout.as_millis().min(u64::MAX as u128) as u64
    }
}

fn invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "ignoring invalid setting; using default");
}
