//! `docsearch` crate (library surface).
//!
//! The primary entrypoint for end users is the `docsearch` binary (CLI + MCP stdio).
//! This module holds the transport-independent tool handler so it can be embedded
//! or driven with mock collaborators.

pub use docsearch_core as core;

use docsearch_core::{
    DocsAnswer, DocsConfig, DocsError, Pipeline, Registry, Resolver, Result as CoreResult,
};
use std::sync::Arc;
use std::time::Instant;

pub const SCHEMA_VERSION: u64 = 1;

/// The `get_docs` handler: resolve a library, then search and fetch its documentation.
#[derive(Clone)]
pub struct DocsService {
    config: Arc<DocsConfig>,
    pipeline: Pipeline,
}

impl DocsService {
    pub fn new(config: DocsConfig, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }

    /// Wire up the network-backed collaborators from `docsearch-local`.
    pub fn from_config(config: DocsConfig) -> CoreResult<Self> {
        let client = docsearch_local::build_client(config.http_timeout)?;
        let search = docsearch_local::search_provider_from_config(&config, client.clone())?;
        let fetcher = Arc::new(docsearch_local::LocalFetcher::with_client(client));
        let extractor = Arc::new(docsearch_local::HtmlTextExtractor::new(config.text_width));
        let pipeline = Pipeline::new(&config, search, fetcher, extractor);
        Ok(Self::new(config, pipeline))
    }

    pub fn config(&self) -> &DocsConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.config.registry
    }

    pub fn search_provider_name(&self) -> &'static str {
        self.pipeline.search_provider_name()
    }

    /// Tool result text. Failures come back as `❌ ...` strings, never as errors.
    pub async fn get_docs(&self, query: &str, library: &str) -> String {
        match self.lookup(query, library).await {
            Ok(answer) => answer.text,
            Err(e) => e.to_user_message(),
        }
    }

    pub async fn lookup(&self, query: &str, library: &str) -> Result<DocsAnswer, DocsError> {
        let t0 = Instant::now();
        let registry = self.registry();
        let resolver = Resolver::new(registry);

        let Some(id) = resolver.validate(Some(library)) else {
            tracing::info!(library, "unsupported library");
            return Err(DocsError::UnsupportedLibrary {
                input: library.to_string(),
                available: registry.ids().map(str::to_string).collect(),
            });
        };
        let Some(url) = resolver.get_url(Some(library)) else {
            return Err(DocsError::MissingDocUrl {
                input: library.to_string(),
            });
        };

        let res = self.pipeline.run(query, &url).await;
        match &res {
            Ok(answer) => tracing::info!(
                library = %id,
                query,
                strategy = answer.strategy.name(),
                pages = answer.pages.len(),
                chars = answer.text.len(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "get_docs ok"
            ),
            Err(e) => tracing::info!(
                library = %id,
                query,
                kind = e.kind(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "get_docs failed"
            ),
        }
        res
    }

    pub fn libraries_json(&self) -> serde_json::Value {
        libraries_json(self.registry())
    }

    pub fn libraries_text(&self) -> String {
        libraries_text(self.registry())
    }
}

/// `{ "libraries": [{id, url}], "aliases": {..} }` in declaration order.
pub fn libraries_json(registry: &Registry) -> serde_json::Value {
    serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "libraries": registry.entries(),
        "aliases": registry.aliases(),
    })
}

/// One `id<TAB>url` line per library, then `alias -> id` lines.
pub fn libraries_text(registry: &Registry) -> String {
    let mut out = String::new();
    for e in registry.entries() {
        out.push_str(&format!("{}\t{}\n", e.id, e.url));
    }
    for (alias, target) in registry.aliases() {
        out.push_str(&format!("{alias} -> {target}\n"));
    }
    out
}
