use docsearch::DocsService;
use rmcp::{
    handler::server::router::tool::ToolRouter as RmcpToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub(crate) struct GetDocsArgs {
    /// What to look up in the documentation, e.g. "app router middleware".
    #[serde(default)]
    query: String,
    /// Library name or alias, e.g. "nextjs", "tailwindcss", "framer-motion".
    #[serde(default)]
    library: String,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub(crate) struct ListLibrariesArgs {}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

fn structured_result(payload: serde_json::Value) -> CallToolResult {
    // Structured content for machine consumers, plus a text copy for clients that
    // only read `content[0].text`.
    let mut r = CallToolResult::structured(payload.clone());
    r.content = vec![Content::text(payload.to_string())];
    r
}

#[derive(Clone)]
pub(crate) struct DocsearchMcp {
    tool_router: RmcpToolRouter<Self>,
    service: DocsService,
}

#[tool_router]
impl DocsearchMcp {
    pub(crate) fn new(service: DocsService) -> Self {
        Self {
            tool_router: Self::tool_router(),
            service,
        }
    }

    #[tool(
        description = "Search the official documentation of a supported library and return the text of the best matching pages. Call list_libraries for the supported names."
    )]
    async fn get_docs(
        &self,
        params: Parameters<Option<GetDocsArgs>>,
    ) -> Result<CallToolResult, McpError> {
        let args = params.0.unwrap_or_default();
        tracing::debug!(library = %args.library, query = %args.query, "tool call: get_docs");
        let text = self.service.get_docs(&args.query, &args.library).await;
        Ok(text_result(text))
    }

    #[tool(
        description = "List supported libraries, their documentation roots, and accepted aliases"
    )]
    async fn list_libraries(
        &self,
        _params: Parameters<Option<ListLibrariesArgs>>,
    ) -> Result<CallToolResult, McpError> {
        Ok(structured_result(self.service.libraries_json()))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for DocsearchMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Documentation lookup for a fixed set of libraries. get_docs returns plain text; failures start with ❌."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub(crate) async fn serve_stdio(service: DocsService) -> Result<(), McpError> {
    tracing::info!(
        provider = service.search_provider_name(),
        libraries = service.registry().len(),
        "mcp stdio server starting"
    );
    let running = DocsearchMcp::new(service)
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    // Keep the stdio server alive until the client closes.
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(())
}
