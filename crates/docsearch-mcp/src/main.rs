use anyhow::Result;
use clap::{Parser, Subcommand};
use docsearch::{libraries_json, libraries_text, DocsService, SCHEMA_VERSION};
use docsearch_core::DocsConfig;

#[cfg(feature = "stdio")]
mod mcp;

#[derive(Parser, Debug)]
#[command(name = "docsearch")]
#[command(about = "Library documentation lookup (MCP stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / MCP clients).
    McpStdio,
    /// Look up documentation once and print the result.
    GetDocs(GetDocsCmd),
    /// Print the library registry (ids, doc roots, aliases).
    Libraries(LibrariesCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct GetDocsCmd {
    /// Library name or alias (e.g. nextjs, tailwindcss, framer-motion).
    #[arg(long)]
    library: String,
    /// What to look up.
    #[arg(long)]
    query: String,
    /// Output format: text|json
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct LibrariesCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Load `KEY=VALUE` lines into the process environment without overriding
/// variables that are already set. Blank lines and `#` comments are skipped.
/// Returns how many variables were set.
fn load_env_file(path: &std::path::Path) -> std::io::Result<usize> {
    let txt = std::fs::read_to_string(path)?;
    let mut n = 0usize;
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            n += 1;
        }
    }
    Ok(n)
}

fn init_tracing() {
    // stdout carries the MCP protocol; logs go to stderr only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn service_from_env() -> Result<DocsService> {
    let cfg = DocsConfig::from_env()?;
    Ok(DocsService::from_config(cfg)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Opt-in env file; does not log values.
    let env_file = std::env::var("DOCSEARCH_ENV_FILE")
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    let env_file_result = env_file
        .as_deref()
        .map(|p| (p.to_string(), load_env_file(std::path::Path::new(p))));

    init_tracing();
    if let Some((path, res)) = env_file_result {
        match res {
            Ok(n) => tracing::debug!(path = %path, vars_set = n, "loaded env file"),
            Err(e) => tracing::warn!(path = %path, error = %e, "could not read env file"),
        }
    }

    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "stdio")]
        Commands::McpStdio => {
            let svc = service_from_env()?;
            mcp::serve_stdio(svc)
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        #[cfg(not(feature = "stdio"))]
        Commands::McpStdio => {
            anyhow::bail!("mcp-stdio requires feature `stdio` (rebuild with: --features stdio)");
        }
        Commands::GetDocs(args) => {
            let svc = service_from_env()?;
            let res = svc.lookup(&args.query, &args.library).await;
            let ok = res.is_ok();
            match args.output.to_ascii_lowercase().as_str() {
                "json" => {
                    let v = match &res {
                        Ok(answer) => serde_json::json!({
                            "schema_version": SCHEMA_VERSION,
                            "kind": "get_docs",
                            "ok": true,
                            "library": args.library,
                            "query": args.query,
                            "strategy": answer.strategy.name(),
                            "pages": answer.pages.iter().map(|p| serde_json::json!({
                                "url": p.url,
                                "ok": p.is_ok(),
                                "error": p.result.as_ref().err().map(|e| e.to_string()),
                            })).collect::<Vec<_>>(),
                            "text": answer.text,
                        }),
                        Err(e) => serde_json::json!({
                            "schema_version": SCHEMA_VERSION,
                            "kind": "get_docs",
                            "ok": false,
                            "library": args.library,
                            "query": args.query,
                            "error": { "code": e.kind(), "message": e.to_user_message() },
                        }),
                    };
                    println!("{v}");
                }
                _ => match &res {
                    Ok(answer) => println!("{}", answer.text),
                    Err(e) => println!("{}", e.to_user_message()),
                },
            }
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Libraries(args) => {
            let cfg = DocsConfig::from_env()?;
            match args.output.to_ascii_lowercase().as_str() {
                "text" => print!("{}", libraries_text(&cfg.registry)),
                _ => println!("{}", libraries_json(&cfg.registry)),
            }
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "name": "docsearch",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("docsearch {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }

    Ok(())
}
