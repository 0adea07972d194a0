//! CLI binary for doculoader.
//!
//! A thin shim over the library crate: maps flags and environment variables
//! onto `RelayConfig` / `AzureConfig`, then either runs the HTTP server or
//! extracts a single local file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doculoader::{
    serve, AppState, AzureConfig, AzureDocumentIntelligence, Extractor, FailurePolicy,
    OcrProvider, PageMarker, RelayConfig, SourceDocument,
};
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the loader for Open WebUI (Settings > Documents > External loader)
  doculoader serve --port 8000

  # OCR one file and print the text
  doculoader extract scan.pdf

  # Full result with per-page timings, as JSON
  doculoader extract scan.pdf --json -o scan.json

ENVIRONMENT:
  AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT   https://<resource>.cognitiveservices.azure.com/
  AZURE_DOCUMENT_INTELLIGENCE_KEY        resource key
  TEMP_WORK_DIR                          scratch directory (default /tmp/doculoader)

  Every flag also reads the environment variable shown in its help text.
  A .env file in the working directory is loaded first, if present.
"#;

/// OCR relay for Open WebUI's external document loader.
#[derive(Parser, Debug)]
#[command(
    name = "doculoader",
    version,
    about = "OCR relay for Open WebUI: PDF pages in, Azure Document Intelligence text out",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging.
    #[arg(short, long, global = true, env = "DOCULOADER_VERBOSE")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true, env = "DOCULOADER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// OCR a single local PDF and print the result.
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "DOCULOADER_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind.
    #[arg(long, env = "DOCULOADER_PORT", default_value_t = 8000)]
    port: u16,

    /// Bearer token required on /process. Unset disables the check.
    #[arg(long, env = "DOCULOADER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "DOCULOADER_MAX_UPLOAD_MB", default_value_t = 100)]
    max_upload_mb: usize,

    #[command(flatten)]
    relay: RelayArgs,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// PDF file to extract.
    file: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit the full extraction result (text, metadata, pages, stats) as JSON.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    relay: RelayArgs,
}

/// Settings shared by both subcommands.
#[derive(Args, Debug)]
struct RelayArgs {
    /// Document Intelligence endpoint.
    #[arg(long, env = "AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT")]
    azure_endpoint: Option<String>,

    /// Document Intelligence key.
    #[arg(long, env = "AZURE_DOCUMENT_INTELLIGENCE_KEY", hide_env_values = true)]
    azure_key: Option<String>,

    /// Analysis model.
    #[arg(long, env = "AZURE_DOCUMENT_INTELLIGENCE_MODEL", default_value = "prebuilt-read")]
    azure_model: String,

    /// REST API version.
    #[arg(long, env = "AZURE_DOCUMENT_INTELLIGENCE_API_VERSION", default_value = "2024-11-30")]
    azure_api_version: String,

    /// Status poll interval when the service sends no Retry-After.
    #[arg(long, env = "DOCULOADER_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Scratch directory for request-scoped files.
    #[arg(long, env = "TEMP_WORK_DIR", default_value = "/tmp/doculoader")]
    work_dir: PathBuf,

    /// Maximum pages in flight per request.
    #[arg(short, long, env = "DOCULOADER_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "DOCULOADER_PAGE_TIMEOUT", default_value_t = 120)]
    page_timeout: u64,

    /// Whole-request deadline in seconds.
    #[arg(long, env = "DOCULOADER_REQUEST_TIMEOUT", default_value_t = 600)]
    request_timeout: u64,

    /// Extra attempts for a failed page (at most 10).
    #[arg(long, env = "DOCULOADER_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// best-effort (failed pages become markers) or abort.
    #[arg(long, env = "DOCULOADER_FAILURE_POLICY", default_value = "best-effort")]
    failure_policy: String,

    /// Page marker: dashed, none, or a template containing {page}.
    #[arg(long, env = "DOCULOADER_PAGE_MARKER", default_value = "dashed")]
    page_marker: String,
}

impl RelayArgs {
    fn build(&self, api_key: Option<String>, max_upload_mb: usize) -> Result<Extractor> {
        let failure_policy: FailurePolicy = self.failure_policy.parse()?;
        let page_marker: PageMarker = self.page_marker.parse()?;

        let config = RelayConfig::builder()
            .work_dir(&self.work_dir)
            .max_concurrency(self.concurrency)
            .page_timeout_secs(self.page_timeout)
            .request_timeout_secs(self.request_timeout)
            .max_retries(self.max_retries)
            .failure_policy(failure_policy)
            .page_marker(page_marker)
            .max_upload_bytes(max_upload_mb.saturating_mul(1024 * 1024))
            .api_key(api_key)
            .build()
            .context("Invalid configuration")?;

        let provider = AzureDocumentIntelligence::new(AzureConfig {
            endpoint: self.azure_endpoint.clone(),
            api_key: self.azure_key.clone(),
            model: self.azure_model.clone(),
            api_version: self.azure_api_version.clone(),
            poll_interval_ms: self.poll_interval_ms,
        })?;
        if let Err(e) = provider.ensure_configured() {
            tracing::warn!("{}", e);
        }

        tracing::debug!("{:?}", config);
        Ok(Extractor::new(config, Arc::new(provider)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case in containers.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_server(args).await,
        Command::Extract(args) => run_extract(args).await,
    }
}

async fn run_server(args: ServeArgs) -> Result<()> {
    let extractor = args.relay.build(args.api_key.clone(), args.max_upload_mb)?;

    tokio::fs::create_dir_all(&extractor.config().work_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create work dir {}",
                extractor.config().work_dir.display()
            )
        })?;

    let addr = SocketAddr::new(args.host, args.port);
    serve(addr, AppState::new(extractor))
        .await
        .with_context(|| format!("Server on {addr} failed"))
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
    let extractor = args.relay.build(None, 100)?;

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let mut source = SourceDocument::new(bytes);
    if let Some(name) = args.file.file_name() {
        source = source.with_filename(name.to_string_lossy());
    }

    let result = extractor
        .extract(source)
        .await
        .with_context(|| format!("Extraction failed for {}", args.file.display()))?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&result).context("Failed to serialize result")?
    } else {
        result.text
    };

    match &args.output {
        Some(path) => tokio::fs::write(path, rendered.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{rendered}").context("Failed to write to stdout")?;
        }
    }
    Ok(())
}
