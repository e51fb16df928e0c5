//! docverify command line
//!
//! Classify and verify business documents with a remote multimodal model.
//!
//! Usage:
//!   docverify classify --job J-1001 --image page1.png
//!   docverify extract --job J-1001 --type SalesQuote --image quote.jpg
//!   docverify verify --job J-1001 --type ProformaInvoice --reference erp.json --image pi.png
//!   docverify classify-verify --job J-1001 --reference erp.json --image a.png --image b.png
//!   docverify health

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use docverify_core::{
    defaults, ClassificationRequest, ClassifyAndVerifyRequest, DocumentImage,
    IdentifierExtractionRequest, VerificationRequest,
};
use docverify_engine::VerificationService;
use docverify_inference::{
    BackendSession, GeminiBackend, ModelCandidates, ModelInvocationOrchestrator,
};

const ENV_HELP: &str = "\
Environment Variables:
  GEMINI_API_KEY            Gemini API key
  GEMINI_ACCESS_TOKEN       Vertex AI bearer token
  GCP_PROJECT_ID            Vertex AI project (selects the Vertex AI endpoint)
  GCP_LOCATION              Vertex AI location (default: us-central1)
  GEMINI_BASE_URL           Endpoint override
  GEMINI_MODEL_NAME         Preferred model (default: gemini-2.0-flash-001)
  GEMINI_FALLBACK_MODELS    Comma-separated fallback models
  GEMINI_TIMEOUT_SECS       Request timeout (default: 120)
  RUST_LOG, LOG_FORMAT, LOG_FILE, LOG_ANSI";

#[derive(Parser)]
#[command(name = "docverify")]
#[command(version, about = "Document classification and verification")]
#[command(propagate_version = true, after_help = ENV_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Job and page images shared by every document command.
#[derive(Args)]
struct DocumentArgs {
    /// Job number
    #[arg(short, long)]
    job: String,

    /// Document page image (can specify multiple)
    #[arg(short, long = "image", required = true, num_args = 1..)]
    images: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract document identifiers
    Extract {
        #[command(flatten)]
        document: DocumentArgs,

        /// Document type (SalesQuote, ProformaInvoice, JobConsumption)
        #[arg(short = 't', long = "type")]
        document_type: String,
    },

    /// Verify a document against reference data
    Verify {
        #[command(flatten)]
        document: DocumentArgs,

        /// Document type (SalesQuote, ProformaInvoice, JobConsumption)
        #[arg(short = 't', long = "type")]
        document_type: String,

        /// Reference data as a JSON object
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },

    /// Classify the document type
    Classify {
        #[command(flatten)]
        document: DocumentArgs,
    },

    /// Classify, then extract identifiers or verify
    ClassifyVerify {
        #[command(flatten)]
        document: DocumentArgs,

        /// Reference data as a JSON object; a single key selects identifier extraction
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },

    /// Print backend readiness
    Health,
}

impl DocumentArgs {
    fn load_images(&self) -> anyhow::Result<Vec<DocumentImage>> {
        self.images.iter().map(|p| load_image(p)).collect()
    }
}

/// Logs go to stderr or a rolling file so stdout carries only the result.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = env::var("LOG_FILE").ok();
    let log_ansi = env::var("LOG_ANSI").ok().map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "docverify=info,docverify_engine=info,docverify_inference=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("docverify.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

fn load_image(path: &Path) -> anyhow::Result<DocumentImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let mime_type = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| defaults::DEFAULT_MIME_TYPE.to_string());
    Ok(DocumentImage {
        image_base64: STANDARD.encode(&bytes),
        mime_type,
    })
}

fn load_reference(path: Option<&Path>) -> anyhow::Result<Map<String, Value>> {
    let Some(path) = path else {
        return Ok(Map::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference data {}", path.display()))?;
    match serde_json::from_str::<Value>(&text)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?
    {
        Value::Object(map) => Ok(map),
        _ => bail!("Reference data in {} must be a JSON object", path.display()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let backend = GeminiBackend::from_env().context("Failed to create Gemini backend")?;
    let session = BackendSession::new(Arc::new(backend));
    if !session.initialize().await {
        warn!("Backend not ready; requests will report an initialization error");
    }

    let candidates = ModelCandidates::from_env();
    info!(models = ?candidates.as_slice(), "Model candidates configured");
    let service = VerificationService::new(session, ModelInvocationOrchestrator::new(candidates));

    let output = run(&service, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(service: &VerificationService, command: Commands) -> anyhow::Result<Value> {
    let output = match command {
        Commands::Health => serde_json::to_value(service.health())?,
        Commands::Extract {
            document,
            document_type,
        } => serde_json::to_value(
            service
                .extract_identifiers(&IdentifierExtractionRequest {
                    document_images: document.load_images()?,
                    job_no: document.job,
                    document_type,
                })
                .await,
        )?,
        Commands::Verify {
            document,
            document_type,
            reference,
        } => serde_json::to_value(
            service
                .verify(&VerificationRequest {
                    document_images: document.load_images()?,
                    job_no: document.job,
                    document_type,
                    reference_data: load_reference(reference.as_deref())?,
                })
                .await,
        )?,
        Commands::Classify { document } => serde_json::to_value(
            service
                .classify(&ClassificationRequest {
                    document_images: document.load_images()?,
                    job_no: document.job,
                })
                .await,
        )?,
        Commands::ClassifyVerify {
            document,
            reference,
        } => serde_json::to_value(
            service
                .classify_and_verify(&ClassifyAndVerifyRequest {
                    document_images: document.load_images()?,
                    job_no: document.job,
                    reference_data: load_reference(reference.as_deref())?,
                })
                .await,
        )?,
    };
    Ok(output)
}
