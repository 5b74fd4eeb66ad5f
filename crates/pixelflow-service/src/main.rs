//! pixelflow - image operation pipeline CLI
//!
//! Reads JSON requests from a file or stdin and prints JSON responses.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pixelflow_core::FsStore;
use pixelflow_service::service::inline_image;
use pixelflow_service::{logging, ImageService, Reply, ServiceConfig};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "pixelflow")]
#[command(author, version, about = "Image operation pipeline and file transforms")]
#[command(long_about = "
Runs image operation pipelines and stored-image transforms from JSON requests.

Examples:
  pixelflow health
  pixelflow filters
  pixelflow process --request ops.json --image photo.jpg
  echo '{\"key\": \"photo.png\", \"quality\": 70}' | pixelflow compress
  pixelflow crop --request crop.json --storage-dir ./images
  pixelflow batch --request requests.json -j 4
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "pixelflow.toml")]
    config: PathBuf,

    /// Image store directory, overriding `files.storage_dir`
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Pretty-print responses
    #[arg(long, global = true)]
    pretty: bool,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an operation list over an image
    #[command(visible_alias = "p")]
    Process(ProcessArgs),

    /// List operation families, methods and parameters
    Filters,

    /// Report that the service is up
    Health,

    /// Re-encode a stored image as JPEG
    Compress(RequestArgs),

    /// Resize a stored image
    Resize(RequestArgs),

    /// Crop a stored image
    Crop(RequestArgs),

    /// Convert a stored image to JPEG
    Convert(RequestArgs),

    /// Run an array of `{"command": ...}` requests in parallel
    Batch(BatchArgs),
}

#[derive(Args)]
struct RequestArgs {
    /// JSON request file (stdin when omitted)
    #[arg(short, long)]
    request: Option<PathBuf>,
}

#[derive(Args)]
struct ProcessArgs {
    #[command(flatten)]
    input: RequestArgs,

    /// Image file to embed as the request's `image`
    #[arg(short, long)]
    image: Option<PathBuf>,
}

#[derive(Args)]
struct BatchArgs {
    #[command(flatten)]
    input: RequestArgs,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, default_value = "0")]
    threads: usize,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(dir) = cli.storage_dir {
        config.files.storage_dir = dir;
    }
    logging::init(&config.logging.filter, cli.verbose).context("Failed to set up logging")?;

    let store = FsStore::open(&config.files.storage_dir).with_context(|| {
        format!("Failed to open image store {}", config.files.storage_dir.display())
    })?;
    let service = ImageService::new(&config, store);

    let ok = match cli.command {
        Commands::Filters => emit(&service.capabilities(), cli.pretty)?,
        Commands::Health => emit(&service.health(), cli.pretty)?,
        Commands::Process(args) => {
            let mut request = read_request(args.input.request.as_deref(), true)?;
            if let Some(path) = args.image {
                let bytes = fs::read(&path)
                    .with_context(|| format!("Failed to read image {}", path.display()))?;
                insert(&mut request, "image", Value::String(inline_image(&bytes)))?;
            }
            emit(&service.process_json(request), cli.pretty)?
        }
        Commands::Compress(args) => run_command(&service, "compress", &args, cli.pretty)?,
        Commands::Resize(args) => run_command(&service, "resize", &args, cli.pretty)?,
        Commands::Crop(args) => run_command(&service, "crop", &args, cli.pretty)?,
        Commands::Convert(args) => run_command(&service, "convert", &args, cli.pretty)?,
        Commands::Batch(args) => run_batch(&service, &args, cli.pretty)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn run_command(service: &ImageService<FsStore>, command: &str, args: &RequestArgs, pretty: bool) -> Result<bool> {
    let mut request = read_request(args.request.as_deref(), false)?;
    insert(&mut request, "command", Value::String(command.to_string()))?;
    let reply = service.handle_json(request);
    emit(&reply, pretty)
}

fn run_batch(service: &ImageService<FsStore>, args: &BatchArgs, pretty: bool) -> Result<bool> {
    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let requests = match read_request(args.input.request.as_deref(), false)? {
        Value::Array(items) => items,
        _ => bail!("Batch input must be a JSON array of requests"),
    };
    info!(requests = requests.len(), "Starting batch");

    let replies: Vec<Reply> = requests
        .into_par_iter()
        .map(|request| service.handle_json(request))
        .collect();

    let failed = replies.iter().filter(|r| !r.is_success()).count();
    info!(success = replies.len() - failed, failed, "Batch complete");
    emit(&replies, pretty)?;
    Ok(failed == 0)
}

/// Read one JSON document from `path` or stdin. An empty process request
/// becomes `{}` so `--image` can supply the rest.
fn read_request(path: Option<&Path>, allow_empty: bool) -> Result<Value> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read request from stdin")?;
            text
        }
    };
    if allow_empty && text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(&text).context("Request is not valid JSON")
}

fn insert(request: &mut Value, key: &str, value: Value) -> Result<()> {
    match request.as_object_mut() {
        Some(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        None => bail!("Request must be a JSON object"),
    }
}

/// Print a response; returns whether it reports success.
fn emit<T: Serialize + Outcome>(response: &T, pretty: bool) -> Result<bool> {
    let text = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    println!("{text}");
    Ok(response.succeeded())
}

trait Outcome {
    fn succeeded(&self) -> bool;
}

impl Outcome for Reply {
    fn succeeded(&self) -> bool {
        self.is_success()
    }
}

impl<T> Outcome for pixelflow_service::Envelope<T> {
    fn succeeded(&self) -> bool {
        self.is_success()
    }
}

impl Outcome for pixelflow_service::Capabilities {
    fn succeeded(&self) -> bool {
        true
    }
}

impl Outcome for Vec<Reply> {
    fn succeeded(&self) -> bool {
        self.iter().all(Reply::is_success)
    }
}
