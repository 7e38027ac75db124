use clap::{Parser, Subcommand};
use simple_resize::imaging::{ImageBackend, SizeRequest};
use simple_resize::server::{self, AppState};
use simple_resize::store::DirStore;
use simple_resize::{batch, config, logging, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Target dimensions shared by `resize` and `batch`.
#[derive(clap::Args, Clone)]
struct SizeArgs {
    /// Target width in pixels
    #[arg(short = 'w', long)]
    width: Option<u32>,

    /// Target height in pixels
    #[arg(short = 'H', long)]
    height: Option<u32>,
}

impl SizeArgs {
    fn request(&self) -> SizeRequest {
        SizeRequest::new(self.width, self.height)
    }
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "simple-resize")]
#[command(about = "Resize images on demand, keeping their format")]
#[command(long_about = "\
Resize images on demand, keeping their format

Give a width, a height, or both. With one side given, the other is derived
from the source aspect ratio, rounded to the nearest pixel. With both given,
the image is stretched to exactly that size. With neither, the source is
returned untouched (configurable via [resize] empty_request).

Output is always in the source's format: JPEG stays JPEG, PNG stays PNG.

Commands:
  resize      one file on disk
  batch       every image under a directory, in parallel
  serve       HTTP service: GET /resize?image_name=cat.jpg&w=500

Run 'simple-resize gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (optional; stock defaults apply when missing)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resize a single image file
    Resize {
        /// Source image
        input: PathBuf,
        /// Destination file (written in the source's format)
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        size: SizeArgs,
    },
    /// Resize every supported image under a directory
    Batch {
        /// Directory to walk
        input: PathBuf,
        /// Directory receiving the resized tree
        #[arg(long = "out")]
        output: PathBuf,
        #[command(flatten)]
        size: SizeArgs,
    },
    /// Run the HTTP resize service
    Serve {
        /// Address to listen on (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
        /// Directory holding source images (overrides [store] root)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Resize {
            input,
            output: dest,
            size,
        } => {
            let config = setup(&cli.config, cli.verbose, cli.json_logs)?;
            let backend = config.backend();
            let summary = batch::resize_file(
                &backend,
                &input,
                &dest,
                size.request(),
                config.resize.empty_request,
            )?;
            output::print_resize_output(&input, &summary);
        }
        Command::Batch {
            input,
            output: dest,
            size,
        } => {
            let config = setup(&cli.config, cli.verbose, cli.json_logs)?;
            init_thread_pool(&config.processing);
            let backend = config.backend();
            let report = batch::run_batch(
                &backend,
                &input,
                &dest,
                size.request(),
                config.resize.empty_request,
            )?;
            output::print_batch_output(&report);
            if !report.is_success() {
                return Err(format!(
                    "{} of {} files failed",
                    report.failed(),
                    report.files.len()
                )
                .into());
            }
        }
        Command::Serve { bind, store } => {
            let config = setup(&cli.config, cli.verbose, cli.json_logs)?;
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let store = DirStore::new(store.unwrap_or_else(|| PathBuf::from(&config.store.root)));
            info!(store = %store.root().display(), "serving images from directory store");

            let backend: Arc<dyn ImageBackend> = Arc::new(config.backend());
            let state = AppState::new(
                backend,
                Arc::new(store),
                config.resize.empty_request,
                &config.server.cache_control,
            )?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind(bind.as_str()).await?;
                server::serve(listener, state).await
            })?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config and install logging for commands that do real work.
fn setup(
    path: &Path,
    verbose: bool,
    json_logs: bool,
) -> Result<config::ServiceConfig, config::ConfigError> {
    let config = config::load_config(path)?;
    logging::init(&config.logging, verbose, json_logs);
    info!(version = version_string(), config = %path.display(), "starting");
    Ok(config)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
