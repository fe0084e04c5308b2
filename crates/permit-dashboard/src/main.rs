//! Entry point for the permit exploration dashboard.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use permit_dashboard::server::{DEFAULT_ADDR, serve};
use permit_dashboard::DashboardState;
use permit_processing::{LoadOptions, PipelineConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Exploration dashboard for building-permit datasets",
    long_about = "Serves overview, univariate, bivariate and exploration pages for a \
                  building-permit CSV and, optionally, its cleaned counterpart.\n\n\
                  EXAMPLES:\n  \
                  permit-dashboard --raw Building_Permits.csv\n  \
                  permit-dashboard --raw Building_Permits.csv --cleaned out/cleaned.csv --addr 0.0.0.0:8501"
)]
struct Args {
    /// Raw permits file (CSV or Parquet)
    #[arg(long)]
    raw: PathBuf,

    /// Cleaned permits file, selectable with `?dataset=cleaned`
    #[arg(long)]
    cleaned: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Pipeline JSON config; only its `load` section is used here
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level);

    let load_options = match &args.config {
        Some(path) => {
            PipelineConfig::from_json_file(path)
                .with_context(|| format!("Reading config {}", path.display()))?
                .load
        }
        None => LoadOptions::default(),
    };

    // A missing file fails each page request rather than startup.
    for path in std::iter::once(&args.raw).chain(args.cleaned.as_ref()) {
        if !path.is_file() {
            warn!("{} does not exist yet; pages using it will report an error", path.display());
        }
    }

    info!(
        "Serving raw={} cleaned={}",
        args.raw.display(),
        args.cleaned
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    );

    let state = DashboardState::with_load_options(args.raw, args.cleaned, load_options);
    serve(state, args.addr).await
}
