mod app;

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

pub use app::App;

/// Implicit association test, presented full screen.
#[derive(Debug, Parser)]
#[command(name = "iat", version)]
pub struct Cli {
    /// JSON experiment configuration; built-in defaults when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the results file is written to.
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// TrueType font used for every on-screen text.
    #[arg(long)]
    pub font: PathBuf,

    /// Run in a window instead of borderless full screen.
    #[arg(long)]
    pub windowed: bool,
}

fn init_tracing() {
    // RUST_LOG=iat_experiment=debug,wgpu=warn
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wgpu=warn,naga=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let app = match App::new(&cli) {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "failed to prepare the experiment");
            return Err(e);
        }
    };
    app.run()
}
