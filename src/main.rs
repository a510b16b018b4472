//! Entry point for the bundle-sync command line tool.

use bundle_sync::cli::{
    Cli,
    run,
};
use clap::Parser as _;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::process::exit(run(cli));
}
