use clap::Parser;
use dopant_screen::cli::{dispatch, Cli};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // stdout carries JSON; logs go to stderr
    let filter = EnvFilter::try_from_env("DOPANT_SCREEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    dispatch(Cli::parse())
}
