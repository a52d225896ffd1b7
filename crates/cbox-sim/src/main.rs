use clap::Parser;
use tracing::Level;

mod cli;
mod config;
mod server;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    // stdout carries responses in stdio mode
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let config = config::SimConfig::from_cli(&cli)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(server::run(config, cli.stdio))
}
