use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "cbox-sim",
    about = "Simulated cbox device: hex-encoded command frames, one per line",
    version
)]
pub struct Cli {
    /// TOML config file. Flags below override it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Update pass interval in milliseconds.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Persist objects to this file instead of keeping them in memory.
    #[arg(long)]
    pub storage: Option<PathBuf>,

    /// Serve a single host on stdin/stdout instead of TCP.
    #[arg(long)]
    pub stdio: bool,

    #[arg(short, long)]
    pub verbose: bool,
}
