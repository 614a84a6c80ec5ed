//! Bleatkan - watches for veadotube instances and logs their avatar states.

mod monitor;

use anyhow::Result;
use bleatkan_core::{DiscoveryOptions, InstancesManager};
use clap::Parser;
use monitor::{DiscoveryForwarder, Monitor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "bleatkan")]
#[command(about = "Connect to running veadotube instances and log their states")]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Instances directory (defaults to ~/.veadotube/instances)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Also ask each instance for its current state
    #[arg(short, long)]
    peek: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG wins over --debug
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting bleatkan");

    let mut options = DiscoveryOptions::default();
    if let Some(dir) = args.dir {
        options = options.with_directory(dir);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = InstancesManager::with_options(Arc::new(DiscoveryForwarder::new(tx.clone())), options)?;
    info!("Instances directory: {}", manager.directory().display());

    let mut monitor = Monitor::new(tx, args.peek);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received, exiting");
                break;
            }
            Some(command) = rx.recv() => monitor.handle(command, &manager),
        }
    }

    info!("Closing {} connection(s)", monitor.session_count());
    monitor.close_all();
    manager.shutdown().await;

    Ok(())
}
