use std::path::PathBuf;

use clap::Parser;
use sysmon_stream::{
    config::{Config, read_config_file},
    logging,
    sampler::{MetricsSampler, SampleSlot},
    server::{BroadcastServer, ServerOptions},
    util::get_socket_path,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};

#[derive(Debug, Clone, Parser)]
#[command(name = "sysmon-server")]
#[command(about = "Sample host metrics and stream them over a Unix socket", long_about = None)]
struct Args {
    /// Config file, defaults are used when it does not exist
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    /// Socket path (overrides SYSMON_SOCKET and the config file)
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    if path.exists() {
        read_config_file(path)
    } else {
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init(
        "sysmon_server",
        logging::level(args.verbose, LevelFilter::WARN),
        args.log_file.as_deref(),
    )?;
    trace!("started with args: {args:?}");

    let config = load_config(&args.config)?;
    let socket_path = args
        .socket
        .or_else(get_socket_path)
        .unwrap_or_else(|| config.socket_path.clone());

    let slot = SampleSlot::default();
    let mut server = BroadcastServer::bind(ServerOptions::new(&socket_path), slot.clone())?;
    info!("🚀 listening on {}", server.socket_path().display());

    let sampler = MetricsSampler::new(slot, config.top_processes, &config.disk_path);
    let running = server.running();
    let clients = server.client_counter();
    let sampler_handle = tokio::task::spawn_blocking(move || sampler.run(running, clients));

    wait_for_signal().await;
    info!("shutting down");

    server.shutdown().await;
    if let Err(e) = sampler_handle.await {
        warn!("sampler thread ended abnormally: {e}");
    }

    info!("✅ server stopped");
    Ok(())
}

async fn wait_for_signal() {
    let mut terminate =
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("cannot listen for SIGTERM: {e}");
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
