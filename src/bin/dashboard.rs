//! Terminal dashboard
//!
//! Live view of the sample stream. Logs go to a file so they never overwrite the screen.

use std::path::PathBuf;

use clap::Parser;
use sysmon_stream::{client::StreamClient, config::read_config_file, dashboard, logging, util};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "sysmon-dashboard")]
#[command(about = "Terminal dashboard for the sample stream", long_about = None)]
struct Args {
    /// Config file, only used for the socket path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Socket path (overrides SYSMON_SOCKET and the config file)
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Log file, defaults to `<data dir>/sysmon-stream/dashboard.log`
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn default_log_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sysmon-stream")
        .join("dashboard.log")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let log_path = args.log_file.clone().unwrap_or_else(default_log_path);
    logging::init(
        "sysmon_dashboard",
        logging::level(args.verbose, LevelFilter::INFO),
        Some(&log_path),
    )?;

    let config_socket = match &args.config {
        Some(path) => Some(read_config_file(path)?.socket_path),
        None => None,
    };
    let socket_path = args
        .socket
        .or_else(util::get_socket_path)
        .or(config_socket)
        .unwrap_or_else(util::get_default_socket_path);

    let stream = StreamClient::connect(&socket_path).await?;

    tokio::select! {
        result = dashboard::run(stream) => {
            result?;
            eprintln!("❌ connection to the server was lost");
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n✅ dashboard stopped");
        }
    }

    Ok(())
}
