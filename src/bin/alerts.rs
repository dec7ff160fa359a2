use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use sysmon_stream::{
    alerts::{AlertEngine, StopReason},
    client::StreamClient,
    config::{Config, ConfigHandle, read_config_file, write_default_config},
    logging,
    telegram::TelegramNotifier,
    util::{get_bot_token, get_chat_id, get_socket_path},
};
use tracing::{error, info, level_filters::LevelFilter, trace};

#[derive(Debug, Clone, Parser)]
#[command(name = "sysmon-alerts")]
#[command(about = "Send Telegram alerts for threshold breaches in the sample stream", long_about = None)]
struct Args {
    /// Config file, re-read for every sample
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

/// Environment credentials take precedence over the file.
fn apply_env_overrides(mut config: Config) -> Config {
    if let Some(token) = get_bot_token() {
        config.telegram.bot_token = token;
    }
    if let Some(chat_id) = get_chat_id() {
        config.telegram.chat_id = chat_id;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init(
        "sysmon_alerts",
        logging::level(args.verbose, LevelFilter::INFO),
        args.log_file.as_deref(),
    )?;
    trace!("started with args: {args:?}");

    if !args.config.exists() {
        info!("config file not found, creating {}", args.config.display());
        write_default_config(&args.config)?;
        info!(
            "📝 fill in the Telegram credentials in {} and restart",
            args.config.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let config = apply_env_overrides(read_config_file(&args.config)?);
    if !config.telegram.is_configured() {
        error!("❌ telegram bot_token and chat_id are not configured");
        return Ok(ExitCode::FAILURE);
    }

    let socket_path = args
        .socket
        .clone()
        .or_else(get_socket_path)
        .unwrap_or_else(|| config.socket_path.clone());

    let notifier = TelegramNotifier::new(&config.telegram)?;

    let stream = match StreamClient::connect(&socket_path).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("❌ {e:#}");
            return Ok(ExitCode::FAILURE);
        }
    };
    info!("✅ connected to {}", socket_path.display());

    let handle = ConfigHandle::from_file(&args.config, config);
    let mut engine = AlertEngine::new(handle, notifier);

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
    };

    match engine.run(stream, shutdown).await? {
        StopReason::Interrupted => Ok(ExitCode::SUCCESS),
        StopReason::Disconnected => Ok(ExitCode::FAILURE),
    }
}
