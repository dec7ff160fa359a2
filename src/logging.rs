use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    filter, fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Install the global subscriber for the library and the calling binary.
///
/// Output goes to stderr unless `log_file` is given, in which case it is appended to that file.
pub fn init(binary: &str, level: LevelFilter, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = filter::Targets::new().with_targets(vec![
        ("sysmon_stream", level),
        (binary, level),
    ]);

    let writer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")
}

/// Default level, raised to DEBUG by `--verbose`.
pub fn level(verbose: bool, default: LevelFilter) -> LevelFilter {
    if verbose { LevelFilter::DEBUG } else { default }
}
