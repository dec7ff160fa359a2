//! Terminal dashboard
//!
//! Redraws the whole screen for every sample received from the stream.

use std::io::{self, Write};

use crossterm::{
    cursor, execute,
    terminal::{self, ClearType},
};
use tokio::io::AsyncRead;
use tracing::{info, instrument, warn};

use crate::{Sample, client::StreamClient, util::format_memory_mb, util::truncate_chars};

const SCREEN_WIDTH: usize = 80;

const NAME_WIDTH: usize = 30;

/// One `█` per two percent.
pub fn bar(percent: f64) -> String {
    let blocks = (percent.max(0.0) / 2.0) as usize;
    "█".repeat(blocks)
}

pub fn render(sample: &Sample) -> String {
    let heavy = "=".repeat(SCREEN_WIDTH);
    let light = "-".repeat(SCREEN_WIDTH);
    let mut lines = vec![
        heavy.clone(),
        format!("{:^width$}", "🖥️  REAL-TIME SERVER MONITORING DASHBOARD", width = SCREEN_WIDTH),
        heavy.clone(),
        String::new(),
        "📊 SYSTEM METRICS:".to_string(),
        light.clone(),
        format!(
            "  💻 CPU Usage:     {:>6.1}%  {}",
            sample.cpu_percent,
            bar(sample.cpu_percent)
        ),
        format!(
            "  💾 Memory Usage:  {:>6.1}%  {}",
            sample.memory_percent,
            bar(sample.memory_percent)
        ),
        format!(
            "     Total: {:.1}G | Used: {:.1}G",
            sample.memory_total_gb, sample.memory_used_gb
        ),
        format!(
            "  💾 Disk Usage:    {:>6.1}%  {}",
            sample.disk_percent,
            bar(sample.disk_percent)
        ),
        format!(
            "     Total: {:.1}G | Used: {:.1}G",
            sample.disk_total_gb, sample.disk_used_gb
        ),
        String::new(),
        "🔥 TOP CPU PROCESSES:".to_string(),
        light.clone(),
    ];

    if sample.top_cpu_processes.is_empty() {
        lines.push("  No active processes".to_string());
    }
    for (i, process) in sample.top_cpu_processes.iter().enumerate() {
        lines.push(format!(
            "  {}. {:<width$} | PID: {:<8} | CPU: {:>5.1}%",
            i + 1,
            truncate_chars(&process.name, NAME_WIDTH),
            process.pid,
            process.cpu_percent,
            width = NAME_WIDTH
        ));
    }

    lines.push(String::new());
    lines.push("💾 TOP MEMORY PROCESSES:".to_string());
    lines.push(light);

    if sample.top_memory_processes.is_empty() {
        lines.push("  No active processes".to_string());
    }
    for (i, process) in sample.top_memory_processes.iter().enumerate() {
        lines.push(format!(
            "  {}. {:<width$} | PID: {:<8} | MEM: {:>7}",
            i + 1,
            truncate_chars(&process.name, NAME_WIDTH),
            process.pid,
            format_memory_mb(process.memory_mb),
            width = NAME_WIDTH
        ));
    }

    lines.push(String::new());
    lines.push(heavy.clone());
    lines.push(format!("{:^width$}", "Press Ctrl+C to exit", width = SCREEN_WIDTH));
    lines.push(heavy);

    lines.join("\n")
}

/// Clear the terminal and draw one frame.
pub fn draw(out: &mut impl Write, sample: &Sample) -> io::Result<()> {
    execute!(out, terminal::Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    writeln!(out, "{}", render(sample))?;
    out.flush()
}

/// Draw every sample until the server disconnects.
#[instrument(skip_all)]
pub async fn run<R: AsyncRead + Unpin>(mut stream: StreamClient<R>) -> anyhow::Result<()> {
    let mut stdout = io::stdout();

    while let Some(sample) = stream.next_sample().await? {
        draw(&mut stdout, &sample)?;
    }

    if stream.skipped() > 0 {
        warn!("skipped {} malformed records", stream.skipped());
    }
    info!("stream disconnected");
    Ok(())
}
