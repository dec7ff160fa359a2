use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::{
    config::{TelegramConfig, Thresholds},
    host::HostDetails,
    notifier::{AlertPayload, Notifier},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Inner width of the box-drawn alert block
const BOX_WIDTH: usize = 44;

#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'a str,
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/bot{}/sendMessage",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip_all)]
    async fn send_message(&self, text: &str) -> bool {
        let message = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };

        match self.client.post(&self.url).json(&message).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    info!("✅ Telegram message sent");
                    true
                } else {
                    error!("Telegram message failed with status: {}", response.status());
                    if let Ok(error_text) = response.text().await {
                        error!("Telegram API error response: {}", error_text);
                    }
                    false
                }
            }
            Err(e) => {
                error!("Failed to send Telegram message: {}", e);
                false
            }
        }
    }

    async fn send_formatted_alert(&self, alert: &AlertPayload) -> bool {
        self.send_message(&pre(&format_alert(alert))).await
    }
}

/// Wrap text in a `<pre>` block so Telegram keeps the box alignment.
pub fn pre(text: &str) -> String {
    format!("<pre>{text}</pre>")
}

pub fn border_top() -> String {
    format!("┌{}┐", "─".repeat(BOX_WIDTH))
}

pub fn border_mid() -> String {
    format!("├{}┤", "─".repeat(BOX_WIDTH))
}

pub fn border_bottom() -> String {
    format!("└{}┘", "─".repeat(BOX_WIDTH))
}

pub fn boxed_line(content: &str) -> String {
    format!("│{content:<width$}│", width = BOX_WIDTH)
}

pub fn format_alert(alert: &AlertPayload) -> String {
    let mut lines = vec![
        border_top(),
        boxed_line(&format!("         {} {}", alert.emoji, alert.title)),
        border_mid(),
        boxed_line(&format!("🗓️ Date: {}", alert.date)),
        boxed_line(&format!("🖥️ Hostname: {}", alert.hostname)),
        boxed_line(&format!("🌐 IP Address: {}", alert.ip)),
        boxed_line(&format!("⏳ Uptime: {}", alert.uptime)),
        border_mid(),
    ];

    lines.extend(alert.metrics.iter().map(|metric| boxed_line(metric)));

    if let Some(section) = &alert.processes {
        lines.push(border_mid());
        lines.push(boxed_line(&format!("📊 {}", section.title)));
        lines.extend(section.lines.iter().map(|line| boxed_line(&format!("  {line}"))));
    }

    lines.push(border_bottom());
    lines.join("\n")
}

/// Lifecycle message sent when the alert engine connects to the stream.
pub fn startup_message(thresholds: &Thresholds, host: &HostDetails, date: &str) -> String {
    [
        border_top(),
        boxed_line("    ✅ Socket Monitoring Started"),
        border_mid(),
        boxed_line(&format!("🗓️ Date: {date}")),
        boxed_line(&format!("🖥️ Hostname: {}", host.hostname)),
        boxed_line(&format!("🌐 IP Address: {}", host.ip)),
        border_mid(),
        boxed_line(&format!("💻 CPU Threshold: {}%", thresholds.cpu_percent)),
        boxed_line(&format!("💾 RAM Threshold: {}%", thresholds.memory_percent)),
        boxed_line(&format!("💾 Disk Threshold: {}%", thresholds.disk_percent)),
        border_mid(),
        boxed_line("🔌 Mode: Unix Socket (Real-time)"),
        border_bottom(),
    ]
    .join("\n")
}

/// Lifecycle message sent when the alert engine stops.
pub fn stop_message(date: &str) -> String {
    [
        border_top(),
        boxed_line("          ⛔ Monitoring Stopped"),
        border_mid(),
        boxed_line(&format!("🗓️ Date: {date}")),
        border_bottom(),
    ]
    .join("\n")
}
