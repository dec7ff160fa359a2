//! AlertEngine - Threshold evaluation with per-signal cooldown
//!
//! ## Cooldown State Machine
//!
//! Each signal class keeps a single "last delivered" timestamp. The effective state is derived on
//! every sample:
//!
//! ```text
//! value <= threshold                               → Quiet       (no alert, no state change)
//! value >  threshold, now - last_sent <= cooldown  → Suppressed  (no alert, no state change)
//! value >  threshold, now - last_sent >  cooldown  → Eligible    (notify)
//! value >  threshold, never sent                   → Eligible    (notify)
//! ```
//!
//! The timestamp only moves after the notifier confirms delivery, so a failed delivery is retried
//! on the next breaching sample.

use std::{fmt, future::Future};

use anyhow::anyhow;
use chrono::{DateTime, Local};
use tokio::io::AsyncRead;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    Sample,
    client::StreamClient,
    config::{ConfigHandle, Thresholds},
    host::HostDetails,
    notifier::{AlertPayload, Notifier, ProcessSection},
    telegram::{pre, startup_message, stop_message},
    util::{format_memory_mb, truncate_chars, unix_now},
};

const ALERT_EMOJI: &str = "🚨";

const PROCESS_NAME_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalClass {
    Cpu,
    Memory,
    Disk,
}

impl SignalClass {
    pub const ALL: [SignalClass; 3] = [SignalClass::Cpu, SignalClass::Memory, SignalClass::Disk];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalClass::Cpu => "cpu",
            SignalClass::Memory => "memory",
            SignalClass::Disk => "disk",
        }
    }

    pub fn value(&self, sample: &Sample) -> f64 {
        match self {
            SignalClass::Cpu => sample.cpu_percent,
            SignalClass::Memory => sample.memory_percent,
            SignalClass::Disk => sample.disk_percent,
        }
    }

    pub fn threshold(&self, thresholds: &Thresholds) -> f64 {
        match self {
            SignalClass::Cpu => thresholds.cpu_percent,
            SignalClass::Memory => thresholds.memory_percent,
            SignalClass::Disk => thresholds.disk_percent,
        }
    }
}

impl fmt::Display for SignalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Quiet,
    Suppressed { remaining: f64 },
    Eligible,
}

impl Evaluation {
    pub fn evaluate(
        value: f64,
        threshold: f64,
        cooldown: f64,
        last_sent_at: Option<f64>,
        now: f64,
    ) -> Evaluation {
        if value <= threshold {
            return Evaluation::Quiet;
        }

        let Some(last_sent_at) = last_sent_at else {
            return Evaluation::Eligible;
        };

        let elapsed = now - last_sent_at;
        if elapsed > cooldown {
            Evaluation::Eligible
        } else {
            Evaluation::Suppressed {
                remaining: cooldown - elapsed,
            }
        }
    }
}

/// Timestamp (unix seconds) of the last delivered alert per signal class.
///
/// `None` is the initial state and makes the first breach always eligible.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AlertState {
    cpu: Option<f64>,
    memory: Option<f64>,
    disk: Option<f64>,
}

impl AlertState {
    pub fn last_sent_at(&self, class: SignalClass) -> Option<f64> {
        match class {
            SignalClass::Cpu => self.cpu,
            SignalClass::Memory => self.memory,
            SignalClass::Disk => self.disk,
        }
    }

    fn mark_sent(&mut self, class: SignalClass, at: f64) {
        let slot = match class {
            SignalClass::Cpu => &mut self.cpu,
            SignalClass::Memory => &mut self.memory,
            SignalClass::Disk => &mut self.disk,
        };
        *slot = Some(at);
    }
}

/// One notification attempt made while processing a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertAttempt {
    pub class: SignalClass,
    pub value: f64,
    pub delivered: bool,
}

/// Why [`AlertEngine::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The server closed the stream
    Disconnected,

    /// The shutdown future completed
    Interrupted,
}

type HostSource = Box<dyn Fn() -> HostDetails + Send + Sync>;

pub struct AlertEngine<N> {
    config: ConfigHandle,
    notifier: N,
    state: AlertState,
    host: HostSource,
}

impl<N: Notifier> AlertEngine<N> {
    pub fn new(config: ConfigHandle, notifier: N) -> Self {
        Self {
            config,
            notifier,
            state: AlertState::default(),
            host: Box::new(HostDetails::collect),
        }
    }

    /// Replace the host lookup attached to alerts.
    pub fn with_host(mut self, host: impl Fn() -> HostDetails + Send + Sync + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Consume samples until the stream ends or `shutdown` completes.
    ///
    /// Lifecycle notifications are sent on entry and on exit.
    #[instrument(skip_all)]
    pub async fn run<R, F>(
        &mut self,
        mut stream: StreamClient<R>,
        shutdown: F,
    ) -> anyhow::Result<StopReason>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = ()>,
    {
        info!("🚀 alert engine started");
        self.send_startup_message().await;

        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                next = stream.next_sample() => match next {
                    Ok(Some(sample)) => {
                        self.process_sample(&sample, unix_now()).await;
                    }
                    Ok(None) => {
                        error!("❌ stream disconnected");
                        break Ok(StopReason::Disconnected);
                    }
                    Err(e) => {
                        error!("❌ failed to read stream: {e}");
                        break Err(anyhow!(e).context("stream read failed"));
                    }
                },

                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break Ok(StopReason::Interrupted);
                }
            }
        };

        self.send_stop_message().await;
        info!("✅ alert engine stopped");

        result
    }

    /// Evaluate every signal class against one sample.
    ///
    /// The configuration is reloaded first, so threshold and cooldown changes apply immediately.
    pub async fn process_sample(&mut self, sample: &Sample, now: f64) -> Vec<AlertAttempt> {
        let config = self.config.reload().clone();
        let mut attempts = vec![];

        for class in SignalClass::ALL {
            let value = class.value(sample);
            let threshold = class.threshold(&config.thresholds);

            let evaluation = Evaluation::evaluate(
                value,
                threshold,
                config.alert_cooldown,
                self.state.last_sent_at(class),
                now,
            );

            trace!("{class}: {value}% vs {threshold}% → {evaluation:?}");

            match evaluation {
                Evaluation::Quiet => {}

                Evaluation::Suppressed { remaining } => {
                    debug!("⏳ {class} alert suppressed: {}s remaining", remaining as i64);
                }

                Evaluation::Eligible => {
                    let host = (self.host)();
                    let payload = build_alert(class, sample, threshold, &host, &format_date(now));
                    let delivered = self.notifier.send_formatted_alert(&payload).await;

                    if delivered {
                        self.state.mark_sent(class, now);
                        warn!("🔴 {class} alert sent: {value:.1}%");
                    } else {
                        error!("{class} alert delivery failed, will retry on next breach");
                    }

                    attempts.push(AlertAttempt {
                        class,
                        value,
                        delivered,
                    });
                }
            }
        }

        attempts
    }

    async fn send_startup_message(&self) {
        let host = (self.host)();
        let text = startup_message(
            &self.config.current().thresholds,
            &host,
            &format_date(unix_now()),
        );
        if !self.notifier.send_message(&pre(&text)).await {
            warn!("startup notification was not delivered");
        }
    }

    async fn send_stop_message(&self) {
        let text = stop_message(&format_date(unix_now()));
        if !self.notifier.send_message(&pre(&text)).await {
            warn!("stop notification was not delivered");
        }
    }
}

/// Local time of a unix timestamp as `%Y-%m-%d %H:%M:%S`.
pub fn format_date(unix_seconds: f64) -> String {
    let datetime = DateTime::from_timestamp(unix_seconds as i64, 0)
        .map(|utc| utc.with_timezone(&Local))
        .unwrap_or_else(Local::now);
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Build the payload for one breached signal, using the rankings already in the sample.
pub fn build_alert(
    class: SignalClass,
    sample: &Sample,
    threshold: f64,
    host: &HostDetails,
    date: &str,
) -> AlertPayload {
    let (title, metrics, processes) = match class {
        SignalClass::Cpu => {
            let lines: Vec<String> = sample
                .top_cpu_processes
                .iter()
                .enumerate()
                .map(|(i, p)| process_line(i + 1, &p.name, &format!("{:.1}%", p.cpu_percent)))
                .collect();
            (
                "CPU ALERT",
                vec![
                    format!("💻 CPU Usage: {:.1}% of 100%", sample.cpu_percent),
                    format!("⚠️ Threshold: {threshold}%"),
                ],
                section(
                    format!("Top {} CPU-Consuming Processes:", lines.len()),
                    lines,
                ),
            )
        }
        SignalClass::Memory => {
            let lines: Vec<String> = sample
                .top_memory_processes
                .iter()
                .enumerate()
                .map(|(i, p)| process_line(i + 1, &p.name, &format_memory_mb(p.memory_mb)))
                .collect();
            (
                "Memory ALERT",
                vec![
                    format!(
                        "💾 Memory: {:.1}% of {}G",
                        sample.memory_percent, sample.memory_total_gb
                    ),
                    format!("⚠️ Threshold: {threshold}%"),
                    format!("📊 Used: {}G", sample.memory_used_gb),
                ],
                section(
                    format!("Top {} Memory-Consuming Processes:", lines.len()),
                    lines,
                ),
            )
        }
        SignalClass::Disk => (
            "Disk ALERT",
            vec![
                format!(
                    "💾 Disk: {:.1}% of {}G",
                    sample.disk_percent, sample.disk_total_gb
                ),
                format!("⚠️ Threshold: {threshold}%"),
                format!("📊 Used: {}G", sample.disk_used_gb),
            ],
            None,
        ),
    };

    AlertPayload {
        emoji: ALERT_EMOJI.to_string(),
        title: title.to_string(),
        date: date.to_string(),
        hostname: host.hostname.clone(),
        ip: host.ip.clone(),
        uptime: host.uptime.clone(),
        metrics,
        processes,
    }
}

fn section(title: String, lines: Vec<String>) -> Option<ProcessSection> {
    if lines.is_empty() {
        return None;
    }
    Some(ProcessSection { title, lines })
}

fn process_line(rank: usize, name: &str, value: &str) -> String {
    let name = truncate_chars(name, PROCESS_NAME_WIDTH);
    format!("{rank:<2}. {name:<width$} {value:>7}", width = PROCESS_NAME_WIDTH)
}
