//! Shared fixtures for the integration suites

#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use sysmon_stream::{
    CpuProcess, MemoryProcess, Sample,
    client::StreamClient,
    host::HostDetails,
    notifier::{AlertPayload, Notifier},
    sampler::SampleSlot,
    server::{BroadcastServer, ServerOptions},
};
use tempfile::TempDir;
use tokio::net::UnixStream;

pub const FAST_INTERVAL: Duration = Duration::from_millis(20);

pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A socket path inside a fresh temp dir. Keep the dir alive for the test's duration.
pub fn socket_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitor.sock");
    (dir, path)
}

pub fn fast_options(path: &PathBuf) -> ServerOptions {
    ServerOptions {
        send_interval: FAST_INTERVAL,
        ..ServerOptions::new(path)
    }
}

pub fn start_server(path: &PathBuf, slot: SampleSlot) -> BroadcastServer {
    BroadcastServer::bind(fast_options(path), slot).unwrap()
}

pub fn create_test_sample(cpu: f64, memory: f64, disk: f64) -> Sample {
    Sample {
        cpu_percent: cpu,
        memory_percent: memory,
        memory_total_gb: 16.0,
        memory_used_gb: 16.0 * memory / 100.0,
        disk_percent: disk,
        disk_total_gb: 100.0,
        disk_used_gb: disk,
        top_cpu_processes: vec![CpuProcess {
            pid: 100,
            name: "stress".to_string(),
            cpu_percent: cpu,
        }],
        top_memory_processes: vec![MemoryProcess {
            pid: 200,
            name: "postgres".to_string(),
            memory_mb: 512.0,
        }],
        timestamp: 1_700_000_000.0,
    }
}

pub fn test_host() -> HostDetails {
    HostDetails {
        hostname: "test-host".to_string(),
        ip: "127.0.0.1".to_string(),
        uptime: "1h 0m".to_string(),
    }
}

pub async fn connect(path: &PathBuf) -> StreamClient<UnixStream> {
    StreamClient::connect(path).await.unwrap()
}

/// Next sample, failing the test if none arrives in time.
pub async fn next_sample(client: &mut StreamClient<UnixStream>) -> Option<Sample> {
    tokio::time::timeout(READ_TIMEOUT, client.next_sample())
        .await
        .expect("timed out waiting for a sample")
        .unwrap()
}

/// Poll until `condition` holds or the read timeout passes.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + READ_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Notifier that records everything and answers with a fixed result.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub accept: bool,
    pub messages: Mutex<Vec<String>>,
    pub alerts: Mutex<Vec<AlertPayload>>,
}

impl RecordingNotifier {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: true,
            ..Self::default()
        })
    }

    pub fn alert_titles(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|alert| alert.title.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, text: &str) -> bool {
        self.messages.lock().unwrap().push(text.to_string());
        self.accept
    }

    async fn send_formatted_alert(&self, alert: &AlertPayload) -> bool {
        self.alerts.lock().unwrap().push(alert.clone());
        self.accept
    }
}
