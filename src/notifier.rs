use async_trait::async_trait;
use serde::Serialize;

/// Structured alert handed to a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub emoji: String,
    pub title: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub date: String,
    pub hostname: String,
    pub ip: String,
    pub uptime: String,
    pub metrics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<ProcessSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSection {
    pub title: String,
    pub lines: Vec<String>,
}

/// Outbound delivery of alerts.
///
/// `true` means the remote endpoint accepted the message. Callers must not treat a `false`
/// delivery as sent.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, text: &str) -> bool;

    async fn send_formatted_alert(&self, alert: &AlertPayload) -> bool;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    async fn send_message(&self, text: &str) -> bool {
        (**self).send_message(text).await
    }

    async fn send_formatted_alert(&self, alert: &AlertPayload) -> bool {
        (**self).send_formatted_alert(alert).await
    }
}
