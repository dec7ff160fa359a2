//! Alert engine consuming a live stream

use std::time::Duration;

use pretty_assertions::assert_eq;
use sysmon_stream::{
    alerts::{AlertEngine, StopReason},
    config::{Config, ConfigHandle},
    sampler::SampleSlot,
};
use tokio::sync::oneshot;

use crate::helpers::*;

#[tokio::test]
async fn test_sustained_breach_alerts_once_then_stops_on_interrupt() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    slot.publish(create_test_sample(97.0, 10.0, 10.0));
    let mut server = start_server(&path, slot);

    let notifier = RecordingNotifier::accepting();
    let mut engine = AlertEngine::new(ConfigHandle::fixed(Config::default()), notifier.clone())
        .with_host(test_host);
    let stream = connect(&path).await;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let engine_task = tokio::spawn(async move {
        engine
            .run(stream, async {
                stop_rx.await.ok();
            })
            .await
    });

    assert!(wait_until(|| !notifier.alert_titles().is_empty()).await);

    // many more breaching records arrive inside the cooldown
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(notifier.alert_titles(), vec!["CPU ALERT".to_string()]);

    stop_tx.send(()).unwrap();
    let reason = engine_task.await.unwrap().unwrap();
    assert_eq!(reason, StopReason::Interrupted);

    let messages = notifier.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("<pre>"));
    assert!(messages[0].contains("CPU Threshold: 90%"));
    assert!(messages[1].contains("Monitoring Stopped"));

    let alert = notifier.alerts.lock().unwrap()[0].clone();
    assert_eq!(alert.hostname, "test-host");
    assert_eq!(alert.metrics[0], "💻 CPU Usage: 97.0% of 100%");

    server.shutdown().await;
}

#[tokio::test]
async fn test_quiet_stream_sends_no_alerts() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    slot.publish(create_test_sample(20.0, 30.0, 40.0));
    let mut server = start_server(&path, slot);

    let notifier = RecordingNotifier::accepting();
    let mut engine = AlertEngine::new(ConfigHandle::fixed(Config::default()), notifier.clone())
        .with_host(test_host);
    let stream = connect(&path).await;

    let reason = engine
        .run(stream, tokio::time::sleep(Duration::from_millis(200)))
        .await
        .unwrap();

    assert_eq!(reason, StopReason::Interrupted);
    assert!(notifier.alert_titles().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_engine_stops_when_server_goes_away() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    slot.publish(create_test_sample(10.0, 90.0, 95.0));
    let mut server = start_server(&path, slot);

    let notifier = RecordingNotifier::accepting();
    let mut engine = AlertEngine::new(ConfigHandle::fixed(Config::default()), notifier.clone())
        .with_host(test_host);
    let stream = connect(&path).await;

    let engine_task = tokio::spawn(async move {
        engine
            .run(stream, std::future::pending::<()>())
            .await
    });

    assert!(wait_until(|| notifier.alert_titles().len() == 2).await);
    server.shutdown().await;

    let reason = tokio::time::timeout(READ_TIMEOUT, engine_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, StopReason::Disconnected);

    let mut titles = notifier.alert_titles();
    titles.sort();
    assert_eq!(titles, vec!["Disk ALERT".to_string(), "Memory ALERT".to_string()]);
    assert!(notifier.messages.lock().unwrap().last().unwrap().contains("Monitoring Stopped"));
}
