//! Server shutdown and endpoint lifecycle

use std::time::{Duration, Instant};

use sysmon_stream::{
    sampler::SampleSlot,
    server::{BroadcastServer, ServerOptions},
};
use tokio::net::UnixStream;

use crate::helpers::*;

#[tokio::test]
async fn test_shutdown_closes_clients_and_removes_endpoint() {
    let (_dir, path) = socket_path();
    let mut server = start_server(&path, SampleSlot::default());

    let mut first = connect(&path).await;
    let mut second = connect(&path).await;
    next_sample(&mut first).await.unwrap();
    next_sample(&mut second).await.unwrap();

    server.shutdown().await;

    assert!(!server.is_running());
    assert_eq!(server.client_count(), 0);
    assert!(!path.exists());

    // both streams end once their buffered records are drained
    while next_sample(&mut first).await.is_some() {}
    while next_sample(&mut second).await.is_some() {}
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (_dir, path) = socket_path();
    let mut server = start_server(&path, SampleSlot::default());

    server.shutdown().await;
    server.shutdown().await;

    assert!(!path.exists());
}

#[tokio::test]
async fn test_rebind_same_path_after_shutdown() {
    let (_dir, path) = socket_path();

    let mut server = start_server(&path, SampleSlot::default());
    server.shutdown().await;

    let mut server = start_server(&path, SampleSlot::default());
    let mut client = connect(&path).await;
    assert!(next_sample(&mut client).await.is_some());

    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_to_missing_socket_fails() {
    let (_dir, path) = socket_path();

    let result = sysmon_stream::client::StreamClient::connect(&path).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_sampler_thread_stops_with_server() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    let mut server = start_server(&path, slot.clone());

    let sampler = sysmon_stream::sampler::MetricsSampler::new(slot, 3, "/");
    let running = server.running();
    let clients = server.client_counter();
    let handle = tokio::task::spawn_blocking(move || sampler.run(running, clients));

    server.shutdown().await;

    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("sampler did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_is_not_held_up_by_a_stalled_client() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    slot.publish(create_test_sample(50.0, 50.0, 50.0));
    let mut server = BroadcastServer::bind(
        ServerOptions {
            send_interval: Duration::from_millis(1),
            ..ServerOptions::new(&path)
        },
        slot,
    )
    .unwrap();

    // connected but never reads, so its socket buffer fills and writes block
    let _stalled = UnixStream::connect(&path).await.unwrap();
    assert!(wait_until(|| server.client_count() == 1).await);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let started = Instant::now();
    server.shutdown().await;

    assert!(
        started.elapsed() < Duration::from_millis(500),
        "shutdown took {:?}",
        started.elapsed()
    );
    assert!(!path.exists());
}
