//! Fan-out of the latest sample to concurrent clients

use pretty_assertions::assert_eq;
use sysmon_stream::{Sample, sampler::SampleSlot};

use crate::helpers::*;

#[tokio::test]
async fn test_client_before_first_sample_gets_initial_record() {
    let (_dir, path) = socket_path();
    let mut server = start_server(&path, SampleSlot::default());

    let mut client = connect(&path).await;
    let sample = next_sample(&mut client).await.unwrap();

    assert_eq!(sample, Sample::default());
    assert_eq!(sample.timestamp, 0.0);

    server.shutdown().await;
}

#[tokio::test]
async fn test_every_client_receives_the_published_sample() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    let expected = create_test_sample(42.0, 55.5, 61.2);
    slot.publish(expected.clone());
    let mut server = start_server(&path, slot);

    let mut first = connect(&path).await;
    let mut second = connect(&path).await;

    assert_eq!(next_sample(&mut first).await, Some(expected.clone()));
    assert_eq!(next_sample(&mut second).await, Some(expected));
    assert!(wait_until(|| server.client_count() == 2).await);

    server.shutdown().await;
}

#[tokio::test]
async fn test_new_sample_replaces_previous_for_all_clients() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    slot.publish(create_test_sample(10.0, 10.0, 10.0));
    let mut server = start_server(&path, slot.clone());

    let mut client = connect(&path).await;
    assert_eq!(next_sample(&mut client).await.unwrap().cpu_percent, 10.0);

    slot.publish(create_test_sample(80.0, 10.0, 10.0));

    let mut seen_update = false;
    for _ in 0..50 {
        let sample = next_sample(&mut client).await.unwrap();
        // records are whole snapshots, never a mix of two samples
        assert!(sample.cpu_percent == 10.0 || sample.cpu_percent == 80.0);
        assert_eq!(sample.top_cpu_processes[0].cpu_percent, sample.cpu_percent);
        if sample.cpu_percent == 80.0 {
            seen_update = true;
            break;
        }
    }
    assert!(seen_update);

    server.shutdown().await;
}

#[tokio::test]
async fn test_dropped_client_does_not_affect_others() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    slot.publish(create_test_sample(30.0, 40.0, 50.0));
    let mut server = start_server(&path, slot);

    let mut survivor = connect(&path).await;
    let mut leaver = connect(&path).await;
    next_sample(&mut survivor).await.unwrap();
    next_sample(&mut leaver).await.unwrap();
    assert!(wait_until(|| server.client_count() == 2).await);

    drop(leaver);

    assert!(wait_until(|| server.client_count() == 1).await);
    for _ in 0..3 {
        assert!(next_sample(&mut survivor).await.is_some());
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_many_concurrent_clients() {
    let (_dir, path) = socket_path();
    let slot = SampleSlot::default();
    slot.publish(create_test_sample(12.0, 34.0, 56.0));
    let mut server = start_server(&path, slot);

    let mut clients = futures::future::join_all((0..16).map(|_| connect(&path))).await;
    let samples =
        futures::future::join_all(clients.iter_mut().map(|client| next_sample(client))).await;

    assert!(samples.iter().all(|s| s.as_ref().map(|s| s.disk_percent) == Some(56.0)));
    assert!(wait_until(|| server.client_count() == 16).await);

    server.shutdown().await;
    assert_eq!(server.client_count(), 0);
}
