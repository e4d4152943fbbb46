//! Tests for fleet lifecycle operations

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, UdpSocket};

use logwell_config::{ListenerTuning, SyslogSourceConfig, Transport};
use logwell_pipeline::{DiagnosticsSink, EventSink, MemoryDiagnostics, MemorySink};

use crate::error::FleetError;
use crate::fleet::ListenerFleet;
use crate::store::StaticConfigStore;

fn source(id: &str, port: u16, transport: Transport) -> SyslogSourceConfig {
    SyslogSourceConfig {
        id: id.into(),
        slug: format!("{}-slug", id),
        port,
        transport,
        ..Default::default()
    }
}

fn test_tuning() -> ListenerTuning {
    ListenerTuning {
        bind_address: "127.0.0.1".into(),
        ..Default::default()
    }
}

struct Harness {
    fleet: Arc<ListenerFleet>,
    sink: Arc<MemorySink>,
    diagnostics: Arc<MemoryDiagnostics>,
}

fn harness() -> Harness {
    let sink = MemorySink::shared();
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let fleet = ListenerFleet::new(
        test_tuning(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&diagnostics) as Arc<dyn DiagnosticsSink>,
    );
    Harness {
        fleet,
        sink,
        diagnostics,
    }
}

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn send_udp(port: u16, message: &str) {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(message.as_bytes(), ("127.0.0.1", port))
        .await
        .unwrap();
}

async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn test_start_all_isolates_bind_failures() {
    let h = harness();
    let port = free_port().await;

    // Two sources racing for the same port: one wins, the other is
    // reported, the fleet keeps going
    let store = StaticConfigStore::new(vec![
        source("winner", port, Transport::Tcp),
        source("loser", port, Transport::Tcp),
        source("other", free_port().await, Transport::Udp),
    ]);

    let started = h.fleet.start_all(&store).await.unwrap();
    assert_eq!(started, 2);
    assert!(h.fleet.is_running("winner").await);
    assert!(!h.fleet.is_running("loser").await);
    assert!(h.fleet.is_running("other").await);
    assert_eq!(
        h.diagnostics
            .count_of(logwell_pipeline::DiagnosticKind::BindFailure),
        1
    );

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn test_source_created_and_duplicate() {
    let h = harness();
    let port = free_port().await;

    h.fleet
        .source_created(source("a", port, Transport::Udp))
        .await
        .unwrap();
    assert!(h.fleet.is_running("a").await);

    let err = h
        .fleet
        .source_created(source("a", port, Transport::Udp))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::AlreadyRunning { .. }));

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn test_created_bind_conflict_propagates() {
    let h = harness();
    let port = free_port().await;

    // Occupy the port so the bind must fail
    let _occupant = TcpListener::bind(("127.0.0.1", port)).await.unwrap();

    let err = h
        .fleet
        .source_created(source("a", port, Transport::Tcp))
        .await
        .unwrap_err();
    assert!(err.is_bind_failure());
    assert!(!h.fleet.is_running("a").await);
    assert_eq!(h.fleet.running_count().await, 0);
}

#[tokio::test]
async fn test_created_revoked_source_gets_no_listener() {
    let h = harness();

    let mut config = source("a", free_port().await, Transport::Udp);
    config.revoked_at = Some(chrono::Utc::now());

    h.fleet.source_created(config).await.unwrap();
    assert!(!h.fleet.is_running("a").await);
}

#[tokio::test]
async fn test_update_with_port_change_rebinds() {
    let h = harness();
    let old_port = free_port().await;
    let new_port = free_port().await;

    h.fleet
        .source_created(source("a", old_port, Transport::Udp))
        .await
        .unwrap();

    h.fleet
        .source_updated(source("a", new_port, Transport::Udp))
        .await
        .unwrap();

    // Old port released, new port receiving
    UdpSocket::bind(("127.0.0.1", old_port)).await.unwrap();
    send_udp(new_port, "<13>Oct 11 22:14:15 host on new port").await;
    assert!(wait_for(|| h.sink.len() == 1).await);

    let status = h.fleet.status().await;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].port, new_port);

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn test_unchanged_update_leaves_listener_untouched() {
    let h = harness();
    let port = free_port().await;

    h.fleet
        .source_created(source("a", port, Transport::Udp))
        .await
        .unwrap();

    send_udp(port, "<13>Oct 11 22:14:15 host before").await;
    assert!(wait_for(|| h.sink.len() == 1).await);

    // Same port, transport, slug, hosts: nothing restarts, counters survive
    h.fleet
        .source_updated(source("a", port, Transport::Udp))
        .await
        .unwrap();

    send_udp(port, "<13>Oct 11 22:14:15 host after").await;
    assert!(wait_for(|| h.sink.len() == 2).await);

    let status = h.fleet.status().await;
    assert_eq!(status[0].metrics.events_forwarded, 2);

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn test_host_policy_update_applies_without_restart() {
    let h = harness();
    let port = free_port().await;

    h.fleet
        .source_created(source("a", port, Transport::Udp))
        .await
        .unwrap();

    send_udp(port, "<13>Oct 11 22:14:15 host open").await;
    assert!(wait_for(|| h.sink.len() == 1).await);

    let mut config = source("a", port, Transport::Udp);
    config.allowed_hosts = vec!["10.0.0.1".into()];
    h.fleet.source_updated(config).await.unwrap();

    send_udp(port, "<13>Oct 11 22:14:15 host blocked").await;
    assert!(wait_for_status(&h, |s| s.metrics.messages_rejected == 1).await);

    // The first event's counter survived: no restart happened
    let status = h.fleet.status().await;
    assert_eq!(status[0].metrics.events_forwarded, 1);
    assert_eq!(h.sink.len(), 1);

    h.fleet.shutdown().await;
}

async fn wait_for_status(
    h: &Harness,
    condition: impl Fn(&crate::fleet::SourceStatus) -> bool,
) -> bool {
    for _ in 0..200 {
        let status = h.fleet.status().await;
        if status.first().is_some_and(&condition) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_revoked_source_port_immediately_rebindable() {
    let h = harness();
    let port = free_port().await;

    h.fleet
        .source_created(source("a", port, Transport::Both))
        .await
        .unwrap();

    h.fleet.source_revoked("a").await;
    assert!(!h.fleet.is_running("a").await);

    // Both sockets must be gone
    TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    UdpSocket::bind(("127.0.0.1", port)).await.unwrap();

    // A new listener can take the port right away
    h.fleet
        .source_created(source("b", free_port().await, Transport::Udp))
        .await
        .unwrap();

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn test_revoke_unknown_source_is_noop() {
    let h = harness();
    h.fleet.source_revoked("ghost").await;
    h.fleet.source_deleted("ghost").await;
    assert_eq!(h.fleet.running_count().await, 0);
}

#[tokio::test]
async fn test_update_to_revoked_stops_listener() {
    let h = harness();
    let port = free_port().await;

    h.fleet
        .source_created(source("a", port, Transport::Udp))
        .await
        .unwrap();

    let mut config = source("a", port, Transport::Udp);
    config.revoked_at = Some(chrono::Utc::now());
    h.fleet.source_updated(config).await.unwrap();

    assert!(!h.fleet.is_running("a").await);
    UdpSocket::bind(("127.0.0.1", port)).await.unwrap();
}

#[tokio::test]
async fn test_reconcile_adds_changes_and_removes() {
    let h = harness();
    let port_a = free_port().await;
    let port_b = free_port().await;
    let port_c = free_port().await;
    let port_a2 = free_port().await;

    let store = StaticConfigStore::new(vec![
        source("a", port_a, Transport::Udp),
        source("b", port_b, Transport::Udp),
    ]);
    h.fleet.start_all(&store).await.unwrap();
    assert_eq!(h.fleet.running_count().await, 2);

    // a moves ports, b disappears, c is new
    store.set(vec![
        source("a", port_a2, Transport::Udp),
        source("c", port_c, Transport::Udp),
    ]);
    h.fleet.reconcile(&store).await.unwrap();

    assert_eq!(h.fleet.running_count().await, 2);
    assert!(h.fleet.is_running("a").await);
    assert!(!h.fleet.is_running("b").await);
    assert!(h.fleet.is_running("c").await);

    let status = h.fleet.status().await;
    assert_eq!(status[0].id, "a");
    assert_eq!(status[0].port, port_a2);

    // b's port is free again
    UdpSocket::bind(("127.0.0.1", port_b)).await.unwrap();

    h.fleet.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_everything() {
    let h = harness();
    let port_a = free_port().await;
    let port_b = free_port().await;

    h.fleet
        .source_created(source("a", port_a, Transport::Both))
        .await
        .unwrap();
    h.fleet
        .source_created(source("b", port_b, Transport::Udp))
        .await
        .unwrap();

    h.fleet.shutdown().await;

    assert_eq!(h.fleet.running_count().await, 0);
    TcpListener::bind(("127.0.0.1", port_a)).await.unwrap();
    UdpSocket::bind(("127.0.0.1", port_b)).await.unwrap();
}
