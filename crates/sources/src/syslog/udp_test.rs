//! Tests for the syslog UDP receive path

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use logwell_config::{ListenerTuning, SyslogSourceConfig, Transport};
use logwell_pipeline::{DiagnosticKind, DiagnosticsSink, EventSink, MemoryDiagnostics, MemorySink};

use crate::syslog::SyslogListener;
use crate::syslog::udp::trim_trailing_newline;

fn test_config(id: &str, port: u16) -> SyslogSourceConfig {
    SyslogSourceConfig {
        id: id.into(),
        slug: format!("{}-slug", id),
        port,
        transport: Transport::Udp,
        ..Default::default()
    }
}

fn test_tuning() -> ListenerTuning {
    ListenerTuning {
        bind_address: "127.0.0.1".into(),
        ..Default::default()
    }
}

async fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    drop(socket);
    port
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

#[test]
fn test_trim_trailing_newline() {
    assert_eq!(trim_trailing_newline(b"hello\n"), b"hello");
    assert_eq!(trim_trailing_newline(b"hello\r\n"), b"hello");
    assert_eq!(trim_trailing_newline(b"hello"), b"hello");
    assert_eq!(trim_trailing_newline(b"\n"), b"");
    assert_eq!(trim_trailing_newline(b"\r\n"), b"");
    assert_eq!(trim_trailing_newline(b""), b"");
    assert_eq!(trim_trailing_newline(b"line1\nline2\n"), b"line1\nline2");
}

#[tokio::test]
async fn test_receives_and_parses_datagram() {
    let port = free_udp_port().await;
    let sink = MemorySink::shared();
    let diagnostics = Arc::new(MemoryDiagnostics::new());

    let handle = SyslogListener::start(
        &test_config("udp-src", port),
        &test_tuning(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&diagnostics) as Arc<dyn DiagnosticsSink>,
    )
    .unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(
            b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed",
            ("127.0.0.1", port),
        )
        .await
        .unwrap();

    assert!(wait_for(|| sink.len() == 1).await);

    let events = sink.events();
    assert_eq!(events[0].slug, "udp-src-slug");
    assert_eq!(events[0].event.message, "su: 'su root' failed");
    assert_eq!(events[0].event.metadata["hostname"], "mymachine");
    assert_eq!(events[0].event.metadata["format"], "rfc3164");

    let metrics = handle.metrics();
    assert_eq!(metrics.messages_received, 1);
    assert_eq!(metrics.events_forwarded, 1);

    handle.stop().await;
}

#[tokio::test]
async fn test_admission_rejects_silently() {
    let port = free_udp_port().await;
    let sink = MemorySink::shared();
    let diagnostics = Arc::new(MemoryDiagnostics::new());

    let config = SyslogSourceConfig {
        allowed_hosts: vec!["10.0.0.1".into()],
        ..test_config("udp-src", port)
    };

    let handle = SyslogListener::start(
        &config,
        &test_tuning(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&diagnostics) as Arc<dyn DiagnosticsSink>,
    )
    .unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"<34>Oct 11 22:14:15 host rejected message", ("127.0.0.1", port))
        .await
        .unwrap();

    assert!(wait_for(|| handle.metrics().messages_rejected == 1).await);

    // No event, no diagnostic - rejection is silent
    assert!(sink.is_empty());
    assert!(diagnostics.entries().is_empty());

    handle.stop().await;
}

#[tokio::test]
async fn test_parse_failure_reported_as_diagnostic() {
    let port = free_udp_port().await;
    let sink = MemorySink::shared();
    let diagnostics = Arc::new(MemoryDiagnostics::new());

    let handle = SyslogListener::start(
        &test_config("udp-src", port),
        &test_tuning(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&diagnostics) as Arc<dyn DiagnosticsSink>,
    )
    .unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"not a syslog message", ("127.0.0.1", port))
        .await
        .unwrap();

    assert!(wait_for(|| diagnostics.count_of(DiagnosticKind::ParseFailure) == 1).await);

    assert!(sink.is_empty());
    let entry = &diagnostics.entries()[0];
    assert_eq!(entry.source_id, "udp-src");
    assert_eq!(entry.raw_len, Some("not a syslog message".len()));
    assert_eq!(handle.metrics().parse_failures, 1);

    handle.stop().await;
}

#[tokio::test]
async fn test_oversized_datagram_dropped() {
    let port = free_udp_port().await;
    let sink = MemorySink::shared();
    let diagnostics = Arc::new(MemoryDiagnostics::new());

    let tuning = ListenerTuning {
        max_message_size: 64,
        ..test_tuning()
    };

    let handle = SyslogListener::start(
        &test_config("udp-src", port),
        &tuning,
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&diagnostics) as Arc<dyn DiagnosticsSink>,
    )
    .unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let oversized = format!("<13>Oct 11 22:14:15 host {}", "x".repeat(200));
    client
        .send_to(oversized.as_bytes(), ("127.0.0.1", port))
        .await
        .unwrap();

    assert!(wait_for(|| handle.metrics().messages_oversized == 1).await);
    assert!(sink.is_empty());

    handle.stop().await;
}

#[tokio::test]
async fn test_stop_releases_port() {
    let port = free_udp_port().await;
    let sink = MemorySink::shared();
    let diagnostics = Arc::new(MemoryDiagnostics::new());

    let handle = SyslogListener::start(
        &test_config("udp-src", port),
        &test_tuning(),
        Arc::clone(&sink) as Arc<dyn EventSink>,
        Arc::clone(&diagnostics) as Arc<dyn DiagnosticsSink>,
    )
    .unwrap();

    handle.stop().await;

    // The port must be immediately rebindable
    UdpSocket::bind(("127.0.0.1", port)).await.unwrap();
}
