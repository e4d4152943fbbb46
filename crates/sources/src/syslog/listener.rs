//! Per-source listener assembly
//!
//! Builds the sockets a source's transport asks for, spawns the receive
//! tasks, and hands back a [`ListenerHandle`] for lifecycle control.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use arc_swap::ArcSwap;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logwell_config::{ListenerTuning, SyslogSourceConfig, Transport};
use logwell_pipeline::{Diagnostic, DiagnosticsSink, EventSink};

use crate::admission::{AdmissionPolicy, ListenerRuntime};
use crate::common::{ListenerMetrics, ListenerMetricsSnapshot};
use crate::syslog::tcp::TcpAcceptor;
use crate::syslog::udp::UdpReceiver;

/// TCP accept backlog
const LISTEN_BACKLOG: i32 = 1024;

// =============================================================================
// Errors
// =============================================================================

/// Errors starting a listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind a socket - the port is unavailable
    #[error("failed to bind {transport} {address}: {source}")]
    Bind {
        /// Which socket failed (`udp` / `tcp`)
        transport: &'static str,
        /// The address that could not be bound
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Configured bind address did not parse
    #[error("invalid bind address '{address}'")]
    InvalidAddress { address: String },
}

impl ListenerError {
    fn bind(transport: &'static str, address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            transport,
            address: address.into(),
            source,
        }
    }
}

// =============================================================================
// Shared per-message path
// =============================================================================

/// Admission + parse + forward, shared by the UDP and TCP receive paths
#[derive(Clone)]
pub(crate) struct Forwarder {
    pub(crate) source_id: Arc<str>,
    pub(crate) runtime: Arc<ArcSwap<ListenerRuntime>>,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) diagnostics: Arc<dyn DiagnosticsSink>,
    pub(crate) metrics: Arc<ListenerMetrics>,
}

impl Forwarder {
    /// Handle one received unit (a datagram or a TCP line)
    ///
    /// Rejections are silent; parse failures become diagnostics. Neither
    /// escapes the listener.
    pub(crate) fn process(&self, data: &[u8], peer: IpAddr) {
        self.metrics.message_received(data.len() as u64);

        let runtime = self.runtime.load();
        if !runtime.admission.permits(peer) {
            self.metrics.message_rejected();
            return;
        }

        let text = String::from_utf8_lossy(data);
        match logwell_protocol::parse(&text) {
            Ok(event) => {
                self.metrics.event_forwarded();
                self.sink.ingest(&runtime.slug, event);
            }
            Err(e) => {
                self.metrics.parse_failure();
                tracing::debug!(
                    source_id = %self.source_id,
                    peer = %peer,
                    error = %e,
                    "dropping unparsable message"
                );
                self.diagnostics.report(Diagnostic::parse_failure(
                    &*self.source_id,
                    e.to_string(),
                    data.len(),
                ));
            }
        }
    }
}

/// Fires the `failed` token if a receive task exits without being stopped
///
/// Runs on drop, so a panicking task still signals the supervisor.
pub(crate) struct ExitGuard {
    cancel: CancellationToken,
    failed: CancellationToken,
}

impl ExitGuard {
    pub(crate) fn new(cancel: CancellationToken, failed: CancellationToken) -> Self {
        Self { cancel, failed }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            self.failed.cancel();
        }
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Factory for per-source listeners
pub struct SyslogListener;

impl SyslogListener {
    /// Bind the source's sockets and spawn its receive tasks
    ///
    /// Every socket the transport requires is bound before anything is
    /// spawned: a port conflict comes back as `ListenerError::Bind` and no
    /// task is left behind. Must be called from within a tokio runtime.
    pub fn start(
        config: &SyslogSourceConfig,
        tuning: &ListenerTuning,
        sink: Arc<dyn EventSink>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Result<ListenerHandle, ListenerError> {
        let address = format!("{}:{}", tuning.bind_address, config.port);
        let addr: SocketAddr = address.parse().map_err(|_| ListenerError::InvalidAddress {
            address: address.clone(),
        })?;

        let runtime = Arc::new(ArcSwap::from_pointee(ListenerRuntime::new(
            &config.slug,
            AdmissionPolicy::new(config.allowed_hosts.iter().cloned(), config.auto_register_hosts),
        )));
        let metrics = Arc::new(ListenerMetrics::new());
        let cancel = CancellationToken::new();
        let failed = CancellationToken::new();

        let forwarder = Forwarder {
            source_id: Arc::from(config.id.as_str()),
            runtime: Arc::clone(&runtime),
            sink,
            diagnostics,
            metrics: Arc::clone(&metrics),
        };

        let udp_socket = if config.transport.wants_udp() {
            Some(
                bind_udp(addr, tuning.recv_buffer_size)
                    .map_err(|e| ListenerError::bind("udp", &address, e))?,
            )
        } else {
            None
        };

        let tcp_listener = if config.transport.wants_tcp() {
            Some(bind_tcp(addr).map_err(|e| ListenerError::bind("tcp", &address, e))?)
        } else {
            None
        };

        tracing::info!(
            source_id = %config.id,
            address = %address,
            transport = %config.transport,
            "listener starting"
        );

        let mut tasks = Vec::with_capacity(2);

        if let Some(socket) = udp_socket {
            let receiver = UdpReceiver {
                socket,
                forwarder: forwarder.clone(),
                max_message_size: tuning.max_message_size,
                cancel: cancel.clone(),
                failed: failed.clone(),
            };
            tasks.push(tokio::spawn(receiver.run()));
        }

        if let Some(listener) = tcp_listener {
            let acceptor = TcpAcceptor {
                listener,
                forwarder,
                tuning: tuning.clone(),
                cancel: cancel.clone(),
                failed: failed.clone(),
            };
            tasks.push(tokio::spawn(acceptor.run()));
        }

        Ok(ListenerHandle {
            id: config.id.clone(),
            port: config.port,
            transport: config.transport,
            runtime,
            metrics,
            cancel,
            failed,
            tasks,
        })
    }
}

/// Handle to a running listener
///
/// The lifecycle layer never touches a listener's internals - only this
/// handle: runtime swaps, metrics, the failure signal, and `stop()`.
pub struct ListenerHandle {
    id: String,
    port: u16,
    transport: Transport,
    runtime: Arc<ArcSwap<ListenerRuntime>>,
    metrics: Arc<ListenerMetrics>,
    cancel: CancellationToken,
    failed: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Source id this listener belongs to
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Port the sockets were bound on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Transport the listener was started with
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Slug currently attached to forwarded events
    pub fn slug(&self) -> Arc<str> {
        Arc::clone(&self.runtime.load().slug)
    }

    /// Swap slug and admission policy without restarting the sockets
    pub fn update_runtime(&self, slug: &str, admission: AdmissionPolicy) {
        self.runtime
            .store(Arc::new(ListenerRuntime::new(slug, admission)));
        tracing::info!(source_id = %self.id, "listener runtime updated");
    }

    /// Snapshot of the listener's counters
    pub fn metrics(&self) -> ListenerMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Token that fires if a receive task dies without being stopped
    pub fn failed(&self) -> CancellationToken {
        self.failed.clone()
    }

    /// Stop the listener and release its sockets
    ///
    /// Cancels every receive task (interrupting blocked reads) and waits
    /// for them to finish; the port is free for reuse when this returns.
    pub async fn stop(self) {
        self.cancel.cancel();
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!(source_id = %self.id, port = self.port, "listener stopped");
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("transport", &self.transport)
            .finish()
    }
}

// =============================================================================
// Socket construction
// =============================================================================

/// Build a UDP socket with SO_REUSEADDR and a sized receive buffer
fn bind_udp(addr: SocketAddr, recv_buffer_size: usize) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(domain_of(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
        tracing::warn!(
            error = %e,
            requested_size = recv_buffer_size,
            "failed to set UDP SO_RCVBUF"
        );
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}

/// Build a TCP listener with SO_REUSEADDR so a stopped listener's port can
/// be rebound immediately
fn bind_tcp(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = Socket::new(domain_of(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}

fn domain_of(addr: SocketAddr) -> Domain {
    if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 }
}

#[cfg(test)]
#[path = "listener_test.rs"]
mod listener_test;
