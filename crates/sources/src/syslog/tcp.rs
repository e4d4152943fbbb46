//! Syslog TCP accept loop and connection handling
//!
//! TCP syslog uses non-transparent framing: newline-delimited messages,
//! LF or CRLF. Every accepted connection runs as its own task so one
//! slow or silent peer cannot starve others on the same port; peer close
//! and resets end only that connection.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use logwell_config::ListenerTuning;

use crate::syslog::listener::{ExitGuard, Forwarder};

/// The TCP half of a listener
pub(crate) struct TcpAcceptor {
    pub(crate) listener: TcpListener,
    pub(crate) forwarder: Forwarder,
    pub(crate) tuning: ListenerTuning,
    pub(crate) cancel: CancellationToken,
    pub(crate) failed: CancellationToken,
}

impl TcpAcceptor {
    /// Accept connections until cancelled, then drain in-flight handlers
    pub(crate) async fn run(self) {
        let _guard = ExitGuard::new(self.cancel.clone(), self.failed.clone());

        tracing::debug!(
            source_id = %self.forwarder.source_id,
            "TCP accept loop started"
        );

        let tracker = TaskTracker::new();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            self.spawn_connection(&tracker, stream, peer_addr);
                        }
                        Err(e) => {
                            self.forwarder.metrics.recv_error();
                            tracing::warn!(
                                source_id = %self.forwarder.source_id,
                                error = %e,
                                "TCP accept error"
                            );
                        }
                    }
                }
            }
        }

        // The listening socket drops here; wait for connection handlers so
        // shutdown means every socket is released.
        tracker.close();
        tracker.wait().await;

        tracing::debug!(
            source_id = %self.forwarder.source_id,
            "TCP accept loop stopped"
        );
    }

    fn spawn_connection(&self, tracker: &TaskTracker, stream: TcpStream, peer_addr: SocketAddr) {
        let metrics = &self.forwarder.metrics;
        let active = metrics.connections_active.load(Ordering::Relaxed);
        if active >= self.tuning.max_connections as u64 {
            tracing::warn!(
                source_id = %self.forwarder.source_id,
                peer = %peer_addr,
                limit = self.tuning.max_connections,
                "connection limit reached, refusing connection"
            );
            drop(stream);
            return;
        }

        metrics.connection_opened();

        let idle_timeout = if self.tuning.idle_timeout.is_zero() {
            None
        } else {
            Some(self.tuning.idle_timeout)
        };

        let handler = ConnectionHandler {
            forwarder: self.forwarder.clone(),
            peer_addr,
            max_message_size: self.tuning.max_message_size,
            read_buffer_size: self.tuning.recv_buffer_size,
            idle_timeout,
            cancel: self.cancel.child_token(),
        };

        tracker.spawn(async move {
            handler.run(stream).await;
        });
    }
}

// =============================================================================
// Connection Handler
// =============================================================================

/// Handles a single TCP connection
struct ConnectionHandler {
    forwarder: Forwarder,
    peer_addr: SocketAddr,
    max_message_size: usize,
    read_buffer_size: usize,
    idle_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl ConnectionHandler {
    async fn run(self, stream: TcpStream) {
        tracing::debug!(
            source_id = %self.forwarder.source_id,
            peer = %self.peer_addr,
            "connection opened"
        );

        let mut reader = BufReader::with_capacity(self.read_buffer_size, stream);
        let mut line_buf = Vec::with_capacity(self.max_message_size.min(4096));
        let peer_ip = self.peer_addr.ip();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                read_result = async {
                    match self.idle_timeout {
                        Some(timeout) => {
                            tokio::time::timeout(
                                timeout,
                                read_bounded_line(&mut reader, &mut line_buf, self.max_message_size),
                            )
                            .await
                        }
                        None => Ok(
                            read_bounded_line(&mut reader, &mut line_buf, self.max_message_size)
                                .await,
                        ),
                    }
                } => {
                    match read_result {
                        Ok(Ok(LineRead::Line)) => {
                            let line = trim_line_ending(&line_buf);
                            if !line.is_empty() {
                                self.forwarder.process(line, peer_ip);
                            }
                        }
                        Ok(Ok(LineRead::TooLong)) => {
                            self.forwarder.metrics.message_oversized();
                            tracing::debug!(
                                source_id = %self.forwarder.source_id,
                                peer = %self.peer_addr,
                                max = self.max_message_size,
                                "line too large, dropping"
                            );
                        }
                        Ok(Ok(LineRead::Eof)) => break,
                        Ok(Err(e)) => {
                            // Peer resets are routine; anything else is noted
                            if !is_connection_reset(&e) {
                                self.forwarder.metrics.recv_error();
                                tracing::debug!(
                                    source_id = %self.forwarder.source_id,
                                    peer = %self.peer_addr,
                                    error = %e,
                                    "TCP read error"
                                );
                            }
                            break;
                        }
                        Err(_) => {
                            tracing::debug!(
                                source_id = %self.forwarder.source_id,
                                peer = %self.peer_addr,
                                "idle connection timed out"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.forwarder.metrics.connection_closed();

        tracing::debug!(
            source_id = %self.forwarder.source_id,
            peer = %self.peer_addr,
            "connection closed"
        );
    }
}

// =============================================================================
// Bounded line reading
// =============================================================================

/// Result of reading one bounded line
enum LineRead {
    /// A line is in the buffer (newline included when one was read)
    Line,
    /// The line exceeded the limit; it was consumed and discarded
    TooLong,
    /// Clean end of stream
    Eof,
}

/// Read until newline or EOF, storing at most `max` bytes
///
/// A line longer than `max` is consumed to its end but reported as
/// `TooLong`, keeping the framing intact without unbounded allocation.
async fn read_bounded_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> io::Result<LineRead> {
    buf.clear();
    let mut overflow = false;

    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(match (buf.is_empty(), overflow) {
                (true, false) => LineRead::Eof,
                (_, true) => LineRead::TooLong,
                _ => LineRead::Line,
            });
        }

        let (take, done) = match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (chunk.len(), false),
        };

        if !overflow {
            let room = max.saturating_sub(buf.len());
            if take <= room {
                buf.extend_from_slice(&chunk[..take]);
            } else {
                buf.extend_from_slice(&chunk[..room]);
                overflow = true;
            }
        }

        reader.consume(take);

        if done {
            return Ok(if overflow { LineRead::TooLong } else { LineRead::Line });
        }
    }
}

/// Strip the trailing LF / CRLF from a read line
fn trim_line_ending(line: &[u8]) -> &[u8] {
    crate::syslog::udp::trim_trailing_newline(line)
}

/// Check if an error is a peer reset (expected, not worth a counter)
fn is_connection_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tcp_test;
