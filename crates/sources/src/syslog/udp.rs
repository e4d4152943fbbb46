//! Syslog UDP receive loop
//!
//! UDP is connectionless: one loop owns the socket and handles each
//! datagram as an independent message. Receive errors are logged and the
//! loop keeps going; only cancellation ends it.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::syslog::listener::{ExitGuard, Forwarder};

/// The UDP half of a listener
pub(crate) struct UdpReceiver {
    pub(crate) socket: UdpSocket,
    pub(crate) forwarder: Forwarder,
    pub(crate) max_message_size: usize,
    pub(crate) cancel: CancellationToken,
    pub(crate) failed: CancellationToken,
}

impl UdpReceiver {
    /// Run the receive loop until cancelled
    pub(crate) async fn run(self) {
        let _guard = ExitGuard::new(self.cancel.clone(), self.failed.clone());

        tracing::debug!(
            source_id = %self.forwarder.source_id,
            "UDP receive loop started"
        );

        // One byte of headroom so truncation by recv_from is detectable
        let mut recv_buf = vec![0u8; self.max_message_size + 1];

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                recv_result = self.socket.recv_from(&mut recv_buf) => {
                    match recv_result {
                        Ok((len, peer_addr)) => {
                            self.handle_datagram(&recv_buf[..len], peer_addr);
                        }
                        Err(e) => {
                            self.forwarder.metrics.recv_error();
                            tracing::debug!(
                                source_id = %self.forwarder.source_id,
                                error = %e,
                                "UDP recv error"
                            );
                        }
                    }
                }
            }
        }

        tracing::debug!(
            source_id = %self.forwarder.source_id,
            "UDP receive loop stopped"
        );
    }

    /// Handle one received datagram
    fn handle_datagram(&self, data: &[u8], peer_addr: SocketAddr) {
        if data.len() > self.max_message_size {
            self.forwarder.metrics.message_oversized();
            tracing::debug!(
                source_id = %self.forwarder.source_id,
                peer = %peer_addr,
                size = data.len(),
                max = self.max_message_size,
                "datagram too large, dropping"
            );
            return;
        }

        let message = trim_trailing_newline(data);
        if message.is_empty() {
            return;
        }

        self.forwarder.process(message, peer_addr.ip());
    }
}

/// Trim one trailing newline (LF or CRLF) some syslog clients append
#[inline]
pub(crate) fn trim_trailing_newline(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && data[end - 1] == b'\r' {
            end -= 1;
        }
    }
    &data[..end]
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod udp_test;
