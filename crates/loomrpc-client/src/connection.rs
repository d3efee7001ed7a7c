use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loomrpc_common::transport::{read_frame, write_frame, JsonCodec, TcpConnector};
use loomrpc_common::{CommandKind, Envelope, LoomError, Result};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::correlation::ResponseTable;

/// One established connection to a destination address.
///
/// The stream is split on establishment: the write half lives behind an
/// async mutex (whole envelopes only; two frames never interleave), and the
/// read half is owned by a spawned reader task that decodes inbound frames
/// and resolves the response table. Responses may arrive in any order; the
/// opaque id decides which future each one satisfies.
#[derive(Debug)]
pub struct Connection {
    addr: String,
    local_addr: Option<SocketAddr>,
    writer: Mutex<OwnedWriteHalf>,
    reader: JoinHandle<()>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Connects to `addr` within `connect_timeout` and starts the reader.
    pub async fn establish(
        addr: &str,
        connect_timeout: Duration,
        responses: Arc<ResponseTable>,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpConnector::connect(addr))
            .await
            .map_err(|_| LoomError::Connect {
                addr: addr.to_string(),
                reason: format!("connect timed out after {}ms", connect_timeout.as_millis()),
            })??;

        let local_addr = stream.local_addr().ok();
        let (read_half, write_half) = stream.into_split();

        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            addr.to_string(),
            read_half,
            responses,
            closed.clone(),
        ));

        debug!(%addr, "connection established");
        Ok(Self {
            addr: addr.to_string(),
            local_addr,
            writer: Mutex::new(write_half),
            reader,
            closed,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Local endpoint of this connection, for stamping outgoing metadata.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether the reader has observed EOF or a read error. A closed
    /// connection is terminally failed; the manager replaces it on next use.
    pub fn is_ok(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Encodes and writes one envelope as a single frame.
    pub async fn write_envelope(&self, envelope: &Envelope) -> Result<()> {
        let bytes = JsonCodec::encode(envelope)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &bytes).await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Per-connection inbound loop: frames in, table resolutions out.
///
/// Only the `Response` kind touches the correlation table; requests and
/// heartbeats from the peer are logged and dropped (this client has no
/// server role). Slow application callbacks run on the resolving path, so
/// handlers installed on futures should stay short.
async fn read_loop(
    addr: String,
    mut read_half: OwnedReadHalf,
    responses: Arc<ResponseTable>,
    closed: Arc<AtomicBool>,
) {
    loop {
        let frame = match read_frame(&mut read_half).await {
            Ok(frame) => frame,
            Err(LoomError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!(%addr, "connection closed by peer");
                break;
            }
            Err(err) => {
                warn!(%addr, %err, "read failed, closing connection");
                break;
            }
        };

        let envelope = match JsonCodec::decode(&frame) {
            Ok(envelope) => envelope,
            Err(err) => {
                // Framing is length-based, so one bad frame does not desync
                // the stream; skip it.
                warn!(%addr, %err, "dropping undecodable frame");
                continue;
            }
        };

        match envelope.kind {
            CommandKind::Response => {
                let opaque = envelope.opaque;
                responses.resolve(opaque, Some(envelope)).await;
            }
            CommandKind::Request => {
                debug!(%addr, opaque = envelope.opaque, "ignoring inbound request");
            }
            CommandKind::Heartbeat => {
                debug!(%addr, "heartbeat");
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
}
