use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loomrpc_common::{metadata, Envelope, LoomError, Message, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::admission::AsyncAdmission;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::correlation::{ResponseCallback, ResponseFuture, ResponseTable};
use crate::manager::ConnectionManager;

/// The client transport core.
///
/// Orchestrates one call attempt end to end: obtain or create the
/// connection, assign an opaque id, register a [`ResponseFuture`], write the
/// request, then either block until the response or timeout (sync) or return
/// the future immediately (async). A housekeeping sweeper runs in the
/// background for the lifetime of the client, force-resolving futures whose
/// deadline has passed.
///
/// The opaque id counter is scoped to this instance, so multiple clients in
/// one process stay independent.
pub struct LoomClient {
    config: ClientConfig,
    connections: ConnectionManager,
    responses: Arc<ResponseTable>,
    admission: AsyncAdmission,
    opaque: AtomicU64,
    sweeper: JoinHandle<()>,
}

impl LoomClient {
    pub fn new(config: ClientConfig) -> Self {
        let responses = Arc::new(ResponseTable::new());
        let connections = ConnectionManager::new(
            config.connect_timeout(),
            config.lock_timeout(),
            responses.clone(),
        );
        let admission = AsyncAdmission::new(config.async_permits);
        let sweeper = spawn_sweeper(
            responses.clone(),
            Duration::from_millis(config.sweep_initial_delay_ms),
            Duration::from_millis(config.sweep_interval_ms.max(1)),
        );

        Self {
            config,
            connections,
            responses,
            admission,
            opaque: AtomicU64::new(0),
            sweeper,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// In-flight requests currently registered in the correlation table.
    pub fn pending_requests(&self) -> usize {
        self.responses.len()
    }

    /// Remaining async admission permits.
    pub fn available_permits(&self) -> usize {
        self.admission.available()
    }

    /// Synchronous call: sends `message` to `addr` and blocks the calling
    /// task until the response arrives or `timeout` elapses.
    pub async fn call(&self, addr: &str, message: Message, timeout: Duration) -> Result<Message> {
        let connection = self.connections.get_or_create(addr).await?;
        let envelope = self.request_envelope(&connection, message);
        let response = self.invoke_sync(&connection, envelope, timeout).await?;
        Ok(response.message)
    }

    /// Asynchronous call: never blocks the caller. The optional callback
    /// runs once, on whichever path resolves the returned future.
    pub async fn call_async(
        &self,
        addr: &str,
        message: Message,
        timeout: Duration,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ResponseFuture>> {
        let connection = self.connections.get_or_create(addr).await?;
        let envelope = self.request_envelope(&connection, message);
        self.invoke_async(&connection, envelope, timeout, callback)
            .await
    }

    /// One-way call: the request is written and forgotten. Nothing is
    /// registered in the correlation table and no response is expected.
    pub async fn call_oneway(&self, addr: &str, mut message: Message) -> Result<()> {
        message.oneway = true;
        let connection = self.connections.get_or_create(addr).await?;
        let envelope = self.request_envelope(&connection, message);
        self.invoke_oneway(&connection, envelope).await
    }

    /// Sync invocation against an already-obtained connection.
    ///
    /// The future is removed from the table on every exit path; removing an
    /// id that an inbound resolution already removed is harmless.
    pub async fn invoke_sync(
        &self,
        connection: &Arc<Connection>,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Envelope> {
        let opaque = envelope.opaque;
        let future = ResponseFuture::new(opaque, timeout, None, None);
        self.responses.register(future.clone())?;

        let result = self
            .invoke_sync_inner(connection, envelope, timeout, &future)
            .await;
        self.responses.remove(opaque);
        result
    }

    async fn invoke_sync_inner(
        &self,
        connection: &Arc<Connection>,
        envelope: Envelope,
        timeout: Duration,
        future: &Arc<ResponseFuture>,
    ) -> Result<Envelope> {
        let opaque = envelope.opaque;

        if let Err(err) = connection.write_envelope(&envelope).await {
            self.responses.remove(opaque);
            future.mark_send_ok(false);
            warn!(addr = %connection.addr(), opaque, %err, "failed to send request");
            return Err(LoomError::SendRequest {
                addr: connection.addr().to_string(),
                reason: err.to_string(),
            });
        }
        future.mark_send_ok(true);

        match future.await_response(timeout).await {
            Some(response) => Ok(response),
            None => {
                if future.is_send_ok() {
                    // The request went out; the server may well have
                    // processed it. Callers must treat this as ambiguous.
                    Err(LoomError::Timeout {
                        addr: connection.addr().to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                } else {
                    let reason = future
                        .take_cause()
                        .await
                        .map(|cause| cause.to_string())
                        .unwrap_or_else(|| "send was never acknowledged".to_string());
                    Err(LoomError::SendRequest {
                        addr: connection.addr().to_string(),
                        reason,
                    })
                }
            }
        }
    }

    /// Async invocation against an already-obtained connection.
    ///
    /// Admission is taken first; a saturated semaphore rejects the call
    /// before anything is registered or written. On a write failure the
    /// future is unblocked, deregistered, its callback run, and the permit
    /// released, in that order, exactly once.
    pub async fn invoke_async(
        &self,
        connection: &Arc<Connection>,
        envelope: Envelope,
        timeout: Duration,
        callback: Option<ResponseCallback>,
    ) -> Result<Arc<ResponseFuture>> {
        let permit = self.admission.acquire(timeout).await?;

        let opaque = envelope.opaque;
        let future = ResponseFuture::new(opaque, timeout, callback, Some(permit));
        self.responses.register(future.clone())?;

        if let Err(err) = connection.write_envelope(&envelope).await {
            future.mark_send_ok(false);
            future
                .set_cause(LoomError::SendRequest {
                    addr: connection.addr().to_string(),
                    reason: err.to_string(),
                })
                .await;
            self.responses.remove(opaque);
            future.complete(None).await;
            warn!(addr = %connection.addr(), opaque, "failed to send async request");
            return Err(LoomError::SendRequest {
                addr: connection.addr().to_string(),
                reason: err.to_string(),
            });
        }
        future.mark_send_ok(true);

        Ok(future)
    }

    /// Writes a request without registering a future.
    pub async fn invoke_oneway(&self, connection: &Arc<Connection>, envelope: Envelope) -> Result<()> {
        connection
            .write_envelope(&envelope)
            .await
            .map_err(|err| LoomError::SendRequest {
                addr: connection.addr().to_string(),
                reason: err.to_string(),
            })
    }

    /// Stops the sweeper and drops all connections. Further calls on this
    /// client will re-create connections but no longer be swept.
    pub fn shutdown(&self) {
        self.sweeper.abort();
        self.connections.clear();
        debug!("client shut down");
    }

    fn request_envelope(&self, connection: &Arc<Connection>, mut message: Message) -> Envelope {
        if let Some(local) = connection.local_addr() {
            message
                .metadata
                .insert(metadata::HOST.to_string(), local.ip().to_string());
            message
                .metadata
                .insert(metadata::PORT.to_string(), local.port().to_string());
        }
        Envelope::request(self.opaque.fetch_add(1, Ordering::Relaxed), message)
    }
}

impl Drop for LoomClient {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

fn spawn_sweeper(
    responses: Arc<ResponseTable>,
    initial_delay: Duration,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(initial_delay).await;
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let swept = responses.sweep_expired().await;
            if swept > 0 {
                debug!(swept, "expired in-flight requests");
            }
        }
    })
}
