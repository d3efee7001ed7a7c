use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use loomrpc_common::{Envelope, LoomError, Result};
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::admission::PermitHold;

/// One-shot continuation invoked with the resolved future on the async path.
pub type ResponseCallback = Box<dyn FnOnce(Arc<ResponseFuture>) + Send>;

/// Extra slack the sweeper grants past a future's deadline, so the waiter's
/// own timeout always fires first on the synchronous path.
const SWEEP_GRACE: Duration = Duration::from_millis(1000);

/// Single-use rendezvous cell for one in-flight request.
///
/// Created when a request is dispatched and resolved exactly once, by
/// whichever happens first: a matching inbound response, a send failure, or
/// the housekeeping sweep. The completion cell is a oneshot sender taken
/// under a mutex, so a second resolution finds nothing to do; the admission
/// permit (async path) is guarded the same way inside [`PermitHold`].
pub struct ResponseFuture {
    opaque: u64,
    timeout: Duration,
    deadline: Instant,
    send_ok: AtomicBool,
    cause: Mutex<Option<LoomError>>,
    completer: Mutex<Option<oneshot::Sender<Option<Envelope>>>>,
    waiter: Mutex<Option<oneshot::Receiver<Option<Envelope>>>>,
    response: OnceLock<Option<Envelope>>,
    callback: Mutex<Option<ResponseCallback>>,
    permit: Option<PermitHold>,
}

impl std::fmt::Debug for ResponseFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseFuture")
            .field("opaque", &self.opaque)
            .field("timeout", &self.timeout)
            .field("deadline", &self.deadline)
            .field("send_ok", &self.send_ok)
            .finish_non_exhaustive()
    }
}

impl ResponseFuture {
    pub fn new(
        opaque: u64,
        timeout: Duration,
        callback: Option<ResponseCallback>,
        permit: Option<PermitHold>,
    ) -> Arc<Self> {
        let (tx, rx) = oneshot::channel();
        Arc::new(Self {
            opaque,
            timeout,
            deadline: Instant::now() + timeout,
            send_ok: AtomicBool::new(false),
            cause: Mutex::new(None),
            completer: Mutex::new(Some(tx)),
            waiter: Mutex::new(Some(rx)),
            response: OnceLock::new(),
            callback: Mutex::new(callback),
            permit,
        })
    }

    pub fn opaque(&self) -> u64 {
        self.opaque
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn mark_send_ok(&self, ok: bool) {
        self.send_ok.store(ok, Ordering::SeqCst);
    }

    /// Whether the request envelope was fully written to the connection.
    /// Distinguishes "timed out after a successful send" (the request may
    /// have been processed remotely) from "never sent" (it was not).
    pub fn is_send_ok(&self) -> bool {
        self.send_ok.load(Ordering::SeqCst)
    }

    pub async fn set_cause(&self, cause: LoomError) {
        *self.cause.lock().await = Some(cause);
    }

    pub async fn take_cause(&self) -> Option<LoomError> {
        self.cause.lock().await.take()
    }

    /// The resolved response, if one arrived. Synchronous so completion
    /// callbacks can read it directly.
    pub fn response(&self) -> Option<Envelope> {
        self.response.get().and_then(|response| response.clone())
    }

    /// Whether this future has been resolved (with or without a response).
    pub fn is_resolved(&self) -> bool {
        self.response.get().is_some()
    }

    /// Resolves this future with the given response (`None` signals failure:
    /// send failure or timeout, per [`is_send_ok`](Self::is_send_ok) and the
    /// stored cause).
    ///
    /// Unblocks the synchronous waiter, runs the async callback (panics are
    /// caught and logged, never propagated), then releases the admission
    /// permit, in that order, at most once.
    pub async fn complete(self: &Arc<Self>, response: Option<Envelope>) {
        // First resolution wins; a later one cannot overwrite the result.
        let _ = self.response.set(response.clone());

        if let Some(tx) = self.completer.lock().await.take() {
            let _ = tx.send(response);
        }

        if let Some(callback) = self.callback.lock().await.take() {
            let future = Arc::clone(self);
            if catch_unwind(AssertUnwindSafe(move || callback(future))).is_err() {
                warn!(opaque = self.opaque, "response callback panicked");
            }
        }

        if let Some(permit) = &self.permit {
            permit.release();
        }
    }

    /// Suspends the caller until the future resolves or `timeout` elapses.
    ///
    /// Returns the response, or `None` on failure or timeout. Intended for
    /// exactly one waiter; a second call observes `None` immediately.
    pub async fn await_response(&self, timeout: Duration) -> Option<Envelope> {
        let rx = match self.waiter.lock().await.take() {
            Some(rx) => rx,
            None => return None,
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => None,
            Err(_) => None,
        }
    }
}

/// Concurrent mapping from opaque request id to its [`ResponseFuture`].
///
/// Consulted by the per-connection readers, the dispatch paths, and the
/// housekeeping sweep. A future is reachable from the table exactly while it
/// is unresolved: resolution always removes first, then completes, so racing
/// finalizers converge: the first to remove wins, the other finds nothing.
pub struct ResponseTable {
    entries: DashMap<u64, Arc<ResponseFuture>>,
}

impl ResponseTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Inserts a future under its opaque id.
    ///
    /// A duplicate id is an internal invariant violation: ids are minted from
    /// a per-client counter and must be unique among live futures.
    pub fn register(&self, future: Arc<ResponseFuture>) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(future.opaque()) {
            Entry::Occupied(entry) => Err(LoomError::Internal(format!(
                "duplicate opaque id {} in response table",
                entry.key()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(future);
                Ok(())
            }
        }
    }

    /// Removes and returns the future for `opaque`, if present. Double
    /// removal is harmless and the sync invocation path relies on that.
    pub fn remove(&self, opaque: u64) -> Option<Arc<ResponseFuture>> {
        self.entries.remove(&opaque).map(|(_, future)| future)
    }

    /// Resolves the future registered under `opaque` with `response`.
    ///
    /// A missing id means the future was already resolved (or never existed,
    /// e.g. a late duplicate signal); the response is dropped silently.
    pub async fn resolve(&self, opaque: u64, response: Option<Envelope>) {
        match self.remove(opaque) {
            Some(future) => future.complete(response).await,
            None => debug!(opaque, "dropping response with no waiting future"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, opaque: u64) -> bool {
        self.entries.contains_key(&opaque)
    }

    /// Force-resolves every entry whose deadline (plus a grace period) has
    /// elapsed. This is what turns an abandoned async call into a timed-out
    /// one when nobody is waiting on it. Iterates a snapshot of the current
    /// keys so it never blocks the readers for long.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|entry| entry.value().deadline() + SWEEP_GRACE <= now)
            .map(|entry| *entry.key())
            .collect();

        let mut swept = 0;
        for opaque in expired {
            if let Some(future) = self.remove(opaque) {
                warn!(opaque, "request expired before a response arrived");
                future.complete(None).await;
                swept += 1;
            }
        }
        swept
    }
}

impl Default for ResponseTable {
    fn default() -> Self {
        Self::new()
    }
}
