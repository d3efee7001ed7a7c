use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use loomrpc_common::{LoomError, Result};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::connection::Connection;
use crate::correlation::ResponseTable;

/// Outcome of one connect attempt, shared by every caller waiting on it.
/// `None` means the attempt is still in flight.
type ConnectOutcome = Option<std::result::Result<Arc<Connection>, String>>;

/// Per-address record: a watch receiver over the connect task's outcome.
struct ConnectionEntry {
    outcome: watch::Receiver<ConnectOutcome>,
}

impl ConnectionEntry {
    /// The established connection, if the attempt succeeded and the
    /// connection is still healthy.
    fn ready(&self) -> Option<Arc<Connection>> {
        match &*self.outcome.borrow() {
            Some(Ok(connection)) if connection.is_ok() => Some(connection.clone()),
            _ => None,
        }
    }

    fn is_pending(&self) -> bool {
        self.outcome.borrow().is_none()
    }
}

/// Owns the address → connection mapping and serializes connection creation.
///
/// Exactly one connect attempt is started per address, no matter how many
/// callers race on first use: creation happens under a lock with a bounded
/// wait and a double check, and every concurrent caller converges on the
/// pending attempt's outcome. Entries whose connection terminally failed are
/// removed and re-created on next use.
pub struct ConnectionManager {
    entries: DashMap<String, ConnectionEntry>,
    create_lock: Mutex<()>,
    connect_timeout: Duration,
    lock_timeout: Duration,
    responses: Arc<ResponseTable>,
}

impl ConnectionManager {
    pub fn new(
        connect_timeout: Duration,
        lock_timeout: Duration,
        responses: Arc<ResponseTable>,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            create_lock: Mutex::new(()),
            connect_timeout,
            lock_timeout,
            responses,
        }
    }

    /// Returns the ready connection for `addr`, creating one if needed.
    ///
    /// The fast path is a lock-free table lookup. The slow path acquires the
    /// creation lock (bounded by the lock timeout, a soft failure the
    /// caller may retry), re-checks, starts at most one connect task, and
    /// waits on its outcome bounded by the connect timeout.
    pub async fn get_or_create(&self, addr: &str) -> Result<Arc<Connection>> {
        if let Some(entry) = self.entries.get(addr) {
            if let Some(connection) = entry.ready() {
                return Ok(connection);
            }
        }

        self.create(addr).await
    }

    async fn create(&self, addr: &str) -> Result<Arc<Connection>> {
        let mut outcome_rx = {
            let guard = tokio::time::timeout(self.lock_timeout, self.create_lock.lock())
                .await
                .map_err(|_| {
                    warn!(
                        %addr,
                        timeout_ms = self.lock_timeout.as_millis() as u64,
                        "timed out waiting for the connection table lock"
                    );
                    LoomError::LockTimeout(self.lock_timeout.as_millis() as u64)
                })?;

            // Double check under the lock: another caller may have created
            // (or may still be creating) the connection while we waited.
            let pending = self.entries.get(addr).and_then(|entry| {
                if let Some(connection) = entry.ready() {
                    return Some(Ok(connection));
                }
                if entry.is_pending() {
                    return Some(Err(entry.outcome.clone()));
                }
                None // terminally failed, replace below
            });

            match pending {
                Some(Ok(connection)) => return Ok(connection),
                Some(Err(rx)) => rx,
                None => {
                    self.entries.remove(addr);

                    let (tx, rx) = watch::channel::<ConnectOutcome>(None);
                    let addr_owned = addr.to_string();
                    let connect_timeout = self.connect_timeout;
                    let responses = self.responses.clone();

                    info!(%addr, "starting connect");
                    tokio::spawn(async move {
                        let outcome =
                            Connection::establish(&addr_owned, connect_timeout, responses)
                                .await
                                .map(Arc::new)
                                .map_err(|e| e.to_string());
                        let _ = tx.send(Some(outcome));
                    });

                    self.entries
                        .insert(addr.to_string(), ConnectionEntry { outcome: rx.clone() });
                    drop(guard);
                    rx
                }
            }
        };

        let outcome = match tokio::time::timeout(
            self.connect_timeout,
            outcome_rx.wait_for(|outcome| outcome.is_some()),
        )
        .await
        {
            Ok(Ok(value)) => value.clone(),
            // The connect task never drops its sender before publishing, so
            // a receive error means the attempt was torn down.
            Ok(Err(_)) => None,
            Err(_) => None,
        };

        match outcome {
            Some(Ok(connection)) => Ok(connection),
            Some(Err(reason)) => {
                warn!(%addr, %reason, "connect failed");
                Err(LoomError::Connect {
                    addr: addr.to_string(),
                    reason,
                })
            }
            None => Err(LoomError::Connect {
                addr: addr.to_string(),
                reason: format!(
                    "no connection within {}ms",
                    self.connect_timeout.as_millis()
                ),
            }),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.entries.len()
    }

    /// Drops every entry; in-flight connects publish into a table nobody
    /// reads anymore, established connections abort their readers on drop.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(
            Duration::from_millis(1000),
            Duration::from_millis(1000),
            Arc::new(ResponseTable::new()),
        )
    }

    /// Listener that counts accepted connections and keeps them open.
    async fn counting_listener() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = accepts.clone();

        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((stream, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    held.push(stream);
                }
            }
        });

        (addr, accepts)
    }

    #[tokio::test]
    async fn test_concurrent_first_use_single_connect() {
        let (addr, accepts) = counting_listener().await;
        let manager = Arc::new(manager());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let addr = addr.clone();
                tokio::spawn(async move { manager.get_or_create(&addr).await })
            })
            .collect();

        let mut connections = Vec::new();
        for task in tasks {
            connections.push(task.await.unwrap().unwrap());
        }

        // Everyone converged on the same underlying connection.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1);
        for connection in &connections[1..] {
            assert!(Arc::ptr_eq(&connections[0], connection));
        }
    }

    #[tokio::test]
    async fn test_ready_entry_is_reused() {
        let (addr, accepts) = counting_listener().await;
        let manager = manager();

        let first = manager.get_or_create(&addr).await.unwrap();
        let second = manager.get_or_create(&addr).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(accepts.load(Ordering::SeqCst), 1);
        assert_eq!(manager.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        // Bind then drop to get a port with no listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let manager = manager();
        let err = manager.get_or_create(&addr).await.unwrap_err();

        match err {
            LoomError::Connect { addr: failed, .. } => assert_eq!(failed, addr),
            other => panic!("expected Connect error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_failed_entry_is_recreated() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let manager = manager();
        assert!(manager.get_or_create(&addr).await.is_err());

        // Revive the address and try again: the failed entry must not stick.
        let listener = TcpListener::bind(&addr).await.unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((stream, _)) = listener.accept().await {
                    held.push(stream);
                }
            }
        });

        let connection = manager.get_or_create(&addr).await.unwrap();
        assert!(connection.is_ok());
    }
}
