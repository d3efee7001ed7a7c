//! Loomrpc Client Transport
//!
//! The client-side transport core: it turns a logical remote call into a
//! correlated request/response exchange over a small set of pooled,
//! asynchronously established TCP connections, with bounded concurrency,
//! timeouts, and retry.
//!
//! # Architecture
//!
//! ```text
//! caller
//!   └─► RetryingInvoker ──► ServiceDiscovery + AddressSelector
//!             │
//!             └─► LoomClient
//!                   ├─► ConnectionManager (one connect per address)
//!                   ├─► ResponseTable    (opaque id → ResponseFuture)
//!                   ├─► AsyncAdmission   (bounded async concurrency)
//!                   └─► sweeper task     (expires abandoned futures)
//! ```
//!
//! Requests sent on one connection may be answered in any order; the opaque
//! id on each envelope, not arrival order, decides which caller a response
//! satisfies.
//!
//! # Example
//!
//! ```no_run
//! use loomrpc_client::{ClientConfig, Invocation, LoomClient, RetryingInvoker, StaticDiscovery};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> loomrpc_common::Result<()> {
//! let client = Arc::new(LoomClient::new(ClientConfig::default()));
//!
//! let discovery = Arc::new(StaticDiscovery::new());
//! discovery.register("Arith", vec!["127.0.0.1:8972".to_string()]);
//!
//! let invoker = RetryingInvoker::new(client, discovery);
//! let invocation = Invocation::new("Arith", "mul")
//!     .with_payload(b"{\"a\":7,\"b\":6}".to_vec())
//!     .with_retries(3);
//!
//! let response = invoker.invoke(invocation).await?;
//! println!("{} bytes back", response.payload.len());
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod client;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod discovery;
pub mod invoker;
pub mod manager;
pub mod retry;
pub mod selector;

pub use client::LoomClient;
pub use config::ClientConfig;
pub use correlation::{ResponseCallback, ResponseFuture, ResponseTable};
pub use discovery::{ServiceDiscovery, StaticDiscovery};
pub use invoker::{Invocation, RetryingInvoker};
pub use retry::{ExponentialBackoff, RetryNTimes, RetryPolicy};
pub use selector::{AddressSelector, RandomSelector, RoundRobinSelector};
