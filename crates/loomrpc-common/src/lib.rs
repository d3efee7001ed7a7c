//! Loomrpc Common Types and Transport
//!
//! This crate provides the protocol definitions and TCP transport primitives
//! shared by the loomrpc client stack.
//!
//! # Overview
//!
//! Loomrpc multiplexes many logical RPC calls over a small set of pooled TCP
//! connections. This crate contains the pieces both sides of that exchange
//! agree on:
//!
//! - **Protocol Layer**: the [`Message`](protocol::Message) /
//!   [`Envelope`](protocol::Envelope) types, the command-kind discriminator,
//!   and the error taxonomy.
//! - **Transport Layer**: length-prefixed framing, the JSON codec, and the
//!   TCP connector.
//!
//! # Wire Format
//!
//! Every frame is `[4-byte length prefix as u32 big-endian] + [JSON data]`,
//! where the JSON data is one encoded [`Envelope`](protocol::Envelope).
//! Frames larger than 100 MB are rejected to prevent memory exhaustion.
//!
//! # Example
//!
//! ```
//! use loomrpc_common::{Envelope, Message};
//!
//! let message = Message::new("Arith", "mul").with_payload(vec![1, 2, 3]);
//! let request = Envelope::request(42, message);
//! assert_eq!(request.opaque, 42);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
