//! Loomrpc Transport Layer
//!
//! TCP connector, length-prefixed framing, and the envelope codec.
//!
//! # Components
//!
//! - **[`JsonCodec`]**: encode/decode [`Envelope`](crate::protocol::Envelope)s to JSON
//! - **[`TcpConnector`]**: resolve-and-connect helper for `host:port` addresses
//! - **[`read_frame`]** / **[`write_frame`]**: framing over any async stream
//!
//! # Wire Format
//!
//! `[4-byte length prefix as u32 big-endian] + [JSON data]`. Frames above
//! 100 MB are rejected to prevent memory exhaustion.

pub mod codec;
pub mod tcp;

pub use codec::{Codec, JsonCodec};
pub use tcp::{read_frame, write_frame, TcpConnector, MAX_FRAME_SIZE};

#[cfg(test)]
mod tests;
