use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known metadata keys carried on a [`Message`].
pub mod metadata {
    /// Error code set by the remote side on an application-level failure.
    pub const ERROR_CODE: &str = "_error_code";
    /// Human-readable message accompanying [`ERROR_CODE`].
    pub const ERROR_MESSAGE: &str = "_error_message";
    /// Local host of the calling client, stamped on outgoing requests.
    pub const HOST: &str = "_host";
    /// Local port of the calling client, stamped on outgoing requests.
    pub const PORT: &str = "_port";
}

/// Payload serialization marker. The transport never interprets the payload;
/// this tag travels with it so the receiving side knows how to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializeType {
    #[default]
    None,
    Json,
}

/// Payload compression marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressType {
    #[default]
    None,
    Gzip,
}

/// A logical RPC message: which service and method to call, string metadata,
/// and an opaque payload.
///
/// Payload encoding is the caller's concern; the transport moves the bytes
/// verbatim in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub service_path: String,
    pub service_method: String,
    pub metadata: HashMap<String, String>,
    pub payload: Vec<u8>,
    /// When set, the remote side must not produce a response.
    #[serde(default)]
    pub oneway: bool,
    #[serde(default)]
    pub serialize_type: SerializeType,
    #[serde(default)]
    pub compress_type: CompressType,
}

impl Message {
    pub fn new(service_path: impl Into<String>, service_method: impl Into<String>) -> Self {
        Message {
            service_path: service_path.into(),
            service_method: service_method.into(),
            metadata: HashMap::new(),
            payload: Vec::new(),
            oneway: false,
            serialize_type: SerializeType::None,
            compress_type: CompressType::None,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Application-level error embedded by the remote side, if any.
    ///
    /// A response carrying [`metadata::ERROR_CODE`] is a successful transport
    /// round trip with a failed call outcome; callers decide whether to retry.
    pub fn application_error(&self) -> Option<(i32, String)> {
        let code = self.metadata.get(metadata::ERROR_CODE)?;
        let code = code.parse().unwrap_or(0);
        let message = self
            .metadata
            .get(metadata::ERROR_MESSAGE)
            .cloned()
            .unwrap_or_default();
        Some((code, message))
    }
}
