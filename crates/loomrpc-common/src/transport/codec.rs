use crate::protocol::error::Result;
use crate::protocol::Envelope;

/// Codec for encoding/decoding wire envelopes.
///
/// Currently only JSON is supported, but the enum leaves room for other
/// formats without touching call sites.
pub enum Codec {
    Json(JsonCodec),
}

impl Codec {
    pub fn new() -> Self {
        Codec::Json(JsonCodec)
    }

    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        match self {
            Codec::Json(_) => JsonCodec::encode(envelope),
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Envelope> {
        match self {
            Codec::Json(_) => JsonCodec::decode(data),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON codec for wire envelopes.
///
/// The opaque id must survive the round trip unchanged; everything else in
/// the envelope is carried as-is.
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode(envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(envelope)?)
    }

    pub fn decode(data: &[u8]) -> Result<Envelope> {
        Ok(serde_json::from_slice(data)?)
    }
}
