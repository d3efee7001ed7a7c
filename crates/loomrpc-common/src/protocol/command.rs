use serde::{Deserialize, Serialize};

use super::message::Message;

/// Discriminator for envelopes moving across a connection.
///
/// The client-side correlation path only consumes [`Response`](CommandKind::Response);
/// other kinds are routed elsewhere (or dropped when no handler is installed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    Request,
    Response,
    Heartbeat,
}

/// Wire envelope: a [`Message`] tagged with an opaque correlation id and a
/// command kind.
///
/// One request attempt produces one envelope with one fresh opaque id; a
/// retried call never reuses the id of a previous attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub opaque: u64,
    pub kind: CommandKind,
    pub message: Message,
}

impl Envelope {
    pub fn request(opaque: u64, message: Message) -> Self {
        Envelope {
            opaque,
            kind: CommandKind::Request,
            message,
        }
    }

    pub fn response(opaque: u64, message: Message) -> Self {
        Envelope {
            opaque,
            kind: CommandKind::Response,
            message,
        }
    }

    pub fn heartbeat(opaque: u64) -> Self {
        Envelope {
            opaque,
            kind: CommandKind::Heartbeat,
            message: Message::new("", ""),
        }
    }

    pub fn is_response(&self) -> bool {
        self.kind == CommandKind::Response
    }
}
