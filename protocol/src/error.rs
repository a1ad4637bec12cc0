use std::error::Error;
use std::fmt;
use std::io;

use serde_json::Error as JsonError;

/// The error types that may arise while reading or writing frames on a
/// [`crate::Transport`].
#[derive(Debug)]
pub enum TransportError {
    /// The peer closed the connection, or the socket is no longer usable.
    /// This is an expected session-termination signal, not a protocol fault.
    PeerClosed,
    /// A frame violated the wire format: a malformed header length,
    /// non-JSON header, missing `content-length`, or non-JSON content.
    Protocol(String),
    /// An I/O error occurred that isn't attributable to the peer closing.
    Io { source: io::Error },
    /// An error occurred while serializing or deserializing a frame payload.
    Serialization { source: JsonError },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::PeerClosed => write!(f, "the peer closed the connection"),
            TransportError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            TransportError::Io { source } => write!(f, "an I/O error occurred: {}", source),
            TransportError::Serialization { source } => {
                write!(f, "an error occurred while (de)serializing a frame: {}", source)
            }
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => TransportError::PeerClosed,
            _ => TransportError::Io { source },
        }
    }
}

impl From<JsonError> for TransportError {
    fn from(source: JsonError) -> Self {
        Self::Serialization { source }
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source } => Some(source),
            Self::Serialization { source } => Some(source),
            _ => None,
        }
    }
}
