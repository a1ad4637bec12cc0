use std::error::Error;
use std::fmt;
use std::io;

use protocol::TransportError;

/// Errors surfaced by broker plumbing that isn't itself a peer-closed or
/// protocol-layer event already handled by [`protocol::TransportError`]
/// (e.g. binding a listening socket, parsing CLI parameters).
#[derive(Debug)]
pub enum BrokerError {
    Transport { source: TransportError },
    Io { source: io::Error },
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BrokerError::Transport { source } => write!(f, "a transport error occurred: {}", source),
            BrokerError::Io { source } => write!(f, "an I/O error occurred: {}", source),
        }
    }
}

impl From<TransportError> for BrokerError {
    fn from(source: TransportError) -> Self {
        Self::Transport { source }
    }
}

impl From<io::Error> for BrokerError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

impl Error for BrokerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport { source } => Some(source),
            Self::Io { source } => Some(source),
        }
    }
}
