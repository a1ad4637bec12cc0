use std::error::Error;
use std::fmt;
use std::io;

use protocol::TransportError;

/// Errors arising while a single player connection is being onboarded,
/// before it's handed off to the gameplay loop (which swallows
/// `TransportError` itself per §7's PeerClosed propagation policy).
#[derive(Debug)]
pub enum GameServerError {
    Transport { source: TransportError },
    Io { source: io::Error },
    /// The first frame on a newly accepted connection wasn't `start_game`.
    UnexpectedFrame,
}

impl fmt::Display for GameServerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameServerError::Transport { source } => write!(f, "a transport error occurred: {}", source),
            GameServerError::Io { source } => write!(f, "an I/O error occurred: {}", source),
            GameServerError::UnexpectedFrame => {
                write!(f, "expected a start_game frame as the first frame on a connection")
            }
        }
    }
}

impl From<TransportError> for GameServerError {
    fn from(source: TransportError) -> Self {
        Self::Transport { source }
    }
}

impl From<io::Error> for GameServerError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

impl Error for GameServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport { source } => Some(source),
            Self::Io { source } => Some(source),
            Self::UnexpectedFrame => None,
        }
    }
}
