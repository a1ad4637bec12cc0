use std::error::Error;
use std::fmt;
use std::io;

use protocol::TransportError;

/// Errors that may arise while the interactive client is running.
#[derive(Debug)]
pub enum ClientError {
    /// Something went wrong on the wire.
    Transport { source: TransportError },
    /// There was an error reading or writing terminal input.
    Io { source: io::Error },
    /// The user typed something that isn't a recognized command.
    InvalidCommand(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientError::Transport { source } => write!(f, "a connection error occurred: {}", source),
            ClientError::Io { source } => write!(f, "there was an error reading/writing input: {}", source),
            ClientError::InvalidCommand(s) => write!(f, "unrecognized command: {}", s),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(source: TransportError) -> Self {
        Self::Transport { source }
    }
}

impl From<io::Error> for ClientError {
    fn from(source: io::Error) -> Self {
        Self::Io { source }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transport { source } => Some(source),
            Self::Io { source } => Some(source),
            Self::InvalidCommand(_) => None,
        }
    }
}
