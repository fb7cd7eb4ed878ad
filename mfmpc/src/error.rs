use std::{error, fmt, io};

use crate::transport::TransportError;

/// Error type for the update protocol.
///
/// Every variant is fatal to the current session: protocol state after a
/// partial exchange cannot be resumed, because the dealer randomness backing
/// the interrupted query is single-use.
#[derive(Debug)]
pub enum ProtocolError {
    /// Two operands of an arithmetic operation disagree on shape.
    DimensionMismatch { left: Vec<usize>, right: Vec<usize> },
    /// Index lookup beyond shape bounds.
    OutOfRange { index: usize, len: usize },
    /// Startup input could not be read or parsed.
    Io(io::Error),
    /// Peer or dealer channel closed or errored mid-exchange.
    Disconnect(TransportError),
    /// The peer or dealer sent a message of the wrong kind for this step.
    UnexpectedMessage { step: &'static str },
    /// Handshake with a peer speaking a different protocol version.
    VersionMismatch { ours: u32, theirs: u32 },
    /// The two endpoints of a handshake disagree on the session header.
    HeaderMismatch,
    /// A step of a specific query failed.
    Query {
        index: usize,
        step: &'static str,
        source: Box<ProtocolError>,
    },
}

impl ProtocolError {
    /// Attach query context to an error bubbling out of a protocol step.
    pub fn at(index: usize, step: &'static str, source: ProtocolError) -> Self {
        ProtocolError::Query {
            index,
            step,
            source: Box::new(source),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { left, right } => {
                write!(f, "Dimension mismatch: {:?} vs {:?}", left, right)
            }
            Self::OutOfRange { index, len } => {
                write!(f, "Index {} out of range for length {}", index, len)
            }
            Self::Io(err) => write!(f, "I/O failure: {}", err),
            Self::Disconnect(err) => write!(f, "{}", err),
            Self::UnexpectedMessage { step } => {
                write!(f, "Unexpected message during {}", step)
            }
            Self::VersionMismatch { ours, theirs } => {
                write!(f, "Protocol version mismatch: ours {}, theirs {}", ours, theirs)
            }
            Self::HeaderMismatch => write!(f, "Session headers disagree"),
            Self::Query {
                index,
                step,
                source,
            } => write!(f, "Query {} failed during {}: {}", index, step, source),
        }
    }
}

impl error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Query { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        ProtocolError::Io(err)
    }
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        ProtocolError::Disconnect(err)
    }
}
