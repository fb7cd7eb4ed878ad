//! Wire schema for the dealer and peer channels.
//!
//! Every message is a self-describing serde value framed with a length
//! prefix, so a shape disagreement between endpoints surfaces as a decode
//! or validation error on receipt instead of silent misalignment. Hellos
//! carry the protocol version and the session header; both are checked
//! before any query runs.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{randomness::QueryRandomness, ProtocolError};

/// Version tag carried by every handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Dimensions of one protocol session, from the query-file header `m n k Q`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    /// Number of users (rows of U).
    pub users: usize,
    /// Number of items (rows of V).
    pub items: usize,
    /// Number of features (columns of U and V).
    pub features: usize,
    /// Number of queries in the session.
    pub queries: usize,
}

impl SessionHeader {
    /// A header is usable if every matrix dimension is non-zero.
    /// Zero queries is a valid (empty) session.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.users == 0 || self.items == 0 || self.features == 0 {
            return Err(ProtocolError::HeaderMismatch);
        }
        Ok(())
    }
}

/// Messages on the dealer channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DealerMessage {
    /// Sent by a party on connect; echoed back by the dealer once both
    /// parties agree on the header.
    Hello {
        version: u32,
        party: usize,
        header: SessionHeader,
    },
    /// One bundle of correlated randomness, sent once per query in order.
    Randomness(Box<QueryRandomness>),
}

/// Messages on the direct party-to-party channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PeerMessage {
    Hello {
        version: u32,
        party: usize,
        header: SessionHeader,
    },
    /// Masked index difference for oblivious alignment.
    AlignDiff(u32),
    /// Masked item-table share `v + r`.
    MaskedTable(Array2<u32>),
    /// Both masked operands of one matrix-triple multiplication.
    MaskedMatrixPair { x: Array2<u32>, y: Array2<u32> },
    /// Both masked operands of one vector-triple multiplication.
    MaskedVectorPair { x: Array1<u32>, y: Array1<u32> },
}

/// Validate an incoming hello against our own version and header.
pub fn check_hello(
    version: u32,
    header: &SessionHeader,
    ours: &SessionHeader,
) -> Result<(), ProtocolError> {
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            ours: PROTOCOL_VERSION,
            theirs: version,
        });
    }
    if header != ours {
        return Err(ProtocolError::HeaderMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> SessionHeader {
        SessionHeader {
            users: 3,
            items: 4,
            features: 2,
            queries: 1,
        }
    }

    #[test]
    fn hello_accepts_matching_header() {
        assert!(check_hello(PROTOCOL_VERSION, &header(), &header()).is_ok());
    }

    #[test]
    fn hello_rejects_version_skew() {
        let result = check_hello(PROTOCOL_VERSION + 1, &header(), &header());
        assert!(matches!(
            result,
            Err(ProtocolError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn hello_rejects_header_skew() {
        let mut other = header();
        other.items = 5;
        assert!(matches!(
            check_hello(PROTOCOL_VERSION, &other, &header()),
            Err(ProtocolError::HeaderMismatch)
        ));
    }

    #[test]
    fn header_rejects_zero_dimensions() {
        let mut bad = header();
        bad.features = 0;
        assert!(bad.validate().is_err());
        let mut empty = header();
        empty.queries = 0;
        assert!(empty.validate().is_ok());
    }
}
