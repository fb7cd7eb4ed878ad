pub mod align;
pub mod error;
pub mod messages;
pub mod queryfile;
pub mod randomness;
pub mod ring;
pub mod secmul;
pub mod session;
pub mod shares;
pub mod trace;
pub mod transport;

pub use error::ProtocolError;
pub use messages::{DealerMessage, PeerMessage, SessionHeader, PROTOCOL_VERSION};
pub use session::{PartyState, Role, Session};

/// Wire ID of the dealer in handshakes and transport diagnostics.
/// Parties use their role IDs 0 and 1.
pub const DEALER_ID: usize = 2;
