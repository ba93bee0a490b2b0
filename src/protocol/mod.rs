//! Peer protocol over UDP
//!
//! Every datagram is `COMMAND|payload`. Single-datagram exchanges (index and
//! tombstone queries) go through [`request`], file pulls through the
//! lockstep chunk protocol in [`transfer`]. The sync engine depends only on
//! the [`PeerTransport`] trait.
//!
//! # Example Usage
//!
//! ```ignore
//! use peersync::protocol::{PeerTransport, UdpTransport};
//!
//! let transport = UdpTransport::new(ProtocolSettings::default());
//! let index = transport.fetch_index("127.0.0.1:9001").await?;
//! for (path, entry) in &index.files {
//!     // Decide whether to pull the file
//! }
//! ```

pub mod error;
pub mod listener;
pub mod request;
pub mod traits;
pub mod transfer;
pub mod transport;
pub mod types;
pub mod wire;

// Re-export public API
pub use error::ProtocolError;
pub use listener::{Listener, ListenerHandle};
pub use traits::{PeerTransport, ProtocolResult};
pub use transport::UdpTransport;
pub use types::{Chunk, FileEntry, IndexPayload, TombstoneEntry, TombstonePayload};
pub use wire::{Command, Message};

// vim: ts=4
