//! Two-party transport abstraction
//!
//! The protocol drivers are written in plain blocking style: they call
//! [`Transport::send`] and [`Transport::recv`] as if talking over a socket.
//! The session engine provides the production implementation; the in-memory
//! pair below exists for driving both sides of a protocol in tests.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crypto::sha256;
use crate::error::{Error, Result};

pub mod memory;

pub use memory::MemoryTransport;

/// Stable identifier of the initiating party
pub const DEVICE_PARTY: &str = "maany-device";
/// Stable identifier of the responding party
pub const SERVER_PARTY: &str = "maany-server";

/// 32-byte party identifier derived from the party name
pub fn party_pid(name: &str) -> [u8; 32] {
    sha256(&[name.as_bytes()])
}

/// Transcript key binding a flow label, both party identifiers and the
/// optional application session identifier. An empty session identifier
/// still yields a well-defined (unbound) transcript.
pub fn transcript_key(label: &str, session_id: &[u8]) -> [u8; 32] {
    sha256(&[
        label.as_bytes(),
        &party_pid(DEVICE_PARTY),
        &party_pid(SERVER_PARTY),
        &(session_id.len() as u32).to_le_bytes(),
        session_id,
    ])
}

/// Ordered, reliable, peer-to-peer byte transport
pub trait Transport: Send {
    /// Hand a message to the peer; blocks until the transport accepts it
    fn send(&self, msg: &[u8]) -> Result<()>;

    /// Take the next message from the peer; blocks until one is available
    fn recv(&self) -> Result<Vec<u8>>;
}

/// Serialize a round message and hand it to the peer
pub fn send_msg<T: Transport + ?Sized, M: Serialize>(transport: &T, msg: &M) -> Result<()> {
    let bytes =
        serde_json::to_vec(msg).map_err(|e| Error::General(format!("encode message: {e}")))?;
    transport.send(&bytes)
}

/// Receive and parse the peer's next round message
pub fn recv_msg<T: Transport + ?Sized, M: DeserializeOwned>(transport: &T) -> Result<M> {
    let bytes = transport.recv()?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::InvalidArgument(format!("malformed peer message: {e}")))
}
