//! In-memory transport implementation for testing

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use super::Transport;
use crate::error::{Error, Result};

/// One end of a bidirectional in-memory link
pub struct MemoryTransport {
    tx: Sender<Vec<u8>>,
    rx: Mutex<Receiver<Vec<u8>>>,
}

impl MemoryTransport {
    /// Create a connected pair of transports
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (tx_a, rx_b) = channel();
        let (tx_b, rx_a) = channel();
        (
            MemoryTransport {
                tx: tx_a,
                rx: Mutex::new(rx_a),
            },
            MemoryTransport {
                tx: tx_b,
                rx: Mutex::new(rx_b),
            },
        )
    }
}

impl Transport for MemoryTransport {
    fn send(&self, msg: &[u8]) -> Result<()> {
        self.tx
            .send(msg.to_vec())
            .map_err(|_| Error::Io("peer hung up".into()))
    }

    fn recv(&self) -> Result<Vec<u8>> {
        let rx = self
            .rx
            .lock()
            .map_err(|_| Error::Io("transport poisoned".into()))?;
        rx.recv().map_err(|_| Error::Io("peer hung up".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_cross_in_order() {
        let (a, b) = MemoryTransport::pair();
        a.send(b"one").unwrap();
        a.send(b"two").unwrap();
        assert_eq!(b.recv().unwrap(), b"one");
        assert_eq!(b.recv().unwrap(), b"two");

        b.send(b"reply").unwrap();
        assert_eq!(a.recv().unwrap(), b"reply");
    }

    #[test]
    fn dropped_peer_errors_out() {
        let (a, b) = MemoryTransport::pair();
        drop(b);
        assert!(a.send(b"anyone there").is_err());
        assert!(a.recv().is_err());
    }
}
