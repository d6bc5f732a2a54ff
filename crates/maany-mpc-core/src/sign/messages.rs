//! Signing message types

use serde::{Deserialize, Serialize};

/// Round 1, device → server: nonce commitment point and message binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMsg1 {
    /// k1 · G, SEC1 compressed
    pub r1: Vec<u8>,
    /// sha256(transcript ‖ sha256(M) ‖ extra_aad); both parties must have
    /// been handed the same message
    pub binding: [u8; 32],
}

/// Round 2, server → device: nonce point and the encrypted signature share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignMsg2 {
    /// k2 · G, SEC1 compressed
    pub r2: Vec<u8>,
    /// Paillier ciphertext of the blinded s-share, big-endian
    pub c3: Vec<u8>,
}
