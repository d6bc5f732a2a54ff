//! Key generation and refresh message types

use serde::{Deserialize, Serialize};

/// Round 1, device → server: commitment to the device's public share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg1 {
    /// sha256(transcript ‖ Q1 ‖ blind)
    pub commitment: [u8; 32],
}

/// Round 2, server → device: the server's public share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg2 {
    /// SEC1 compressed point
    pub q2: Vec<u8>,
}

/// Round 3, device → server: commitment opening and the Paillier binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg3 {
    /// SEC1 compressed point
    pub q1: Vec<u8>,
    /// Opening of the round-1 commitment
    pub blind: [u8; 32],
    /// Device's Paillier modulus, big-endian
    pub paillier_n: Vec<u8>,
    /// Enc(x1) under the device's Paillier key, big-endian
    pub c_key: Vec<u8>,
}

/// Round 4, server → device: confirmation that both sides derived the same
/// joint public key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenMsg4 {
    /// sha256(transcript ‖ "confirm" ‖ Q)
    pub confirm: [u8; 32],
}

/// Round 1, device → server: commitment to the device's refresh offset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshMsg1 {
    /// sha256(transcript ‖ delta1 ‖ blind)
    pub commitment: [u8; 32],
}

/// Round 2, server → device: the server's refresh offset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshMsg2 {
    /// Scalar, big-endian
    pub delta2: [u8; 32],
}

/// Round 3, device → server: offset opening, the new device public share
/// and the re-keyed Paillier binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshMsg3 {
    /// Scalar, big-endian
    pub delta1: [u8; 32],
    /// Opening of the round-1 commitment
    pub blind: [u8; 32],
    /// x1' · G, SEC1 compressed
    pub q1: Vec<u8>,
    /// Fresh Paillier modulus, big-endian
    pub paillier_n: Vec<u8>,
    /// Enc(x1') under the fresh Paillier key, big-endian
    pub c_key: Vec<u8>,
}

/// Round 4, server → device: confirmation that the joint key is unchanged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshMsg4 {
    /// sha256(transcript ‖ "refresh-confirm" ‖ Q)
    pub confirm: [u8; 32],
}
