//! Signature format conversion
//!
//! Stateless translation between canonical ASN.1 DER and fixed-width
//! big-endian r ‖ s (64 bytes on secp256k1). No low-S normalization happens
//! here; the signing protocol emits normalized signatures.

use crate::error::{Error, Result};

/// Width of one signature component on secp256k1
pub const COMPONENT_LEN: usize = 32;

/// DER → left-zero-padded big-endian r ‖ s
pub fn der_to_raw(der: &[u8]) -> Result<Vec<u8>> {
    let signature = k256::ecdsa::Signature::from_der(der)
        .map_err(|e| Error::InvalidArgument(format!("invalid DER signature: {e}")))?;
    Ok(signature.to_bytes().to_vec())
}

/// Big-endian r ‖ s → canonical DER
pub fn raw_to_der(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() != 2 * COMPONENT_LEN {
        return Err(Error::InvalidArgument(format!(
            "raw signature must be {} bytes, got {}",
            2 * COMPONENT_LEN,
            raw.len()
        )));
    }
    let signature = k256::ecdsa::Signature::from_slice(raw)
        .map_err(|e| Error::InvalidArgument(format!("invalid signature components: {e}")))?;
    Ok(signature.to_der().as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::signature::Signer;
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn der_and_raw_describe_the_same_signature() {
        let key = SigningKey::random(&mut OsRng);
        let signature: k256::ecdsa::Signature = key.sign(b"conversion fixture");

        let der = signature.to_der().as_bytes().to_vec();
        let raw = der_to_raw(&der).unwrap();
        assert_eq!(raw.len(), 64);
        assert_eq!(raw, signature.to_bytes().to_vec());

        let back = raw_to_der(&raw).unwrap();
        assert_eq!(back, der);
    }

    #[test]
    fn garbage_der_is_rejected() {
        assert!(der_to_raw(b"not a signature").is_err());
        assert!(der_to_raw(&[]).is_err());
    }

    #[test]
    fn wrong_raw_length_is_rejected() {
        assert!(raw_to_der(&[0u8; 63]).is_err());
        assert!(raw_to_der(&[0u8; 65]).is_err());
    }

    #[test]
    fn zero_components_are_rejected() {
        // r = s = 0 is not a valid signature
        assert!(raw_to_der(&[0u8; 64]).is_err());
    }
}
