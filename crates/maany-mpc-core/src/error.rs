//! Error types for the MPC engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving the engine
///
/// Each variant corresponds to one stable [`ErrorKind`]; the message carries
/// the operation-specific detail.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Malformed input: wrong length, unknown enum value, bad framing
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Curve or scheme that is reserved but not implemented
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Operation called in the wrong session state
    #[error("protocol state: {0}")]
    ProtocolState(String),

    /// Cryptographic failure: bad point, tag mismatch, verification failure
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Injected RNG callback reported failure
    #[error("rng failure: {0}")]
    Rng(String),

    /// Transport-level failure, including aborted sessions
    #[error("io: {0}")]
    Io(String),

    /// Reserved for policy enforcement
    #[error("policy: {0}")]
    Policy(String),

    /// Allocation failure
    #[error("out of memory: {0}")]
    Memory(String),

    /// Anything else
    #[error("general error: {0}")]
    General(String),
}

impl Error {
    /// The stable kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::ProtocolState(_) => ErrorKind::ProtocolState,
            Error::Crypto(_) => ErrorKind::Crypto,
            Error::Rng(_) => ErrorKind::Rng,
            Error::Io(_) => ErrorKind::Io,
            Error::Policy(_) => ErrorKind::Policy,
            Error::Memory(_) => ErrorKind::Memory,
            Error::General(_) => ErrorKind::General,
        }
    }
}

/// Stable error taxonomy with the wire encoding used by the flat API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorKind {
    Ok = 0,
    General = 1,
    InvalidArgument = 2,
    Unsupported = 3,
    ProtocolState = 4,
    Crypto = 5,
    Rng = 6,
    Io = 7,
    Policy = 8,
    Memory = 9,
}

impl ErrorKind {
    /// Numeric code as carried across the flat API
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Decode a numeric code; unknown codes map to `General`
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ErrorKind::Ok,
            2 => ErrorKind::InvalidArgument,
            3 => ErrorKind::Unsupported,
            4 => ErrorKind::ProtocolState,
            5 => ErrorKind::Crypto,
            6 => ErrorKind::Rng,
            7 => ErrorKind::Io,
            8 => ErrorKind::Policy,
            9 => ErrorKind::Memory,
            _ => ErrorKind::General,
        }
    }
}

/// Human-readable name for an error kind
pub fn error_string(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Ok => "ok",
        ErrorKind::General => "general error",
        ErrorKind::InvalidArgument => "invalid argument",
        ErrorKind::Unsupported => "unsupported",
        ErrorKind::ProtocolState => "protocol state",
        ErrorKind::Crypto => "crypto error",
        ErrorKind::Rng => "rng failure",
        ErrorKind::Io => "io",
        ErrorKind::Policy => "policy",
        ErrorKind::Memory => "out of memory",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_round_trip() {
        for kind in [
            ErrorKind::Ok,
            ErrorKind::General,
            ErrorKind::InvalidArgument,
            ErrorKind::Unsupported,
            ErrorKind::ProtocolState,
            ErrorKind::Crypto,
            ErrorKind::Rng,
            ErrorKind::Io,
            ErrorKind::Policy,
            ErrorKind::Memory,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), kind);
        }
        assert_eq!(ErrorKind::from_code(4711), ErrorKind::General);
    }

    #[test]
    fn error_maps_to_kind() {
        let err = Error::Crypto("tag mismatch".into());
        assert_eq!(err.kind(), ErrorKind::Crypto);
        assert_eq!(error_string(err.kind()), "crypto error");
    }
}
