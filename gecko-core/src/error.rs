use thiserror::Error;

/// Failures reported by the codecs.
///
/// Every variant is a distinct decode failure; encoding an in-memory tree
/// never fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeckoError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unknown opcode 0x{opcode:02X} at offset 0x{offset:X}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("truncated stream at offset 0x{offset:X}: needed {needed} bytes, {available} available")]
    TruncatedStream {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unbalanced block at offset 0x{offset:X}: {reason}")]
    UnbalancedBlock { offset: usize, reason: String },

    #[error("unrecognized text dialect: {0}")]
    UnrecognizedDialect(String),

    #[error("invalid table framing: {0}")]
    InvalidTableFraming(String),
}

pub type Result<T> = std::result::Result<T, GeckoError>;
