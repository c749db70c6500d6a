use thiserror::Error;

/// Errors raised by the protocol core.
///
/// All protocol-level errors are terminal: neither party emits a partial
/// result after any of these.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run configuration: set size out of range, missing input file,
    /// bit count not a multiple of the value width.
    #[error("configuration error: {0}")]
    Config(String),

    /// A message that violates the fixed protocol transcript: wrong variant,
    /// size mismatch, missing wire or table in received material.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Authentication failure while decrypting garbled material.
    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// Transport closed mid-protocol.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O failure in the circuit-cache file layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed circuit file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for the authentication-tag mismatch raised by gate
    /// decryption, identifying the offending gate.
    pub(crate) fn bad_tag(gate_id: u32) -> Self {
        Error::Crypto(format!(
            "authentication tag mismatch on garbled gate {gate_id}"
        ))
    }
}
