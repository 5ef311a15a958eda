use thiserror::Error;

/// Failures produced by the signed exchange pipeline.
///
/// Every variant carries a human readable reason which the HTTP surface
/// forwards verbatim as a plain-text 500 body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad URL or identity material supplied at construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// The OCSP responder could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed certificate material or a responder that answered with garbage.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A chunking or serialization invariant was violated.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Key/certificate mismatch or a failing signature primitive.
    #[error("signing error: {0}")]
    Signing(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Error::Encoding(msg.into())
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Error::Signing(msg.into())
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Encoding(format!("DER: {err}"))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
