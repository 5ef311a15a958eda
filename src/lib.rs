//! Library for producing Signed HTTP Exchanges (`application/signed-exchange;v=b3`).
//!
//! This crate provides the exchange pipeline (Merkle Integrity encoding,
//! signing and framing), certificate chain artifacts with OCSP, header-integrity
//! digests for cross-linked preloads, and the declarative scenario table served
//! by `sxg-server`.

/// `application/cert-chain+cbor` artifacts and OCSP fetching
pub mod cert_chain;

/// Sample payloads loaded from disk
pub mod content;

/// Process-wide state shared by request handlers
pub mod context;

/// Error taxonomy
pub mod error;

/// Exchange assembly and wire format
pub mod exchange;

/// Header-integrity digests for `allowed-alt-sxg` links
pub mod header_integrity;

/// Signed response headers and their canonical CBOR encoding
pub mod headers;

/// Certificate and key pairs exchanges are signed with
pub mod identity;

/// `link` header vocabulary
pub mod link;

/// Merkle Integrity content encoding (mi-sha256-03)
pub mod mice;

/// Route table of served exchanges
pub mod scenario;

/// Exchange signature construction
pub mod signer;

/// Test fixtures: throwaway PKI and OCSP doubles
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use error::{Error, Result};
