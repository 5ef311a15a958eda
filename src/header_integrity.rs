//! `header-integrity` digests advertised on `allowed-alt-sxg` links.

use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

use crate::{exchange, headers::ResponseHeaders};

/// Computes the header-integrity digest of the subresource exchange that
/// would be served for `url`.
///
/// The header set is the one every subresource exchange carries
/// ([`ResponseHeaders::subresource`]) plus `content-type` and the MI headers,
/// serialized by the same code path as exchange assembly.
///
/// # Arguments
///
/// * `url` - URL of the advertised resource. Only used for logging.
/// * `payload` - The resource body.
/// * `content_type` - The resource's `content-type`.
/// * `cors` - Whether the exchange carries `access-control-allow-origin: *`.
///
/// # Returns
///
/// `sha256-<base64>`, or an empty string when the header block cannot be built.
pub fn header_integrity(url: &str, payload: &[u8], content_type: &str, cors: bool) -> String {
    match exchange::prepare(content_type, ResponseHeaders::subresource(cors), payload) {
        Ok(prepared) => {
            let digest = format!(
                "sha256-{}",
                BASE64.encode(Sha256::digest(&prepared.header_block))
            );
            log::trace!("header-integrity of {url}: {digest}");
            digest
        }
        Err(e) => {
            log::error!("Failed to compute header-integrity of {url}: {e}");
            String::new()
        }
    }
}
