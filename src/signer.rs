//! Signature header construction for `b3` signed exchanges.

use std::fmt;

use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::{signature::RandomizedSigner, Signature};
use rand::{rngs::OsRng, CryptoRng, RngCore};

use crate::{
    error::{Error, Result},
    identity::{ensure_key_matches, SigningIdentity},
};

/// Label of the single signature carried by each exchange.
pub const SIGNATURE_LABEL: &str = "label";

/// Integrity scheme named in the signature header.
pub const INTEGRITY: &str = "digest/mi-sha256-03";

const CONTEXT_STRING: &[u8] = b"HTTP Exchange 1 b3";

/// How long a signature stays valid after its `date`.
pub fn signature_validity() -> Duration {
    Duration::hours(24)
}

/// Everything the signature covers besides the identity itself.
#[derive(Debug, Clone)]
pub struct SignatureInput<'a> {
    /// The exchange's request URL.
    pub request_url: &'a str,
    /// Canonical CBOR response headers, including the MI digest.
    pub header_block: &'a [u8],
    /// Where clients fetch the certificate chain.
    pub cert_url: &'a str,
    /// Where clients revalidate the exchange.
    pub validity_url: &'a str,
    /// Signing time.
    pub date: DateTime<Utc>,
}

/// The parsed contents of a `Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub label: String,
    /// DER encoded ECDSA P-256 signature.
    pub sig: Vec<u8>,
    pub integrity: String,
    pub cert_url: String,
    pub cert_sha256: [u8; 32],
    pub validity_url: String,
    pub date: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl fmt::Display for SignatureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; sig=*{}*; integrity=\"{}\"; cert-url=\"{}\"; cert-sha256=*{}*; validity-url=\"{}\"; date={}; expires={}",
            self.label,
            BASE64.encode(&self.sig),
            self.integrity,
            self.cert_url,
            BASE64.encode(self.cert_sha256),
            self.validity_url,
            self.date.timestamp(),
            self.expires.timestamp(),
        )
    }
}

/// Signs `input` with the identity's key using the operating system RNG.
pub fn sign(input: &SignatureInput<'_>, identity: &SigningIdentity) -> Result<SignatureHeader> {
    sign_with_rng(input, identity, &mut OsRng)
}

/// Signs `input` with the identity's key, drawing signature randomness from `rng`.
///
/// # Arguments
///
/// * `input` - URL, header block, URLs and signing time to cover.
/// * `identity` - Certificate and key to sign with.
/// * `rng` - Extra entropy for the ECDSA nonce. [`ZeroRng`] makes the output reproducible.
///
/// # Returns
///
/// The signature header, or a signing error when the key does not belong to
/// the identity's leaf certificate.
pub fn sign_with_rng<R: CryptoRng + RngCore>(
    input: &SignatureInput<'_>,
    identity: &SigningIdentity,
    rng: &mut R,
) -> Result<SignatureHeader> {
    ensure_key_matches(identity.leaf(), identity.signing_key())?;

    let expires = input.date + signature_validity();
    let message = signed_message(input, identity.cert_sha256(), expires)?;

    let signature: Signature = identity
        .signing_key()
        .try_sign_with_rng(rng, &message)
        .map_err(|e| Error::signing(format!("ECDSA signing failed: {e}")))?;

    log::debug!(
        "Signed {} with {} identity, expires {expires}",
        input.request_url,
        identity.role()
    );

    Ok(SignatureHeader {
        label: SIGNATURE_LABEL.to_owned(),
        sig: signature.to_der().as_bytes().to_vec(),
        integrity: INTEGRITY.to_owned(),
        cert_url: input.cert_url.to_owned(),
        cert_sha256: *identity.cert_sha256(),
        validity_url: input.validity_url.to_owned(),
        date: input.date,
        expires,
    })
}

/// Builds the byte string a `b3` signature is computed over.
pub fn signed_message(
    input: &SignatureInput<'_>,
    cert_sha256: &[u8; 32],
    expires: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let date = unix_seconds(input.date)?;
    let expires = unix_seconds(expires)?;

    let mut msg = Vec::with_capacity(
        64 + CONTEXT_STRING.len() + 1 + 33 + 32 + input.validity_url.len()
            + input.request_url.len()
            + input.header_block.len()
            + 24,
    );
    msg.extend_from_slice(&[0x20; 64]);
    msg.extend_from_slice(CONTEXT_STRING);
    msg.push(0);
    msg.push(cert_sha256.len() as u8);
    msg.extend_from_slice(cert_sha256);
    push_length_prefixed(&mut msg, input.validity_url.as_bytes());
    msg.extend_from_slice(&date.to_be_bytes());
    msg.extend_from_slice(&expires.to_be_bytes());
    push_length_prefixed(&mut msg, input.request_url.as_bytes());
    push_length_prefixed(&mut msg, input.header_block);

    Ok(msg)
}

fn push_length_prefixed(msg: &mut Vec<u8>, bytes: &[u8]) {
    msg.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    msg.extend_from_slice(bytes);
}

fn unix_seconds(time: DateTime<Utc>) -> Result<u64> {
    u64::try_from(time.timestamp())
        .map_err(|_| Error::signing(format!("signing time {time} predates the unix epoch")))
}

/// Randomness source that only yields zero bytes.
///
/// ECDSA here is RFC 6979 deterministic with the RNG output mixed in, so a
/// zero source gives byte-identical signatures for identical inputs. Tests only.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZeroRng;

impl RngCore for ZeroRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        dest.fill(0);
        Ok(())
    }
}

impl CryptoRng for ZeroRng {}
