//! `application/signed-exchange;v=b3` assembly.

use std::io::Write;

use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use url::Url;

use crate::{
    error::{Error, Result},
    headers::ResponseHeaders,
    identity::SigningIdentity,
    mice::{self, EncodedPayload},
    signer::{self, SignatureHeader, SignatureInput},
};

/// Media type of a serialized exchange.
pub const CONTENT_TYPE: &str = "application/signed-exchange;v=b3";

/// Leading bytes of every exchange.
pub const MAGIC: &[u8; 8] = b"sxg1-b3\0";

/// Response status carried by every exchange.
pub const STATUS: u16 = 200;

const MAX_U24: usize = (1 << 24) - 1;

/// Everything needed to produce one exchange.
#[derive(Debug, Clone)]
pub struct ExchangeRequest<'a> {
    /// Absolute `https` URL the exchange claims to be a response for.
    pub url: String,
    pub content_type: String,
    /// Signed response headers, not including `content-type` or the MI headers.
    pub headers: ResponseHeaders,
    pub payload: &'a [u8],
    /// Signing time.
    pub date: DateTime<Utc>,
    /// Absolute `https` URL of the identity's chain artifact.
    pub cert_url: String,
    /// Absolute `https` URL clients revalidate against.
    pub validity_url: String,
    pub identity: &'a SigningIdentity,
}

/// The signed response parts of an exchange before framing.
#[derive(Debug, Clone)]
pub struct PreparedResponse {
    /// All signed headers, including `content-type` and the MI headers.
    pub headers: ResponseHeaders,
    pub encoded: EncodedPayload,
    /// Canonical CBOR of `headers` with `:status`.
    pub header_block: Vec<u8>,
}

/// Adds `content-type` and the MI headers to `headers`, MI-encodes `payload`
/// and serializes the resulting header block.
///
/// Both assembly and header-integrity digests go through here so that the
/// digest advertised for a resource always matches the exchange served for it.
pub fn prepare(
    content_type: &str,
    mut headers: ResponseHeaders,
    payload: &[u8],
) -> Result<PreparedResponse> {
    let encoded = mice::encode(payload, mice::DEFAULT_RECORD_SIZE)?;

    headers.add("content-type", content_type);
    headers.add("content-encoding", mice::CONTENT_ENCODING);
    headers.add("digest", encoded.digest_header());
    let header_block = headers.to_cbor(STATUS)?;

    Ok(PreparedResponse {
        headers,
        encoded,
        header_block,
    })
}

/// A signed exchange ready to be written out.
#[derive(Debug, Clone)]
pub struct Exchange {
    fallback_url: String,
    signature: SignatureHeader,
    signature_bytes: Vec<u8>,
    header_block: Vec<u8>,
    body: Vec<u8>,
}

impl Exchange {
    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    pub fn signature(&self) -> &SignatureHeader {
        &self.signature
    }

    pub fn header_block(&self) -> &[u8] {
        &self.header_block
    }

    /// The MI encoded body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Total serialized length.
    pub fn encoded_len(&self) -> usize {
        MAGIC.len()
            + 2
            + self.fallback_url.len()
            + 6
            + self.signature_bytes.len()
            + self.header_block.len()
            + self.body.len()
    }

    /// Writes the exchange in its wire format.
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&(self.fallback_url.len() as u16).to_be_bytes())?;
        w.write_all(self.fallback_url.as_bytes())?;
        w.write_all(&u24(self.signature_bytes.len()))?;
        w.write_all(&u24(self.header_block.len()))?;
        w.write_all(&self.signature_bytes)?;
        w.write_all(&self.header_block)?;
        w.write_all(&self.body)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut buf)
            .unwrap_or_else(|_| unreachable!("writing to a Vec cannot fail"));
        buf
    }
}

fn u24(n: usize) -> [u8; 3] {
    let b = (n as u32).to_be_bytes();
    [b[1], b[2], b[3]]
}

/// Builds and signs an exchange using the operating system RNG.
pub fn assemble(request: ExchangeRequest<'_>) -> Result<Exchange> {
    assemble_with_rng(request, &mut OsRng)
}

/// Builds and signs an exchange.
///
/// # Arguments
///
/// * `request` - The response to sign and the identity to sign it with.
/// * `rng` - Randomness for the ECDSA signature.
///
/// # Returns
///
/// The complete exchange. Nothing is produced when any step fails: URLs that
/// are not absolute `https` give a configuration error, oversized fields an
/// encoding error and a key that does not match the leaf a signing error.
pub fn assemble_with_rng<R: CryptoRng + RngCore>(
    request: ExchangeRequest<'_>,
    rng: &mut R,
) -> Result<Exchange> {
    require_https("request URL", &request.url)?;
    require_https("cert URL", &request.cert_url)?;
    require_https("validity URL", &request.validity_url)?;
    if request.url.len() > u16::MAX as usize {
        return Err(Error::encoding("fallback URL does not fit a 2-byte length"));
    }

    let prepared = prepare(&request.content_type, request.headers, request.payload)?;
    if prepared.header_block.len() > MAX_U24 {
        return Err(Error::encoding("response headers do not fit a 3-byte length"));
    }

    let signature = signer::sign_with_rng(
        &SignatureInput {
            request_url: &request.url,
            header_block: &prepared.header_block,
            cert_url: &request.cert_url,
            validity_url: &request.validity_url,
            date: request.date,
        },
        request.identity,
        rng,
    )?;
    let signature_bytes = signature.to_string().into_bytes();
    if signature_bytes.len() > MAX_U24 {
        return Err(Error::encoding("signature header does not fit a 3-byte length"));
    }

    log::debug!(
        "Assembled exchange for {} ({} payload bytes, {} records)",
        request.url,
        request.payload.len(),
        prepared.encoded.records.len()
    );

    Ok(Exchange {
        fallback_url: request.url,
        signature,
        signature_bytes,
        header_block: prepared.header_block,
        body: prepared.encoded.body,
    })
}

/// URLs end up inside quoted signature parameters, so only canonical
/// `https` URLs with plain hostnames are accepted.
fn require_https(what: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::config(format!("{what} '{raw}' is invalid: {e}")))?;
    let plain_host = url
        .host_str()
        .is_some_and(|host| host.chars().all(is_host_char));
    if url.scheme() != "https" || !plain_host {
        return Err(Error::config(format!(
            "{what} '{raw}' must be an absolute https URL"
        )));
    }
    if url.as_str() != raw {
        return Err(Error::config(format!(
            "{what} '{raw}' is not in canonical form ('{url}')"
        )));
    }
    Ok(url)
}

/// Characters allowed in a hostname or IP literal.
pub fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | ':' | '[' | ']')
}
