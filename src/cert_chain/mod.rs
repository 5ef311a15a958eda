//! `application/cert-chain+cbor` artifacts served next to signed exchanges.

/// OCSP request construction and responder transport.
pub mod ocsp;

use ciborium::value::Value;
use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::error::{Error, Result};

/// Leading element of every certificate chain artifact.
pub const CHAIN_MAGIC: &str = "\u{1F4DC}\u{26D3}";

/// Media type of the serialized chain.
pub const CONTENT_TYPE: &str = "application/cert-chain+cbor";

/// A certificate chain with the revocation proof of its leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    /// DER certificates, leaf first.
    pub certs: Vec<Vec<u8>>,
    /// Raw OCSP response for the leaf.
    pub ocsp: Vec<u8>,
    /// Optional serialized SCT list for the leaf.
    pub sct: Option<Vec<u8>>,
}

impl CertificateChain {
    /// Collects DER encodings of `certs` together with the leaf's OCSP response.
    pub fn new(certs: &[Certificate], ocsp: Vec<u8>, sct: Option<Vec<u8>>) -> Result<Self> {
        if certs.is_empty() {
            return Err(Error::encoding("certificate chain is empty"));
        }
        let certs = certs
            .iter()
            .map(|cert| cert.to_der())
            .collect::<der::Result<Vec<_>>>()?;

        Ok(Self { certs, ocsp, sct })
    }

    /// Serializes the chain into its CBOR wire form.
    ///
    /// Items are written leaf first. The leaf item carries `cert`, `ocsp` and
    /// the optional `sct`; later items only `cert`. Keys are emitted in
    /// canonical CBOR order (`sct` before `cert` before `ocsp`).
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut items = Vec::with_capacity(self.certs.len() + 1);
        items.push(Value::Text(CHAIN_MAGIC.to_owned()));

        for (i, cert) in self.certs.iter().enumerate() {
            let mut entries = Vec::with_capacity(3);
            if i == 0 {
                if let Some(sct) = &self.sct {
                    entries.push(entry("sct", sct));
                }
            }
            entries.push(entry("cert", cert));
            if i == 0 {
                entries.push(entry("ocsp", &self.ocsp));
            }
            items.push(Value::Map(entries));
        }

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&Value::Array(items), &mut buf)
            .map_err(|e| Error::encoding(format!("failed to encode certificate chain: {e}")))?;
        Ok(buf)
    }

    /// Parses a serialized chain artifact.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        let value: Value = ciborium::de::from_reader(bytes)
            .map_err(|e| Error::encoding(format!("invalid certificate chain CBOR: {e}")))?;

        let items = match value {
            Value::Array(items) => items,
            _ => return Err(Error::encoding("certificate chain is not a CBOR array")),
        };
        let mut items = items.into_iter();

        match items.next() {
            Some(Value::Text(magic)) if magic == CHAIN_MAGIC => {}
            _ => return Err(Error::encoding("certificate chain is missing its magic")),
        }

        let mut certs = Vec::new();
        let mut ocsp = None;
        let mut sct = None;
        for (i, item) in items.enumerate() {
            let entries = match item {
                Value::Map(entries) => entries,
                _ => return Err(Error::encoding(format!("chain item {i} is not a map"))),
            };
            let mut cert = None;
            for (key, value) in entries {
                let (key, value) = match (key, value) {
                    (Value::Text(key), Value::Bytes(value)) => (key, value),
                    _ => return Err(Error::encoding(format!("chain item {i} has a bad entry"))),
                };
                match (key.as_str(), i) {
                    ("cert", _) => cert = Some(value),
                    ("ocsp", 0) => ocsp = Some(value),
                    ("sct", _) => {
                        if i == 0 {
                            sct = Some(value);
                        }
                    }
                    (other, _) => {
                        return Err(Error::encoding(format!(
                            "chain item {i} has unexpected key '{other}'"
                        )))
                    }
                }
            }
            certs.push(cert.ok_or_else(|| Error::encoding(format!("chain item {i} has no cert")))?);
        }

        if certs.is_empty() {
            return Err(Error::encoding("certificate chain is empty"));
        }
        let ocsp = ocsp.ok_or_else(|| Error::encoding("leaf item has no ocsp response"))?;

        Ok(Self { certs, ocsp, sct })
    }

    /// Decodes the DER certificates held by this chain.
    pub fn certificates(&self) -> Result<Vec<Certificate>> {
        self.certs
            .iter()
            .map(|der| Certificate::from_der(der).map_err(Error::from))
            .collect()
    }
}

fn entry(key: &str, value: &[u8]) -> (Value, Value) {
    (Value::Text(key.to_owned()), Value::Bytes(value.to_vec()))
}

/// Serializes `{leaf, issuer, ocsp, sct}` into a chain artifact.
///
/// # Arguments
///
/// * `leaf` - The signing certificate.
/// * `issuer` - The certificate that issued `leaf`.
/// * `ocsp` - Raw OCSP response covering `leaf`.
/// * `sct` - Optional SCT list for `leaf`.
///
/// # Returns
///
/// The CBOR bytes served at the identity's chain path.
pub fn build_chain(
    leaf: &Certificate,
    issuer: &Certificate,
    ocsp: &[u8],
    sct: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let chain = CertificateChain::new(
        &[leaf.clone(), issuer.clone()],
        ocsp.to_vec(),
        sct.map(<[u8]>::to_vec),
    )?;
    chain.to_cbor()
}

/// Parses an artifact produced by [`build_chain`].
pub fn parse_chain(bytes: &[u8]) -> Result<CertificateChain> {
    CertificateChain::from_cbor(bytes)
}
