use std::{fs, path::Path};

use der::{
    asn1::{ObjectIdentifier, PrintableStringRef, Utf8StringRef},
    Encode,
};
use p256::{
    ecdsa::{SigningKey, VerifyingKey},
    pkcs8::DecodePrivateKey,
    SecretKey,
};
use sha2::{Digest, Sha256};
use strum::Display;
use x509_cert::Certificate;

use crate::{
    cert_chain::ocsp::responder_urls,
    error::{Error, Result},
};

/// id-at-commonName
const ID_AT_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");

/// Path suffix of the revalidation resource on every origin.
pub const VALIDITY_PATH: &str = "/cert/null.validity.msg";

/// Which of the two configured identities a resource is signed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Role {
    #[strum(serialize = "primary")]
    Primary,
    #[strum(serialize = "alternate")]
    Alternate,
}

/// A certificate chain and private key able to sign exchanges for one origin.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Clone)]
pub struct SigningIdentity {
    role: Role,
    certs: Vec<Certificate>,
    key: SigningKey,
    chain_path: String,
    origin: String,
    cert_sha256: [u8; 32],
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("role", &self.role)
            .field("origin", &self.origin)
            .field("chain_path", &self.chain_path)
            .field("cert_sha256", &hex::encode(self.cert_sha256))
            .finish_non_exhaustive()
    }
}

impl SigningIdentity {
    /// Builds an identity from PEM material.
    ///
    /// # Arguments
    ///
    /// * `role` - Which configured identity this is.
    /// * `cert_pem` - Leaf certificate followed by its issuer.
    /// * `key_pem` - The leaf's P-256 private key, PKCS#8 or SEC1.
    /// * `chain_path` - Path the chain artifact is served on, e.g. `/cert/cert.cbor`.
    ///
    /// # Returns
    ///
    /// The identity, or a protocol error if the chain is malformed and a
    /// signing error if the key does not belong to the leaf.
    pub fn from_pem(role: Role, cert_pem: &[u8], key_pem: &str, chain_path: &str) -> Result<Self> {
        let certs = Certificate::load_pem_chain(cert_pem)
            .map_err(|e| Error::protocol(format!("failed to parse certificates: {e}")))?;
        if certs.len() < 2 {
            return Err(Error::protocol(format!(
                "{role} identity needs a leaf and its issuer, got {} certificate(s)",
                certs.len()
            )));
        }
        if certs[0].tbs_certificate.issuer != certs[1].tbs_certificate.subject {
            return Err(Error::protocol(format!(
                "{role} leaf is not issued by the second certificate"
            )));
        }
        if responder_urls(&certs[0])?.is_empty() {
            return Err(Error::protocol(format!(
                "{role} leaf certificate advertises no OCSP responder"
            )));
        }

        let key = parse_private_key(key_pem)?;
        ensure_key_matches(&certs[0], &key)?;

        let origin = common_name(&certs[0])?;
        if !chain_path.starts_with('/') {
            return Err(Error::config(format!(
                "chain path '{chain_path}' must be absolute"
            )));
        }

        let cert_sha256: [u8; 32] = Sha256::digest(certs[0].to_der()?).into();

        log::info!("Loaded {role} signing identity for {origin}");

        Ok(Self {
            role,
            certs,
            key,
            chain_path: chain_path.to_owned(),
            origin,
            cert_sha256,
        })
    }

    /// Reads the PEM files at `cert_path` and `key_path`.
    pub fn load(role: Role, cert_path: &Path, key_path: &Path, chain_path: &str) -> Result<Self> {
        let cert_pem = fs::read(cert_path).map_err(|e| {
            Error::config(format!("failed to read {}: {e}", cert_path.display()))
        })?;
        let key_pem = fs::read_to_string(key_path).map_err(|e| {
            Error::config(format!("failed to read {}: {e}", key_path.display()))
        })?;

        Self::from_pem(role, &cert_pem, &key_pem, chain_path)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Host name this identity signs for, taken from the leaf's subject CN.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn chain_path(&self) -> &str {
        &self.chain_path
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certs
    }

    pub fn leaf(&self) -> &Certificate {
        &self.certs[0]
    }

    pub fn issuer(&self) -> &Certificate {
        &self.certs[1]
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    /// SHA-256 of the leaf's DER encoding.
    pub fn cert_sha256(&self) -> &[u8; 32] {
        &self.cert_sha256
    }

    /// Revalidation URL for exchanges signed by this identity.
    pub fn validity_url(&self) -> String {
        format!("https://{}{VALIDITY_PATH}", self.origin)
    }

    /// Absolute URL of `path` on this identity's origin.
    pub fn url_for(&self, path: &str) -> String {
        format!("https://{}{path}", self.origin)
    }

    /// Returns a copy of this identity that signs with `key_pem` instead,
    /// skipping the key check so a mismatch surfaces at signing time.
    pub fn with_unchecked_key(&self, key_pem: &str) -> Result<Self> {
        Ok(Self {
            key: parse_private_key(key_pem)?,
            ..self.clone()
        })
    }
}

/// Returns the subject common name of `cert`.
pub fn common_name(cert: &Certificate) -> Result<String> {
    for rdn in cert.tbs_certificate.subject.0.iter() {
        for attr in rdn.0.iter() {
            if attr.oid != ID_AT_COMMON_NAME {
                continue;
            }
            if let Ok(cn) = attr.value.decode_as::<Utf8StringRef<'_>>() {
                return Ok(cn.as_str().to_owned());
            }
            if let Ok(cn) = attr.value.decode_as::<PrintableStringRef<'_>>() {
                return Ok(cn.as_str().to_owned());
            }
            return Err(Error::protocol("subject common name has an unsupported string type"));
        }
    }

    Err(Error::protocol("certificate has no subject common name"))
}

fn parse_private_key(pem: &str) -> Result<SigningKey> {
    if let Ok(key) = SigningKey::from_pkcs8_pem(pem) {
        return Ok(key);
    }
    SecretKey::from_sec1_pem(pem)
        .map(SigningKey::from)
        .map_err(|e| Error::config(format!("unsupported private key: {e}")))
}

/// Ensures `key` is the private half of `leaf`'s public key.
pub(crate) fn ensure_key_matches(leaf: &Certificate, key: &SigningKey) -> Result<()> {
    let spki = leaf
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    let leaf_key = VerifyingKey::from_sec1_bytes(spki)
        .map_err(|_| Error::signing("leaf certificate does not carry a P-256 key"))?;

    if &leaf_key != key.verifying_key() {
        return Err(Error::signing(
            "private key does not match the leaf certificate",
        ));
    }
    Ok(())
}
