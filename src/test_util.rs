//! Throwaway PKI and transport doubles for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use der::{asn1::Ia5String, Encode};
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType, IsCa,
    KeyPair, KeyUsagePurpose,
};
use x509_cert::{
    ext::pkix::{name::GeneralName, AccessDescription, AuthorityInfoAccessSyntax},
    Certificate,
};

use crate::{
    cert_chain::ocsp::OcspClient,
    error::{Error, Result},
};

const AIA_OID: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 1];

/// A CA plus a leaf issued by it, in the PEM shapes loaded from disk.
pub struct IdentityFixture {
    /// Leaf certificate followed by the CA certificate.
    pub cert_pem: String,
    /// PKCS#8 private key of the leaf.
    pub key_pem: String,
}

impl IdentityFixture {
    /// Issues a P-256 leaf for `common_name`, optionally advertising an OCSP responder.
    pub fn issue(common_name: &str, ocsp_url: Option<&str>) -> Self {
        let ca_key = KeyPair::generate().expect("generate CA key");
        let mut ca_params = CertificateParams::default();
        let mut ca_dn = DistinguishedName::new();
        ca_dn.push(DnType::CommonName, format!("{common_name} test CA"));
        ca_params.distinguished_name = ca_dn;
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let ca_cert = ca_params.self_signed(&ca_key).expect("self-sign CA");

        let leaf_key = KeyPair::generate().expect("generate leaf key");
        let mut leaf_params =
            CertificateParams::new(vec![common_name.to_owned()]).expect("leaf params");
        let mut leaf_dn = DistinguishedName::new();
        leaf_dn.push(DnType::CommonName, common_name);
        leaf_params.distinguished_name = leaf_dn;
        if let Some(url) = ocsp_url {
            leaf_params
                .custom_extensions
                .push(CustomExtension::from_oid_content(AIA_OID, aia_extension(url)));
        }
        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &ca_cert, &ca_key)
            .expect("sign leaf");

        Self {
            cert_pem: format!("{}{}", leaf_cert.pem(), ca_cert.pem()),
            key_pem: leaf_key.serialize_pem(),
        }
    }

    /// Parsed certificates, leaf first.
    pub fn certificates(&self) -> Vec<Certificate> {
        Certificate::load_pem_chain(self.cert_pem.as_bytes()).expect("parse fixture PEM")
    }
}

/// A fresh PKCS#8 key unrelated to any fixture certificate.
pub fn unrelated_key_pem() -> String {
    KeyPair::generate()
        .expect("generate key")
        .serialize_pem()
}

fn aia_extension(url: &str) -> Vec<u8> {
    AuthorityInfoAccessSyntax(vec![AccessDescription {
        access_method: der::asn1::ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1"),
        access_location: GeneralName::UniformResourceIdentifier(
            Ia5String::new(url).expect("ascii url"),
        ),
    }])
    .to_der()
    .expect("encode AIA")
}

/// [`OcspClient`] that answers every request with a canned body.
pub struct StaticOcspClient {
    response: Option<Vec<u8>>,
    requests: Mutex<Vec<(String, Vec<u8>)>>,
}

impl StaticOcspClient {
    pub fn new(response: Vec<u8>) -> Self {
        Self {
            response: Some(response),
            requests: Mutex::new(vec![]),
        }
    }

    /// A client whose responder never answers.
    pub fn unreachable() -> Self {
        Self {
            response: None,
            requests: Mutex::new(vec![]),
        }
    }

    /// Requests seen so far as `(url, DER body)` pairs.
    pub fn requests(&self) -> Vec<(String, Vec<u8>)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl OcspClient for StaticOcspClient {
    async fn post(&self, url: &str, request: Vec<u8>) -> Result<Vec<u8>> {
        self.requests
            .lock()
            .expect("requests lock")
            .push((url.to_owned(), request));

        self.response
            .clone()
            .ok_or_else(|| Error::network(format!("{url}: connection refused")))
    }
}
