use async_trait::async_trait;
use der::{
    asn1::{Null, ObjectIdentifier, OctetString},
    Decode, Encode, Sequence,
};
use sha1::{Digest, Sha1};
use x509_cert::{
    ext::pkix::{name::GeneralName, AuthorityInfoAccessSyntax},
    serial_number::SerialNumber,
    spki::AlgorithmIdentifierOwned,
    Certificate,
};

use crate::error::{Error, Result};

/// id-pe-authorityInfoAccess
const ID_PE_AUTHORITY_INFO_ACCESS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.1.1");
/// id-ad-ocsp
const ID_AD_OCSP: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1");
/// id-sha1
const ID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");

pub const REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";
pub const RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";

/// RFC 6960 `CertID`.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertId {
    pub hash_algorithm: AlgorithmIdentifierOwned,
    pub issuer_name_hash: OctetString,
    pub issuer_key_hash: OctetString,
    pub serial_number: SerialNumber,
}

/// RFC 6960 `Request`, without extensions.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Request {
    pub req_cert: CertId,
}

/// RFC 6960 `TBSRequest` with the default version and no requestor name.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TbsRequest {
    pub request_list: Vec<Request>,
}

/// Unsigned RFC 6960 `OCSPRequest`.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct OcspRequest {
    pub tbs_request: TbsRequest,
}

impl OcspRequest {
    /// Builds a single-certificate request for `leaf` issued by `issuer`.
    ///
    /// Uses SHA-1 for the issuer name and key hashes, which every public
    /// responder accepts.
    pub fn for_certificate(leaf: &Certificate, issuer: &Certificate) -> Result<Self> {
        let issuer_name = issuer.tbs_certificate.subject.to_der()?;
        let issuer_key = issuer
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes();

        let cert_id = CertId {
            hash_algorithm: AlgorithmIdentifierOwned {
                oid: ID_SHA1,
                parameters: Some(Null.into()),
            },
            issuer_name_hash: OctetString::new(Sha1::digest(&issuer_name).to_vec())?,
            issuer_key_hash: OctetString::new(Sha1::digest(issuer_key).to_vec())?,
            serial_number: leaf.tbs_certificate.serial_number.clone(),
        };

        Ok(OcspRequest {
            tbs_request: TbsRequest {
                request_list: vec![Request { req_cert: cert_id }],
            },
        })
    }
}

/// Lists the OCSP responder URLs advertised in the certificate's
/// Authority Information Access extension.
pub fn responder_urls(cert: &Certificate) -> Result<Vec<String>> {
    let Some(extensions) = cert.tbs_certificate.extensions.as_ref() else {
        return Ok(vec![]);
    };

    let mut urls = Vec::new();
    for ext in extensions
        .iter()
        .filter(|ext| ext.extn_id == ID_PE_AUTHORITY_INFO_ACCESS)
    {
        let aia = AuthorityInfoAccessSyntax::from_der(ext.extn_value.as_bytes())
            .map_err(|e| Error::protocol(format!("malformed authority info access: {e}")))?;
        for access in aia.0 {
            if access.access_method != ID_AD_OCSP {
                continue;
            }
            if let GeneralName::UniformResourceIdentifier(uri) = access.access_location {
                urls.push(uri.to_string());
            }
        }
    }

    Ok(urls)
}

/// Transport used to reach an OCSP responder.
#[async_trait]
pub trait OcspClient {
    /// POSTs a DER encoded OCSP request to `url` and returns the raw response body.
    async fn post(&self, url: &str, request: Vec<u8>) -> Result<Vec<u8>>;
}

/// Fetches the OCSP response for the leaf of `certs`.
///
/// # Arguments
///
/// * `client` - Transport used to reach the responder.
/// * `certs` - Certificate chain, leaf first, issuer second.
///
/// # Returns
///
/// The raw OCSP response body. Fails with a protocol error when the chain has
/// no issuer or the leaf advertises no responder, and with a network error when
/// the responder cannot be reached.
pub async fn fetch_ocsp(
    client: &(dyn OcspClient + Send + Sync),
    certs: &[Certificate],
) -> Result<Vec<u8>> {
    if certs.len() < 2 {
        return Err(Error::protocol(format!(
            "OCSP needs a leaf and its issuer, got {} certificate(s)",
            certs.len()
        )));
    }
    let (leaf, issuer) = (&certs[0], &certs[1]);

    let url = responder_urls(leaf)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::protocol("leaf certificate advertises no OCSP responder"))?;

    let request = OcspRequest::for_certificate(leaf, issuer)?.to_der()?;

    log::info!("Fetching OCSP response from {url}");
    let response = client.post(&url, request).await?;
    log::debug!("OCSP responder {url} returned {} bytes", response.len());

    Ok(response)
}

#[cfg(feature = "ocsp-http")]
pub use http::HttpOcspClient;

#[cfg(feature = "ocsp-http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{OcspClient, REQUEST_CONTENT_TYPE, RESPONSE_CONTENT_TYPE};
    use crate::error::{Error, Result};

    /// [`OcspClient`] backed by `reqwest` with a hard request timeout.
    #[derive(Clone, Debug)]
    pub struct HttpOcspClient {
        client: reqwest::Client,
    }

    impl HttpOcspClient {
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| Error::config(format!("failed to build OCSP client: {e}")))?;

            Ok(Self { client })
        }
    }

    #[async_trait]
    impl OcspClient for HttpOcspClient {
        async fn post(&self, url: &str, request: Vec<u8>) -> Result<Vec<u8>> {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, REQUEST_CONTENT_TYPE)
                .header(reqwest::header::ACCEPT, RESPONSE_CONTENT_TYPE)
                .body(request)
                .send()
                .await
                .map_err(|e| Error::network(format!("OCSP responder {url} unreachable: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::protocol(format!(
                    "OCSP responder {url} answered with status {status}"
                )));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| Error::network(format!("failed to read OCSP response: {e}")))?;

            Ok(body.to_vec())
        }
    }
}
