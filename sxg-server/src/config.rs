use std::{path::PathBuf, time::Duration};

use clap::Parser;
use sxg::{context::IdentitySource, identity::Role};

/// Command line and environment configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "sxg-server")]
#[command(version, about = "Serves Signed HTTP Exchanges and their certificate chains", long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory holding the identity PEM files
    #[arg(long, env = "SXG_CERT_DIR", default_value = "cert")]
    pub cert_dir: PathBuf,

    /// Directory holding the sample payloads
    #[arg(long, env = "SXG_CONTENT_DIR", default_value = "contents")]
    pub content_dir: PathBuf,

    /// Timeout for each OCSP request made at startup, in seconds
    #[arg(long, env = "SXG_OCSP_TIMEOUT_SECS", default_value_t = 10)]
    pub ocsp_timeout_secs: u64,

    /// Primary certificate chain (leaf first), relative to the cert directory
    #[arg(long, default_value = "cert.pem")]
    pub cert_file: String,

    /// Primary private key, relative to the cert directory
    #[arg(long, default_value = "cert.key")]
    pub key_file: String,

    /// Alternate certificate chain (leaf first), relative to the cert directory
    #[arg(long, default_value = "alt_cert.pem")]
    pub alt_cert_file: String,

    /// Alternate private key, relative to the cert directory
    #[arg(long, default_value = "alt_cert.key")]
    pub alt_key_file: String,
}

impl Config {
    pub fn ocsp_timeout(&self) -> Duration {
        Duration::from_secs(self.ocsp_timeout_secs)
    }

    pub fn primary_source(&self) -> IdentitySource {
        self.source(Role::Primary, &self.cert_file, &self.key_file)
    }

    pub fn alternate_source(&self) -> IdentitySource {
        self.source(Role::Alternate, &self.alt_cert_file, &self.alt_key_file)
    }

    /// The chain of `cert.pem` is served at `/cert/cert.cbor`.
    fn source(&self, role: Role, cert_file: &str, key_file: &str) -> IdentitySource {
        let stem = cert_file
            .rsplit_once('.')
            .map_or(cert_file, |(stem, _)| stem);

        IdentitySource {
            role,
            cert_path: self.cert_dir.join(cert_file),
            key_path: self.cert_dir.join(key_file),
            chain_path: format!("/cert/{stem}.cbor"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["sxg-server"]).unwrap();

        assert_eq!(config.ocsp_timeout(), Duration::from_secs(10));
        assert_eq!(config.content_dir, PathBuf::from("contents"));

        let primary = config.primary_source();
        assert_eq!(primary.role, Role::Primary);
        assert_eq!(primary.cert_path, PathBuf::from("cert/cert.pem"));
        assert_eq!(primary.key_path, PathBuf::from("cert/cert.key"));
        assert_eq!(primary.chain_path, "/cert/cert.cbor");

        let alternate = config.alternate_source();
        assert_eq!(alternate.role, Role::Alternate);
        assert_eq!(alternate.cert_path, PathBuf::from("cert/alt_cert.pem"));
        assert_eq!(alternate.chain_path, "/cert/alt_cert.cbor");
    }

    #[test]
    fn overrides() {
        let config = Config::try_parse_from([
            "sxg-server",
            "--port",
            "9000",
            "--cert-dir",
            "/etc/sxg",
            "--alt-cert-file",
            "other",
            "--ocsp-timeout-secs",
            "3",
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.ocsp_timeout(), Duration::from_secs(3));
        let alternate = config.alternate_source();
        assert_eq!(alternate.cert_path, PathBuf::from("/etc/sxg/other"));
        assert_eq!(alternate.chain_path, "/cert/other.cbor");
    }
}
