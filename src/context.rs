//! Process-wide state built once at startup and shared read-only by handlers.

use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};

use crate::{
    cert_chain::{build_chain, ocsp::{fetch_ocsp, OcspClient}},
    content::ContentStore,
    error::{Error, Result},
    exchange::{self, Exchange, ExchangeRequest},
    identity::{Role, SigningIdentity},
    scenario::{Catalog, Resource, ScenarioTable},
};

/// Exchanges are dated this far in the past to tolerate client clock skew.
pub fn signing_backdate() -> Duration {
    Duration::seconds(10)
}

/// Files an identity is loaded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentitySource {
    pub role: Role,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Path the chain artifact is served on.
    pub chain_path: String,
}

/// A signing identity together with its serialized certificate chain.
#[derive(Debug, Clone)]
pub struct LoadedIdentity {
    pub identity: SigningIdentity,
    /// `application/cert-chain+cbor` bytes, fetched OCSP included.
    pub chain: Bytes,
}

impl LoadedIdentity {
    /// Fetches OCSP for `identity` and builds its chain artifact.
    pub async fn build(
        identity: SigningIdentity,
        ocsp: &(dyn OcspClient + Send + Sync),
    ) -> Result<Self> {
        let response = fetch_ocsp(ocsp, identity.certificates()).await?;
        let chain = build_chain(identity.leaf(), identity.issuer(), &response, None)?;

        log::info!(
            "Built {} certificate chain for {} ({} bytes) at {}",
            identity.role(),
            identity.origin(),
            chain.len(),
            identity.chain_path()
        );

        Ok(Self {
            identity,
            chain: Bytes::from(chain),
        })
    }

    async fn load(source: &IdentitySource, ocsp: &(dyn OcspClient + Send + Sync)) -> Result<Self> {
        let identity = SigningIdentity::load(
            source.role,
            &source.cert_path,
            &source.key_path,
            &source.chain_path,
        )?;
        Self::build(identity, ocsp).await
    }
}

/// Whether an identity could be brought up at startup.
#[derive(Debug, Clone)]
pub enum IdentityState {
    Ready(LoadedIdentity),
    /// Startup failed; scenarios using this identity answer with `reason`.
    Unavailable { role: Role, reason: Error },
}

impl IdentityState {
    pub fn as_ready(&self) -> Result<&LoadedIdentity> {
        match self {
            IdentityState::Ready(loaded) => Ok(loaded),
            IdentityState::Unavailable { role, reason } => Err(Error::config(format!(
                "{role} identity unavailable: {reason}"
            ))),
        }
    }
}

/// An exchange plus the unsigned headers it is served with.
#[derive(Debug, Clone)]
pub struct ServedExchange {
    pub exchange: Exchange,
    pub outer_headers: Vec<(&'static str, String)>,
}

/// Everything request handlers read.
#[derive(Debug)]
pub struct AppContext {
    primary: LoadedIdentity,
    alternate: IdentityState,
    content: ContentStore,
    table: ScenarioTable,
}

impl AppContext {
    /// Loads both identities from disk and fetches their OCSP responses.
    ///
    /// # Arguments
    ///
    /// * `primary` - Files of the primary identity. Any failure is returned.
    /// * `alternate` - Files of the alternate identity. Failures are logged and
    ///   recorded so the rest of the deployment keeps working.
    /// * `content` - Sample payloads.
    /// * `table` - Route table. Validated before anything else is loaded.
    /// * `ocsp` - Transport for OCSP requests.
    pub async fn init(
        primary: &IdentitySource,
        alternate: &IdentitySource,
        content: ContentStore,
        table: ScenarioTable,
        ocsp: &(dyn OcspClient + Send + Sync),
    ) -> Result<Self> {
        table.validate()?;

        let primary = LoadedIdentity::load(primary, ocsp).await?;
        let alternate = match LoadedIdentity::load(alternate, ocsp).await {
            Ok(loaded) => IdentityState::Ready(loaded),
            Err(reason) => {
                log::error!("Alternate identity is unavailable: {reason}");
                IdentityState::Unavailable {
                    role: Role::Alternate,
                    reason,
                }
            }
        };

        Self::new(primary, alternate, content, table)
    }

    /// Assembles a context from already loaded parts.
    pub fn new(
        primary: LoadedIdentity,
        alternate: IdentityState,
        content: ContentStore,
        table: ScenarioTable,
    ) -> Result<Self> {
        table.validate()?;

        if let IdentityState::Ready(alt) = &alternate {
            if alt.identity.chain_path() == primary.identity.chain_path() {
                return Err(Error::config(format!(
                    "both identities are served at {}",
                    primary.identity.chain_path()
                )));
            }
        }

        for resource in table.resources() {
            if let Err(e) = resource.payload_from(&content) {
                log::warn!("{e}");
            }
        }

        Ok(Self {
            primary,
            alternate,
            content,
            table,
        })
    }

    pub fn table(&self) -> &ScenarioTable {
        &self.table
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    /// The identity playing `role`, or the reason it failed to load.
    pub fn identity(&self, role: Role) -> Result<&LoadedIdentity> {
        match role {
            Role::Primary => Ok(&self.primary),
            Role::Alternate => self.alternate.as_ready(),
        }
    }

    /// Chain artifact served at `path`, if any identity is served there.
    pub fn chain_for_path(&self, path: &str) -> Option<&Bytes> {
        [Some(&self.primary), self.alternate.as_ready().ok()]
            .into_iter()
            .flatten()
            .find(|loaded| loaded.identity.chain_path() == path)
            .map(|loaded| &loaded.chain)
    }

    /// Builds the exchange for scenario `name` as requested on `host`.
    ///
    /// The signing time is `now` minus [`signing_backdate`].
    pub fn exchange(&self, name: &str, host: &str, now: DateTime<Utc>) -> Result<ServedExchange> {
        let plan = self.table.resolve(name, host, self)?;
        let loaded = self.identity(plan.role)?;

        let exchange = exchange::assemble(ExchangeRequest {
            url: plan.url,
            content_type: plan.content_type.to_owned(),
            headers: plan.signed_headers,
            payload: plan.payload,
            date: now - signing_backdate(),
            cert_url: format!("https://{host}{}", loaded.identity.chain_path()),
            validity_url: loaded.identity.validity_url(),
            identity: &loaded.identity,
        })?;

        Ok(ServedExchange {
            exchange,
            outer_headers: plan.outer_headers,
        })
    }
}

impl Catalog for AppContext {
    fn origin(&self, role: Role) -> Result<&str> {
        self.identity(role).map(|loaded| loaded.identity.origin())
    }

    fn payload(&self, resource: &Resource) -> Result<&[u8]> {
        resource.payload_from(&self.content)
    }
}
