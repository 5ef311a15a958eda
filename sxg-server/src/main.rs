//! Signed HTTP Exchange demo server.
//!
//! Loads the primary and alternate signing identities, fetches their OCSP
//! responses once and then serves exchanges and certificate chains.

pub mod api;
pub mod config;
pub mod template;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use sxg::{
    cert_chain::ocsp::HttpOcspClient, content::ContentStore, context::AppContext,
    scenario::ScenarioTable,
};
use tokio::net::TcpListener;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::debug!("{config:?}");

    let ocsp = HttpOcspClient::new(config.ocsp_timeout())
        .context("failed to create OCSP client")?;
    let content = ContentStore::load_dir(&config.content_dir).with_context(|| {
        format!("failed to load content from {}", config.content_dir.display())
    })?;

    let ctx = AppContext::init(
        &config.primary_source(),
        &config.alternate_source(),
        content,
        ScenarioTable::builtin(),
        &ocsp,
    )
    .await
    .context("failed to initialize signing identities")?;

    let primary = ctx.identity(sxg::identity::Role::Primary)?;
    log::info!("Signing for {}", primary.identity.origin());

    let app = api::create_router(Arc::new(ctx));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("Listening on port {}", config.port);

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
