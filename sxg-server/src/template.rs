//! HTML templates embedded at build time.

use std::sync::OnceLock;

use minijinja::Environment;
use serde::Serialize;

static ENVIRONMENT: OnceLock<Environment<'static>> = OnceLock::new();

const INDEX: &str = include_str!("../templates/index.html");

fn embed_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
    Ok(match name {
        "index.html" => Some(INDEX.to_owned()),
        _ => None,
    })
}

fn environment() -> &'static Environment<'static> {
    ENVIRONMENT.get_or_init(|| {
        let mut environment = Environment::new();
        environment.set_loader(embed_loader);
        environment
    })
}

/// Renders template `name` with HTML auto-escaping (from the `.html` suffix).
pub fn render<S: Serialize>(name: &str, ctx: S) -> Result<String, minijinja::Error> {
    environment().get_template(name)?.render(ctx)
}
