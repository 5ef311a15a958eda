//! HTTP surface: index page, certificate chains and exchanges.

pub mod error;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        header::{self, HeaderName},
        HeaderMap, HeaderValue, Uri,
    },
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use minijinja::context;
use sxg::{cert_chain, context::AppContext, exchange};

use crate::template;
use error::ApiError;

/// `cache-control` of certificate chain responses.
pub const CHAIN_CACHE_CONTROL: &str = "public, max-age=100";

const DEFAULT_HOST: &str = "localhost";

/// Create the API router
pub fn create_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/cert/{file}", get(certificate_chain))
        .route("/sxg/{file}", get(signed_exchange))
        .fallback(not_found)
        .with_state(ctx)
}

/// Host the request was addressed to: the `Host` header, else the URI
/// authority (HTTP/2), else [`DEFAULT_HOST`].
///
/// The host is signed into the `cert-url`, so anything beyond hostname
/// characters and a port is rejected.
fn request_host(headers: &HeaderMap, uri: &Uri) -> Result<String, ApiError> {
    let host = match headers.get(header::HOST) {
        Some(value) => value
            .to_str()
            .map_err(|_| ApiError::BadRequest("host header is not visible ASCII".to_owned()))?,
        None => uri.authority().map_or("", |authority| authority.as_str()),
    };

    if host.is_empty() {
        return Ok(DEFAULT_HOST.to_owned());
    }
    if !host.chars().all(exchange::is_host_char) {
        return Err(ApiError::BadRequest(format!("invalid host {host:?}")));
    }
    Ok(host.to_ascii_lowercase())
}

/// GET /
async fn index(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Html<String>, ApiError> {
    let host = request_host(&headers, &uri)?;
    let sxgs: Vec<String> = ctx
        .table()
        .listed()
        .map(|scenario| format!("{}.sxg", scenario.name))
        .collect();

    let page = template::render("index.html", context! { host, sxgs })
        .map_err(|e| ApiError::Internal(format!("failed to render index: {e}")))?;
    Ok(Html(page))
}

/// GET /cert/{file}
async fn certificate_chain(
    State(ctx): State<Arc<AppContext>>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let path = format!("/cert/{file}");
    let chain = ctx
        .chain_for_path(&path)
        .ok_or_else(|| ApiError::NotFound(format!("no certificate chain at {path}")))?;

    log::debug!("Serving certificate chain {path}");

    let headers = [
        (header::CONTENT_TYPE, cert_chain::CONTENT_TYPE),
        (header::CACHE_CONTROL, CHAIN_CACHE_CONTROL),
    ];
    Ok((headers, Body::from(chain.clone())).into_response())
}

/// GET /sxg/{file}
async fn signed_exchange(
    State(ctx): State<Arc<AppContext>>,
    Path(file): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, ApiError> {
    let scenario = ctx
        .table()
        .scenario_for_file(&file)
        .ok_or_else(|| ApiError::NotFound(format!("no exchange named {file}")))?;

    let host = request_host(&headers, &uri)?;
    let served = ctx.exchange(scenario.name, &host, Utc::now())?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(exchange::CONTENT_TYPE),
    );
    response_headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    for (name, value) in &served.outer_headers {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::Internal(format!("invalid {name} header: {e}")))?;
        response_headers.append(HeaderName::from_static(*name), value);
    }

    log::info!("Serving {file} for {}", served.exchange.fallback_url());

    Ok((response_headers, served.exchange.to_bytes()).into_response())
}

async fn not_found() -> ApiError {
    ApiError::NotFound("not found".to_owned())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::to_bytes,
        http::{Request, StatusCode},
    };
    use sxg::{
        cert_chain::parse_chain,
        content::ContentStore,
        context::{IdentityState, LoadedIdentity},
        identity::{Role, SigningIdentity},
        scenario::ScenarioTable,
        test_util::{IdentityFixture, StaticOcspClient},
        Error,
    };
    use tower::ServiceExt;

    use super::*;

    async fn identity(role: Role, origin: &str, chain_path: &str) -> LoadedIdentity {
        let fixture = IdentityFixture::issue(origin, Some("http://ocsp.example.test"));
        let identity = SigningIdentity::from_pem(
            role,
            fixture.cert_pem.as_bytes(),
            &fixture.key_pem,
            chain_path,
        )
        .unwrap();
        LoadedIdentity::build(identity, &StaticOcspClient::new(b"ocsp".to_vec()))
            .await
            .unwrap()
    }

    async fn router(alternate_ready: bool) -> Router {
        let _ = env_logger::builder().is_test(true).try_init();

        let primary = identity(Role::Primary, "example.test", "/cert/cert.cbor").await;
        let alternate = if alternate_ready {
            IdentityState::Ready(identity(Role::Alternate, "alt.test", "/cert/alt_cert.cbor").await)
        } else {
            IdentityState::Unavailable {
                role: Role::Alternate,
                reason: Error::config("failed to read cert/alt_cert.pem"),
            }
        };

        let mut content = ContentStore::new();
        content.insert("amptestnocdn.html", b"<html amp></html>".to_vec());
        content.insert("v0.js", b"(function(){})();".to_vec());

        let ctx = AppContext::new(primary, alternate, content, ScenarioTable::builtin()).unwrap();
        create_router(Arc::new(ctx))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, "sxg.test")
            .body(Body::empty())
            .unwrap()
    }

    async fn body(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn index_lists_top_level_scenarios() {
        let response = router(true).await.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body(response).await).unwrap();
        assert!(html.contains("<a href=\"https://sxg.test/sxg/hello.sxg\">hello.sxg</a>"));
        assert!(html.contains("loop.sxg"));
        assert!(!html.contains("v0.sxg"));
    }

    #[tokio::test]
    async fn serves_certificate_chains() {
        let app = router(true).await;

        let response = app.clone().oneshot(get("/cert/cert.cbor")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/cert-chain+cbor"
        );
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=100"
        );
        let primary = body(response).await;
        assert_eq!(parse_chain(&primary).unwrap().ocsp, b"ocsp");

        let response = app.clone().oneshot(get("/cert/alt_cert.cbor")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(body(response).await, primary);

        let response = app.oneshot(get("/cert/unknown.cbor")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_hello_exchange() {
        let response = router(true)
            .await
            .oneshot(get("/sxg/hello.sxg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/signed-exchange;v=b3"
        );
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(response.headers().get(header::LINK).is_none());

        let bytes = body(response).await;
        assert!(bytes.starts_with(b"sxg1-b3\0"));
        let url = b"https://example.test/hello.html";
        assert_eq!(&bytes[8..10], &(url.len() as u16).to_be_bytes());
        assert_eq!(&bytes[10..10 + url.len()], url);
    }

    #[tokio::test]
    async fn preload_scenario_carries_alternate_link() {
        let response = router(true)
            .await
            .oneshot(get("/sxg/amptestnocdn_js_preload.sxg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let links: Vec<_> = response.headers().get_all(header::LINK).iter().collect();
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0],
            "<https://sxg.test/sxg/v0.sxg>;rel=\"alternate\";\
             type=\"application/signed-exchange;v=b3\";\
             anchor=\"https://example.test/amptest/js/v0.js\";"
        );
    }

    #[tokio::test]
    async fn subresource_carries_cache_control() {
        let response = router(true)
            .await
            .oneshot(get("/sxg/v0.sxg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=600"
        );
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let app = router(true).await;

        for uri in ["/sxg/nope.sxg", "/sxg/hello", "/elsewhere"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn missing_content_is_a_server_error() {
        let response = router(true)
            .await
            .oneshot(get("/sxg/nikko_320_jpg.sxg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body(response).await).unwrap();
        assert!(text.contains("nikko_320.jpg"), "{text}");
    }

    #[tokio::test]
    async fn unavailable_alternate_identity() {
        let app = router(false).await;

        let response = app.clone().oneshot(get("/sxg/alt.sxg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = String::from_utf8(body(response).await).unwrap();
        assert!(text.contains("alternate identity unavailable"), "{text}");

        let response = app.clone().oneshot(get("/cert/alt_cert.cbor")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get("/sxg/hello.sxg")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn hosts_outside_the_hostname_charset_are_rejected() {
        let app = router(true).await;

        for host in [
            "evil.test\";validity-url=\"https://evil.test/x",
            "evil.test\\x",
            "evil.test x",
            "user@evil.test",
        ] {
            for uri in ["/sxg/hello.sxg", "/"] {
                let request = Request::builder()
                    .uri(uri)
                    .header(header::HOST, host)
                    .body(Body::empty())
                    .unwrap();
                let response = app.clone().oneshot(request).await.unwrap();
                assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{host} {uri}");
            }
        }
    }

    #[tokio::test]
    async fn host_is_lowercased_into_the_cert_url() {
        let request = Request::builder()
            .uri("/sxg/hello.sxg")
            .header(header::HOST, "SXG.Test:8443")
            .body(Body::empty())
            .unwrap();
        let response = router(true).await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body(response).await;
        let needle = b"cert-url=\"https://sxg.test:8443/cert/cert.cbor\"";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[tokio::test]
    async fn uri_authority_stands_in_for_a_missing_host() {
        let request = Request::builder()
            .uri("https://h2.test/sxg/hello.sxg")
            .body(Body::empty())
            .unwrap();
        let response = router(true).await.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body(response).await;
        let needle = b"cert-url=\"https://h2.test/cert/cert.cbor\"";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn request_host_fallbacks() {
        let empty = HeaderMap::new();
        assert_eq!(request_host(&empty, &Uri::from_static("/")).unwrap(), "localhost");
        assert_eq!(
            request_host(&empty, &Uri::from_static("https://h2.test/")).unwrap(),
            "h2.test"
        );

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("host.test"));
        assert_eq!(
            request_host(&headers, &Uri::from_static("https://h2.test/")).unwrap(),
            "host.test"
        );
    }
}
