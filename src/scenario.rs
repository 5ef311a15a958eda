//! Declarative table of the exchanges served under `/sxg/`.
//!
//! Each [`Scenario`] names the [`Resource`] it signs and a list of
//! [`Directive`]s describing which other exchanges it advertises. The table is
//! data; [`ScenarioTable::resolve`] interprets one entry into the headers and
//! payload of a single exchange.

use crate::{
    content::ContentStore,
    error::{Error, Result},
    header_integrity::header_integrity,
    headers::{ResponseHeaders, SUBRESOURCE_CACHE_CONTROL},
    identity::Role,
    link::{Destination, Link, Variant, IMAGE_VARIANTS},
};

/// Path prefix of every exchange.
pub const SXG_PREFIX: &str = "/sxg/";

/// File extension of every exchange.
pub const SXG_EXTENSION: &str = ".sxg";

/// `imagesizes` of the responsive image preloads.
pub const IMAGE_SIZES: &str = "(max-width: 640px) 100vw, 640px";

/// Body of the built-in hello pages.
pub const HELLO_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Hello SignedHTTPExchange</title>
  </head>
  <body>
    <div id="message">
      <h1>Hello SignedHTTPExchange</h1>
    </div>
  </body>
</html>
"#;

const HTML: &str = "text/html; charset=utf-8";

/// Where a resource's body comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Compiled into the binary.
    Inline(&'static str),
    /// A file in the [`ContentStore`].
    File(&'static str),
}

/// A response that can be signed, identified by its URL on an identity's origin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub name: &'static str,
    pub role: Role,
    /// Absolute path on the origin, e.g. `/amptest/js/v0.js`.
    pub path: &'static str,
    pub content_type: &'static str,
    pub payload: Payload,
}

impl Resource {
    pub fn url(&self, origin: &str) -> String {
        format!("https://{origin}{}", self.path)
    }

    /// Looks the body up in `store`.
    pub fn payload_from<'a>(&self, store: &'a ContentStore) -> Result<&'a [u8]> {
        match self.payload {
            Payload::Inline(body) => Ok(body.as_bytes()),
            Payload::File(name) => store.get(name).map(|blob| blob.as_ref()).ok_or_else(|| {
                Error::config(format!(
                    "content file '{name}' for resource '{}' is not loaded",
                    self.name
                ))
            }),
        }
    }
}

/// A cross-link from one exchange to another resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Advertise the exchange of `scenario`: an outer `alternate` link plus a
    /// signed `allowed-alt-sxg` link carrying its header-integrity digest.
    AltSxg {
        scenario: &'static str,
        /// Add `variants-04`/`variant-key-04` keyed on the target's content-type.
        vary: bool,
        /// Digest the target payload without its first byte.
        damaged: bool,
    },
    /// Signed preload hint for `resource`.
    Preload {
        resource: &'static str,
        destination: Destination,
    },
    /// Signed responsive image preload of `resource` with `(resource, width)` candidates.
    PreloadImage {
        resource: &'static str,
        srcset: Vec<(&'static str, u32)>,
    },
}

impl Directive {
    pub fn alt_sxg(scenario: &'static str) -> Self {
        Directive::AltSxg {
            scenario,
            vary: false,
            damaged: false,
        }
    }

    pub fn alt_sxg_variant(scenario: &'static str) -> Self {
        Directive::AltSxg {
            scenario,
            vary: true,
            damaged: false,
        }
    }

    pub fn alt_sxg_damaged(scenario: &'static str) -> Self {
        Directive::AltSxg {
            scenario,
            vary: false,
            damaged: true,
        }
    }

    pub fn preload(resource: &'static str, destination: Destination) -> Self {
        Directive::Preload {
            resource,
            destination,
        }
    }
}

/// One entry of the route table, served at `/sxg/<name>.sxg`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scenario {
    pub name: &'static str,
    pub resource: &'static str,
    /// Subresources carry `cache-control` both inside and outside the exchange.
    pub subresource: bool,
    pub cors: bool,
    /// Shown on the index page.
    pub listed: bool,
    pub directives: Vec<Directive>,
}

impl Scenario {
    /// A top-level page.
    pub fn page(name: &'static str, resource: &'static str) -> Self {
        Self {
            name,
            resource,
            subresource: false,
            cors: false,
            listed: false,
            directives: vec![],
        }
    }

    /// A resource other exchanges may advertise.
    pub fn subresource(name: &'static str, resource: &'static str) -> Self {
        Self {
            subresource: true,
            ..Self::page(name, resource)
        }
    }

    pub fn listed(mut self) -> Self {
        self.listed = true;
        self
    }

    pub fn cors(mut self) -> Self {
        self.cors = true;
        self
    }

    pub fn with(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    /// Request path of this scenario, e.g. `/sxg/hello.sxg`.
    pub fn path(&self) -> String {
        format!("{SXG_PREFIX}{}{SXG_EXTENSION}", self.name)
    }
}

/// Lookups a scenario needs while being resolved.
pub trait Catalog {
    /// Host name of the identity playing `role`.
    fn origin(&self, role: Role) -> Result<&str>;

    /// Body of `resource`.
    fn payload(&self, resource: &Resource) -> Result<&[u8]>;
}

/// Everything needed to assemble and serve one exchange.
#[derive(Debug, Clone)]
pub struct Plan<'a> {
    pub role: Role,
    /// URL the exchange is signed for.
    pub url: String,
    pub content_type: &'static str,
    pub payload: &'a [u8],
    /// Headers signed inside the exchange.
    pub signed_headers: ResponseHeaders,
    /// Headers on the HTTP response carrying the exchange, in order.
    pub outer_headers: Vec<(&'static str, String)>,
}

/// The route table: resources plus the scenarios that sign them.
#[derive(Debug, Clone)]
pub struct ScenarioTable {
    resources: Vec<Resource>,
    scenarios: Vec<Scenario>,
}

impl ScenarioTable {
    pub fn new(resources: Vec<Resource>, scenarios: Vec<Scenario>) -> Self {
        Self {
            resources,
            scenarios,
        }
    }

    /// The demo deployment.
    pub fn builtin() -> Self {
        use Destination::*;
        use Role::*;

        let resource = |name, role, path, content_type, payload| Resource {
            name,
            role,
            path,
            content_type,
            payload,
        };

        let resources = vec![
            resource("hello", Primary, "/hello.html", HTML, Payload::Inline(HELLO_PAGE)),
            resource("alt_hello", Alternate, "/hello.html", HTML, Payload::Inline(HELLO_PAGE)),
            resource(
                "amptestnocdn",
                Primary,
                "/amptest/amptestnocdn.html",
                HTML,
                Payload::File("amptestnocdn.html"),
            ),
            resource(
                "v0js",
                Primary,
                "/amptest/js/v0.js",
                "text/javascript",
                Payload::File("v0.js"),
            ),
            resource(
                "nikko_320_jpg",
                Primary,
                "/amptest/img/nikko_320.jpg",
                "image/jpeg",
                Payload::File("nikko_320.jpg"),
            ),
            resource(
                "nikko_320_webp",
                Primary,
                "/amptest/img/nikko_320.jpg",
                "image/webp",
                Payload::File("nikko_320.webp"),
            ),
            resource(
                "nikko_640_jpg",
                Primary,
                "/amptest/img/nikko_640.jpg",
                "image/jpeg",
                Payload::File("nikko_640.jpg"),
            ),
            resource(
                "nikko_640_webp",
                Primary,
                "/amptest/img/nikko_640.jpg",
                "image/webp",
                Payload::File("nikko_640.webp"),
            ),
            resource("a_css", Primary, "/amptest/css/a.css", "text/css", Payload::Inline("")),
            resource("b_css", Primary, "/amptest/css/b.css", "text/css", Payload::Inline("")),
            resource(
                "fonttest",
                Primary,
                "/amptest/fonttest.html",
                HTML,
                Payload::File("fonttest.html"),
            ),
            resource(
                "wapuro_mincho",
                Alternate,
                "/fonts/wapuro-mincho.woff2",
                "font/woff2",
                Payload::File("wapuro-mincho.woff2"),
            ),
        ];

        let nikko_preload = || Directive::PreloadImage {
            resource: "nikko_640_jpg",
            srcset: vec![("nikko_640_jpg", 640), ("nikko_320_jpg", 320)],
        };

        let scenarios = vec![
            Scenario::page("hello", "hello").listed(),
            Scenario::page("alt", "alt_hello").listed(),
            Scenario::page("amptestnocdn", "amptestnocdn").listed(),
            Scenario::page("amptestnocdn_js_preload", "amptestnocdn")
                .listed()
                .with(Directive::alt_sxg("v0"))
                .with(Directive::preload("v0js", Script)),
            Scenario::page("amptestnocdn_js_img_preload", "amptestnocdn")
                .listed()
                .with(Directive::alt_sxg("v0"))
                .with(Directive::preload("v0js", Script))
                .with(Directive::alt_sxg("nikko_320_jpg"))
                .with(Directive::alt_sxg("nikko_640_jpg"))
                .with(nikko_preload()),
            Scenario::page("amptestnocdn_js_img_vary_preload", "amptestnocdn")
                .listed()
                .with(Directive::alt_sxg("v0"))
                .with(Directive::preload("v0js", Script))
                .with(Directive::alt_sxg_variant("nikko_320_jpg"))
                .with(Directive::alt_sxg_variant("nikko_320_webp"))
                .with(Directive::alt_sxg_variant("nikko_640_jpg"))
                .with(Directive::alt_sxg_variant("nikko_640_webp"))
                .with(nikko_preload()),
            Scenario::page("amptestnocdn_js_preload_error", "amptestnocdn")
                .listed()
                .with(Directive::alt_sxg_damaged("v0"))
                .with(Directive::preload("v0js", Script)),
            Scenario::page("amptestnocdn_js_img_preload_error", "amptestnocdn")
                .listed()
                .with(Directive::alt_sxg("v0"))
                .with(Directive::preload("v0js", Script))
                .with(Directive::alt_sxg_damaged("nikko_320_jpg"))
                .with(Directive::alt_sxg_damaged("nikko_640_jpg"))
                .with(nikko_preload()),
            Scenario::page("loop", "amptestnocdn")
                .listed()
                .with(Directive::alt_sxg("a_css"))
                .with(Directive::preload("a_css", Style)),
            Scenario::page("fonttest", "fonttest")
                .listed()
                .with(Directive::alt_sxg("wapuro-mincho.woff2"))
                .with(Directive::preload("wapuro_mincho", Font)),
            Scenario::page("cors_fonttest", "fonttest")
                .listed()
                .with(Directive::alt_sxg("cors_wapuro-mincho.woff2"))
                .with(Directive::preload("wapuro_mincho", Font)),
            Scenario::subresource("v0", "v0js"),
            Scenario::subresource("nikko_320_jpg", "nikko_320_jpg"),
            Scenario::subresource("nikko_320_webp", "nikko_320_webp"),
            Scenario::subresource("nikko_640_jpg", "nikko_640_jpg"),
            Scenario::subresource("nikko_640_webp", "nikko_640_webp"),
            Scenario::subresource("a_css", "a_css")
                .with(Directive::alt_sxg("b_css"))
                .with(Directive::preload("b_css", Style)),
            Scenario::subresource("b_css", "b_css")
                .with(Directive::alt_sxg("a_css"))
                .with(Directive::preload("a_css", Style)),
            Scenario::subresource("wapuro-mincho.woff2", "wapuro_mincho"),
            Scenario::subresource("cors_wapuro-mincho.woff2", "wapuro_mincho").cors(),
        ];

        Self::new(resources, scenarios)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Finds the scenario served as `file`, e.g. `hello.sxg`.
    pub fn scenario_for_file(&self, file: &str) -> Option<&Scenario> {
        file.strip_suffix(SXG_EXTENSION)
            .and_then(|name| self.scenario(name))
    }

    /// Scenarios shown on the index page, in table order.
    pub fn listed(&self) -> impl Iterator<Item = &Scenario> {
        self.scenarios.iter().filter(|s| s.listed)
    }

    /// Checks that every name the table mentions exists.
    ///
    /// Cycles are allowed: resolving a scenario only digests the payloads it
    /// links to and never resolves the linked scenarios themselves.
    pub fn validate(&self) -> Result<()> {
        for (i, r) in self.resources.iter().enumerate() {
            if self.resources[..i].iter().any(|other| other.name == r.name) {
                return Err(Error::config(format!("duplicate resource '{}'", r.name)));
            }
            if !r.path.starts_with('/') {
                return Err(Error::config(format!(
                    "resource '{}' path '{}' must be absolute",
                    r.name, r.path
                )));
            }
        }

        for (i, s) in self.scenarios.iter().enumerate() {
            if self.scenarios[..i].iter().any(|other| other.name == s.name) {
                return Err(Error::config(format!("duplicate scenario '{}'", s.name)));
            }
            self.require_resource(s.resource)
                .map_err(|e| Error::config(format!("scenario '{}': {e}", s.name)))?;

            for directive in &s.directives {
                self.check_directive(directive)
                    .map_err(|e| Error::config(format!("scenario '{}': {e}", s.name)))?;
            }
        }

        Ok(())
    }

    fn check_directive(&self, directive: &Directive) -> Result<()> {
        match directive {
            Directive::AltSxg { scenario, .. } => {
                let target = self.require_scenario(scenario)?;
                if !target.subresource {
                    return Err(Error::config(format!(
                        "advertised scenario '{scenario}' is not a subresource"
                    )));
                }
            }
            Directive::Preload { resource, .. } => {
                self.require_resource(resource)?;
            }
            Directive::PreloadImage { resource, srcset } => {
                self.require_resource(resource)?;
                for (candidate, _) in srcset {
                    self.require_resource(candidate)?;
                }
            }
        }
        Ok(())
    }

    fn require_resource(&self, name: &str) -> Result<&Resource> {
        self.resource(name)
            .ok_or_else(|| Error::config(format!("unknown resource '{name}'")))
    }

    fn require_scenario(&self, name: &str) -> Result<&Scenario> {
        self.scenario(name)
            .ok_or_else(|| Error::config(format!("unknown scenario '{name}'")))
    }

    /// Interprets scenario `name` into the exchange to serve.
    ///
    /// # Arguments
    ///
    /// * `name` - Scenario name, without the `/sxg/` prefix and `.sxg` extension.
    /// * `host` - Host the request arrived on. `alternate` links point back at it.
    /// * `catalog` - Origins and payloads.
    ///
    /// # Returns
    ///
    /// The signed and outer headers, URL and payload of the exchange.
    pub fn resolve<'c, C: Catalog + ?Sized>(
        &self,
        name: &str,
        host: &str,
        catalog: &'c C,
    ) -> Result<Plan<'c>> {
        let scenario = self.require_scenario(name)?;
        let resource = self.require_resource(scenario.resource)?;
        let url = resource.url(catalog.origin(resource.role)?);
        let payload = catalog.payload(resource)?;

        // Fonts included: every subresource gets the outer cache-control.
        let (mut signed_headers, mut outer_headers) = if scenario.subresource {
            (
                ResponseHeaders::subresource(scenario.cors),
                vec![("cache-control", SUBRESOURCE_CACHE_CONTROL.to_owned())],
            )
        } else {
            (ResponseHeaders::new(), vec![])
        };

        for directive in &scenario.directives {
            match directive {
                Directive::AltSxg {
                    scenario: target_name,
                    vary,
                    damaged,
                } => {
                    let target = self.require_scenario(target_name)?;
                    let target_resource = self.require_resource(target.resource)?;
                    let target_url = target_resource.url(catalog.origin(target_resource.role)?);
                    let variant = vary
                        .then(|| Variant::new(IMAGE_VARIANTS, target_resource.content_type));

                    let mut body = catalog.payload(target_resource)?;
                    if *damaged {
                        body = body.get(1..).unwrap_or_default();
                    }
                    let integrity = header_integrity(
                        &target_url,
                        body,
                        target_resource.content_type,
                        target.cors,
                    );

                    outer_headers.push((
                        "link",
                        Link::Alternate {
                            href: format!("https://{host}{}", target.path()),
                            anchor: target_url.clone(),
                            variant: variant.clone(),
                        }
                        .to_string(),
                    ));
                    signed_headers.add(
                        "link",
                        Link::AllowedAltSxg {
                            target: target_url,
                            header_integrity: integrity,
                            variant,
                        }
                        .to_string(),
                    );
                }
                Directive::Preload {
                    resource: target_name,
                    destination,
                } => {
                    let target = self.require_resource(target_name)?;
                    let target_url = target.url(catalog.origin(target.role)?);
                    let link = match destination {
                        Destination::Font => Link::preload_font(target_url, target.content_type),
                        other => Link::preload(target_url, *other),
                    };
                    signed_headers.add("link", link.to_string());
                }
                Directive::PreloadImage {
                    resource: target_name,
                    srcset,
                } => {
                    let target = self.require_resource(target_name)?;
                    let target_url = target.url(catalog.origin(target.role)?);
                    let candidates = srcset
                        .iter()
                        .map(|(candidate, width)| {
                            let r = self.require_resource(candidate)?;
                            Ok((r.url(catalog.origin(r.role)?), *width))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    signed_headers.add(
                        "link",
                        Link::preload_image(target_url, candidates, IMAGE_SIZES).to_string(),
                    );
                }
            }
        }

        log::debug!(
            "Resolved scenario {name} to {url} ({} signed link(s), {} outer header(s))",
            scenario.directives.len(),
            outer_headers.len()
        );

        Ok(Plan {
            role: resource.role,
            url,
            content_type: resource.content_type,
            payload,
            signed_headers,
            outer_headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    struct TestCatalog {
        content: ContentStore,
        alternate: Option<&'static str>,
    }

    impl TestCatalog {
        fn new() -> Self {
            let mut content = ContentStore::new();
            content.insert("amptestnocdn.html", Bytes::from_static(b"<html amp></html>"));
            content.insert("v0.js", Bytes::from_static(b"(function(){})();"));
            content.insert("nikko_320.jpg", Bytes::from_static(b"\xff\xd8jpg320"));
            content.insert("nikko_640.jpg", Bytes::from_static(b"\xff\xd8jpg640"));
            content.insert("nikko_320.webp", Bytes::from_static(b"RIFFwebp320"));
            content.insert("nikko_640.webp", Bytes::from_static(b"RIFFwebp640"));
            content.insert("fonttest.html", Bytes::from_static(b"<html>font</html>"));
            content.insert("wapuro-mincho.woff2", Bytes::from_static(b"wOF2font"));

            Self {
                content,
                alternate: Some("alt.test"),
            }
        }
    }

    impl Catalog for TestCatalog {
        fn origin(&self, role: Role) -> Result<&str> {
            match role {
                Role::Primary => Ok("example.test"),
                Role::Alternate => self
                    .alternate
                    .ok_or_else(|| Error::config("alternate identity unavailable")),
            }
        }

        fn payload(&self, resource: &Resource) -> Result<&[u8]> {
            resource.payload_from(&self.content)
        }
    }

    fn links<'a>(headers: &'a [(&'static str, String)]) -> Vec<&'a str> {
        headers
            .iter()
            .filter(|(name, _)| *name == "link")
            .map(|(_, value)| value.as_str())
            .collect()
    }

    #[test]
    fn builtin_table_is_valid() {
        let table = ScenarioTable::builtin();
        table.validate().unwrap();

        assert_eq!(table.scenarios().len(), 20);
        assert!(table.scenario_for_file("hello.sxg").is_some());
        assert!(table.scenario_for_file("wapuro-mincho.woff2.sxg").is_some());
        assert!(table.scenario_for_file("hello").is_none());
        assert!(table.scenario_for_file("nope.sxg").is_none());
        assert!(table.listed().all(|s| !s.subresource));
    }

    #[test]
    fn dangling_references_are_rejected() {
        let table = ScenarioTable::new(
            vec![Resource {
                name: "page",
                role: Role::Primary,
                path: "/page.html",
                content_type: HTML,
                payload: Payload::Inline("page"),
            }],
            vec![Scenario::page("page", "page").with(Directive::alt_sxg("missing"))],
        );
        let err = table.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");

        let table = ScenarioTable::new(vec![], vec![Scenario::page("page", "missing")]);
        assert!(table.validate().is_err());
    }

    #[test]
    fn advertised_scenarios_must_be_subresources() {
        let page = Resource {
            name: "page",
            role: Role::Primary,
            path: "/page.html",
            content_type: HTML,
            payload: Payload::Inline("page"),
        };
        let table = ScenarioTable::new(
            vec![page],
            vec![
                Scenario::page("a", "page").with(Directive::alt_sxg("b")),
                Scenario::page("b", "page"),
            ],
        );

        let err = table.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");
    }

    #[test]
    fn js_preload_links() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog::new();

        let plan = table
            .resolve("amptestnocdn_js_preload", "sxg.test", &catalog)
            .unwrap();

        assert_eq!(plan.url, "https://example.test/amptest/amptestnocdn.html");
        assert_eq!(plan.payload, b"<html amp></html>");
        assert_eq!(
            links(&plan.outer_headers),
            vec![
                "<https://sxg.test/sxg/v0.sxg>;rel=\"alternate\";\
                 type=\"application/signed-exchange;v=b3\";\
                 anchor=\"https://example.test/amptest/js/v0.js\";"
            ]
        );

        let integrity = header_integrity(
            "https://example.test/amptest/js/v0.js",
            b"(function(){})();",
            "text/javascript",
            false,
        );
        assert_eq!(
            plan.signed_headers.get("link").unwrap(),
            format!(
                "<https://example.test/amptest/js/v0.js>;rel=\"allowed-alt-sxg\";\
                 header-integrity=\"{integrity}\",\
                 <https://example.test/amptest/js/v0.js>;rel=\"preload\";as=\"script\""
            )
        );
        assert!(!plan.signed_headers.contains("cache-control"));
    }

    #[test]
    fn damaged_digest_skips_first_byte() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog::new();

        let good = table
            .resolve("amptestnocdn_js_preload", "sxg.test", &catalog)
            .unwrap();
        let bad = table
            .resolve("amptestnocdn_js_preload_error", "sxg.test", &catalog)
            .unwrap();

        let damaged = header_integrity(
            "https://example.test/amptest/js/v0.js",
            b"function(){})();",
            "text/javascript",
            false,
        );
        let bad_links = bad.signed_headers.get("link").unwrap();
        assert!(bad_links.contains(&damaged));
        assert_ne!(good.signed_headers, bad.signed_headers);
        assert_eq!(good.outer_headers, bad.outer_headers);
    }

    #[test]
    fn vary_preload_advertises_every_variant() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog::new();

        let plan = table
            .resolve("amptestnocdn_js_img_vary_preload", "sxg.test", &catalog)
            .unwrap();

        let outer = links(&plan.outer_headers);
        assert_eq!(outer.len(), 5);
        assert_eq!(
            outer[2],
            "<https://sxg.test/sxg/nikko_320_webp.sxg>;rel=\"alternate\";\
             type=\"application/signed-exchange;v=b3\";\
             variants-04=\"accept;image/jpeg,image/webp\";variant-key-04=\"image/webp\";\
             anchor=\"https://example.test/amptest/img/nikko_320.jpg\";"
        );

        let webp_integrity = header_integrity(
            "https://example.test/amptest/img/nikko_320.jpg",
            b"RIFFwebp320",
            "image/webp",
            false,
        );
        let signed = plan.signed_headers.get("link").unwrap();
        assert!(signed.contains(&format!(
            "<https://example.test/amptest/img/nikko_320.jpg>;rel=\"allowed-alt-sxg\";\
             variants-04=\"accept;image/jpeg,image/webp\";variant-key-04=\"image/webp\";\
             header-integrity=\"{webp_integrity}\""
        )));
        assert!(signed.ends_with(
            "<https://example.test/amptest/img/nikko_640.jpg>;rel=\"preload\";as=\"image\";\
             imagesrcset=\"https://example.test/amptest/img/nikko_640.jpg 640w, \
             https://example.test/amptest/img/nikko_320.jpg 320w\";\
             imagesizes=\"(max-width: 640px) 100vw, 640px\""
        ));
    }

    #[test]
    fn subresources_carry_cache_control() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog::new();

        let plan = table.resolve("v0", "sxg.test", &catalog).unwrap();

        assert_eq!(plan.content_type, "text/javascript");
        assert_eq!(
            plan.outer_headers,
            vec![("cache-control", "public, max-age=600".to_owned())]
        );
        assert_eq!(
            plan.signed_headers,
            ResponseHeaders::subresource(false)
        );

        for font in ["wapuro-mincho.woff2", "cors_wapuro-mincho.woff2"] {
            let plan = table.resolve(font, "sxg.test", &catalog).unwrap();
            assert!(
                plan.outer_headers
                    .contains(&("cache-control", "public, max-age=600".to_owned())),
                "{font}"
            );
        }
    }

    #[test]
    fn stylesheet_cycle_resolves() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog::new();

        for name in ["loop", "a_css", "b_css"] {
            let plan = table.resolve(name, "sxg.test", &catalog).unwrap();
            assert_eq!(links(&plan.outer_headers).len(), 1, "{name}");
        }

        let a = table.resolve("a_css", "sxg.test", &catalog).unwrap();
        assert!(a.payload.is_empty());
        assert!(a
            .signed_headers
            .get("link")
            .unwrap()
            .ends_with("<https://example.test/amptest/css/b.css>;rel=\"preload\";as=\"style\""));
    }

    #[test]
    fn cors_font_uses_cors_digest() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog::new();

        let plain = table.resolve("fonttest", "sxg.test", &catalog).unwrap();
        let cors = table.resolve("cors_fonttest", "sxg.test", &catalog).unwrap();

        let cors_integrity = header_integrity(
            "https://alt.test/fonts/wapuro-mincho.woff2",
            b"wOF2font",
            "font/woff2",
            true,
        );
        let cors_links = cors.signed_headers.get("link").unwrap();
        assert!(cors_links.contains(&cors_integrity));
        assert!(cors_links.ends_with(
            "<https://alt.test/fonts/wapuro-mincho.woff2>;rel=\"preload\";as=\"font\";\
             type=\"font/woff2\";crossorigin"
        ));
        assert_ne!(plain.signed_headers, cors.signed_headers);

        let font = table
            .resolve("cors_wapuro-mincho.woff2", "sxg.test", &catalog)
            .unwrap();
        assert_eq!(font.role, Role::Alternate);
        assert_eq!(font.url, "https://alt.test/fonts/wapuro-mincho.woff2");
        assert_eq!(
            font.signed_headers.get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn unavailable_alternate_origin_fails_resolution() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog {
            alternate: None,
            ..TestCatalog::new()
        };

        assert!(table.resolve("hello", "sxg.test", &catalog).is_ok());
        assert!(table.resolve("alt", "sxg.test", &catalog).is_err());
        assert!(table.resolve("fonttest", "sxg.test", &catalog).is_err());
    }

    #[test]
    fn missing_payload_fails_resolution() {
        let table = ScenarioTable::builtin();
        let catalog = TestCatalog {
            content: ContentStore::new(),
            alternate: Some("alt.test"),
        };

        let err = table.resolve("v0", "sxg.test", &catalog).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err:?}");
        assert!(table.resolve("hello", "sxg.test", &catalog).is_ok());
    }
}
