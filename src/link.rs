//! `link` header values used to cross-link exchanges for preloading.

use std::fmt;

use strum::Display;

use crate::exchange;

/// `variants-04` value for resources negotiated on the image `accept` types.
pub const IMAGE_VARIANTS: &str = "accept;image/jpeg,image/webp";

/// Content negotiation parameters of an exchange variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// `variants-04`, e.g. [`IMAGE_VARIANTS`].
    pub variants: String,
    /// `variant-key-04`, the value this variant answers to.
    pub key: String,
}

impl Variant {
    pub fn new(variants: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            variants: variants.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "variants-04=\"{}\";variant-key-04=\"{}\";",
            self.variants, self.key
        )
    }
}

/// Request destination of a preload hint (`as=`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Destination {
    #[strum(serialize = "script")]
    Script,
    #[strum(serialize = "style")]
    Style,
    #[strum(serialize = "font")]
    Font,
    #[strum(serialize = "image")]
    Image,
}

/// A single `link` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Outer header pointing a browser at the exchange served for `anchor`.
    Alternate {
        href: String,
        anchor: String,
        variant: Option<Variant>,
    },
    /// Signed header allowing a prefetched exchange for `target` to be used.
    AllowedAltSxg {
        target: String,
        header_integrity: String,
        variant: Option<Variant>,
    },
    /// Signed preload hint.
    Preload {
        target: String,
        destination: Destination,
        mime_type: Option<String>,
        crossorigin: bool,
        /// `(url, width)` candidates for `imagesrcset`.
        image_srcset: Vec<(String, u32)>,
        image_sizes: Option<String>,
    },
}

impl Link {
    pub fn preload(target: impl Into<String>, destination: Destination) -> Self {
        Link::Preload {
            target: target.into(),
            destination,
            mime_type: None,
            crossorigin: false,
            image_srcset: vec![],
            image_sizes: None,
        }
    }

    /// A cross-origin font preload.
    pub fn preload_font(target: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Link::Preload {
            target: target.into(),
            destination: Destination::Font,
            mime_type: Some(mime_type.into()),
            crossorigin: true,
            image_srcset: vec![],
            image_sizes: None,
        }
    }

    /// A responsive image preload.
    pub fn preload_image(
        target: impl Into<String>,
        srcset: Vec<(String, u32)>,
        sizes: impl Into<String>,
    ) -> Self {
        Link::Preload {
            target: target.into(),
            destination: Destination::Image,
            mime_type: None,
            crossorigin: false,
            image_srcset: srcset,
            image_sizes: Some(sizes.into()),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Alternate {
                href,
                anchor,
                variant,
            } => {
                write!(
                    f,
                    "<{href}>;rel=\"alternate\";type=\"{}\";",
                    exchange::CONTENT_TYPE
                )?;
                if let Some(variant) = variant {
                    write!(f, "{variant}")?;
                }
                write!(f, "anchor=\"{anchor}\";")
            }
            Link::AllowedAltSxg {
                target,
                header_integrity,
                variant,
            } => {
                write!(f, "<{target}>;rel=\"allowed-alt-sxg\";")?;
                if let Some(variant) = variant {
                    write!(f, "{variant}")?;
                }
                write!(f, "header-integrity=\"{header_integrity}\"")
            }
            Link::Preload {
                target,
                destination,
                mime_type,
                crossorigin,
                image_srcset,
                image_sizes,
            } => {
                write!(f, "<{target}>;rel=\"preload\";as=\"{destination}\"")?;
                if let Some(mime_type) = mime_type {
                    write!(f, ";type=\"{mime_type}\"")?;
                }
                if *crossorigin {
                    f.write_str(";crossorigin")?;
                }
                if !image_srcset.is_empty() {
                    let srcset = image_srcset
                        .iter()
                        .map(|(url, width)| format!("{url} {width}w"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(f, ";imagesrcset=\"{srcset}\"")?;
                }
                if let Some(sizes) = image_sizes {
                    write!(f, ";imagesizes=\"{sizes}\"")?;
                }
                Ok(())
            }
        }
    }
}
