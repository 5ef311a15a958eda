//! Response header set carried inside an exchange, and its canonical CBOR form.

use std::collections::BTreeMap;

use ciborium::value::Value;

use crate::error::{Error, Result};

/// `cache-control` carried by every subresource exchange.
pub const SUBRESOURCE_CACHE_CONTROL: &str = "public, max-age=600";

/// Response headers keyed by lower-cased name.
///
/// Values added under the same name keep their insertion order and are joined
/// with `,` when serialized, the way an HTTP/1.1 field list would be folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    fields: BTreeMap<String, Vec<String>>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// The header set shared by subresource exchanges and the
    /// header-integrity computation that advertises them.
    pub fn subresource(cors: bool) -> Self {
        let mut headers = Self::new();
        headers.add("cache-control", SUBRESOURCE_CACHE_CONTROL);
        if cors {
            headers.add("access-control-allow-origin", "*");
        }
        headers
    }

    /// Appends a value for `name`.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Returns the folded value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<String> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(|values| values.join(","))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, String)> {
        self.fields
            .iter()
            .map(|(name, values)| (name.as_str(), values.join(",")))
    }

    /// Serializes the headers plus the `:status` pseudo header as a canonical
    /// CBOR map of byte strings.
    ///
    /// Canonical ordering sorts keys by encoded length first and then
    /// bytewise, so the output only depends on the header contents.
    pub fn to_cbor(&self, status: u16) -> Result<Vec<u8>> {
        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(self.fields.len() + 1);
        entries.push((b":status".to_vec(), status.to_string().into_bytes()));
        for (name, value) in self.iter() {
            if name.starts_with(':') {
                return Err(Error::encoding(format!(
                    "pseudo header '{name}' is not allowed in response headers"
                )));
            }
            entries.push((name.as_bytes().to_vec(), value.into_bytes()));
        }
        entries.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let map = Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Bytes(k), Value::Bytes(v)))
                .collect(),
        );

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&map, &mut buf)
            .map_err(|e| Error::encoding(format!("failed to encode response headers: {e}")))?;
        Ok(buf)
    }
}
