//! Provider header handling.

use crate::encoding::decode_rfc2047;
use std::collections::HashMap;

/// Collection of message headers as reported by a provider.
///
/// Names are case-insensitive; a name may carry several values, kept in the
/// order they were added.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from `(name, value)` pairs.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.add(name, value);
        }
        headers
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Gets the first value for a header with RFC 2047 words decoded.
    ///
    /// A value that fails to decode is returned verbatim.
    #[must_use]
    pub fn decoded(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|raw| decode_rfc2047(raw).unwrap_or_else(|_| raw.to_string()))
    }

    /// Gets every value for a header with RFC 2047 words decoded.
    ///
    /// Values that fail to decode are returned verbatim.
    #[must_use]
    pub fn decoded_all(&self, name: &str) -> Vec<String> {
        self.get_all(name)
            .into_iter()
            .map(|raw| decode_rfc2047(raw).unwrap_or_else(|_| raw.to_string()))
            .collect()
    }

    /// Returns the number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}
