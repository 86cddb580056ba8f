//! Cache keys.
//!
//! Server-side keys are built with [`CacheKey::scoped`], which requires the
//! caller's [`CompanyScope`]. Two scopes therefore never share an entry, and
//! a key that forgets its scope cannot be written.

use procura_core::CompanyScope;
use std::fmt;

/// Separator between the scope and the rest of the key.
const SCOPE_SEPARATOR: char = '|';
/// Separator between key segments.
const SEGMENT_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// An unscoped key taken verbatim, such as an endpoint path on the client.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// `scope|segment/segment/...`
    pub fn scoped<I, S>(scope: &CompanyScope, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut key = String::from(scope.as_str());
        key.push(SCOPE_SEPARATOR);
        for (i, segment) in segments.into_iter().enumerate() {
            if i > 0 {
                key.push(SEGMENT_SEPARATOR);
            }
            key.push_str(segment.as_ref());
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scope part of a scoped key, if it has one.
    pub fn scope(&self) -> Option<&str> {
        self.0.split_once(SCOPE_SEPARATOR).map(|(scope, _)| scope)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for CacheKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}
