//! Read-only lookup services used during decode.
//!
//! Persisted rows reference tool categories and mining patterns by string
//! identifier. The registries owning those objects live outside this crate,
//! so decode receives them as explicitly passed resolver traits rather than
//! reaching into ambient global state. "Not found" is an expected answer,
//! never an error: the registry is the source of truth and may have dropped
//! an identifier since the data was written.

use std::collections::BTreeMap;

/// Resolver from a category identifier to its canonical registered form.
#[cfg_attr(test, mockall::automock)]
pub trait CategoryLookup: Send + Sync {
    /// Resolve `id` (case-insensitively) to the canonical identifier of a
    /// registered category, or `None` if no such category exists.
    fn resolve(&self, id: &str) -> Option<String>;
}

/// Resolver from a pattern identifier to its canonical registered form.
#[cfg_attr(test, mockall::automock)]
pub trait PatternLookup: Send + Sync {
    /// Resolve `id` (case-insensitively) to the canonical identifier of a
    /// registered pattern, or `None` if no such pattern exists.
    fn resolve(&self, id: &str) -> Option<String>;
}

/// A fixed, case-insensitive id set implementing both lookup traits.
///
/// Suitable for tests and for deployments whose registries are static.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    // lowercase id -> canonical id
    ids: BTreeMap<String, String>,
}

impl StaticLookup {
    /// Build a lookup over the given canonical identifiers.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids
            .into_iter()
            .map(Into::into)
            .map(|id| (id.to_lowercase(), id))
            .collect();
        Self { ids }
    }

    fn get(&self, id: &str) -> Option<String> {
        self.ids.get(&id.to_lowercase()).cloned()
    }
}

impl CategoryLookup for StaticLookup {
    fn resolve(&self, id: &str) -> Option<String> {
        self.get(id)
    }
}

impl PatternLookup for StaticLookup {
    fn resolve(&self, id: &str) -> Option<String> {
        self.get(id)
    }
}
