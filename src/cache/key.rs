//! Cache key derivation.
//!
//! A key is built from ordered segments: scalar context fields (role names,
//! model ids) and item lists whose order carries no meaning (skill lists).
//! Item lists are normalized (trimmed, lowercased, sorted) so that requests
//! naming the same items in a different order collide on purpose.
//! Delimiters and backslashes inside values are escaped with a backslash, so
//! `["a,b"]` and `["a", "b"]` derive different keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Separator between key segments.
pub const SEGMENT_DELIMITER: char = '|';
/// Separator between items inside one list segment.
pub const ITEM_DELIMITER: char = ',';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 hex digest of the key, for stores that want bounded-length ids.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self(format!("{}:{}", prefix, self.0))
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder {
    namespace: Option<String>,
    segments: Vec<String>,
}

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix applied as `namespace:` in front of the derived key.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Append a scalar field verbatim.
    pub fn scalar(mut self, value: impl AsRef<str>) -> Self {
        self.segments.push(escape(value.as_ref()));
        self
    }

    /// Append an order-irrelevant list of item names.
    pub fn items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.segments.push(normalize_items(items));
        self
    }

    /// Append an order-irrelevant list, using `field` as each item's identity.
    pub fn items_by<T, F>(self, items: &[T], field: F) -> Self
    where
        F: Fn(&T) -> &str,
    {
        self.items(items.iter().map(field))
    }

    pub fn build(self) -> CacheKey {
        let mut key = String::new();
        if let Some(ns) = self.namespace {
            key.push_str(&ns);
            key.push(':');
        }
        key.push_str(&self.segments.join(&SEGMENT_DELIMITER.to_string()));
        CacheKey(key)
    }
}

fn normalize_items<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = items
        .into_iter()
        .map(|s| escape(&s.as_ref().trim().to_lowercase()))
        .collect();
    names.sort();
    names.join(&ITEM_DELIMITER.to_string())
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, SEGMENT_DELIMITER | ITEM_DELIMITER | ESCAPE) {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Skill {
        name: String,
    }

    fn skills(names: &[&str]) -> Vec<Skill> {
        names
            .iter()
            .map(|n| Skill {
                name: n.to_string(),
            })
            .collect()
    }

    fn transferable_skills_key(current: &[Skill], target: &[Skill], from: &str, to: &str) -> CacheKey {
        CacheKeyBuilder::new()
            .namespace("transferable")
            .scalar(from)
            .scalar(to)
            .items_by(current, |s| s.name.as_str())
            .items_by(target, |s| s.name.as_str())
            .build()
    }

    #[test]
    fn permuted_lists_produce_the_same_key() {
        let a = transferable_skills_key(
            &skills(&["Python", "SQL", "Excel"]),
            &skills(&["Tableau", "statistics"]),
            "Analyst",
            "Data Scientist",
        );
        let b = transferable_skills_key(
            &skills(&["excel", "python", "sql"]),
            &skills(&["Statistics", "TABLEAU"]),
            "Analyst",
            "Data Scientist",
        );
        assert_eq!(a, b);
        assert_eq!(
            a.as_str(),
            "transferable:Analyst|Data Scientist|excel,python,sql|statistics,tableau"
        );
    }

    #[test]
    fn different_scalars_or_items_differ() {
        let base = transferable_skills_key(&skills(&["sql"]), &skills(&[]), "Analyst", "Engineer");
        let other_role = transferable_skills_key(&skills(&["sql"]), &skills(&[]), "Analyst", "Manager");
        let other_items = transferable_skills_key(&skills(&["sql", "go"]), &skills(&[]), "Analyst", "Engineer");
        assert_ne!(base, other_role);
        assert_ne!(base, other_items);
    }

    #[test]
    fn list_segments_do_not_swap() {
        let a = CacheKeyBuilder::new().items(["a"]).items(["b"]).build();
        let b = CacheKeyBuilder::new().items(["b"]).items(["a"]).build();
        assert_ne!(a, b);
    }

    #[test]
    fn delimiters_inside_values_do_not_collide() {
        let joined = CacheKeyBuilder::new().items(["a,b"]).build();
        let split = CacheKeyBuilder::new().items(["a", "b"]).build();
        assert_ne!(joined, split);
        assert_eq!(joined.as_str(), "a\\,b");

        let piped = CacheKeyBuilder::new().scalar("x|y").build();
        let segments = CacheKeyBuilder::new().scalar("x").scalar("y").build();
        assert_ne!(piped, segments);

        let escaped = CacheKeyBuilder::new().scalar("x\\").scalar("y").build();
        let literal = CacheKeyBuilder::new().scalar("x\\|y").build();
        assert_ne!(escaped, literal);
    }

    #[test]
    fn empty_lists_produce_empty_segments() {
        let key = CacheKeyBuilder::new()
            .scalar("role")
            .items(Vec::<String>::new())
            .items(Vec::<String>::new())
            .build();
        assert_eq!(key.as_str(), "role||");
    }

    #[test]
    fn digest_is_stable_hex() {
        let key = CacheKey::new("onet:15-1252.00");
        let digest = key.digest();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, CacheKey::new("onet:15-1252.00").digest());
        assert_ne!(digest, CacheKey::new("onet:15-1253.00").digest());
    }
}
