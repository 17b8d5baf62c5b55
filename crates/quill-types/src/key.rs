use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{validate_component, TypeError};

/// Name of an index bucket.
///
/// Index keys map directly to file names under `indexes/`, so they follow the
/// same path rules as object ids. Colons are allowed: keys are conventionally
/// written as `attribute:value`, e.g. `title:foo`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexKey(String);

impl IndexKey {
    pub fn new(key: impl Into<String>) -> Result<Self, TypeError> {
        let key = key.into();
        validate_component("index key", &key, &[])?;
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IndexKey {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for IndexKey {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for IndexKey {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<IndexKey> for String {
    fn from(key: IndexKey) -> Self {
        key.0
    }
}

impl AsRef<str> for IndexKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexKey({})", self.0)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_attribute_value_keys() {
        let key = IndexKey::new("title:foo").unwrap();
        assert_eq!(key.as_str(), "title:foo");
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(IndexKey::new("../etc").is_err());
        assert!(IndexKey::new("..").is_err());
        assert!(IndexKey::new("").is_err());
        assert!(IndexKey::new("a\nb").is_err());
    }
}
