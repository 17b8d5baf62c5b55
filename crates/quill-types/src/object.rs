use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{validate_component, TypeError};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Identifier of a stored object.
///
/// An `ObjectId` is an opaque string. It names the object's changelog file
/// and its last two characters select the partition directory the file lives
/// in. Generated identifiers are UUID v7 values rendered in base 36, so the
/// trailing characters come from the random bits and spread evenly across
/// all 36 × 36 partitions.
///
/// Identifiers must be usable as a single path component and must survive the
/// audit log line grammar, so `/`, `\`, `:`, `@`, NUL and line breaks are
/// rejected, as are `.` and `..`. A trailing `.` is rejected too, since the
/// two-character suffix must never be `..`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Validate a caller-supplied identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_component("object id", &id, &[':', '@'])?;
        if id.ends_with('.') {
            return Err(TypeError::TrailingDot {
                kind: "object id",
                value: id,
            });
        }
        Ok(Self(id))
    }

    /// Allocate a fresh, unique identifier.
    pub fn generate() -> Self {
        Self(encode_base36(uuid::Uuid::now_v7().as_u128()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last two characters, used as the partition directory name.
    ///
    /// Single-character identifiers are their own suffix.
    pub fn suffix(&self) -> &str {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.0[start..]
    }
}

fn encode_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(25);
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    // Every byte comes from BASE36, which is ASCII.
    digits.into_iter().map(char::from).collect()
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ObjectId {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
