//! Case-insensitive module identifiers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use modula_util::errors::ModulaError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A module or dependency-target name.
///
/// Equality, hashing and ordering use a lower-cased form; the original
/// casing is kept for display.
#[derive(Debug, Clone)]
pub struct Identifier {
    original: String,
    normalized: String,
}

impl Identifier {
    /// Build an identifier from any text. Never fails.
    pub fn of(text: impl Into<String>) -> Self {
        let original = text.into();
        let normalized = original.to_lowercase();
        Self {
            original,
            normalized,
        }
    }

    /// Parse identifier text coming from descriptor input.
    ///
    /// Rejects empty text and text containing whitespace.
    pub fn parse(text: &str) -> Result<Self, ModulaError> {
        if text.is_empty() {
            return Err(ModulaError::Parse {
                message: "identifier must not be empty".to_string(),
            });
        }
        if text.chars().any(char::is_whitespace) {
            return Err(ModulaError::Parse {
                message: format!("identifier '{text}' must not contain whitespace"),
            });
        }
        Ok(Self::of(text))
    }

    /// The identifier as originally written.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// The normalized form used for comparison.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl From<&str> for Identifier {
    fn from(text: &str) -> Self {
        Self::of(text)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Identifier::parse(&text).map_err(serde::de::Error::custom)
    }
}
