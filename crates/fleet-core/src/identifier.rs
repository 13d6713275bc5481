//! Resource identifiers: the stable name for any entity in the fleet.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// A stable name for any entity, addressable by its canonical string form
/// `[<parent>/]<type>.<name>`.
///
/// `tokens` is an approximation of LLM token cost attached for budgeting; it
/// is advisory, not authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// `"<namespace>.<Class>"`, e.g. `"common.Message"`.
    pub r#type: String,
    /// Opaque name, content-addressed where possible.
    pub name: String,
    /// Canonical-string path of the parent identifier, or empty for none.
    pub parent: String,
    /// Advisory token cost.
    pub tokens: u32,
}

/// Failure to parse a canonical identifier string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIdentifierError {
    /// The final path segment has no `.` separating type from name.
    #[error("identifier segment {0:?} has no '.' separating type from name")]
    MissingTypeSeparator(String),
    /// The input was empty.
    #[error("identifier string is empty")]
    Empty,
}

impl Identifier {
    /// Construct a root-level identifier (no parent) with zero tokens.
    pub fn new(r#type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            name: name.into(),
            parent: String::new(),
            tokens: 0,
        }
    }

    /// Builder-style setter for `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    /// Builder-style setter for `tokens`.
    #[must_use]
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens = tokens;
        self
    }

    /// Derive a content-addressed name from a stable hash of `payload`.
    ///
    /// Used by resource producers that want identical content to collapse
    /// to the same identifier across re-puts.
    #[must_use]
    pub fn content_hash(payload: &[u8]) -> String {
        let digest = Sha256::digest(payload);
        hex_encode(&digest)
    }

    /// Canonical string form: `[<parent>/]<type>.<name>`.
    #[must_use]
    pub fn to_canonical(&self) -> String {
        if self.parent.is_empty() {
            format!("{}.{}", self.r#type, self.name)
        } else {
            format!("{}/{}.{}", self.parent, self.r#type, self.name)
        }
    }

    /// Parse a canonical string back into an [`Identifier`].
    ///
    /// The exact inverse of [`Identifier::to_canonical`] except for
    /// `tokens`, which is not part of the string form and defaults to 0.
    pub fn parse(s: &str) -> Result<Self, ParseIdentifierError> {
        if s.is_empty() {
            return Err(ParseIdentifierError::Empty);
        }
        let (parent, last) = match s.rfind('/') {
            Some(idx) => (s[..idx].to_string(), &s[idx + 1..]),
            None => (String::new(), s),
        };
        let dot = last
            .rfind('.')
            .ok_or_else(|| ParseIdentifierError::MissingTypeSeparator(last.to_string()))?;
        let r#type = last[..dot].to_string();
        let name = last[dot + 1..].to_string();
        Ok(Self {
            r#type,
            name,
            parent,
            tokens: 0,
        })
    }

    /// Whether `self`'s canonical string starts with `prefix`.
    ///
    /// Used by index filters: `"a.B"` matches both `"a.B.x"` and
    /// `"a.B.Sub.y"` since this is a prefix test, not equality.
    #[must_use]
    pub fn canonical_starts_with(&self, prefix: &str) -> bool {
        self.to_canonical().starts_with(prefix)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}
