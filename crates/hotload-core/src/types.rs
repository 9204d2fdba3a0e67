use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an immutable snapshot of the tracked reference (a commit SHA).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Returns `None` for empty or whitespace-only identifiers.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(7) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_identifiers() {
        assert_eq!(Revision::new(""), None);
        assert_eq!(Revision::new("   "), None);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let rev = Revision::new(" abc123\n").unwrap();
        assert_eq!(rev.as_str(), "abc123");
    }

    #[test]
    fn short_takes_seven_chars() {
        let rev = Revision::new("0123456789abcdef").unwrap();
        assert_eq!(rev.short(), "0123456");
        let tiny = Revision::new("abc").unwrap();
        assert_eq!(tiny.short(), "abc");
    }

    #[test]
    fn serializes_as_plain_string() {
        let rev = Revision::new("abc123").unwrap();
        assert_eq!(serde_json::to_string(&rev).unwrap(), "\"abc123\"");
    }
}
