//! Version tags for cache-validity decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::input::content_hash;

/// Identifies the content a store was populated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTag {
    /// Content or caller-chosen tag; the only part compared.
    pub tag: String,
    pub created_at: DateTime<Utc>,
}

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            created_at: Utc::now(),
        }
    }

    /// Tag derived from the SHA-256 of the content.
    pub fn from_content(bytes: &[u8]) -> Self {
        Self::new(content_hash(bytes))
    }

    /// Whether two tags describe the same content.
    pub fn same_content(&self, other: &VersionTag) -> bool {
        self.tag == other.tag
    }
}

/// Outcome of comparing a stored tag with a fresh one.
///
/// A mismatch is an expected state for the caller to act on (usually by
/// re-ingesting), not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCheck {
    pub mismatch: bool,
    pub reason: Option<String>,
}

impl VersionCheck {
    /// Compare the stored tag (if any) against a candidate.
    pub fn compare(stored: Option<&VersionTag>, candidate: &VersionTag) -> Self {
        match stored {
            None => Self {
                mismatch: true,
                reason: Some("no version tag stored".to_string()),
            },
            Some(stored) if !stored.same_content(candidate) => Self {
                mismatch: true,
                reason: Some(format!(
                    "stored tag '{}' differs from '{}'",
                    stored.tag, candidate.tag
                )),
            },
            Some(_) => Self {
                mismatch: false,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_content() {
        let a = VersionTag::from_content(b"chr1\t100");
        let b = VersionTag::from_content(b"chr1\t100");
        assert!(a.tag.starts_with("sha256:"));
        assert!(a.same_content(&b));
        assert!(!a.same_content(&VersionTag::from_content(b"chr1\t101")));
    }

    #[test]
    fn test_compare() {
        let tag = VersionTag::new("v1");
        assert!(VersionCheck::compare(None, &tag).mismatch);
        assert!(VersionCheck::compare(Some(&VersionTag::new("v0")), &tag).mismatch);

        let same = VersionCheck::compare(Some(&VersionTag::new("v1")), &tag);
        assert!(!same.mismatch);
        assert!(same.reason.is_none());
    }
}
