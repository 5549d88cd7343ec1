//! Domain identifiers.
//!
//! - `EntryId`: ドキュメント内の 1 エントリ（= 1 update task）の識別子
//! - `LockToken`: ロック所有者を示すトークン（ULID）

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier of one entry in the document.
///
/// The serialized document keys its map by text, so integer identifiers are
/// stored in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Inclusive range of integer identifiers.
    ///
    /// ```ignore
    /// EntryId::range(1, 3) // ["1", "2", "3"]
    /// EntryId::range(5, 4) // []
    /// ```
    pub fn range(start: u64, end: u64) -> Vec<EntryId> {
        (start..=end).map(EntryId::from).collect()
    }
}

impl From<u64> for EntryId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ownership token written into the lock entries.
///
/// Release and extension only succeed while the stored token still matches,
/// so a holder whose lock expired cannot delete a successor's lock.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockToken(Ulid);

impl LockToken {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 3, vec!["1", "2", "3"])]
    #[case(5, 5, vec!["5"])]
    #[case(5, 4, vec![])]
    fn range_is_inclusive(#[case] start: u64, #[case] end: u64, #[case] expected: Vec<&str>) {
        let ids = EntryId::range(start, end);
        let ids: Vec<&str> = ids.iter().map(EntryId::as_str).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn range_two_to_hundred_has_ninety_nine_ids() {
        let ids = EntryId::range(2, 100);
        assert_eq!(ids.len(), 99);
        assert_eq!(ids.first(), Some(&EntryId::from(2)));
        assert_eq!(ids.last(), Some(&EntryId::from(100)));
    }

    #[test]
    fn integer_and_text_ids_agree() {
        assert_eq!(EntryId::from(42), EntryId::from("42"));
        assert_eq!(EntryId::new("alpha").to_string(), "alpha");
    }

    #[test]
    fn tokens_are_unique_and_prefixed() {
        let a = LockToken::generate();
        let b = LockToken::generate();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("lock-"));
    }
}
