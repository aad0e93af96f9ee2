//! # Master Numbers
//!
//! A variant family is known to the hub by one number, but the storefront
//! only numbers its details. When a family has no stored master number one
//! is derived from the sibling numbers:
//!
//! ```text
//!   ["SHIRT-RED-M", "SHIRT-RED-L", "SHIRT-BLUE"]
//!        common prefix      → "SHIRT-"
//!        strip separators   → "SHIRT"
//!        taken by a detail? → "SHIRT-hauptartikel"
//!
//!   ["X1", "Y2"]
//!        common prefix      → ""
//!        fallback           → "X1-hauptartikel"
//! ```

use regex::Regex;
use std::sync::LazyLock;

/// Suffix appended to make a master number unique.
pub const MASTER_SUFFIX: &str = "-hauptartikel";

static TRAILING_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9]+$").expect("TRAILING_SEPARATORS is a valid regex pattern")
});

/// Longest common prefix, compared per character.
pub fn common_prefix<S: AsRef<str>>(numbers: &[S]) -> String {
    let Some((first, rest)) = numbers.split_first() else {
        return String::new();
    };
    let mut prefix: Vec<char> = first.as_ref().chars().collect();
    for number in rest {
        let shared = prefix
            .iter()
            .zip(number.as_ref().chars())
            .take_while(|(a, b)| **a == *b)
            .count();
        prefix.truncate(shared);
    }
    prefix.into_iter().collect()
}

/// First master number candidate for a set of sibling numbers.
///
/// Returns `None` for an empty family.
pub fn master_candidate<S: AsRef<str>>(numbers: &[S]) -> Option<String> {
    let first = numbers.first()?.as_ref();
    let prefix = common_prefix(numbers);
    let trimmed = TRAILING_SEPARATORS.replace(&prefix, "");
    if trimmed.is_empty() {
        Some(format!("{first}{MASTER_SUFFIX}"))
    } else {
        Some(trimmed.into_owned())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_prefix_is_literal() {
        assert_eq!(common_prefix(&["ABC-001", "ABC-002", "ABC-003"]), "ABC-00");
        assert_eq!(common_prefix(&["Größe-1", "Größe-2"]), "Größe-");
        assert_eq!(common_prefix::<&str>(&[]), "");
    }

    #[test]
    fn test_trailing_separators_are_stripped() {
        assert_eq!(master_candidate(&["ABC-1", "ABC-2"]).unwrap(), "ABC");
        assert_eq!(master_candidate(&["A.B_/x", "A.B_/y"]).unwrap(), "A.B");
    }

    #[test]
    fn test_fallback_uses_first_sibling() {
        assert_eq!(master_candidate(&["X1", "Y2"]).unwrap(), "X1-hauptartikel");
        assert_eq!(master_candidate(&["--1", "--2"]).unwrap(), "--1-hauptartikel");
        assert_eq!(master_candidate::<&str>(&[]), None);
    }

    #[test]
    fn test_single_sibling_keeps_its_number() {
        assert_eq!(master_candidate(&["SHIRT-1"]).unwrap(), "SHIRT-1");
    }
}
