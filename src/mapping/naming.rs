//! SQL identifier generation
//!
//! Element type and attribute names are turned into identifiers that every
//! supported database accepts unquoted, then made unique within their scope
//! (tables within the map, columns within a table).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

static INVALID_IDENTIFIER_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("identifier pattern is valid"));

/// Reduce a name to `[A-Za-z0-9_]`, prefixing `_` before a leading digit
pub fn sanitize(name: &str) -> String {
    let mut identifier = INVALID_IDENTIFIER_CHARS.replace_all(name, "_").into_owned();
    if identifier.is_empty() || identifier.starts_with(|c: char| c.is_ascii_digit()) {
        identifier.insert(0, '_');
    }
    identifier
}

/// Identifiers already used in one scope
///
/// Comparison ignores ASCII case, since most databases fold unquoted
/// identifiers.
#[derive(Debug, Clone, Default)]
pub struct UniqueNames {
    scope: String,
    used: HashSet<String>,
}

impl UniqueNames {
    /// Create an empty scope; the label only appears in log messages
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            used: HashSet::new(),
        }
    }

    /// Check whether an identifier is taken
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(&name.to_ascii_lowercase())
    }

    /// Claim `base`, or `base1`, `base2`, ... if it is taken
    pub fn claim(&mut self, base: &str) -> String {
        if self.used.insert(base.to_ascii_lowercase()) {
            return base.to_string();
        }

        let mut suffix = 1u32;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if self.used.insert(candidate.to_ascii_lowercase()) {
                warn!(scope = %self.scope, name = base, renamed = %candidate, "identifier already used, renamed");
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Number of identifiers claimed
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Check whether nothing has been claimed
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Order"), "Order");
        assert_eq!(sanitize("line-item.v2"), "line_item_v2");
        assert_eq!(sanitize("2ndAddress"), "_2ndAddress");
        assert_eq!(sanitize("Straße"), "Stra_e");
        assert_eq!(sanitize(""), "_");
    }

    #[test]
    fn test_claim_suffixes() {
        let mut names = UniqueNames::new("tables");
        assert_eq!(names.claim("Item"), "Item");
        assert_eq!(names.claim("Item"), "Item1");
        assert_eq!(names.claim("ITEM"), "ITEM2");
        assert!(names.contains("item1"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_claim_skips_taken_suffix() {
        let mut names = UniqueNames::new("columns");
        names.claim("Part1");
        names.claim("Part");
        assert_eq!(names.claim("Part"), "Part2");
    }

    proptest! {
        #[test]
        fn prop_claimed_names_are_unique(bases in proptest::collection::vec("[A-Za-z_][A-Za-z0-9_]{0,6}", 1..40)) {
            let mut names = UniqueNames::new("prop");
            let mut seen = HashSet::new();
            for base in &bases {
                let claimed = names.claim(base);
                prop_assert!(claimed.starts_with(base.as_str()));
                prop_assert!(seen.insert(claimed.to_ascii_lowercase()));
            }
        }

        #[test]
        fn prop_sanitized_names_are_identifiers(name in "\\PC{0,20}") {
            let identifier = sanitize(&name);
            prop_assert!(!identifier.is_empty());
            prop_assert!(identifier.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            prop_assert!(!identifier.starts_with(|c: char| c.is_ascii_digit()));
        }
    }
}
