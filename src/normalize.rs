// 🔤 Name Normalizer - Raw names → normalization keys
//
// Two normalizers live here:
// - `normalize_name`: entity names (brands, companies) → exact-match key
// - `SecurityNormalizer`: security names from fund holdings → aggregation key
//
// "Acme, Inc." / "ACME INC" / "acme incorporated" → "acme"
// "Berkshire Hathaway Inc Class B" → "berkshire hathaway inc"

use regex::Regex;
use std::sync::OnceLock;

// ============================================================================
// ENTITY NAMES
// ============================================================================

/// Trailing corporate-form suffixes. Leading space = whole word only,
/// so a single-word name ("Global") is never stripped to nothing.
const CORPORATE_SUFFIXES: [&str; 19] = [
    " inc",
    " incorporated",
    " llc",
    " ltd",
    " limited",
    " corp",
    " corporation",
    " plc",
    " gmbh",
    " sa",
    " ag",
    " nv",
    " bv",
    " co",
    " company",
    " group",
    " holdings",
    " international",
    " global",
];

/// Normalize an entity name into its exact-match key
///
/// Steps:
/// 1. Trim + case-fold
/// 2. Drop every character that is not alphanumeric or whitespace
/// 3. Collapse whitespace runs
/// 4. Strip trailing corporate suffixes until none is left
///
/// Punctuation goes before suffix matching so "Acme, Inc." and "Acme Inc"
/// land on the same key, and step 4 runs to a fixed point, which makes the
/// whole function idempotent.
///
/// Returns `""` for empty or punctuation-only input. Callers skip empty keys.
pub fn normalize_name(raw: &str) -> String {
    let folded = raw.trim().to_lowercase();

    let cleaned: String = folded
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    let mut normalized = collapse_whitespace(&cleaned);

    loop {
        let mut stripped = false;
        for suffix in CORPORATE_SUFFIXES.iter() {
            if let Some(rest) = normalized.strip_suffix(suffix) {
                normalized = rest.trim_end().to_string();
                stripped = true;
            }
        }
        if !stripped {
            break;
        }
    }

    normalized
}

/// Collapse any run of whitespace into a single space and trim both ends
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// SECURITY NAMES
// ============================================================================

/// Trailing share-class qualifier: "class a", "cl b", "-cl. c", "class a1", "class 2".
/// The designator is one letter (optionally one digit) or one digit, so a
/// legal form after "class" ("World Class Inc") is left alone.
const SHARE_CLASS_PATTERN: &str = r"(?:\s|-)+(?:class|cl)\.?\s+(?:[a-z]\d?|\d)\.?$";

fn share_class_regex() -> Option<&'static Regex> {
    static SHARE_CLASS: OnceLock<Option<Regex>> = OnceLock::new();
    SHARE_CLASS
        .get_or_init(|| Regex::new(SHARE_CLASS_PATTERN).ok())
        .as_ref()
}

/// Normalizer for security names coming out of fund holdings
///
/// - Case-fold
/// - "corporation" → "corp", "incorporated" → "inc"
/// - Strip a trailing share-class qualifier (when grouping is on)
///
/// Grouping share classes collapses every class of one issuer into a
/// single aggregation bucket.
#[derive(Debug, Clone, Copy)]
pub struct SecurityNormalizer {
    pub group_share_classes: bool,
}

impl SecurityNormalizer {
    pub fn new(group_share_classes: bool) -> Self {
        SecurityNormalizer {
            group_share_classes,
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        let folded = collapse_whitespace(&raw.to_lowercase())
            .replace("corporation", "corp")
            .replace("incorporated", "inc");

        if !self.group_share_classes {
            return folded;
        }

        match share_class_regex() {
            Some(re) => collapse_whitespace(&re.replace(&folded, "")),
            None => folded,
        }
    }
}

impl Default for SecurityNormalizer {
    fn default() -> Self {
        Self::new(true)
    }
}

// ============================================================================
// TESTS
// ============================================================================
