// 🎯 Similarity Matcher - Token-order-invariant fuzzy matching
//
// "Acme Corp Holdings" and "Holdings Acme Corp" score 100:
// both sides are tokenized, tokens sorted, then compared by
// normalized edit distance on the sorted strings.

use serde::Serialize;

/// Default acceptance cutoff on the 0-100 scale
pub const DEFAULT_THRESHOLD: u8 = 95;

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FuzzyMatch<'a> {
    /// The known key that won
    pub key: &'a str,

    /// Token-sort score (0 - 100)
    pub score: u8,
}

// ============================================================================
// BEST MATCH
// ============================================================================

/// Find the best-scoring known key for `candidate`
///
/// Returns the highest-scoring key when its score is `>= threshold`,
/// otherwise `None` ("treat as a new identity").
///
/// Ties go to the first key in iteration order, so `known_keys` must be an
/// ordered sequence for results to be reproducible.
///
/// ```
/// use exposure_ledger::similarity::best_match;
///
/// let known = ["exxon mobil corp", "chevron corp"];
/// let m = best_match("exxonmobil corp", known, 90).unwrap();
/// assert_eq!(m.key, "exxon mobil corp");
/// ```
pub fn best_match<'a, I>(candidate: &str, known_keys: I, threshold: u8) -> Option<FuzzyMatch<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate_sorted = sorted_tokens(candidate);
    let mut best: Option<FuzzyMatch<'a>> = None;

    for key in known_keys {
        let score = ratio(&candidate_sorted, &sorted_tokens(key));

        // Strictly greater: first key wins on equal scores
        if best.map_or(true, |b| score > b.score) {
            best = Some(FuzzyMatch { key, score });
        }
    }

    best.filter(|m| m.score >= threshold)
}

// ============================================================================
// SCORING
// ============================================================================

/// Token-sort ratio between two strings (0 - 100)
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Lowercase, turn non-alphanumerics into separators, sort tokens, rejoin
fn sorted_tokens(s: &str) -> String {
    let processed: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let mut tokens: Vec<&str> = processed.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity ratio based on insert/delete edit distance
///
/// ratio = (len_a + len_b - distance) / (len_a + len_b), scaled to 0-100
/// and rounded. Empty input on either side scores 0.
fn ratio(a: &str, b: &str) -> u8 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() || b_chars.is_empty() {
        return 0;
    }

    let total = a_chars.len() + b_chars.len();
    let distance = indel_distance(&a_chars, &b_chars);

    let score = (total - distance) as f64 / total as f64 * 100.0;
    score.round() as u8
}

/// Minimum number of single-character insertions + deletions turning `a` into `b`
///
/// Equals `len_a + len_b - 2 * LCS(a, b)`.
fn indel_distance(a: &[char], b: &[char]) -> usize {
    a.len() + b.len() - 2 * longest_common_subsequence(a, b)
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                std::cmp::max(prev[j + 1], curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_indel_distance() {
        assert_eq!(indel_distance(&chars(""), &chars("")), 0);
        assert_eq!(indel_distance(&chars("abc"), &chars("abc")), 0);
        assert_eq!(indel_distance(&chars("abc"), &chars("ab")), 1);
        assert_eq!(indel_distance(&chars("abc"), &chars("abd")), 2);
        assert_eq!(indel_distance(&chars("kitten"), &chars("sitting")), 5);
    }

    #[test]
    fn test_token_sort_ratio_order_invariant() {
        assert_eq!(token_sort_ratio("Acme Corp Holdings", "Holdings Acme Corp"), 100);
        assert_eq!(token_sort_ratio("acme corp", "acme corp"), 100);
    }

    #[test]
    fn test_token_sort_ratio_empty() {
        assert_eq!(token_sort_ratio("", "acme"), 0);
        assert_eq!(token_sort_ratio("", ""), 0);
    }

    #[test]
    fn test_token_sort_ratio_close_spelling() {
        // "corp exxonmobil" vs "corp exxon mobil": 30 / 31
        assert_eq!(token_sort_ratio("exxonmobil corp", "exxon mobil corp"), 97);
    }

    #[test]
    fn test_best_match_finds_close_key() {
        let known = ["exxon mobil corp", "chevron corp"];
        let m = best_match("exxonmobil corp", known, 90);
        assert_eq!(m.map(|m| m.key), Some("exxon mobil corp"));
        assert!(m.unwrap().score >= 90);
    }

    #[test]
    fn test_best_match_rejects_unrelated() {
        let known = ["exxon mobil corp"];
        assert!(best_match("unrelated widget co", known, 90).is_none());
    }

    #[test]
    fn test_best_match_threshold_inclusive() {
        let known = ["exxon mobil corp"];
        assert!(best_match("exxonmobil corp", known, 97).is_some());
        assert!(best_match("exxonmobil corp", known, 98).is_none());
    }

    #[test]
    fn test_best_match_tie_goes_to_first() {
        // Both reorderings score 100 against the candidate
        let known = vec!["beta alpha".to_string(), "alpha beta".to_string()];
        let m = best_match("alpha beta", known.iter().map(String::as_str), 95).unwrap();
        assert_eq!(m.key, "beta alpha");
        assert_eq!(m.score, 100);
    }

    #[test]
    fn test_best_match_empty_known_set() {
        let known: Vec<&str> = Vec::new();
        assert!(best_match("acme", known, 0).is_none());
    }
}
