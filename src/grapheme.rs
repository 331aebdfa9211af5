//! Grapheme-aware text measurement and splitting.
//!
//! All text lengths in the algebra are counts of extended grapheme
//! clusters (UAX #29), never code points or code units, so a split can
//! never separate the halves of a ZWJ sequence, a regional-indicator flag
//! pair, a variation selector, a skin-tone modifier, or a subdivision tag
//! sequence from their base.

use unicode_segmentation::UnicodeSegmentation;

/// Number of user-perceived characters in `text`.
pub fn count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Split `text` after its first `n` graphemes.
///
/// The boundary always falls between clusters; `n` at or past the end
/// returns `(text, "")`.
pub fn split_at(text: &str, n: usize) -> (&str, &str) {
    match text.grapheme_indices(true).nth(n) {
        Some((byte, _)) => text.split_at(byte),
        None => (text, ""),
    }
}

/// The smallest prefix of `text` holding at least `n` graphemes.
///
/// Where a requested boundary would land inside a cluster, the prefix is
/// extended rightward until the cluster completes, so callers slicing an
/// "at least this much" window never receive a torn cluster. `n` at or
/// past the end returns `text` unchanged.
pub fn take_at_least(text: &str, n: usize) -> &str {
    split_at(text, n).0
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case("", 0; "empty")]
    #[test_case("abc", 3; "ascii")]
    #[test_case("héllo", 5; "combining accent")]
    #[test_case("🇺🇸🇭🇺", 2; "regional indicator pairs")]
    #[test_case("🚵🏻‍♀️", 1; "zwj with skin tone and variation selector")]
    #[test_case("🏴󠁧󠁢󠁳󠁣󠁴󠁿", 1; "subdivision tag sequence")]
    #[test_case("a👍🏽b", 3; "astral with modifier between ascii")]
    fn test_count(text: &str, expected: usize) {
        assert_eq!(count(text), expected);
    }

    #[test]
    fn test_split_keeps_clusters_whole() {
        let text = "01🚵🏻‍♀️345";

        let (left, right) = split_at(text, 3);
        assert_eq!(left, "01🚵🏻‍♀️");
        assert_eq!(right, "345");

        let (left, right) = split_at(text, 2);
        assert_eq!(left, "01");
        assert_eq!(right, "🚵🏻‍♀️345");
    }

    #[test]
    fn test_split_reconcatenates() {
        let text = "a🇺🇸b👩‍👩‍👧‍👦c";
        for n in 0..=count(text) + 1 {
            let (left, right) = split_at(text, n);
            assert_eq!(format!("{left}{right}"), text);
        }
    }

    #[test]
    fn test_split_past_end() {
        assert_eq!(split_at("ab", 5), ("ab", ""));
    }

    #[test]
    fn test_take_at_least() {
        assert_eq!(take_at_least("01🚵🏻‍♀️345", 3), "01🚵🏻‍♀️");
        assert_eq!(take_at_least("ab", 9), "ab");
        assert_eq!(take_at_least("ab", 0), "");
    }
}
