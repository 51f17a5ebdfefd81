//! Text helpers: phrase matching, randomness detection and stable text
//! pattern extraction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tuning::{RandomnessTuning, TextTuning};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static LETTER_DIGIT_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z].*[0-9].*[a-zA-Z]").unwrap());
static BEM_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]+(-[a-z]+)*(__[a-z]+(-[a-z]+)*)?(--[a-z]+(-[a-z]+)*)?$").unwrap()
});
static PLAIN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z-]+$").unwrap());
static NUMERIC_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").unwrap());
static LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Zа-яА-Я]").unwrap());
static SUFFIXED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9.,]+[KMB%$€₽£|]").unwrap());

/// Raw text shorter than this never yields a pattern.
const MIN_SOURCE_LEN: usize = 3;

/// Collapse whitespace runs to a single space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Case-insensitive containment after whitespace normalization of both
/// sides. Empty inputs never match.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    if text.is_empty() || phrase.is_empty() {
        return false;
    }
    let text = normalize_whitespace(&text.to_lowercase());
    let phrase = normalize_whitespace(&phrase.to_lowercase());
    text.contains(&phrase)
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(token: &str) -> f64 {
    let mut counts = std::collections::HashMap::new();
    let mut total = 0usize;
    for ch in token.chars() {
        *counts.entry(ch).or_insert(0usize) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Heuristic for machine-generated identifiers (hashed class names,
/// build ids). Short tokens and conventional CSS names are exempt.
pub fn is_random_generated(token: &str, tuning: &RandomnessTuning) -> bool {
    let len = token.chars().count();
    if len < tuning.min_len {
        return false;
    }

    let looks_random = LETTER_DIGIT_LETTER.is_match(token)
        || len > tuning.long_len
        || shannon_entropy(token) > tuning.entropy_threshold;

    let conventional =
        BEM_TOKEN.is_match(token) || PLAIN_TOKEN.is_match(token) || len <= tuning.short_len;

    looks_random && !conventional
}

/// Pick up to a few meaningful words out of an element's text, skipping
/// counters, prices and other volatile tokens.
pub fn extract_stable_text_pattern(text: &str, tuning: &TextTuning) -> Option<String> {
    if text.chars().count() < MIN_SOURCE_LEN {
        return None;
    }

    let clean = normalize_whitespace(text);
    let words: Vec<&str> = clean
        .split_whitespace()
        .filter(|word| is_stable_word(word, tuning))
        .take(tuning.max_words)
        .collect();
    if words.is_empty() {
        return None;
    }

    let pattern = words.join(" ");
    let len = pattern.chars().count();
    (tuning.min_pattern_len..=tuning.max_pattern_len)
        .contains(&len)
        .then_some(pattern)
}

fn is_stable_word(word: &str, tuning: &TextTuning) -> bool {
    if NUMERIC_WORD.is_match(word) {
        return false;
    }

    let len = word.chars().count();
    if len < tuning.min_word_len {
        return false;
    }

    let digits = word.chars().filter(|ch| ch.is_ascii_digit()).count();
    if digits as f64 > len as f64 * tuning.max_digit_ratio {
        return false;
    }

    let has_letter = LETTER.is_match(word);
    let starts_with_digit = word.chars().next().is_some_and(|ch| ch.is_ascii_digit());
    let ends_with_digit = word.chars().last().is_some_and(|ch| ch.is_ascii_digit());
    if (starts_with_digit || ends_with_digit) && has_letter {
        return false;
    }

    !SUFFIXED_NUMBER.is_match(word) && has_letter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_phrase_normalizes() {
        assert!(contains_phrase("  Subscribe\n  to   our NEWSLETTER ", "to our newsletter"));
        assert!(contains_phrase("abc", " b "));
        assert!(!contains_phrase("", "x"));
        assert!(!contains_phrase("text", ""));
        assert!(!contains_phrase("subscribe now", "subscribenow"));
    }

    #[test]
    fn test_entropy() {
        assert_eq!(shannon_entropy(""), 0.0);
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        assert!((shannon_entropy("abcd") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_random_tokens() {
        let tuning = RandomnessTuning::default();
        assert!(!is_random_generated("btn-primary", &tuning));
        assert!(is_random_generated("a8f3k9z1q2", &tuning));
        assert!(!is_random_generated("modal__close--big", &tuning));
        assert!(!is_random_generated("abc", &tuning));
        // short names are exempt even when mixed
        assert!(!is_random_generated("ab1cd2", &tuning));
        assert!(is_random_generated("Subscribe Newsletter", &tuning));
        assert!(is_random_generated("css-1x2y3z4", &tuning));
    }

    #[test]
    fn test_extract_drops_volatile_words() {
        let tuning = TextTuning::default();
        let pattern = extract_stable_text_pattern("  Купить   сейчас!  1,5K95  ", &tuning).unwrap();
        assert_eq!(pattern, "Купить сейчас!");
        let len = pattern.chars().count();
        assert!((4..=30).contains(&len));
    }

    #[test]
    fn test_extract_limits() {
        let tuning = TextTuning::default();
        assert_eq!(extract_stable_text_pattern("ab", &tuning), None);
        assert_eq!(extract_stable_text_pattern("123 456 7", &tuning), None);
        assert_eq!(extract_stable_text_pattern("Hi", &tuning), None);
        assert_eq!(
            extract_stable_text_pattern("Only today sale 50% off", &tuning),
            Some("Only today sale".to_string())
        );
        assert_eq!(
            extract_stable_text_pattern("abc123 v2 Subscribe", &tuning),
            Some("Subscribe".to_string())
        );
        assert_eq!(
            extract_stable_text_pattern("Supercalifragilistic expialidocious wording", &tuning),
            None
        );
    }
}
