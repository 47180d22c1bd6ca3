//! Target-description keyword extraction, grounded on the teacher's
//! `perceiver-semantic/src/keywords.rs` (`unicode_words` tokenization over
//! a stopword filter), feeding the exact semantics of
//! `original_source/engine/selector_pattern_tracker.py`'s `_extract_keywords`
//! (lowercase, drop stopwords and single-char tokens, strip punctuation).

use unicode_segmentation::UnicodeSegmentation;

const STOPWORDS: &[&str] = &["the", "a", "an", "on", "in", "to", "for", "of", "and", "or", "is", "are"];

pub fn extract_keywords(target: &str) -> Vec<String> {
    target
        .unicode_words()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_punctuation() {
        let keywords = extract_keywords("Click the 'Login' button, please.");
        assert_eq!(keywords, vec!["click", "login", "button", "please"]);
    }

    #[test]
    fn empty_input_yields_no_keywords() {
        assert!(extract_keywords("").is_empty());
    }
}
