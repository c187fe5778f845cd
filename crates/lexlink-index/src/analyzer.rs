//! Text analysis for the lexical index.
//!
//! The corpus is English legal text. Analysis is intentionally plain:
//! NFKC normalization, lowercasing, splitting on anything that is not
//! alphanumeric, and a small legal stop-word list. Citations survive as
//! their component tokens (`[2013] SGCA 36` → `2013`, `sgca`, `36`), which
//! is what makes citation-field matching work.

use unicode_normalization::UnicodeNormalization;

/// Words too common in legal text to be useful as search terms.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "as", "at", "be", "by", "for", "from", "has", "have", "he",
    "her", "his", "in", "is", "it", "its", "may", "not", "of", "on", "or", "shall", "such",
    "that", "the", "their", "them", "thereof", "this", "to", "under", "upon", "was", "were",
    "where", "which", "who", "will", "with",
];

/// Tokenizer shared by index build and query analysis.
#[derive(Debug, Clone, Default)]
pub struct Analyzer;

impl Analyzer {
    /// Creates an analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Tokenizes text: NFKC fold, lowercase, split on non-alphanumerics,
    /// drop stop words and empty tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized: String = text.nfkc().collect();
        normalized
            .split(|c: char| !c.is_alphanumeric())
            .filter_map(|raw| {
                if raw.is_empty() {
                    return None;
                }
                let token = raw.to_lowercase();
                if STOP_WORDS.contains(&token.as_str()) {
                    None
                } else {
                    Some(token)
                }
            })
            .collect()
    }
}
