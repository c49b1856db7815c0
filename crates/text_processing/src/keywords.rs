//! Case-insensitive whole-phrase keyword matching

use regex::Regex;

struct CompiledKeyword {
    pattern: Regex,
    phrase: String,
}

/// A set of literal phrases compiled once to word-boundary regexes
pub struct KeywordMatcher {
    keywords: Vec<CompiledKeyword>,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Self {
        let keywords = phrases
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .filter_map(|phrase| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase)))
                    .map_err(|e| tracing::warn!(phrase = %phrase, error = %e, "Skipping keyword"))
                    .ok()
                    .map(|pattern| CompiledKeyword {
                        pattern,
                        phrase: phrase.to_string(),
                    })
            })
            .collect();

        Self { keywords }
    }

    /// First configured phrase found in `text`
    pub fn find(&self, text: &str) -> Option<&str> {
        let text = normalize_apostrophes(text);
        self.keywords
            .iter()
            .find(|k| k.pattern.is_match(&text))
            .map(|k| k.phrase.as_str())
    }

    pub fn matches(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// STT output often carries typographic apostrophes ("I’m", "can’t")
pub(crate) fn normalize_apostrophes(text: &str) -> String {
    text.replace(['\u{2018}', '\u{2019}'], "'")
}
