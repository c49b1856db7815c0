//! Slot value extraction for the early intake stages
//!
//! Status, symptoms, duration and location. Schedule and insurance answers go
//! through `temporal` and `replies`.

use once_cell::sync::Lazy;
use regex::Regex;

use intake_core::PatientStatus;

use crate::keywords::{normalize_apostrophes, KeywordMatcher};

static RETURNING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(returning|existing|been (?:here|there|in) before|seen (?:here|you|there) before|came (?:here )?before|not new|again|follow[- ]?up)\b")
        .unwrap()
});

static FIRST_VISIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(first time|first visit|never been|haven't been|have not been|not been)\b")
        .unwrap()
});

static NEW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bnew\b").unwrap());

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b((?:\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten|twelve|few|several|couple(?: of)?|many)\s+(?:days?|weeks?|months?|years?)|since\s+[a-z0-9 ]{2,30}|(?:last|past)\s+(?:few\s+)?(?:days?|weeks?|months?|years?)|a (?:long )?while|a long time|yesterday|forever|all my life|as long as i can remember)\b",
    )
    .unwrap()
});

static LOCATION_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:in|from|near|live in|based in|calling from)\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)?)")
        .unwrap()
});

static FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:u+h+|u+m+|h+m+|e+r+|m+|a+h+|uh-huh|huh|mhm|eh)$").unwrap()
});

static NOISE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[(?:inaudible|unintelligible|noise|silence|crosstalk)\]").unwrap());

pub struct SlotExtractor {
    cities: KeywordMatcher,
}

impl SlotExtractor {
    /// `cities` are matched verbatim before falling back to "in <Place>" phrasing
    pub fn new<S: AsRef<str>>(cities: &[S]) -> Self {
        Self {
            cities: KeywordMatcher::new(cities),
        }
    }

    /// Silence, filler sounds, STT noise markers or stray symbols
    pub fn is_unintelligible(text: &str) -> bool {
        let stripped = NOISE_MARKER.replace_all(text, " ");
        let words: Vec<String> = stripped
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_string()
            })
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return true;
        }
        let letters: usize = words
            .iter()
            .map(|w| w.chars().filter(|c| c.is_alphabetic()).count())
            .sum();
        if letters < 2 && !words.iter().any(|w| w.chars().any(|c| c.is_ascii_digit())) {
            return true;
        }
        words.iter().all(|w| FILLER.is_match(w))
    }

    pub fn status(&self, text: &str) -> Option<PatientStatus> {
        let text = normalize_apostrophes(text);
        if FIRST_VISIT.is_match(&text) {
            Some(PatientStatus::New)
        } else if RETURNING.is_match(&text) {
            Some(PatientStatus::Returning)
        } else if NEW.is_match(&text) {
            Some(PatientStatus::New)
        } else {
            None
        }
    }

    /// Free-text description of what the caller is experiencing
    pub fn symptoms(&self, text: &str) -> Option<String> {
        if Self::is_unintelligible(text) {
            return None;
        }
        let trimmed = text.trim().trim_end_matches(['.', '!']).trim();
        let word_count = trimmed.split_whitespace().count();
        if word_count == 0 {
            return None;
        }
        // a lone yes/no is not a symptom description
        if word_count == 1
            && matches!(
                trimmed.to_lowercase().as_str(),
                "yes" | "no" | "ok" | "okay" | "yeah" | "nope" | "sure"
            )
        {
            return None;
        }
        Some(trimmed.to_string())
    }

    pub fn duration(&self, text: &str) -> Option<String> {
        DURATION
            .captures(&normalize_apostrophes(text))
            .map(|c| c[1].trim().to_lowercase())
    }

    /// Known city, then "in/from <Place>", then a short bare answer
    pub fn location(&self, text: &str) -> Option<String> {
        if let Some(city) = self.cities.find(text) {
            return Some(title_case(city));
        }
        if let Some(caps) = LOCATION_PHRASE.captures(text) {
            return Some(caps[1].to_string());
        }

        let words: Vec<&str> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();
        let bare_place = !words.is_empty()
            && words.len() <= 3
            && words.iter().all(|w| w.chars().all(|c| c.is_alphabetic()))
            && !Self::is_unintelligible(text);
        if bare_place {
            Some(title_case(&words.join(" ")))
        } else {
            None
        }
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SlotExtractor {
        SlotExtractor::new(&["delhi", "mumbai", "bangalore"])
    }

    #[test]
    fn test_unintelligible() {
        for text in ["", "   ", "um", "uh... hmm", "[inaudible]", "?!", "m"] {
            assert!(SlotExtractor::is_unintelligible(text), "should be unintelligible: {text:?}");
        }
        for text in ["new", "no", "I feel anxious", "5550123"] {
            assert!(!SlotExtractor::is_unintelligible(text), "should be intelligible: {text:?}");
        }
    }

    #[test]
    fn test_status() {
        let ex = extractor();
        assert_eq!(ex.status("I'm a new patient"), Some(PatientStatus::New));
        assert_eq!(ex.status("first time calling"), Some(PatientStatus::New));
        assert_eq!(ex.status("Returning"), Some(PatientStatus::Returning));
        assert_eq!(ex.status("I've been there before"), Some(PatientStatus::Returning));
        assert_eq!(ex.status("I haven't been here before"), Some(PatientStatus::New));
        assert_eq!(ex.status("I feel anxious"), None);
    }

    #[test]
    fn test_duration() {
        let ex = extractor();
        assert_eq!(ex.duration("about three weeks now"), Some("three weeks".into()));
        assert_eq!(
            ex.duration("for the last few weeks"),
            Some("last few weeks".into())
        );
        assert_eq!(ex.duration("since my divorce"), Some("since my divorce".into()));
        assert_eq!(ex.duration("2 months"), Some("2 months".into()));
        assert_eq!(ex.duration("I'm not sure"), None);
    }

    #[test]
    fn test_location() {
        let ex = extractor();
        assert_eq!(ex.location("I live in Andheri, Mumbai."), Some("Mumbai".into()));
        assert_eq!(ex.location("calling from Pune"), Some("Pune".into()));
        assert_eq!(ex.location("chennai"), Some("Chennai".into()));
        assert_eq!(ex.location("uh"), None);
        assert_eq!(ex.location("I would rather not say where I am right now"), None);
    }

    #[test]
    fn test_symptoms() {
        let ex = extractor();
        assert_eq!(
            ex.symptoms("I've been feeling really anxious."),
            Some("I've been feeling really anxious".into())
        );
        assert_eq!(ex.symptoms("yes"), None);
        assert_eq!(ex.symptoms("um"), None);
    }
}
