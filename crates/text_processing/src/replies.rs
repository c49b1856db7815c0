//! Yes/no and insurance reply classification

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use intake_config::InsurancePolicy;

use crate::keywords::{normalize_apostrophes, KeywordMatcher};

static YES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(yes|yeah|yep|yup|sure|ok|okay|correct|absolutely|definitely|please do|go ahead|book it|sounds good|that works|that's fine|fine|alright|of course)\b",
    )
    .unwrap()
});

static NO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(no|nope|nah|not really|don't|do not|rather not|no thanks|no thank you|doesn't work|another day|different day)\b")
        .unwrap()
});

static LEADING_NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\W*(no|nope|nah)\b").unwrap());

static REFUSE_INSURANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(no insurance|don't have insurance|do not have insurance|don't have any insurance|not insured|uninsured|without insurance|self[- ]?pay|pay (?:it )?myself|pay cash|cash)\b",
    )
    .unwrap()
});

static ACCEPT_INSURANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insurance|insured|my plan|coverage|covered|member id|policy number|yes|yeah|yep|sure)\b")
        .unwrap()
});

static PROVIDER_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:provider is|insurance is|insured (?:with|by)|i have|it's|it is)\s+([A-Z][A-Za-z&]+(?:\s+[A-Z][A-Za-z&]+){0,3})")
        .unwrap()
});

static MEMBER_ID_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z]{0,4}-?\d[A-Za-z0-9-]{2,})\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Affirmation {
    Yes,
    No,
    Unclear,
}

/// Classify a yes/no answer to a confirmation question
pub fn classify_affirmation(text: &str) -> Affirmation {
    let text = normalize_apostrophes(text);
    if LEADING_NO.is_match(&text) {
        return Affirmation::No;
    }
    let yes = YES.is_match(&text);
    let no = NO.is_match(&text);
    match (yes, no) {
        (true, false) => Affirmation::Yes,
        (false, true) => Affirmation::No,
        _ => Affirmation::Unclear,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum InsuranceReply {
    Accept {
        provider: Option<String>,
        member_id: Option<String>,
    },
    Refuse,
    Unclear,
}

/// Pulls payer names and member IDs out of insurance answers
pub struct InsuranceReplyClassifier {
    providers: KeywordMatcher,
}

impl InsuranceReplyClassifier {
    pub fn new(policy: &InsurancePolicy) -> Self {
        Self {
            providers: KeywordMatcher::new(&policy.known_providers),
        }
    }

    pub fn classify(&self, text: &str) -> InsuranceReply {
        let provider = self.provider(text);
        let member_id = member_id(text);
        let normalized = normalize_apostrophes(text);

        if provider.is_some() || member_id.is_some() {
            return InsuranceReply::Accept {
                provider,
                member_id,
            };
        }
        if REFUSE_INSURANCE.is_match(&normalized) {
            return InsuranceReply::Refuse;
        }
        if ACCEPT_INSURANCE.is_match(&normalized) {
            return InsuranceReply::Accept {
                provider: None,
                member_id: None,
            };
        }
        match classify_affirmation(&normalized) {
            Affirmation::No => InsuranceReply::Refuse,
            Affirmation::Yes => InsuranceReply::Accept {
                provider: None,
                member_id: None,
            },
            Affirmation::Unclear => InsuranceReply::Unclear,
        }
    }

    /// Known payer first, then "my insurance is X" phrasing
    pub fn provider(&self, text: &str) -> Option<String> {
        if let Some(name) = self.providers.find(text) {
            return Some(name.to_string());
        }
        PROVIDER_PHRASE
            .captures(text)
            .map(|c| c[1].trim().to_string())
            .filter(|p| !p.eq_ignore_ascii_case("insurance"))
    }

    /// True when the caller is declining insurance outright
    pub fn is_refusal(&self, text: &str) -> bool {
        REFUSE_INSURANCE.is_match(&normalize_apostrophes(text))
    }
}

impl Default for InsuranceReplyClassifier {
    fn default() -> Self {
        Self::new(&InsurancePolicy::default())
    }
}

/// Alphanumeric token with at least one digit, e.g. "AB12345" or "5550123"
pub fn member_id(text: &str) -> Option<String> {
    MEMBER_ID_TOKEN
        .captures_iter(text)
        .map(|c| c[1].trim_matches('-').to_uppercase())
        .find(|id| id.chars().filter(|c| c.is_ascii_alphanumeric()).count() >= 4)
}
