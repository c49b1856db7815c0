//! Crisis detection
//!
//! Runs before anything else on every caller turn, at every stage. A single
//! match is terminal, so the pattern set leans toward over-triggering.

use serde::Serialize;

use intake_config::CrisisPolicy;

use crate::keywords::KeywordMatcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrisisAssessment {
    Clear,
    Crisis { matched_pattern: String },
}

impl CrisisAssessment {
    pub fn is_crisis(&self) -> bool {
        matches!(self, CrisisAssessment::Crisis { .. })
    }
}

pub struct CrisisDetector {
    matcher: KeywordMatcher,
}

impl CrisisDetector {
    pub fn new(policy: &CrisisPolicy) -> Self {
        let matcher = KeywordMatcher::new(&policy.patterns);
        if matcher.is_empty() {
            tracing::error!("No crisis patterns configured, crisis detection will never trigger");
        } else {
            tracing::debug!(patterns = matcher.len(), "Crisis detector ready");
        }
        Self { matcher }
    }

    pub fn detect(&self, text: &str) -> CrisisAssessment {
        match self.matcher.find(text) {
            Some(pattern) => CrisisAssessment::Crisis {
                matched_pattern: pattern.to_string(),
            },
            None => CrisisAssessment::Clear,
        }
    }
}

impl Default for CrisisDetector {
    fn default() -> Self {
        Self::new(&CrisisPolicy::default())
    }
}
