//! Scope filter: keeps the call on mental health intake

use serde::Serialize;
use std::collections::HashMap;

use intake_config::ScopePolicy;
use intake_core::IntakeStage;

use crate::keywords::KeywordMatcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ScopeClass {
    InScope,
    /// Physical ailment with no mental-health qualifier; ends the call
    PhysicalAilment { keyword: String },
    /// Off-topic with nothing answering the current question; redirect
    Irrelevant { keyword: String },
}

impl ScopeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeClass::InScope => "in_scope",
            ScopeClass::PhysicalAilment { .. } => "physical_ailment",
            ScopeClass::Irrelevant { .. } => "irrelevant",
        }
    }
}

pub struct ScopeFilter {
    physical: KeywordMatcher,
    mental_health: KeywordMatcher,
    off_topic: KeywordMatcher,
    stage_hints: HashMap<IntakeStage, KeywordMatcher>,
}

impl ScopeFilter {
    pub fn new(policy: &ScopePolicy) -> Self {
        let stage_hints = policy
            .stage_hints
            .iter()
            .map(|(stage, hints)| (*stage, KeywordMatcher::new(hints)))
            .collect();

        Self {
            physical: KeywordMatcher::new(&policy.physical_ailments),
            mental_health: KeywordMatcher::new(&policy.mental_health_terms),
            off_topic: KeywordMatcher::new(&policy.off_topic),
            stage_hints,
        }
    }

    pub fn classify(&self, text: &str, stage: IntakeStage) -> ScopeClass {
        let mental = self.mental_health.matches(text);

        if let Some(keyword) = self.physical.find(text) {
            if !mental {
                return ScopeClass::PhysicalAilment {
                    keyword: keyword.to_string(),
                };
            }
        }

        if let Some(keyword) = self.off_topic.find(text) {
            let answers_stage = self
                .stage_hints
                .get(&stage)
                .map(|hints| hints.matches(text))
                .unwrap_or(false);
            if !mental && !answers_stage {
                return ScopeClass::Irrelevant {
                    keyword: keyword.to_string(),
                };
            }
        }

        ScopeClass::InScope
    }
}

impl Default for ScopeFilter {
    fn default() -> Self {
        Self::new(&ScopePolicy::default())
    }
}
