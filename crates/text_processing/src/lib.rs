//! Utterance classifiers for the intake line
//!
//! Everything here is a pure function over policy data:
//! - **Crisis detection**: self-harm indicators, checked first on every turn
//! - **Scope filtering**: physical ailments and off-topic chatter
//! - **Ambiguity resolution**: spoken dates relative to the call date
//! - **Reply classification**: yes/no, insurance accept/refuse
//! - **Slot extraction**: status, symptoms, duration, location

pub mod crisis;
pub mod extraction;
pub mod keywords;
pub mod replies;
pub mod scope;
pub mod temporal;

pub use crisis::{CrisisAssessment, CrisisDetector};
pub use extraction::SlotExtractor;
pub use keywords::KeywordMatcher;
pub use replies::{
    classify_affirmation, member_id, Affirmation, InsuranceReply, InsuranceReplyClassifier,
};
pub use scope::{ScopeClass, ScopeFilter};
pub use temporal::{AmbiguityResolver, DateResolution, TimePreference};

use intake_config::IntakePolicy;

/// All classifiers compiled from one policy
pub struct Classifiers {
    pub crisis: CrisisDetector,
    pub scope: ScopeFilter,
    pub dates: AmbiguityResolver,
    pub insurance: InsuranceReplyClassifier,
    pub slots: SlotExtractor,
}

impl Classifiers {
    pub fn from_policy(policy: &IntakePolicy) -> Self {
        let cities: Vec<&str> = policy.scheduling.roster.known_cities().collect();
        Self {
            crisis: CrisisDetector::new(&policy.crisis),
            scope: ScopeFilter::new(&policy.scope),
            dates: AmbiguityResolver::new(),
            insurance: InsuranceReplyClassifier::new(&policy.insurance),
            slots: SlotExtractor::new(&cities),
        }
    }
}

impl Default for Classifiers {
    fn default() -> Self {
        Self::from_policy(&IntakePolicy::default())
    }
}
