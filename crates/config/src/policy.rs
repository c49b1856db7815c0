//! Call-flow policy data
//!
//! Keyword sets, the self-pay rate, the retry cap, prompts and the doctor
//! roster. Everything here is data so clinical staff can tune it without a
//! code change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use intake_core::IntakeStage;

use crate::prompts::PromptsConfig;
use crate::roster::DoctorRoster;
use crate::ConfigError;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Root policy document (config/policy.yaml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakePolicy {
    pub clinic_name: String,
    pub crisis: CrisisPolicy,
    pub scope: ScopePolicy,
    pub insurance: InsurancePolicy,
    pub self_pay: SelfPayPolicy,
    pub retries: RetryPolicy,
    pub scheduling: SchedulingPolicy,
    pub prompts: PromptsConfig,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            clinic_name: "Orchard Clinic".to_string(),
            crisis: CrisisPolicy::default(),
            scope: ScopePolicy::default(),
            insurance: InsurancePolicy::default(),
            self_pay: SelfPayPolicy::default(),
            retries: RetryPolicy::default(),
            scheduling: SchedulingPolicy::default(),
            prompts: PromptsConfig::default(),
        }
    }
}

impl IntakePolicy {
    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::FileNotFound(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let policy: IntakePolicy = serde_yaml::from_str(content)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crisis.patterns.is_empty() {
            return Err(ConfigError::invalid(
                "crisis.patterns",
                "At least one crisis pattern is required",
            ));
        }

        if self.retries.max_consecutive_failures == 0 {
            return Err(ConfigError::invalid(
                "retries.max_consecutive_failures",
                "Must be at least 1",
            ));
        }

        if self.self_pay.amount_usd == 0 {
            return Err(ConfigError::invalid(
                "self_pay.amount_usd",
                "Self-pay rate must be positive",
            ));
        }

        if self.scheduling.search_horizon_days == 0 {
            return Err(ConfigError::invalid(
                "scheduling.search_horizon_days",
                "Must search at least one day",
            ));
        }

        self.scheduling.roster.validate()
    }
}

/// Load the policy, falling back to compiled-in defaults when the file is missing
pub fn load_policy(path: &str) -> Result<IntakePolicy, ConfigError> {
    if Path::new(path).exists() {
        let policy = IntakePolicy::load(path)?;
        tracing::info!(path = %path, "Loaded intake policy");
        Ok(policy)
    } else {
        tracing::warn!(path = %path, "Policy file not found, using defaults");
        Ok(IntakePolicy::default())
    }
}

/// Crisis indicators. Any single match ends intake.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrisisPolicy {
    pub patterns: Vec<String>,
}

impl Default for CrisisPolicy {
    fn default() -> Self {
        Self {
            patterns: strings(&[
                "suicide",
                "suicidal",
                "kill myself",
                "killing myself",
                "end my life",
                "ending my life",
                "take my own life",
                "take my life",
                "hurt myself",
                "hurting myself",
                "harm myself",
                "harming myself",
                "self harm",
                "self-harm",
                "cut myself",
                "cutting myself",
                "harm",
                "want to die",
                "wanna die",
                "want to be dead",
                "want to be alive",
                "end it all",
                "ending it all",
                "hang myself",
                "hanging myself",
                "shoot myself",
                "no point in living",
                "no point living",
                "not worth living",
                "kill me",
                "wish i was dead",
                "wish i were dead",
                "better off dead",
                "don't want to live",
                "do not want to live",
                "no reason to live",
                "can't do this anymore",
                "cannot do this anymore",
                "can't go on",
                "overdose",
                "weapon",
                "giving away my possessions",
                "giving away possessions",
                "giving away my things",
                "not safe",
            ]),
        }
    }
}

/// Scope keyword sets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopePolicy {
    /// Physical ailments the clinic does not treat
    pub physical_ailments: Vec<String>,
    /// Terms that keep an utterance in scope even with a physical keyword
    pub mental_health_terms: Vec<String>,
    /// Off-topic markers
    pub off_topic: Vec<String>,
    /// Per-stage answer hints; an utterance containing one is never irrelevant
    pub stage_hints: BTreeMap<IntakeStage, Vec<String>>,
}

impl Default for ScopePolicy {
    fn default() -> Self {
        let weekdays = [
            "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
        ];
        let mut schedule_hints = strings(&weekdays);
        schedule_hints.extend(strings(&[
            "today", "tomorrow", "next", "week", "weekend", "morning", "afternoon", "evening",
            "am", "pm", "yes", "no", "sure", "okay",
        ]));

        let stage_hints = [
            (
                IntakeStage::Status,
                strings(&["new", "returning", "first time", "before", "existing"]),
            ),
            (
                IntakeStage::Duration,
                strings(&[
                    "day", "days", "week", "weeks", "month", "months", "year", "years", "since",
                    "while",
                ]),
            ),
            (
                IntakeStage::Location,
                strings(&["live", "from", "city", "near", "in"]),
            ),
            (IntakeStage::Schedule, schedule_hints),
            (
                IntakeStage::Insurance,
                strings(&[
                    "insurance", "insured", "pay", "self-pay", "cash", "member", "yes", "no",
                ]),
            ),
        ]
        .into_iter()
        .collect();

        Self {
            physical_ailments: strings(&[
                "flu",
                "fever",
                "cough",
                "cold",
                "sore throat",
                "broken bone",
                "broken bones",
                "bone",
                "bones",
                "broken hand",
                "broken finger",
                "broke my hand",
                "broke my finger",
                "broken arm",
                "broken leg",
                "broken ankle",
                "broken wrist",
                "broke my arm",
                "broke my leg",
                "broke my ankle",
                "broke my wrist",
                "broke a bone",
                "fracture",
                "fractured",
                "sprain",
                "sprained",
                "laceration",
                "lacerations",
                "stitches",
                "blood",
                "bleeding",
                "stomach pain",
                "stomach ache",
                "vomiting",
                "rash",
                "infection",
                "swollen",
                "toothache",
                "back pain",
            ]),
            mental_health_terms: strings(&[
                "anxiety",
                "anxious",
                "depression",
                "depressed",
                "panic",
                "panic attack",
                "stress",
                "stressed",
                "trauma",
                "ptsd",
                "bipolar",
                "mood",
                "sad",
                "lonely",
                "grief",
                "insomnia",
                "therapy",
                "therapist",
                "counseling",
                "mental health",
                "ocd",
                "adhd",
                "overwhelmed",
                "nervous",
                "worried",
                "scared",
                "unstable",
                "burnout",
                "psychiatrist",
            ]),
            off_topic: strings(&[
                "weather",
                "sports",
                "football",
                "cricket",
                "basketball",
                "movie",
                "movies",
                "recipe",
                "pizza",
                "stock market",
                "stocks",
                "joke",
                "politics",
                "election",
                "traffic",
                "video game",
            ]),
            stage_hints,
        }
    }
}

impl ScopePolicy {
    pub fn hints_for(&self, stage: IntakeStage) -> &[String] {
        self.stage_hints
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Known payers, used to pull the provider name out of free text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsurancePolicy {
    pub known_providers: Vec<String>,
    /// Payers the clinic is not in network with
    pub not_accepted: Vec<String>,
    /// Minimum member-ID length accepted by the verifier
    pub min_member_id_len: usize,
}

impl Default for InsurancePolicy {
    fn default() -> Self {
        Self {
            known_providers: strings(&[
                "Aetna",
                "Blue Cross Blue Shield",
                "Blue Cross",
                "Cigna",
                "UnitedHealthcare",
                "United Healthcare",
                "Humana",
                "Kaiser",
                "Anthem",
                "Medicare",
                "Medicaid",
            ]),
            not_accepted: strings(&["Medicaid"]),
            min_member_id_len: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfPayPolicy {
    pub amount_usd: u32,
}

impl Default for SelfPayPolicy {
    fn default() -> Self {
        Self { amount_usd: 250 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive failed extractions at one stage before offering a human
    pub max_consecutive_failures: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    /// How many days past the requested date to search
    pub search_horizon_days: u32,
    pub roster: DoctorRoster,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            search_horizon_days: 14,
            roster: DoctorRoster::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_policy() {
        let policy = IntakePolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.self_pay.amount_usd, 250);
        assert_eq!(policy.retries.max_consecutive_failures, 2);
        assert!(policy.crisis.patterns.iter().any(|p| p == "kill myself"));
        assert!(policy.scope.hints_for(IntakeStage::Schedule).contains(&"monday".to_string()));
        assert!(policy.scope.hints_for(IntakeStage::Symptoms).is_empty());
    }

    #[test]
    fn test_partial_yaml_override() {
        let yaml = r#"
self_pay:
  amount_usd: 300
retries:
  max_consecutive_failures: 3
scope:
  stage_hints:
    status: ["new", "returning"]
"#;
        let policy = IntakePolicy::from_yaml(yaml).unwrap();
        assert_eq!(policy.self_pay.amount_usd, 300);
        assert_eq!(policy.retries.max_consecutive_failures, 3);
        assert_eq!(policy.clinic_name, "Orchard Clinic");
        assert_eq!(policy.scope.hints_for(IntakeStage::Status).len(), 2);
        assert!(!policy.crisis.patterns.is_empty());
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let yaml = "crisis:\n  patterns: []\n";
        assert!(matches!(
            IntakePolicy::from_yaml(yaml),
            Err(ConfigError::InvalidValue { field, .. }) if field == "crisis.patterns"
        ));

        let yaml = "retries:\n  max_consecutive_failures: 0\n";
        assert!(IntakePolicy::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "clinic_name: Test Clinic").unwrap();
        let policy = IntakePolicy::load(file.path()).unwrap();
        assert_eq!(policy.clinic_name, "Test Clinic");

        assert!(matches!(
            IntakePolicy::load("/nonexistent/policy.yaml"),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_load_policy_falls_back_to_defaults() {
        let policy = load_policy("/nonexistent/policy.yaml").unwrap();
        assert_eq!(policy.self_pay.amount_usd, 250);
    }
}
