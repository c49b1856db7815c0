//! Doctor roster: weekly recurring appointment slots and nearby-doctor lookup

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ConfigError;

/// One recurring weekly slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub doctor: String,
    pub specialty: String,
    /// Day name, e.g. "monday"
    pub weekday: String,
    /// Clock time, e.g. "9:30 AM" or "14:00"
    pub time: String,
}

impl RosterEntry {
    pub fn new(doctor: &str, specialty: &str, weekday: &str, time: &str) -> Self {
        Self {
            doctor: doctor.to_string(),
            specialty: specialty.to_string(),
            weekday: weekday.to_string(),
            time: time.to_string(),
        }
    }

    pub fn parsed_weekday(&self) -> Result<Weekday, ConfigError> {
        self.weekday.trim().parse::<Weekday>().map_err(|_| {
            ConfigError::invalid(
                "scheduling.roster.weekday",
                format!("Unknown weekday '{}' for {}", self.weekday, self.doctor),
            )
        })
    }

    pub fn parsed_time(&self) -> Result<NaiveTime, ConfigError> {
        let raw = self.time.trim().to_uppercase();
        NaiveTime::parse_from_str(&raw, "%I:%M %p")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(|_| {
                ConfigError::invalid(
                    "scheduling.roster.time",
                    format!("Unparseable time '{}' for {}", self.time, self.doctor),
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorRoster {
    pub entries: Vec<RosterEntry>,
    /// Lowercase city name to doctors practicing nearby
    pub nearby: BTreeMap<String, Vec<String>>,
}

impl Default for DoctorRoster {
    fn default() -> Self {
        let nearby = [
            ("delhi", vec!["Dr. Puckett", "Dr. Shah"]),
            ("mumbai", vec!["Dr. Lee"]),
            ("bangalore", vec!["Dr. Shah"]),
        ]
        .into_iter()
        .map(|(city, docs)| {
            (
                city.to_string(),
                docs.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

        Self {
            entries: vec![
                RosterEntry::new("Dr. Lee", "Bipolar", "monday", "9:00 AM"),
                RosterEntry::new("Dr. Puckett", "Trauma", "monday", "9:30 AM"),
                RosterEntry::new("Dr. Shah", "Anxiety", "tuesday", "11:00 AM"),
                RosterEntry::new("Dr. Lee", "Bipolar", "wednesday", "2:00 PM"),
                RosterEntry::new("Dr. Puckett", "Trauma", "thursday", "10:00 AM"),
                RosterEntry::new("Dr. Shah", "Anxiety", "friday", "4:30 PM"),
            ],
            nearby,
        }
    }
}

impl DoctorRoster {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::invalid(
                "scheduling.roster.entries",
                "Roster must have at least one entry",
            ));
        }
        for entry in &self.entries {
            entry.parsed_weekday()?;
            entry.parsed_time()?;
        }
        Ok(())
    }

    /// Doctors near a city (case-insensitive); `None` for unknown cities
    pub fn nearby_doctors(&self, city: &str) -> Option<&[String]> {
        self.nearby
            .get(&city.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn known_cities(&self) -> impl Iterator<Item = &str> {
        self.nearby.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_is_valid() {
        let roster = DoctorRoster::default();
        assert!(roster.validate().is_ok());
        assert_eq!(
            roster.entries[1].parsed_time().unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(roster.entries[0].parsed_weekday().unwrap(), Weekday::Mon);
    }

    #[test]
    fn test_nearby_lookup() {
        let roster = DoctorRoster::default();
        assert_eq!(
            roster.nearby_doctors("Delhi").unwrap(),
            &["Dr. Puckett".to_string(), "Dr. Shah".to_string()]
        );
        assert!(roster.nearby_doctors("Chennai").is_none());
    }

    #[test]
    fn test_bad_entry_rejected() {
        let mut roster = DoctorRoster::default();
        roster.entries.push(RosterEntry::new("Dr. X", "General", "funday", "9:00 AM"));
        assert!(roster.validate().is_err());

        let entry = RosterEntry::new("Dr. X", "General", "monday", "25:99");
        assert!(entry.parsed_time().is_err());
        let entry = RosterEntry::new("Dr. X", "General", "monday", "14:15");
        assert_eq!(
            entry.parsed_time().unwrap(),
            NaiveTime::from_hms_opt(14, 15, 0).unwrap()
        );
    }
}
