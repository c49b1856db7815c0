//! Appointment slot and date range types

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A bookable appointment with one doctor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentSlot {
    /// Stable identifier, unique per doctor and start time
    pub id: String,
    pub doctor: String,
    pub specialty: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl AppointmentSlot {
    pub fn new(
        doctor: impl Into<String>,
        specialty: impl Into<String>,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Self {
        let doctor = doctor.into();
        let id = format!(
            "{}T{:02}{:02}-{}",
            date.format("%Y-%m-%d"),
            time.hour(),
            time.minute(),
            slug(&doctor)
        );
        Self {
            id,
            doctor,
            specialty: specialty.into(),
            date,
            time,
        }
    }

    /// Caller-facing description, e.g. "Monday, June 10 at 9:30 AM with Dr. Puckett"
    pub fn describe(&self) -> String {
        format!(
            "{}, {} {} at {} with {}",
            self.date.format("%A"),
            self.date.format("%B"),
            self.date.day(),
            format_time(self.time),
            self.doctor
        )
    }
}

/// 12-hour clock rendering without a leading zero ("9:30 AM")
pub fn format_time(time: NaiveTime) -> String {
    let (pm, hour) = time.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        time.minute(),
        if pm { "PM" } else { "AM" }
    )
}

fn slug(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// Half-open range of calendar days `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `days` calendar days starting at `start`
    pub fn starting_at(start: NaiveDate, days: u32) -> Self {
        Self {
            start,
            end: start + Duration::days(i64::from(days)),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}
