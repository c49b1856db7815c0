//! Ambiguity resolver for spoken dates
//!
//! Turns vague expressions ("next week", "tuesday afternoon", "June 10th")
//! into a concrete calendar day relative to the call date. The agent then
//! proposes the nearest open slot on or after that day and asks for a yes.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

const MONTHS: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

static MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{MONTHS}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b")).unwrap()
});

static DAY_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTHS}\b")).unwrap()
});

static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(mon|tues|wednes|thurs|fri|satur|sun)days?\b").unwrap()
});

static NEXT_WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bnext\s+(mon|tues|wednes|thurs|fri|satur|sun)day\b").unwrap()
});

/// "in N days/weeks" further out than this is not a scheduling request
const MAX_RELATIVE_DAYS: i64 = 366;

static IN_DAYS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bin\s+(\d+|a|one|two|three|four|five|six|seven)\s+(day|days|week|weeks)\b")
        .unwrap()
});

static CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)(?:\s|$|[.,!?])").unwrap()
});

static PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(day after tomorrow|tomorrow|today|tonight|next week|this week|this weekend|weekend|weekdays?)\b")
        .unwrap()
});

/// Caller's time-of-day preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "kind", content = "time", rename_all = "snake_case")]
pub enum TimePreference {
    #[default]
    Any,
    Morning,
    Afternoon,
    Evening,
    At(NaiveTime),
}

impl TimePreference {
    pub fn matches(&self, time: NaiveTime) -> bool {
        match self {
            TimePreference::Any => true,
            TimePreference::Morning => time.hour() < 12,
            TimePreference::Afternoon => (12..17).contains(&time.hour()),
            TimePreference::Evening => time.hour() >= 17,
            TimePreference::At(at) => (*at - time).num_minutes().abs() <= 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DateResolution {
    Resolved {
        date: NaiveDate,
        preference: TimePreference,
        /// The phrase that produced the date, lowercased
        expression: String,
    },
    Unparseable,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AmbiguityResolver;

impl AmbiguityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, text: &str, anchor: NaiveDate) -> DateResolution {
        let preference = Self::time_preference(text);
        match Self::resolve_date(text, anchor) {
            Some((date, expression)) => DateResolution::Resolved {
                date,
                preference,
                expression,
            },
            None => DateResolution::Unparseable,
        }
    }

    /// Time-of-day hint on its own; `Any` if none
    pub fn time_preference(text: &str) -> TimePreference {
        if let Some(caps) = CLOCK.captures(text) {
            let hour: u32 = caps[1].parse().unwrap_or(0);
            let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let pm = caps[3].to_ascii_lowercase().starts_with('p');
            if (1..=12).contains(&hour) && minute < 60 {
                let hour24 = match (hour, pm) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                };
                if let Some(time) = NaiveTime::from_hms_opt(hour24, minute, 0) {
                    return TimePreference::At(time);
                }
            }
        }

        let lower = text.to_lowercase();
        if lower.contains("morning") {
            TimePreference::Morning
        } else if lower.contains("afternoon") || lower.contains("lunch") {
            TimePreference::Afternoon
        } else if lower.contains("evening") || lower.contains("tonight") || lower.contains("after work") {
            TimePreference::Evening
        } else {
            TimePreference::Any
        }
    }

    fn resolve_date(text: &str, anchor: NaiveDate) -> Option<(NaiveDate, String)> {
        if let Some(caps) = ISO_DATE.captures(text) {
            let y = caps[1].parse().ok()?;
            let m = caps[2].parse().ok()?;
            let d = caps[3].parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some((date, caps[0].to_string()));
            }
        }

        if let Some(caps) = MONTH_DAY.captures(text) {
            if let Some(date) = month_day(&caps[1], &caps[2], anchor) {
                return Some((date, caps[0].to_lowercase()));
            }
        }
        if let Some(caps) = DAY_MONTH.captures(text) {
            if let Some(date) = month_day(&caps[2], &caps[1], anchor) {
                return Some((date, caps[0].to_lowercase()));
            }
        }

        if let Some(caps) = NEXT_WEEKDAY.captures(text) {
            let weekday = parse_weekday(&caps[1])?;
            let date = shift(next_week_monday(anchor)?, weekday.num_days_from_monday() as i64)?;
            return Some((date, caps[0].to_lowercase()));
        }

        if let Some(caps) = IN_DAYS.captures(text) {
            let n = small_number(&caps[1])?;
            let unit = caps[2].to_lowercase();
            let days = if unit.starts_with("week") { n.checked_mul(7)? } else { n };
            if days > MAX_RELATIVE_DAYS {
                return None;
            }
            return Some((shift(anchor, days)?, caps[0].to_lowercase()));
        }

        let phrase = PHRASE.captures(text).map(|c| c[1].to_lowercase());
        let weekday = WEEKDAY
            .captures(text)
            .and_then(|c| parse_weekday(&c[1]).map(|w| (w, c[0].to_lowercase())));

        match (phrase.as_deref(), weekday) {
            (Some("day after tomorrow"), _) => Some((shift(anchor, 2)?, "day after tomorrow".into())),
            (Some("tomorrow"), _) => Some((shift(anchor, 1)?, "tomorrow".into())),
            (Some(p @ ("today" | "tonight")), _) => Some((anchor, p.to_string())),
            // "tuesday next week"
            (Some("next week"), Some((w, word))) => Some((
                shift(next_week_monday(anchor)?, w.num_days_from_monday() as i64)?,
                format!("{word} next week"),
            )),
            (Some("next week"), None) => Some((next_week_monday(anchor)?, "next week".into())),
            (_, Some((w, word))) => Some((on_or_after(anchor, w)?, word)),
            (Some(p @ ("this weekend" | "weekend")), None) => {
                Some((on_or_after(anchor, Weekday::Sat)?, p.to_string()))
            }
            (Some("this week"), None) => Some((anchor, "this week".into())),
            (Some(p @ ("weekday" | "weekdays")), None) => {
                let date = match anchor.weekday() {
                    Weekday::Sat => shift(anchor, 2)?,
                    Weekday::Sun => shift(anchor, 1)?,
                    _ => anchor,
                };
                Some((date, p.to_string()))
            }
            _ => None,
        }
    }
}

fn parse_weekday(word: &str) -> Option<Weekday> {
    let lower = word.to_lowercase();
    let day = match lower.get(..3)? {
        "mon" => Weekday::Mon,
        "tue" => Weekday::Tue,
        "wed" => Weekday::Wed,
        "thu" => Weekday::Thu,
        "fri" => Weekday::Fri,
        "sat" => Weekday::Sat,
        "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn parse_month(word: &str) -> Option<u32> {
    let lower = word.to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Month/day in the anchor's year, rolled to next year if already past
fn month_day(month: &str, day: &str, anchor: NaiveDate) -> Option<NaiveDate> {
    let month = parse_month(month)?;
    let day: u32 = day.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(anchor.year(), month, day)?;
    if date < anchor {
        NaiveDate::from_ymd_opt(anchor.year() + 1, month, day)
    } else {
        Some(date)
    }
}

fn small_number(word: &str) -> Option<i64> {
    match word.to_lowercase().as_str() {
        "a" | "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        digits => digits.parse().ok(),
    }
}

/// `anchor` moved by `days`, or `None` past the calendar's range
fn shift(anchor: NaiveDate, days: i64) -> Option<NaiveDate> {
    anchor.checked_add_signed(Duration::try_days(days)?)
}

/// Monday of the week after the anchor's week
fn next_week_monday(anchor: NaiveDate) -> Option<NaiveDate> {
    shift(anchor, 7 - anchor.weekday().num_days_from_monday() as i64)
}

/// First `weekday` on or after `anchor`
fn on_or_after(anchor: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let ahead = (7 + weekday.num_days_from_monday() as i64
        - anchor.weekday().num_days_from_monday() as i64)
        % 7;
    shift(anchor, ahead)
}
