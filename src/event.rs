// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Schedule event model and time-of-day helpers

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

use crate::{Result, WeekcalError};

/// Accepted time-of-day layouts, tried in order.
/// A space in a chrono pattern also matches no space, so "1:00PM" parses too.
const TIME_FORMATS: &[&str] = &["%I:%M %p", "%H:%M"];

/// Day of the week a recurring event falls on, Monday first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// All days in display order
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Upper-case English name, as exchanged with the model
    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
            Weekday::Sunday => "SUNDAY",
        }
    }

    /// Position in the week, Monday = 0
    pub fn ordinal(self) -> u32 {
        self.to_chrono().num_days_from_monday()
    }

    /// Match a full day name, ignoring case and surrounding whitespace
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|day| day.name().eq_ignore_ascii_case(name))
    }

    /// Like [`Weekday::from_name`], but unknown names become Monday
    pub fn parse_lenient(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!("Invalid day '{}' found, defaulting to MONDAY", name);
            Weekday::Monday
        })
    }

    pub fn to_chrono(self) -> chrono::Weekday {
        match self {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown day '{}'", s))
    }
}

impl<'de> Deserialize<'de> for Weekday {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Weekday::parse_lenient(&name))
    }
}

/// A single weekly recurring entry in the timetable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    #[serde(default = "new_event_id")]
    pub id: String,
    pub title: String,
    /// Wall-clock start, e.g. "1:00 PM"
    pub start_time: String,
    /// Wall-clock end, e.g. "2:30 PM"
    pub end_time: String,
    pub day: Weekday,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ScheduleEvent {
    /// Create an event with a freshly generated id
    pub fn new(
        title: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        day: Weekday,
    ) -> Self {
        Self {
            id: new_event_id(),
            title: title.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            day,
            location: None,
            notes: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Parsed start time, if the string is well formed
    pub fn start(&self) -> Option<NaiveTime> {
        parse_time(&self.start_time).ok()
    }

    /// Parsed end time, if the string is well formed
    pub fn end(&self) -> Option<NaiveTime> {
        parse_time(&self.end_time).ok()
    }
}

/// Generate a new opaque event id
pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a time-of-day string such as "1:00 PM", "01:00 pm" or "13:00"
pub fn parse_time(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| WeekcalError::InvalidTime(value.to_string()))
}

/// Format a time the way events store it, e.g. "1:30 PM"
pub fn format_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Shift a time string by `minutes`, wrapping around midnight
pub fn adjust_time(value: &str, minutes: i64) -> Result<String> {
    let time = parse_time(value)?;
    Ok(format_time(time + Duration::minutes(minutes)))
}
