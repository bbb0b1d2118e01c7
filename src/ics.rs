// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! iCalendar export of the weekly schedule
//!
//! Each event becomes one VEVENT anchored on the next date (today or later)
//! falling on its weekday, repeating weekly from there.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use icalendar::{Calendar, Component, EventLike};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::event::{parse_time, ScheduleEvent, Weekday};
use crate::Result;

/// Product identifier used when none is configured
pub const DEFAULT_PROD_ID: &str = "-//weekcal//weekcal//EN";

/// MIME type handed to other applications
pub const ICS_MIME_TYPE: &str = "text/calendar";

const FLOATING_FORMAT: &str = "%Y%m%dT%H%M%S";
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Result of an export run
#[derive(Debug, Clone)]
pub struct IcsExport {
    /// The calendar text, CRLF terminated
    pub content: String,
    /// Number of VEVENTs written
    pub exported: usize,
    /// Titles of events left out because their times did not parse
    pub skipped: Vec<String>,
}

/// Convert events to .ics text, anchored on the current local date
pub fn create_ics(events: &[ScheduleEvent], prod_id: &str) -> String {
    build_calendar(events, prod_id, Local::now().date_naive(), Utc::now()).content
}

/// Convert events to .ics text relative to `today`, stamping them with `now`
pub fn build_calendar(
    events: &[ScheduleEvent],
    prod_id: &str,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> IcsExport {
    let mut cal = Calendar::new();
    let dtstamp = now.format(UTC_FORMAT).to_string();
    let mut exported = 0;
    let mut skipped = Vec::new();

    for event in events {
        match build_vevent(event, today, &dtstamp) {
            Ok(vevent) => {
                cal.push(vevent);
                exported += 1;
            }
            Err(e) => {
                warn!("Could not process event '{}': {}", event.title, e);
                skipped.push(event.title.clone());
            }
        }
    }

    let cal = cal.done();
    let content = rewrite_header(&cal.to_string(), prod_id);
    debug!("Exported {} events, skipped {}", exported, skipped.len());

    IcsExport { content, exported, skipped }
}

fn build_vevent(event: &ScheduleEvent, today: NaiveDate, dtstamp: &str) -> Result<icalendar::Event> {
    let start = parse_time(&event.start_time)?;
    let end = parse_time(&event.end_time)?;
    let date = next_or_same(today, event.day);

    let mut vevent = icalendar::Event::new();
    vevent.uid(&event.id);
    vevent.add_property("DTSTAMP", dtstamp);
    vevent.add_property("DTSTART", date.and_time(start).format(FLOATING_FORMAT).to_string());
    vevent.add_property("DTEND", date.and_time(end).format(FLOATING_FORMAT).to_string());
    vevent.add_property("RRULE", "FREQ=WEEKLY");
    vevent.summary(&event.title);

    if let Some(ref location) = event.location {
        vevent.location(location);
    }
    if let Some(ref notes) = event.notes {
        vevent.description(notes);
    }

    Ok(vevent.done())
}

/// First date on or after `today` that falls on `day`
pub fn next_or_same(today: NaiveDate, day: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let ahead = (day.ordinal() as i64 - current).rem_euclid(7);
    today + Duration::days(ahead)
}

/// Swap in our PRODID and make sure CALSCALE follows it
fn rewrite_header(ics: &str, prod_id: &str) -> String {
    let has_calscale = ics.lines().any(|l| l.starts_with("CALSCALE:"));
    let mut result = String::with_capacity(ics.len());

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(prod_id);
            result.push_str("\r\n");
            if !has_calscale {
                result.push_str("CALSCALE:GREGORIAN\r\n");
            }
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

/// Write calendar text to `<cache_dir>/ics_files/<file_name>`
pub fn write_ics_file(cache_dir: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    let dir = cache_dir.join("ics_files");
    fs::create_dir_all(&dir)?;

    let path = dir.join(file_name);
    fs::write(&path, content)?;
    info!("Wrote calendar to {:?}", path);

    Ok(path)
}

/// Hand a file to the desktop's "open with" handler
pub fn open_with_default_app(path: &Path) -> Result<()> {
    info!("Opening {:?} as {}", path, ICS_MIME_TYPE);

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .arg("/c")
            .arg("start")
            .arg("")
            .arg(path)
            .spawn()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2024-01-01 was a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 30, 0).unwrap()
    }

    fn wednesday_class() -> ScheduleEvent {
        let mut event = ScheduleEvent::new("Chemistry", "10:00 AM", "11:00 AM", Weekday::Wednesday);
        event.id = "chem-1".to_string();
        event
    }

    fn vevent_count(ics: &str) -> usize {
        ics.lines().filter(|l| *l == "BEGIN:VEVENT").count()
    }

    #[test]
    fn test_next_or_same() {
        assert_eq!(next_or_same(monday(), Weekday::Monday), monday());
        assert_eq!(
            next_or_same(monday(), Weekday::Wednesday),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        assert_eq!(
            next_or_same(monday(), Weekday::Sunday),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );
        // Saturday looking for Friday wraps into next week
        let saturday = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        assert_eq!(
            next_or_same(saturday, Weekday::Friday),
            NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()
        );
    }

    #[test]
    fn test_empty_export_is_header_and_footer() {
        let export = build_calendar(&[], DEFAULT_PROD_ID, monday(), now());
        let ics = &export.content;

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.trim_end().ends_with("END:VCALENDAR"));
        assert!(ics.contains("VERSION:2.0"));
        assert!(ics.contains("PRODID:-//weekcal//weekcal//EN"));
        assert!(ics.contains("CALSCALE:GREGORIAN"));
        assert_eq!(vevent_count(ics), 0);
        assert_eq!(export.exported, 0);
    }

    #[test]
    fn test_single_weekly_event() {
        let export = build_calendar(&[wednesday_class()], "-//Test//Test//EN", monday(), now());
        let ics = &export.content;
        println!("Generated ICS:\n{}", ics);

        assert_eq!(vevent_count(ics), 1);
        assert!(ics.contains("PRODID:-//Test//Test//EN"));
        assert!(ics.contains("UID:chem-1"));
        assert!(ics.contains("DTSTAMP:20240101T083000Z"));
        assert!(ics.contains("DTSTART:20240103T100000"));
        assert!(ics.contains("DTEND:20240103T110000"));
        assert!(ics.contains("RRULE:FREQ=WEEKLY"));
        assert!(ics.contains("SUMMARY:Chemistry"));
        assert!(!ics.contains("LOCATION"));
        assert!(!ics.contains("DESCRIPTION"));
    }

    #[test]
    fn test_event_on_today_starts_today() {
        let wednesday = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let export = build_calendar(&[wednesday_class()], DEFAULT_PROD_ID, wednesday, now());
        assert!(export.content.contains("DTSTART:20240103T100000"));
    }

    #[test]
    fn test_optional_fields() {
        let event = wednesday_class()
            .with_location("Lab 4")
            .with_notes("Goggles");
        let ics = build_calendar(&[event], DEFAULT_PROD_ID, monday(), now()).content;

        assert!(ics.contains("LOCATION:Lab 4"));
        assert!(ics.contains("DESCRIPTION:Goggles"));
    }

    #[test]
    fn test_pm_and_unpadded_times() {
        let event = ScheduleEvent::new("Band", "1:00 PM", "2:30 PM", Weekday::Friday);
        let ics = build_calendar(&[event], DEFAULT_PROD_ID, monday(), now()).content;

        assert!(ics.contains("DTSTART:20240105T130000"));
        assert!(ics.contains("DTEND:20240105T143000"));
    }

    #[test]
    fn test_bad_time_skips_only_that_event() {
        let broken = ScheduleEvent::new("Mystery", "after lunch", "3:00 PM", Weekday::Tuesday);
        let fine = ScheduleEvent::new("Drama", "3:00 PM", "4:00 PM", Weekday::Thursday);

        let export = build_calendar(
            &[broken, wednesday_class(), fine],
            DEFAULT_PROD_ID,
            monday(),
            now(),
        );

        assert_eq!(export.exported, 2);
        assert_eq!(export.skipped, vec!["Mystery".to_string()]);
        assert_eq!(vevent_count(&export.content), 2);
        assert!(!export.content.contains("Mystery"));
        assert!(export.content.contains("SUMMARY:Drama"));
        assert!(export.content.trim_end().ends_with("END:VCALENDAR"));
    }

    #[test]
    fn test_create_ics_uses_current_date() {
        let ics = create_ics(&[wednesday_class()], DEFAULT_PROD_ID);
        assert_eq!(vevent_count(&ics), 1);
        assert!(ics.contains("RRULE:FREQ=WEEKLY"));
    }

    #[test]
    fn test_write_ics_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ics_file(dir.path(), "my_schedule.ics", "BEGIN:VCALENDAR\r\n").unwrap();

        assert_eq!(path, dir.path().join("ics_files").join("my_schedule.ics"));
        assert_eq!(fs::read_to_string(path).unwrap(), "BEGIN:VCALENDAR\r\n");
    }
}
