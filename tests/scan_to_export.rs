// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use image::{Rgb, RgbImage};
use std::sync::Arc;

use weekcal::db::Database;
use weekcal::gemini::ScheduleExtractor;
use weekcal::history::{History, ScanOutcome};
use weekcal::ics::build_calendar;
use weekcal::scanner::ScanSession;
use weekcal::{AppConfig, Result, ScheduleStore, Weekday};

const ANSWER: &str = r#"The days run across the top and the hours down the left side.
<JSON>
[
  {"title": "Physics", "start_time": "9:00 AM", "end_time": "10:30 AM", "day": "MONDAY", "location": "Lab 2"},
  {"title": "History", "start_time": "1:00 PM", "end_time": "2:00 PM", "day": "WEDNESDAY"},
  {"title": "Drama", "start_time": "whenever", "end_time": "3:00 PM", "day": "THURSDAY"},
  {"title": "Sport", "start_time": "3:00 PM", "end_time": "4:30 PM", "day": "Caturday", "notes": "Bring kit"}
]
</JSON>"#;

struct CannedModel;

#[async_trait]
impl ScheduleExtractor for CannedModel {
    async fn extract(&self, _image: &[u8], _mime_type: &str, _prompt: &str) -> Result<String> {
        Ok(ANSWER.to_string())
    }
}

fn config_in(dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.data_dir = dir.join("data").to_string_lossy().to_string();
    config.storage.database = dir.join("data").join("weekcal.db").to_string_lossy().to_string();
    config.storage.history_file = dir.join("history.jsonl").to_string_lossy().to_string();
    config.export.cache_dir = dir.join("cache").to_string_lossy().to_string();
    config
}

#[tokio::test]
async fn scan_edit_and_export_a_week() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let photo = dir.path().join("timetable.png");
    RgbImage::from_pixel(64, 48, Rgb([250, 250, 250])).save(&photo).unwrap();

    // Scan
    let session = ScanSession::from_config(&config, Arc::new(CannedModel));
    let mut store = ScheduleStore::new();
    let result = session.process(&photo, &mut store).await.unwrap();

    assert!(result.state.scan_success);
    assert_eq!(store.len(), 4);
    // Unknown day falls back to Monday
    assert_eq!(store.events()[3].day, Weekday::Monday);

    let history = History::new(config.history_path()).read_all().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, ScanOutcome::Events);

    // Persist and reload
    std::fs::create_dir_all(config.data_dir()).unwrap();
    let db = Database::open(config.database_path()).unwrap();
    db.save_store(&store).unwrap();
    let mut store = db.load_store().unwrap();
    assert_eq!(store.len(), 4);

    // Edit: move Sport to Friday, drop History
    let sport = store.events()[3].id.clone();
    let history_id = store.events()[1].id.clone();
    assert!(store.move_event(&sport, Weekday::Friday, 0));
    assert!(store.delete(&history_id));
    db.save_store(&store).unwrap();

    // Export relative to Tuesday 2024-01-02
    let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
    let export = build_calendar(db.load_store().unwrap().events(), "-//test//EN", today, now);

    assert_eq!(export.exported, 2);
    assert_eq!(export.skipped, vec!["Drama".to_string()]);

    let ics = &export.content;
    assert!(ics.contains("PRODID:-//test//EN"));
    // Monday already passed this week, so next Monday
    assert!(ics.contains("DTSTART:20240108T090000"));
    assert!(ics.contains("DTEND:20240108T103000"));
    // Friday of the same week
    assert!(ics.contains("DTSTART:20240105T150000"));
    assert_eq!(ics.matches("RRULE:FREQ=WEEKLY").count(), 2);
    assert!(ics.contains("LOCATION:Lab 2"));
    assert!(ics.contains("DESCRIPTION:Bring kit"));
    assert!(!ics.contains("History"));
}

#[tokio::test]
async fn photo_that_is_not_a_schedule_leaves_store_alone() {
    struct Refusal;

    #[async_trait]
    impl ScheduleExtractor for Refusal {
        async fn extract(&self, _image: &[u8], _mime_type: &str, _prompt: &str) -> Result<String> {
            Ok("<NA>This is a photo of a cat.</NA>".to_string())
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let photo = dir.path().join("cat.png");
    RgbImage::from_pixel(16, 16, Rgb([10, 10, 10])).save(&photo).unwrap();

    let session = ScanSession::from_config(&config, Arc::new(Refusal));
    let mut store = ScheduleStore::new();
    let result = session.process(&photo, &mut store).await.unwrap();

    assert!(store.is_empty());
    assert!(result.state.show_info_popup);
    assert_eq!(result.state.message.as_deref(), Some("This is a photo of a cat."));
}
