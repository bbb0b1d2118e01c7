// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Scan session: photo in, events out
//!
//! Saves the photo, asks the model once, classifies the answer and keeps
//! a small state the front end can render (loading flag, popup message).
//! Only one scan runs at a time; a second trigger is refused rather than
//! queued.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::event::ScheduleEvent;
use crate::extraction::{classify_response, ExtractionOutcome};
use crate::gemini::ScheduleExtractor;
use crate::history::{History, ScanOutcome, ScanRecord};
use crate::image_store::{image_hash, load_scan, mime_type, save_scan, scan_path};
use crate::store::ScheduleStore;
use crate::{Result, WeekcalError};

/// What the front end shows about the current scan
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanState {
    pub is_loading: bool,
    /// Model explanation or error text
    pub message: Option<String>,
    /// The message should be shown as a popup with a retry option
    pub show_info_popup: bool,
    pub scan_success: bool,
}

/// Everything one scan produced
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub state: ScanState,
    pub events: Vec<ScheduleEvent>,
    pub record: ScanRecord,
}

pub struct ScanSession {
    extractor: Arc<dyn ScheduleExtractor>,
    prompt: String,
    data_dir: PathBuf,
    max_dimension: u32,
    history: Option<History>,
    state: Mutex<ScanState>,
    busy: tokio::sync::Mutex<()>,
}

impl ScanSession {
    pub fn new(extractor: Arc<dyn ScheduleExtractor>, prompt: String, data_dir: PathBuf) -> Self {
        Self {
            extractor,
            prompt,
            data_dir,
            max_dimension: 2048,
            history: None,
            state: Mutex::new(ScanState::default()),
            busy: tokio::sync::Mutex::new(()),
        }
    }

    /// Session wired up from configuration, logging to the scan history
    pub fn from_config(config: &AppConfig, extractor: Arc<dyn ScheduleExtractor>) -> Self {
        Self::new(extractor, config.prompts.extraction.clone(), config.data_dir())
            .with_max_dimension(config.storage.max_image_dimension)
            .with_history(History::new(config.history_path()))
    }

    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = Some(history);
        self
    }

    /// Whether a scan is running right now
    pub fn is_busy(&self) -> bool {
        self.busy.try_lock().is_err()
    }

    /// Current state snapshot
    pub fn state(&self) -> ScanState {
        self.lock_state().clone()
    }

    /// Clear the message so the user can retry
    pub fn dismiss(&self) {
        let mut state = self.lock_state();
        state.message = None;
        state.show_info_popup = false;
    }

    /// Scan `source` and append any events found to `store`
    pub async fn process(&self, source: &Path, store: &mut ScheduleStore) -> Result<ScanResult> {
        let result = self.scan(source).await?;
        store.extend(result.events.iter().cloned());
        Ok(result)
    }

    /// Scan `source` without touching a store.
    ///
    /// Fails only with [`WeekcalError::ScanInProgress`]; every other problem
    /// ends up as a message in the returned state.
    pub async fn scan(&self, source: &Path) -> Result<ScanResult> {
        let _busy = self
            .busy
            .try_lock()
            .map_err(|_| WeekcalError::ScanInProgress)?;

        *self.lock_state() = ScanState {
            is_loading: true,
            ..ScanState::default()
        };

        info!("Scanning {:?}", source);
        let saved = scan_path(&self.data_dir);
        let (state, events, mut record) = match self.extract(source).await {
            Ok((hash, outcome)) => {
                let mut record = ScanRecord::new(saved, outcome_kind(&outcome));
                record.image_hash = Some(hash);
                let (state, events) = settle(outcome);
                (state, events, record)
            }
            Err(e) => {
                warn!("Scan failed: {}", e);
                let message = format!("Failed to scan: {}", e);
                let state = ScanState {
                    message: Some(message),
                    ..ScanState::default()
                };
                (state, Vec::new(), ScanRecord::new(saved, ScanOutcome::Failed))
            }
        };

        record.event_count = events.len();
        record.message = state.message.clone();
        *self.lock_state() = state.clone();

        if let Some(history) = &self.history {
            if let Err(e) = history.append(&record) {
                warn!("Failed to record scan history: {}", e);
            }
        }

        info!("Scan finished: {} ({} events)", record.outcome, record.event_count);
        Ok(ScanResult { state, events, record })
    }

    async fn extract(&self, source: &Path) -> Result<(String, ExtractionOutcome)> {
        let saved = save_scan(source, &self.data_dir, self.max_dimension)?;
        let image = load_scan(&saved)?;
        let hash = image_hash(&image);

        let answer = self
            .extractor
            .extract(&image, mime_type(&image), &self.prompt)
            .await?;

        Ok((hash, classify_response(&answer)))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn outcome_kind(outcome: &ExtractionOutcome) -> ScanOutcome {
    match outcome {
        ExtractionOutcome::Events(_) => ScanOutcome::Events,
        ExtractionOutcome::NotASchedule(_) => ScanOutcome::NotASchedule,
        ExtractionOutcome::Unexpected => ScanOutcome::Unexpected,
    }
}

/// Final state for a classified answer
fn settle(outcome: ExtractionOutcome) -> (ScanState, Vec<ScheduleEvent>) {
    let message = outcome.message().map(str::to_string);
    match outcome {
        ExtractionOutcome::Events(events) => (
            ScanState {
                scan_success: true,
                ..ScanState::default()
            },
            events,
        ),
        ExtractionOutcome::NotASchedule(_) | ExtractionOutcome::Unexpected => (
            ScanState {
                message,
                show_info_popup: true,
                ..ScanState::default()
            },
            Vec::new(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Weekday;
    use crate::extraction::UNEXPECTED_MESSAGE;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockExtractor {
        answer: std::result::Result<String, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl MockExtractor {
        fn answering(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(error: &str) -> Self {
            Self {
                answer: Err(error.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScheduleExtractor for MockExtractor {
        async fn extract(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(!image.is_empty());
            assert_eq!(mime_type, "image/jpeg");
            assert!(!prompt.is_empty());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer.clone().map_err(WeekcalError::Api)
        }
    }

    fn photo(dir: &Path) -> PathBuf {
        let path = dir.join("timetable.png");
        RgbImage::from_pixel(32, 32, Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn session(dir: &Path, extractor: Arc<MockExtractor>) -> ScanSession {
        ScanSession::new(extractor, "extract the timetable".to_string(), dir.join("data"))
            .with_history(History::new(dir.join("history.jsonl")))
    }

    const ANSWER: &str = "Days are columns.\n<JSON>[\
        {\"title\":\"Maths\",\"start_time\":\"9:00 AM\",\"end_time\":\"10:00 AM\",\"day\":\"MONDAY\"},\
        {\"title\":\"French\",\"start_time\":\"11:00 AM\",\"end_time\":\"12:00 PM\",\"day\":\"friday\"}\
        ]</JSON>";

    #[tokio::test]
    async fn test_successful_scan_adds_events() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(MockExtractor::answering(ANSWER));
        let session = session(dir.path(), extractor.clone());
        let mut store = ScheduleStore::new();

        let result = session.process(&photo(dir.path()), &mut store).await.unwrap();

        assert!(result.state.scan_success);
        assert!(!result.state.is_loading);
        assert_eq!(result.state.message, None);
        assert_eq!(store.len(), 2);
        assert_eq!(store.events()[1].day, Weekday::Friday);
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("data").join("scan.jpeg").exists());

        let history = History::new(dir.path().join("history.jsonl")).read_all().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, ScanOutcome::Events);
        assert_eq!(history[0].event_count, 2);
        assert!(history[0].image_hash.is_some());
    }

    #[tokio::test]
    async fn test_not_a_schedule_shows_popup() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(MockExtractor::answering(
            "<NA>A blurry desk. Retake the photo closer and in better light.</NA>",
        ));
        let session = session(dir.path(), extractor);
        let mut store = ScheduleStore::new();

        let result = session.process(&photo(dir.path()), &mut store).await.unwrap();

        assert!(store.is_empty());
        assert!(result.state.show_info_popup);
        assert!(!result.state.scan_success);
        assert_eq!(
            result.state.message.as_deref(),
            Some("A blurry desk. Retake the photo closer and in better light.")
        );
        assert_eq!(result.record.outcome, ScanOutcome::NotASchedule);

        session.dismiss();
        assert_eq!(session.state().message, None);
        assert!(!session.state().show_info_popup);
    }

    #[tokio::test]
    async fn test_untagged_answer() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), Arc::new(MockExtractor::answering("I like turtles")));

        let result = session.scan(&photo(dir.path())).await.unwrap();
        assert_eq!(result.state.message.as_deref(), Some(UNEXPECTED_MESSAGE));
        assert_eq!(result.record.outcome, ScanOutcome::Unexpected);
    }

    #[tokio::test]
    async fn test_api_failure_becomes_message() {
        let dir = tempfile::tempdir().unwrap();
        let session = session(dir.path(), Arc::new(MockExtractor::failing("quota exceeded")));

        let result = session.scan(&photo(dir.path())).await.unwrap();
        let message = result.state.message.unwrap();
        assert!(message.starts_with("Failed to scan:"), "{}", message);
        assert!(message.contains("quota exceeded"));
        assert!(!result.state.is_loading);
        assert_eq!(result.record.outcome, ScanOutcome::Failed);
    }

    #[tokio::test]
    async fn test_missing_photo_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(MockExtractor::answering(ANSWER));
        let session = session(dir.path(), extractor.clone());

        let result = session.scan(&dir.path().join("nope.jpg")).await.unwrap();
        assert!(result.state.message.unwrap().contains("not found"));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_scan_is_refused_while_first_runs() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(MockExtractor {
            answer: Ok(ANSWER.to_string()),
            delay: Duration::from_millis(100),
            calls: AtomicUsize::new(0),
        });
        let session = session(dir.path(), extractor.clone());
        let source = photo(dir.path());

        let (first, second) = tokio::join!(session.scan(&source), session.scan(&source));

        assert!(first.is_ok());
        assert!(matches!(second, Err(WeekcalError::ScanInProgress)));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

        // Free again afterwards
        assert!(session.scan(&source).await.is_ok());
    }
}
