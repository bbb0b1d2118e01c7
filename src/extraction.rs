// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Classification of the model's tagged free-text answer

use serde::Serialize;

use crate::event::ScheduleEvent;
use crate::parser::parse_schedule_events;

/// Shown when the answer carries neither tag
pub const UNEXPECTED_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// What the model made of the image
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// `<JSON>` answer, decoded. May be empty if the payload was broken.
    Events(Vec<ScheduleEvent>),
    /// `<NA>` answer: what the model saw and advice for a better photo
    NotASchedule(String),
    /// Neither tag present
    Unexpected,
}

impl ExtractionOutcome {
    /// Text to show the user, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Events(_) => None,
            ExtractionOutcome::NotASchedule(msg) => Some(msg),
            ExtractionOutcome::Unexpected => Some(UNEXPECTED_MESSAGE),
        }
    }
}

/// Text between the first `<tag>` and the next `</tag>`.
///
/// A missing closing tag yields everything after the opening tag.
pub fn extract_tagged<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open)? + open.len();
    let rest = &text[start..];
    Some(match rest.find(&close) {
        Some(end) => &rest[..end],
        None => rest,
    })
}

/// Sort a raw model answer into events, a refusal, or garbage.
/// `<JSON>` wins when both tags are present.
pub fn classify_response(text: &str) -> ExtractionOutcome {
    if let Some(json) = extract_tagged(text, "JSON") {
        return ExtractionOutcome::Events(parse_schedule_events(json));
    }
    if let Some(reason) = extract_tagged(text, "NA") {
        return ExtractionOutcome::NotASchedule(reason.trim().to_string());
    }
    ExtractionOutcome::Unexpected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Weekday;

    #[test]
    fn test_extract_tagged() {
        assert_eq!(extract_tagged("a <X>inner</X> b", "X"), Some("inner"));
        assert_eq!(extract_tagged("<X>first</X><X>second</X>", "X"), Some("first"));
        assert_eq!(extract_tagged("<X>unterminated", "X"), Some("unterminated"));
        assert_eq!(extract_tagged("nothing here", "X"), None);
    }

    #[test]
    fn test_classify_json_answer_with_reasoning() {
        let answer = "The days run across the top row and times down the left side.\n\
            <JSON>[{\"title\":\"Physics\",\"start_time\":\"11:00 AM\",\"end_time\":\"12:00 PM\",\"day\":\"THURSDAY\"}]</JSON>";

        match classify_response(answer) {
            ExtractionOutcome::Events(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].title, "Physics");
                assert_eq!(events[0].day, Weekday::Thursday);
            }
            other => panic!("Expected events, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_not_a_schedule() {
        let answer = "<NA>  A photo of a cat. Try photographing the timetable flat and well lit. </NA>";
        let outcome = classify_response(answer);
        assert_eq!(
            outcome,
            ExtractionOutcome::NotASchedule(
                "A photo of a cat. Try photographing the timetable flat and well lit.".to_string()
            )
        );
        assert!(outcome.message().unwrap().starts_with("A photo of a cat"));
    }

    #[test]
    fn test_classify_untagged() {
        let outcome = classify_response("Sure! Here is your schedule: ...");
        assert_eq!(outcome, ExtractionOutcome::Unexpected);
        assert_eq!(outcome.message(), Some(UNEXPECTED_MESSAGE));
    }

    #[test]
    fn test_broken_json_is_empty_events() {
        let outcome = classify_response("<JSON>[{oops</JSON>");
        assert_eq!(outcome, ExtractionOutcome::Events(Vec::new()));
        assert_eq!(outcome.message(), None);
    }

    #[test]
    fn test_json_preferred_over_na() {
        let outcome = classify_response("<NA>blurry</NA><JSON>[]</JSON>");
        assert_eq!(outcome, ExtractionOutcome::Events(Vec::new()));
    }
}
