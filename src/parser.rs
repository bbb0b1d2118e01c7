// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Decode the model's JSON event array into typed events

use tracing::{debug, error};

use crate::event::ScheduleEvent;

/// Parse a JSON array of events.
///
/// Unknown fields are ignored and unknown day names fall back to Monday.
/// If the payload as a whole cannot be decoded the result is empty: a broken
/// answer is treated the same as an answer with no events.
pub fn parse_schedule_events(json: &str) -> Vec<ScheduleEvent> {
    let payload = strip_code_fence(json);

    match serde_json::from_str::<Vec<ScheduleEvent>>(payload) {
        Ok(events) => {
            debug!("Parsed {} events", events.len());
            events
        }
        Err(e) => {
            error!("Error parsing schedule JSON: {}", e);
            Vec::new()
        }
    }
}

/// Remove a surrounding ```json ... ``` fence, if present
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !(trimmed.starts_with("```") && trimmed.ends_with("```")) || trimmed.len() < 6 {
        return trimmed;
    }

    let inner = &trimmed[3..trimmed.len() - 3];
    inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Weekday;

    const THREE_EVENTS: &str = r#"[
        {"title": "Biology", "start_time": "9:00 AM", "end_time": "10:30 AM", "day": "MONDAY", "location": "Lab 2"},
        {"title": "History", "start_time": "1:00 PM", "end_time": "2:00 PM", "day": "WEDNESDAY", "notes": "Bring essay"},
        {"title": "Choir", "start_time": "4:15 PM", "end_time": "5:00 PM", "day": "FRIDAY", "location": null}
    ]"#;

    #[test]
    fn test_parses_all_fields() {
        let events = parse_schedule_events(THREE_EVENTS);
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].title, "Biology");
        assert_eq!(events[0].start_time, "9:00 AM");
        assert_eq!(events[0].end_time, "10:30 AM");
        assert_eq!(events[0].day, Weekday::Monday);
        assert_eq!(events[0].location.as_deref(), Some("Lab 2"));
        assert_eq!(events[0].notes, None);

        assert_eq!(events[1].day, Weekday::Wednesday);
        assert_eq!(events[1].notes.as_deref(), Some("Bring essay"));

        assert_eq!(events[2].location, None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let events = parse_schedule_events(THREE_EVENTS);
        assert_ne!(events[0].id, events[1].id);
        assert_ne!(events[1].id, events[2].id);
    }

    #[test]
    fn test_lowercase_day() {
        let events = parse_schedule_events(
            r#"[{"title":"Gym","start_time":"6:00 PM","end_time":"7:00 PM","day":"tuesday"}]"#,
        );
        assert_eq!(events[0].day, Weekday::Tuesday);
    }

    #[test]
    fn test_unknown_day_falls_back_to_monday() {
        let events = parse_schedule_events(
            r#"[
                {"title":"Party","start_time":"8:00 PM","end_time":"11:00 PM","day":"Funday"},
                {"title":"Run","start_time":"7:00 AM","end_time":"8:00 AM","day":"SUNDAY"}
            ]"#,
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].day, Weekday::Monday);
        assert_eq!(events[1].day, Weekday::Sunday);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let events = parse_schedule_events(
            r#"[{"title":"Piano","start_time":"3:00 PM","end_time":"4:00 PM","day":"SATURDAY","teacher":"Ms. Lee","room_number":12}]"#,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Piano");
    }

    #[test]
    fn test_broken_payload_yields_empty_list() {
        assert!(parse_schedule_events("[{\"title\": \"oops\"").is_empty());
        assert!(parse_schedule_events("not json at all").is_empty());
        assert!(parse_schedule_events("").is_empty());
        // A missing required field spoils the whole payload
        assert!(parse_schedule_events(r#"[{"title":"No times","day":"MONDAY"}]"#).is_empty());
    }

    #[test]
    fn test_code_fence_is_tolerated() {
        let fenced = format!("```json\n{}\n```", THREE_EVENTS);
        assert_eq!(parse_schedule_events(&fenced).len(), 3);
    }

    #[test]
    fn test_empty_array() {
        assert!(parse_schedule_events("  [] ").is_empty());
    }
}
