// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use weekcal::extraction::{classify_response, ExtractionOutcome};
use weekcal::ics::create_ics;
use weekcal::parser::parse_schedule_events;

#[derive(Arbitrary, Debug)]
struct Input {
    answer: String,
    json: String,
    prod_id: String,
}

fuzz_target!(|input: Input| {
    // Model answers are untrusted text; none of this may panic
    if let ExtractionOutcome::Events(events) = classify_response(&input.answer) {
        let ics = create_ics(&events, &input.prod_id);
        assert!(ics.starts_with("BEGIN:VCALENDAR"));
    }

    let events = parse_schedule_events(&input.json);
    let _ = create_ics(&events, &input.prod_id);
});
