// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! In-memory weekly schedule with add/edit/delete/move

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::event::{ScheduleEvent, Weekday};

/// The working list of events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStore {
    events: Vec<ScheduleEvent>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<ScheduleEvent>) -> Self {
        Self { events }
    }

    /// All events in list order
    pub fn events(&self) -> &[ScheduleEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ScheduleEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn add(&mut self, event: ScheduleEvent) {
        debug!("Adding event {} ({})", event.id, event.title);
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = ScheduleEvent>) {
        self.events.extend(events);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Remove the event with `id`. Returns false if there was none.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        before != self.events.len()
    }

    /// Replace the event sharing `updated.id`. Returns false if there was none.
    pub fn update(&mut self, updated: ScheduleEvent) -> bool {
        match self.events.iter_mut().find(|e| e.id == updated.id) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }

    /// Move an event to `target_day`, placing it at `target_index` among
    /// that day's events (clamped to the end). The list stays ordered by day.
    pub fn move_event(&mut self, id: &str, target_day: Weekday, target_index: usize) -> bool {
        let Some(pos) = self.events.iter().position(|e| e.id == id) else {
            return false;
        };

        let mut dragged = self.events.remove(pos);
        dragged.day = target_day;

        let (mut target, mut others): (Vec<_>, Vec<_>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| e.day == target_day);

        let index = target_index.min(target.len());
        debug!("Moving event {} to {} at {}", id, target_day, index);
        target.insert(index, dragged);

        others.extend(target);
        others.sort_by_key(|e| e.day);
        self.events = others;
        true
    }

    /// Events of one day, earliest first
    pub fn day(&self, day: Weekday) -> Vec<&ScheduleEvent> {
        let mut events: Vec<&ScheduleEvent> = self.events.iter().filter(|e| e.day == day).collect();
        events.sort_by(|a, b| compare_events(a, b));
        events
    }

    /// Days that have events, each sorted by start then end time
    pub fn events_by_day(&self) -> BTreeMap<Weekday, Vec<&ScheduleEvent>> {
        let mut grouped: BTreeMap<Weekday, Vec<&ScheduleEvent>> = BTreeMap::new();
        for event in &self.events {
            grouped.entry(event.day).or_default().push(event);
        }
        for events in grouped.values_mut() {
            events.sort_by(|a, b| compare_events(a, b));
        }
        grouped
    }

    /// All seven days, including empty ones
    pub fn week(&self) -> Vec<(Weekday, Vec<&ScheduleEvent>)> {
        let mut grouped = self.events_by_day();
        Weekday::ALL
            .into_iter()
            .map(|day| (day, grouped.remove(&day).unwrap_or_default()))
            .collect()
    }
}

fn compare_events(a: &ScheduleEvent, b: &ScheduleEvent) -> Ordering {
    compare_times(a.start(), b.start()).then_with(|| compare_times(a.end(), b.end()))
}

// Unparsable times sort after real ones
fn compare_times(a: Option<NaiveTime>, b: Option<NaiveTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
