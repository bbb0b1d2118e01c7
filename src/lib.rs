// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! weekcal: timetable photo to weekly calendar
//!
//! A photographed weekly schedule is sent to a vision model, the answer is
//! parsed into recurring events, the events can be edited, and the week is
//! exported as an iCalendar file.

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod extraction;
pub mod gemini;
pub mod history;
pub mod ics;
pub mod image_store;
pub mod parser;
pub mod scanner;
pub mod store;
pub mod watcher;
pub mod web;

pub use config::AppConfig;
pub use error::{Result, WeekcalError};
pub use event::{ScheduleEvent, Weekday};
pub use store::ScheduleStore;
