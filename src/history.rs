// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Scan history log (JSON Lines)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::Result;

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The model returned an event list
    Events,
    /// The model said the photo is not a schedule
    NotASchedule,
    /// The answer had neither tag
    Unexpected,
    /// The request itself failed
    Failed,
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanOutcome::Events => "events",
            ScanOutcome::NotASchedule => "not a schedule",
            ScanOutcome::Unexpected => "unexpected",
            ScanOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A single scan attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub image_path: PathBuf,
    pub image_hash: Option<String>,
    pub outcome: ScanOutcome,
    pub event_count: usize,
    pub message: Option<String>,
}

impl ScanRecord {
    pub fn new(image_path: PathBuf, outcome: ScanOutcome) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            image_path,
            image_hash: None,
            outcome,
            event_count: 0,
            message: None,
        }
    }
}

/// Append-only log of scans
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append an entry to the history
    pub fn append(&self, record: &ScanRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }

    /// Read all history entries, oldest first
    pub fn read_all(&self) -> Result<Vec<ScanRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Failed to parse history entry: {}", e);
                }
            }
        }

        Ok(records)
    }

    /// Get the most recent N entries (newest first)
    pub fn get_recent(&self, count: usize) -> Result<Vec<ScanRecord>> {
        let mut records = self.read_all()?;
        records.reverse();
        records.truncate(count);
        Ok(records)
    }

    /// Clear all history
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
