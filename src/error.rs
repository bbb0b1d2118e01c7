// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for weekcal

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for weekcal operations
pub type Result<T> = std::result::Result<T, WeekcalError>;

/// weekcal error types
#[derive(Error, Debug)]
pub enum WeekcalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("API key not set: environment variable {0} is empty or missing")]
    MissingApiKey(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scanned image not found: {0}")]
    ScanNotFound(PathBuf),

    #[error("A scan is already in progress")]
    ScanInProgress,

    #[error("No event with id {0}")]
    EventNotFound(String),

    #[error("Invalid time '{0}' (expected e.g. '1:00 PM' or '13:00')")]
    InvalidTime(String),
}
