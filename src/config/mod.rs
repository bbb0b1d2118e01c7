// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for weekcal

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ics::DEFAULT_PROD_ID;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Inbox directories watched for new timetable photos
    #[serde(default = "default_watch_paths")]
    pub watch_paths: Vec<String>,

    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,

    /// Where scans, the schedule and history live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Calendar export settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Web API settings
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_extraction_prompt")]
    pub extraction: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_db_path")]
    pub database: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    /// Longest side of the stored scan, in pixels
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_prod_id")]
    pub prod_id: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_ics_file_name")]
    pub file_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
}

// Default value functions
fn default_watch_paths() -> Vec<String> { vec!["./inbox".to_string()] }
fn default_engine_url() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_model() -> String { "gemini-2.0-flash".to_string() }
fn default_api_key_env() -> String { "GEMINI_API_KEY".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_data_dir() -> String { "./data".to_string() }
fn default_db_path() -> String { "weekcal.db".to_string() }
fn default_history_file() -> String { "weekcal_history.jsonl".to_string() }
fn default_max_image_dimension() -> u32 { 2048 }
fn default_prod_id() -> String { DEFAULT_PROD_ID.to_string() }
fn default_cache_dir() -> String { "./cache".to_string() }
fn default_ics_file_name() -> String { "my_schedule.ics".to_string() }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }

fn default_extraction_prompt() -> String {
    "You are a calendar assistant that extracts structured event data from photographed \
     weekly schedules, including unconventional or inconsistent layouts.\n\n\
     Days may be rows or columns. Time slots may sit on the side, along the top, inside \
     the event blocks, or be missing entirely. Cells may span several hours or carry extra \
     notes. Infer the structure where needed.\n\n\
     First briefly explain how the schedule is laid out (which axis holds the days, how \
     you inferred the time slots). Then extract every event. Read the text carefully.\n\n\
     Write each day in full upper case (e.g. 'MONDAY'). Write each time in 12-hour form \
     with one space before AM/PM (e.g. '1:00 PM', '12:30 AM'), converting from 24-hour \
     time if necessary.\n\n\
     Output the events as a JSON array of objects with the fields: title, start_time, \
     end_time, day, location (if present), notes (optional).\n\n\
     Enclose the JSON array in <JSON></JSON> tags. If you cannot see a schedule or \
     timetable, instead write <NA></NA> tags containing what you can see and, if it looks \
     like a schedule, advice for taking a better photo. The text inside <NA></NA> must \
     not exceed 40 words."
        .to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_paths: default_watch_paths(),
            ai_engine: EngineConfig::default(),
            prompts: PromptConfig::default(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            extraction: default_extraction_prompt(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: default_db_path(),
            history_file: default_history_file(),
            max_image_dimension: default_max_image_dimension(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            prod_id: default_prod_id(),
            cache_dir: default_cache_dir(),
            file_name: default_ics_file_name(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::WeekcalError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values that cannot work at runtime
    pub fn validate(&self) -> crate::Result<()> {
        if self.ai_engine.model.trim().is_empty() {
            return Err(crate::WeekcalError::Config("ai_engine.model is empty".to_string()));
        }
        if self.ai_engine.timeout_secs == 0 {
            return Err(crate::WeekcalError::Config(
                "ai_engine.timeout_secs must be positive".to_string(),
            ));
        }
        if self.storage.max_image_dimension == 0 {
            return Err(crate::WeekcalError::Config(
                "storage.max_image_dimension must be positive".to_string(),
            ));
        }
        if self.export.file_name.trim().is_empty() {
            return Err(crate::WeekcalError::Config("export.file_name is empty".to_string()));
        }
        Ok(())
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> crate::Result<String> {
        let var = &self.ai_engine.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(crate::WeekcalError::MissingApiKey(var.clone())),
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.database)
    }

    pub fn history_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.history_file)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.export.cache_dir)
    }
}
