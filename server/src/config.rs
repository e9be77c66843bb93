//! Server configuration and validation limits
//!
//! Central location for all configuration constants, resource limits,
//! and validation boundaries used throughout the application, plus the
//! runtime `ServerConfig` loaded at startup.

use crate::error::{AppError, Result};
use crate::validation::messages::Locale;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ===== Validation Limits =====

/// Maximum length for short text fields (titles, descriptions, tag names)
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum length for note bodies (markdown and rendered HTML)
pub const MAX_CONTENT_LENGTH: usize = 60_000;

/// Smallest page count a book may declare
pub const MIN_BOOK_TOTAL: i64 = 1;

// ===== Uploads =====

/// Largest request body accepted, covers included (10 MiB)
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// URL prefix under which stored uploads are served
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

// ===== Pagination =====

/// Upper bound for `per_page` on paginated listings
pub const MAX_PER_PAGE: u32 = 100;

/// Number of books created by `booknotes seed`
pub const SEED_BOOK_COUNT: usize = 10;

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_database() -> PathBuf {
    PathBuf::from("data/booknotes.db")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

fn default_per_page() -> u32 {
    15
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP server listens on
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Directory holding content-addressed cover images
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Language used for validation messages
    #[serde(default)]
    pub locale: Locale,
    /// Lifetime of issued bearer tokens
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Default page size for paginated listings
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database: default_database(),
            upload_dir: default_upload_dir(),
            locale: Locale::default(),
            token_ttl_hours: default_token_ttl_hours(),
            per_page: default_per_page(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional JSON file, then apply
    /// `BOOKNOTES_*` environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                let content = tokio::fs::read_to_string(path).await?;
                serde_json::from_str(&content)
                    .map_err(|e| AppError::Generic(format!("Failed to parse config: {}", e)))?
            }
            None => ServerConfig::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("BOOKNOTES_BIND") {
            self.bind = bind;
        }
        if let Some(database) = lookup("BOOKNOTES_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(dir) = lookup("BOOKNOTES_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(locale) = lookup("BOOKNOTES_LOCALE") {
            self.locale = locale
                .parse()
                .map_err(|_| AppError::Generic(format!("Unknown locale: {}", locale)))?;
        }
        if let Some(ttl) = lookup("BOOKNOTES_TOKEN_TTL_HOURS") {
            self.token_ttl_hours = ttl
                .parse()
                .map_err(|_| AppError::Generic(format!("Invalid token TTL: {}", ttl)))?;
        }
        if let Some(per_page) = lookup("BOOKNOTES_PER_PAGE") {
            let per_page: u32 = per_page
                .parse()
                .map_err(|_| AppError::Generic(format!("Invalid per_page: {}", per_page)))?;
            self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        }
        Ok(())
    }
}
