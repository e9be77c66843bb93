//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::config::ServerConfig;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{AuthService, BooksService, NotesService, PostsService, TagsService};
use crate::storage::BlobStore;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub repo: Repository,
    pub uploads: BlobStore,
    pub auth: AuthService,
    pub books: BooksService,
    pub notes: NotesService,
    pub posts: PostsService,
    pub tags: TagsService,
}

impl AppState {
    /// Wire services over an existing pool
    pub fn new(config: ServerConfig, pool: SqlitePool) -> Self {
        let repo = Repository::new(pool);
        let uploads = BlobStore::new(config.upload_dir.clone());
        let locale = config.locale;

        Self {
            auth: AuthService::new(repo.clone(), config.token_ttl_hours, locale),
            books: BooksService::new(repo.clone(), uploads.clone(), locale),
            notes: NotesService::new(repo.clone(), locale),
            posts: PostsService::new(repo.clone(), locale),
            tags: TagsService::new(repo.clone(), locale),
            config: Arc::new(config),
            repo,
            uploads,
        }
    }
}

/// Application setup - opens the database and the upload directory
pub async fn setup(config: ServerConfig) -> Result<AppState> {
    tracing::info!("Initializing application");
    tracing::info!("Database: {:?}", config.database);

    let pool = create_pool(&config.database).await?;
    let state = AppState::new(config, pool);
    state.uploads.initialize().await?;

    tracing::info!("Application initialized successfully");

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_setup_creates_database_and_uploads() {
        let temp = TempDir::new().unwrap();
        let config = ServerConfig {
            database: temp.path().join("db").join("booknotes.db"),
            upload_dir: temp.path().join("uploads"),
            ..ServerConfig::default()
        };

        let state = setup(config).await.unwrap();

        assert!(temp.path().join("db").join("booknotes.db").exists());
        assert!(state.uploads.root().is_dir());
    }
}
