//! Books service
//!
//! Book lifecycle: validated creation with an optional cover upload,
//! partial updates checked against the stored row, soft and force deletion.

use crate::database::{Book, BookWithCount, Note, QueryFilter, Repository, Visibility};
use crate::error::Result;
use crate::storage::{BlobStore, StoredBlob};
use crate::validation::{CreateBook, Locale, RawInput, UpdateBook};
use serde::Serialize;

/// A book with its notes, as returned by the detail endpoint. The count
/// travels with the book.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    pub book: BookWithCount,
    pub notes: Vec<Note>,
}

/// Service for managing books
#[derive(Clone)]
pub struct BooksService {
    repo: Repository,
    uploads: BlobStore,
    locale: Locale,
}

impl BooksService {
    pub fn new(repo: Repository, uploads: BlobStore, locale: Locale) -> Self {
        Self {
            repo,
            uploads,
            locale,
        }
    }

    pub async fn list_books(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<BookWithCount>> {
        self.repo.list_books(visibility, filter).await
    }

    /// A visible book with its notes filtered and sorted by `note_filter`.
    pub async fn get_book(
        &self,
        id: i64,
        visibility: Visibility,
        note_filter: &QueryFilter,
    ) -> Result<BookDetail> {
        let book = self.repo.find_book(id, visibility).await?;
        let notes = self
            .repo
            .list_book_notes(book.id, visibility, note_filter)
            .await?;

        Ok(BookDetail {
            book: BookWithCount {
                book,
                notes_count: notes.len() as i64,
            },
            notes,
        })
    }

    /// Create a book. Nothing is persisted when validation fails, and a
    /// freshly stored cover is removed again if the insert fails.
    pub async fn create_book(&self, input: &RawInput) -> Result<Book> {
        let CreateBook { mut book, cover } = CreateBook::parse(input, self.locale)?;

        let stored = match cover {
            Some(file) => Some(self.uploads.store(&file).await?),
            None => None,
        };
        if let Some(blob) = &stored {
            book.cover = blob.public_path.clone();
        }

        tracing::info!("Creating book: {}", book.title);

        match self.repo.create_book(book).await {
            Ok(created) => {
                tracing::info!("Book created successfully: {}", created.id);
                Ok(created)
            }
            Err(e) => {
                self.discard_new_cover(stored).await;
                Err(e)
            }
        }
    }

    /// Update a book in any state; this is also how a trashed book is restored.
    pub async fn update_book(&self, id: i64, input: &RawInput) -> Result<Book> {
        let current = self.repo.find_book(id, Visibility::everything()).await?;
        let UpdateBook { mut changes, cover } = UpdateBook::parse(input, self.locale, &current)?;

        let stored = match cover {
            Some(Some(file)) => Some(self.uploads.store(&file).await?),
            Some(None) => {
                changes.cover = Some(String::new());
                None
            }
            None => None,
        };
        if let Some(blob) = &stored {
            changes.cover = Some(blob.public_path.clone());
        }

        tracing::debug!("Updating book: {}", id);
        match self.repo.update_book(id, changes).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                self.discard_new_cover(stored).await;
                Err(e)
            }
        }
    }

    /// Remove a cover written by a request whose write then failed.
    /// Covers that already existed are shared and stay.
    async fn discard_new_cover(&self, stored: Option<StoredBlob>) {
        if let Some(blob) = stored.filter(|b| b.created) {
            if let Err(cleanup) = self.uploads.remove(&blob.public_path).await {
                tracing::warn!("Failed to remove orphaned cover: {}", cleanup);
            }
        }
    }

    pub async fn delete_book(&self, id: i64, visibility: Visibility) -> Result<()> {
        tracing::info!("Deleting book: {}", id);
        self.repo.soft_delete_book(id, visibility).await
    }

    /// Permanently remove a trashed book with its notes and tag links
    pub async fn force_delete_book(&self, id: i64) -> Result<()> {
        let book = self.repo.force_delete_book(id).await?;
        tracing::info!("Book permanently deleted: {} ({})", book.id, book.title);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use crate::database::filter::{BOOK_FILTER, NOTE_FILTER};
    use crate::error::AppError;
    use crate::validation::UploadedFile;
    use serde_json::json;
    use tempfile::TempDir;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

    async fn create_test_service() -> (BooksService, TempDir) {
        let temp = TempDir::new().unwrap();
        let uploads = BlobStore::new(temp.path().join("uploads"));
        uploads.initialize().await.unwrap();
        let repo = Repository::new(create_memory_pool().await.unwrap());
        (BooksService::new(repo, uploads, Locale::ZhCn), temp)
    }

    fn with_cover(fields: serde_json::Value) -> RawInput {
        let mut input = RawInput::from_json(fields).unwrap();
        input.insert_file(
            "cover",
            UploadedFile {
                filename: Some("cover.png".to_string()),
                content_type: Some("image/png".to_string()),
                data: PNG.to_vec(),
            },
        );
        input
    }

    #[tokio::test]
    async fn test_duplicate_covers_share_path() {
        let (service, _temp) = create_test_service().await;

        let first = service
            .create_book(&with_cover(json!({ "title": "A", "total": 10 })))
            .await
            .unwrap();
        let second = service
            .create_book(&with_cover(json!({ "title": "B", "total": 10 })))
            .await
            .unwrap();

        assert!(first.cover.starts_with("/uploads/"));
        assert!(first.cover.ends_with(".png"));
        assert_eq!(first.cover, second.cover);
    }

    #[tokio::test]
    async fn test_invalid_create_persists_nothing() {
        let (service, _temp) = create_test_service().await;

        let input = with_cover(json!({ "title": "A", "total": 10, "read": 11 }));
        let result = service.create_book(&input).await;
        match result {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.get("read").unwrap()[0], "已读不能大于10");
            }
            other => panic!("expected validation error, got {:?}", other.map(|b| b.id)),
        }

        let books = service
            .list_books(Visibility::everything(), &QueryFilter::defaults(&BOOK_FILTER))
            .await
            .unwrap();
        assert!(books.is_empty());
    }

    #[tokio::test]
    async fn test_update_restores_trashed_book() {
        let (service, _temp) = create_test_service().await;

        let book = service
            .create_book(&RawInput::from_json(json!({ "title": "A", "total": 10 })).unwrap())
            .await
            .unwrap();
        service
            .delete_book(book.id, Visibility::public())
            .await
            .unwrap();

        let filter = QueryFilter::defaults(&NOTE_FILTER);
        assert!(service
            .get_book(book.id, Visibility::public(), &filter)
            .await
            .is_err());

        let input = RawInput::from_json(json!({ "deleted_at": null })).unwrap();
        service.update_book(book.id, &input).await.unwrap();

        let detail = service
            .get_book(book.id, Visibility::public(), &filter)
            .await
            .unwrap();
        assert_eq!(detail.book.notes_count, 0);
    }

    #[tokio::test]
    async fn test_failed_update_discards_new_cover() {
        let (service, _temp) = create_test_service().await;
        let book = service
            .create_book(&RawInput::from_json(json!({ "title": "A", "total": 10 })).unwrap())
            .await
            .unwrap();

        sqlx::query(
            "CREATE TRIGGER books_frozen BEFORE UPDATE ON books \
             BEGIN SELECT RAISE(ABORT, 'frozen'); END",
        )
        .execute(service.repo.pool())
        .await
        .unwrap();

        let result = service
            .update_book(book.id, &with_cover(json!({ "title": "B" })))
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let mut entries = tokio::fs::read_dir(service.uploads.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_shared_cover() {
        let (service, _temp) = create_test_service().await;
        let first = service
            .create_book(&with_cover(json!({ "title": "A", "total": 10 })))
            .await
            .unwrap();

        sqlx::query(
            "CREATE TRIGGER books_frozen BEFORE UPDATE ON books \
             BEGIN SELECT RAISE(ABORT, 'frozen'); END",
        )
        .execute(service.repo.pool())
        .await
        .unwrap();

        let result = service
            .update_book(first.id, &with_cover(json!({ "title": "B" })))
            .await;
        assert!(result.is_err());

        let path = service.uploads.resolve(&first.cover).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_detail_nests_count_in_book() {
        let (service, _temp) = create_test_service().await;
        let book = service
            .create_book(&RawInput::from_json(json!({ "title": "A", "total": 10 })).unwrap())
            .await
            .unwrap();
        for page in 1..=3 {
            service
                .repo
                .create_note(
                    book.id,
                    crate::database::NewNote {
                        title: None,
                        desc: None,
                        content: "c".to_string(),
                        html_content: "c".to_string(),
                        page,
                        hidden: false,
                        tags: Vec::new(),
                    },
                )
                .await
                .unwrap();
        }

        let detail = service
            .get_book(book.id, Visibility::public(), &QueryFilter::defaults(&NOTE_FILTER))
            .await
            .unwrap();
        let value = serde_json::to_value(&detail).unwrap();

        assert_eq!(value["book"]["id"], book.id);
        assert_eq!(value["book"]["notes_count"], 3);
        assert_eq!(value["notes"].as_array().unwrap().len(), 3);
        assert!(value.get("notes_count").is_none());
        assert!(value.get("title").is_none());
    }
}
