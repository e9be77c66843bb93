//! Notes service
//!
//! Notes always belong to a book; every read requires both the note and
//! its book to pass the caller's visibility.

use crate::database::{
    Book, Note, Pagination, QueryFilter, Repository, Tag, TaggableKind, Visibility,
};
use crate::error::{AppError, Result};
use crate::validation::{CreateNote, Locale, RawInput, UpdateNote};
use serde::Serialize;

/// A note with its parent book, as listed by the global note index
#[derive(Debug, Clone, Serialize)]
pub struct NoteWithBook {
    #[serde(flatten)]
    pub note: Note,
    pub book: Book,
}

/// A note with its tags and parent book
#[derive(Debug, Clone, Serialize)]
pub struct NoteDetail {
    #[serde(flatten)]
    pub note: Note,
    pub tags: Vec<Tag>,
    pub book: Book,
}

/// One page of the global note index
#[derive(Debug, Clone)]
pub struct NotePage {
    pub notes: Vec<NoteWithBook>,
    pub total: i64,
    pub pagination: Pagination,
}

/// Service for managing notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
    locale: Locale,
}

impl NotesService {
    pub fn new(repo: Repository, locale: Locale) -> Self {
        Self { repo, locale }
    }

    pub async fn list_notes(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
        pagination: Pagination,
    ) -> Result<NotePage> {
        let (notes, total) = self
            .repo
            .paginate_notes(visibility, filter, pagination)
            .await?;

        let book_ids: Vec<i64> = notes.iter().map(|n| n.book_id).collect();
        let books = self.repo.books_by_ids(&book_ids).await?;

        let notes = notes
            .into_iter()
            .filter_map(|note| {
                let book = books.get(&note.book_id).cloned()?;
                Some(NoteWithBook { note, book })
            })
            .collect();

        Ok(NotePage {
            notes,
            total,
            pagination,
        })
    }

    pub async fn get_note(&self, id: i64, visibility: Visibility) -> Result<NoteDetail> {
        let note = self.repo.find_note(id, visibility).await?;
        let book = self
            .repo
            .find_book(note.book_id, visibility)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Note"),
                other => other,
            })?;

        let mut tags = self.repo.tags_for(TaggableKind::Note, &[note.id]).await?;
        let tags = tags.remove(&note.id).unwrap_or_default();

        Ok(NoteDetail { note, tags, book })
    }

    /// Create a note under a book the caller can see.
    pub async fn create_note(
        &self,
        book_id: i64,
        input: &RawInput,
        visibility: Visibility,
    ) -> Result<Note> {
        let book = self
            .repo
            .find_book(book_id, visibility.without_trashed())
            .await?;
        let CreateNote { note } = CreateNote::parse(input, self.locale, Some(&book))?;

        tracing::info!("Creating note on page {} of book {}", note.page, book.id);

        let note = self.repo.create_note(book.id, note).await?;

        tracing::info!("Note created successfully: {}", note.id);
        Ok(note)
    }

    /// Update a note in any state; the page is checked against its book.
    pub async fn update_note(&self, id: i64, input: &RawInput) -> Result<Note> {
        let current = self.repo.find_note(id, Visibility::everything()).await?;
        let book = self
            .repo
            .find_book(current.book_id, Visibility::everything())
            .await?;
        let UpdateNote { changes } = UpdateNote::parse(input, self.locale, Some(&book))?;

        tracing::debug!("Updating note: {}", id);
        self.repo.update_note(id, changes).await
    }

    pub async fn delete_note(&self, id: i64, visibility: Visibility) -> Result<()> {
        tracing::info!("Deleting note: {}", id);
        self.repo.soft_delete_note(id, visibility).await
    }

    pub async fn force_delete_note(&self, id: i64) -> Result<()> {
        let note = self.repo.force_delete_note(id).await?;
        tracing::info!("Note permanently deleted: {}", note.id);
        Ok(())
    }
}
