use super::Repository;
use crate::database::filter::{FilterExt, QueryFilter};
use crate::database::models::{Book, BookChanges, BookWithCount, NewBook};
use crate::database::scope::{TaggableKind, Visibility, VisibilityExt};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

pub(super) const BOOK_COLUMNS: &str = "b.id, b.title, b.total, b.read, b.started_at, b.cover, \
     b.hidden, b.deleted_at, b.created_at, b.updated_at";

impl Repository {
    /// List books with the number of their notes, both under `visibility`.
    pub async fn list_books(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<BookWithCount>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {BOOK_COLUMNS}, (SELECT COUNT(*) FROM notes n WHERE n.book_id = b.id"
        ));
        qb.push(TaggableKind::Note.partition_sql("n"));
        qb.push_visibility(visibility, "n");
        qb.push(") AS notes_count FROM books b WHERE 1 = 1");
        qb.push_visibility(visibility, "b");
        qb.apply_filter(filter).apply_sort(filter);

        let books = qb
            .build_query_as::<BookWithCount>()
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }

    /// Get a book by ID if `visibility` admits it
    pub async fn find_book(&self, id: i64, visibility: Visibility) -> Result<Book> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = "));
        qb.push_bind(id);
        qb.push_visibility(visibility, "b");

        qb.build_query_as::<Book>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("Book"))
    }

    /// Books by ID regardless of state, for embedding in note listings
    pub async fn books_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Book>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id IN ("));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let books = qb.build_query_as::<Book>().fetch_all(&self.pool).await?;
        Ok(books.into_iter().map(|b| (b.id, b)).collect())
    }

    pub async fn create_book(&self, book: NewBook) -> Result<Book> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, total, read, started_at, cover, hidden, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(book.total)
        .bind(book.read)
        .bind(book.started_at)
        .bind(&book.cover)
        .bind(book.hidden)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created book: {}", created.id);
        Ok(created)
    }

    /// Apply a partial update to a book in any state.
    pub async fn update_book(&self, id: i64, changes: BookChanges) -> Result<Book> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE books SET updated_at = ");
        qb.push_bind(Utc::now());

        if let Some(title) = changes.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(total) = changes.total {
            qb.push(", total = ").push_bind(total);
        }
        if let Some(read) = changes.read {
            qb.push(", read = ").push_bind(read);
        }
        if let Some(started_at) = changes.started_at {
            qb.push(", started_at = ").push_bind(started_at);
        }
        if let Some(cover) = changes.cover {
            qb.push(", cover = ").push_bind(cover);
        }
        if let Some(hidden) = changes.hidden {
            qb.push(", hidden = ").push_bind(hidden);
        }
        if changes.restore {
            qb.push(", deleted_at = NULL");
        }
        qb.push(" WHERE id = ").push_bind(id);

        let rows = qb.build().execute(&self.pool).await?.rows_affected();
        if rows == 0 {
            return Err(AppError::NotFound("Book"));
        }

        tracing::debug!("Updated book: {}", id);
        self.find_book(id, Visibility::everything()).await
    }

    /// Soft delete a book that is not yet trashed and that `visibility` admits
    pub async fn soft_delete_book(&self, id: i64, visibility: Visibility) -> Result<()> {
        let now = Utc::now();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE books SET deleted_at = ");
        qb.push_bind(now);
        qb.push(", updated_at = ").push_bind(now);
        qb.push(" WHERE id = ").push_bind(id);
        qb.push_visibility(visibility.without_trashed(), "books");

        let rows = qb.build().execute(&self.pool).await?.rows_affected();
        if rows == 0 {
            return Err(AppError::NotFound("Book"));
        }

        tracing::debug!("Soft deleted book: {}", id);
        Ok(())
    }

    /// Permanently delete a trashed book with its notes and their tag links
    pub async fn force_delete_book(&self, id: i64) -> Result<Book> {
        let mut tx = self.pool.begin().await?;

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = "));
        qb.push_bind(id);
        qb.push_visibility(Visibility::only_trashed(), "b");

        let book = qb
            .build_query_as::<Book>()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("Book"))?;

        let links = sqlx::query(
            r#"
            DELETE FROM taggables
            WHERE target_type = ?
              AND target_id IN (SELECT id FROM notes WHERE book_id = ?)
            "#,
        )
        .bind(TaggableKind::Note.target_type())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let notes = sqlx::query("DELETE FROM notes WHERE book_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            "Force deleted book: {} ({} notes, {} tag links)",
            id,
            notes,
            links
        );
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::database::filter::{QueryFilter, BOOK_FILTER};
    use crate::database::models::BookChanges;
    use crate::database::scope::Visibility;
    use crate::error::AppError;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_create_and_find_book() {
        let repo = create_test_repo().await;

        let book = repo.create_book(new_book("Dune", 600, 120)).await.unwrap();
        assert_eq!(book.title, "Dune");
        assert!(!book.hidden);
        assert!(book.deleted_at.is_none());

        let fetched = repo.find_book(book.id, Visibility::public()).await.unwrap();
        assert_eq!(fetched.total, 600);
        assert_eq!(fetched.read, 120);
    }

    #[tokio::test]
    async fn test_list_respects_visibility() {
        let repo = create_test_repo().await;
        seed_books(&repo).await;
        let filter = QueryFilter::defaults(&BOOK_FILTER);

        let public = repo.list_books(Visibility::public(), &filter).await.unwrap();
        assert_eq!(public.len(), 8);
        assert!(public
            .iter()
            .all(|b| !b.book.hidden && b.book.deleted_at.is_none()));

        let all = repo
            .list_books(Visibility::everything(), &filter)
            .await
            .unwrap();
        assert_eq!(all.len(), 10);
    }

    #[tokio::test]
    async fn test_notes_count_follows_visibility() {
        let repo = create_test_repo().await;
        let book = repo.create_book(new_book("Counted", 100, 0)).await.unwrap();

        for page in 1..=3 {
            repo.create_note(book.id, new_note(page, &[])).await.unwrap();
        }
        let hidden = repo.create_note(book.id, new_note(4, &[])).await.unwrap();
        repo.update_note(
            hidden.id,
            crate::database::NoteChanges {
                hidden: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        repo.create_post(new_note(0, &[])).await.unwrap();

        let filter = QueryFilter::defaults(&BOOK_FILTER);
        let public = repo.list_books(Visibility::public(), &filter).await.unwrap();
        assert_eq!(public[0].notes_count, 3);

        let all = repo
            .list_books(Visibility::everything(), &filter)
            .await
            .unwrap();
        assert_eq!(all[0].notes_count, 4);
    }

    #[tokio::test]
    async fn test_filter_by_title() {
        let repo = create_test_repo().await;
        seed_books(&repo).await;

        let params: HashMap<String, String> =
            [("title".to_string(), "Book 5".to_string())].into_iter().collect();
        let filter = QueryFilter::from_params(&BOOK_FILTER, &params);

        let books = repo.list_books(Visibility::public(), &filter).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].book.title, "Book 5");
    }

    #[tokio::test]
    async fn test_soft_delete_twice_is_not_found() {
        let repo = create_test_repo().await;
        let book = repo.create_book(new_book("Once", 100, 0)).await.unwrap();

        repo.soft_delete_book(book.id, Visibility::public())
            .await
            .unwrap();

        let second = repo.soft_delete_book(book.id, Visibility::everything()).await;
        assert!(matches!(second, Err(AppError::NotFound("Book"))));

        let trashed = repo
            .find_book(book.id, Visibility::only_trashed())
            .await
            .unwrap();
        assert!(trashed.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_soft_delete_hidden_needs_edit_mode() {
        let repo = create_test_repo().await;
        let ids = seed_books(&repo).await;

        let result = repo.soft_delete_book(ids[1], Visibility::public()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        repo.soft_delete_book(ids[1], Visibility::everything())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_and_restore() {
        let repo = create_test_repo().await;
        let ids = seed_books(&repo).await;

        let restored = repo
            .update_book(
                ids[0],
                BookChanges {
                    restore: true,
                    title: Some("Back again".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(restored.deleted_at.is_none());
        assert_eq!(restored.title, "Back again");

        let missing = repo.update_book(9999, BookChanges::default()).await;
        assert!(matches!(missing, Err(AppError::NotFound("Book"))));
    }

    #[tokio::test]
    async fn test_force_delete_cascades() {
        let repo = create_test_repo().await;
        let book = repo.create_book(new_book("Gone", 100, 0)).await.unwrap();
        let note = repo
            .create_note(book.id, new_note(3, &["rust"]))
            .await
            .unwrap();
        let post = repo.create_post(new_note(0, &["rust"])).await.unwrap();

        let not_trashed = repo.force_delete_book(book.id).await;
        assert!(matches!(not_trashed, Err(AppError::NotFound("Book"))));

        repo.soft_delete_book(book.id, Visibility::public())
            .await
            .unwrap();
        repo.force_delete_book(book.id).await.unwrap();

        assert!(repo
            .find_book(book.id, Visibility::everything())
            .await
            .is_err());
        assert!(repo
            .find_note(note.id, Visibility::everything())
            .await
            .is_err());

        let links: Vec<(i64,)> = sqlx::query_as("SELECT target_id FROM taggables")
            .fetch_all(repo.pool())
            .await
            .unwrap();
        assert_eq!(links, vec![(post.id,)]);
    }
}
