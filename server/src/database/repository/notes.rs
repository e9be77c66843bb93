use super::tags::sync_tags;
use super::Repository;
use crate::database::filter::{FilterExt, Pagination, QueryFilter};
use crate::database::models::{NewNote, Note, NoteChanges, NoteRecord, Post};
use crate::database::scope::{TaggableKind, Visibility, VisibilityExt};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};

pub(super) const NOTE_COLUMNS: &str = "n.id, n.book_id, n.title, n.\"desc\", n.content, \
     n.html_content, n.page, n.hidden, n.deleted_at, n.created_at, n.updated_at";

impl Repository {
    // ===== Notes =====

    /// Notes of one book, filtered and sorted.
    pub async fn list_book_notes(
        &self,
        book_id: i64,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<Note>> {
        let records = self
            .list_records(TaggableKind::Note, Some(book_id), visibility, filter)
            .await?;
        Ok(records.into_iter().map(Note::from_record).collect())
    }

    /// One page of notes across every book visible under `visibility`.
    /// Returns the page and the total row count.
    pub async fn paginate_notes(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Note>, i64)> {
        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*)");
        push_global_scope(&mut count, visibility, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {NOTE_COLUMNS}"));
        push_global_scope(&mut qb, visibility, filter);
        qb.apply_sort(filter);
        qb.push(" LIMIT ").push_bind(pagination.limit());
        qb.push(" OFFSET ").push_bind(pagination.offset());

        let records = qb
            .build_query_as::<NoteRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok((records.into_iter().map(Note::from_record).collect(), total))
    }

    pub async fn find_note(&self, id: i64, visibility: Visibility) -> Result<Note> {
        self.find_record(TaggableKind::Note, id, visibility)
            .await
            .map(Note::from_record)
    }

    /// Insert a note under `book_id` and link its tags.
    pub async fn create_note(&self, book_id: i64, note: NewNote) -> Result<Note> {
        self.insert_record(TaggableKind::Note, book_id, note)
            .await
            .map(Note::from_record)
    }

    pub async fn update_note(&self, id: i64, changes: NoteChanges) -> Result<Note> {
        self.update_record(TaggableKind::Note, id, changes)
            .await
            .map(Note::from_record)
    }

    pub async fn soft_delete_note(&self, id: i64, visibility: Visibility) -> Result<()> {
        self.soft_delete_record(TaggableKind::Note, id, visibility)
            .await
    }

    pub async fn force_delete_note(&self, id: i64) -> Result<Note> {
        self.force_delete_record(TaggableKind::Note, id)
            .await
            .map(Note::from_record)
    }

    // ===== Posts =====

    pub async fn list_posts(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<Post>> {
        let records = self
            .list_records(TaggableKind::Post, None, visibility, filter)
            .await?;
        Ok(records.into_iter().map(Post::from_record).collect())
    }

    pub async fn find_post(&self, id: i64, visibility: Visibility) -> Result<Post> {
        self.find_record(TaggableKind::Post, id, visibility)
            .await
            .map(Post::from_record)
    }

    pub async fn create_post(&self, post: NewNote) -> Result<Post> {
        self.insert_record(TaggableKind::Post, 0, post)
            .await
            .map(Post::from_record)
    }

    pub async fn update_post(&self, id: i64, changes: NoteChanges) -> Result<Post> {
        self.update_record(TaggableKind::Post, id, changes)
            .await
            .map(Post::from_record)
    }

    pub async fn soft_delete_post(&self, id: i64, visibility: Visibility) -> Result<()> {
        self.soft_delete_record(TaggableKind::Post, id, visibility)
            .await
    }

    pub async fn force_delete_post(&self, id: i64) -> Result<Post> {
        self.force_delete_record(TaggableKind::Post, id)
            .await
            .map(Post::from_record)
    }

    // ===== Shared row access =====

    async fn list_records(
        &self,
        kind: TaggableKind,
        book_id: Option<i64>,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<NoteRecord>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE 1 = 1"));
        qb.push(kind.partition_sql("n"));
        if let Some(book_id) = book_id {
            qb.push(" AND n.book_id = ").push_bind(book_id);
        }
        qb.push_visibility(visibility, "n");
        qb.apply_filter(filter).apply_sort(filter);

        let records = qb
            .build_query_as::<NoteRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn find_record(
        &self,
        kind: TaggableKind,
        id: i64,
        visibility: Visibility,
    ) -> Result<NoteRecord> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE n.id = "));
        qb.push_bind(id);
        qb.push(kind.partition_sql("n"));
        qb.push_visibility(visibility, "n");

        qb.build_query_as::<NoteRecord>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound(kind.entity()))
    }

    async fn insert_record(
        &self,
        kind: TaggableKind,
        book_id: i64,
        note: NewNote,
    ) -> Result<NoteRecord> {
        let now = Utc::now();
        let page = match kind {
            TaggableKind::Note => note.page,
            TaggableKind::Post => 0,
        };

        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, NoteRecord>(
            r#"
            INSERT INTO notes (book_id, title, "desc", content, html_content, page, hidden, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(&note.title)
        .bind(&note.desc)
        .bind(&note.content)
        .bind(&note.html_content)
        .bind(page)
        .bind(note.hidden)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sync_tags(&mut tx, kind, record.id, &note.tags).await?;
        tx.commit().await?;

        tracing::debug!("Created {}: {}", kind.entity(), record.id);
        Ok(record)
    }

    /// Partial update of a row in any state; `tags` replaces the tag set.
    async fn update_record(
        &self,
        kind: TaggableKind,
        id: i64,
        changes: NoteChanges,
    ) -> Result<NoteRecord> {
        let mut tx = self.pool.begin().await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE notes SET updated_at = ");
        qb.push_bind(Utc::now());

        if let Some(title) = changes.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(desc) = changes.desc {
            qb.push(", \"desc\" = ").push_bind(desc);
        }
        if let Some(content) = changes.content {
            qb.push(", content = ").push_bind(content);
        }
        if let Some(html_content) = changes.html_content {
            qb.push(", html_content = ").push_bind(html_content);
        }
        if let (TaggableKind::Note, Some(page)) = (kind, changes.page) {
            qb.push(", page = ").push_bind(page);
        }
        if let Some(hidden) = changes.hidden {
            qb.push(", hidden = ").push_bind(hidden);
        }
        if changes.restore {
            qb.push(", deleted_at = NULL");
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(kind.partition_sql("notes"));

        let rows = qb.build().execute(&mut *tx).await?.rows_affected();
        if rows == 0 {
            return Err(AppError::NotFound(kind.entity()));
        }

        if let Some(tags) = changes.tags {
            sync_tags(&mut tx, kind, id, &tags).await?;
        }

        let record = sqlx::query_as::<_, NoteRecord>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("Updated {}: {}", kind.entity(), id);
        Ok(record)
    }

    async fn soft_delete_record(
        &self,
        kind: TaggableKind,
        id: i64,
        visibility: Visibility,
    ) -> Result<()> {
        let now = Utc::now();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE notes SET deleted_at = ");
        qb.push_bind(now);
        qb.push(", updated_at = ").push_bind(now);
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(kind.partition_sql("notes"));
        qb.push_visibility(visibility.without_trashed(), "notes");

        let rows = qb.build().execute(&self.pool).await?.rows_affected();
        if rows == 0 {
            return Err(AppError::NotFound(kind.entity()));
        }

        tracing::debug!("Soft deleted {}: {}", kind.entity(), id);
        Ok(())
    }

    async fn force_delete_record(&self, kind: TaggableKind, id: i64) -> Result<NoteRecord> {
        let mut tx = self.pool.begin().await?;

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE n.id = "));
        qb.push_bind(id);
        qb.push(kind.partition_sql("n"));
        qb.push_visibility(Visibility::only_trashed(), "n");

        let record = qb
            .build_query_as::<NoteRecord>()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound(kind.entity()))?;

        sqlx::query("DELETE FROM taggables WHERE target_type = ? AND target_id = ?")
            .bind(kind.target_type())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!("Force deleted {}: {}", kind.entity(), id);
        Ok(record)
    }
}

/// FROM/WHERE shared by the count and page queries of the global listing.
/// The parent book must pass the same scope as the note.
fn push_global_scope(qb: &mut QueryBuilder<'_, Sqlite>, visibility: Visibility, filter: &QueryFilter) {
    qb.push(" FROM notes n JOIN books b ON b.id = n.book_id WHERE 1 = 1");
    qb.push(TaggableKind::Note.partition_sql("n"));
    qb.push_visibility(visibility, "n");
    qb.push_visibility(visibility, "b");
    qb.apply_filter(filter);
}
