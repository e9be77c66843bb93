use super::notes::NOTE_COLUMNS;
use super::Repository;
use crate::database::filter::{FilterExt, QueryFilter};
use crate::database::models::{Note, NoteRecord, Post, Tag, TagWithCount};
use crate::database::scope::{TaggableKind, Visibility, VisibilityExt};
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use std::collections::HashMap;

/// `targets_count` subquery: note-partition rows only, never soft-deleted,
/// and only while their book passes the same scope.
fn push_targets_count(qb: &mut QueryBuilder<'_, Sqlite>, visibility: Visibility) {
    qb.push(
        "(SELECT COUNT(*) FROM taggables tg JOIN notes n ON n.id = tg.target_id \
         JOIN books b ON b.id = n.book_id \
         WHERE tg.tag_id = t.id AND tg.target_type = ",
    );
    qb.push_bind(TaggableKind::Note.target_type());
    qb.push(TaggableKind::Note.partition_sql("n"));
    qb.push_visibility(visibility.without_trashed(), "n");
    qb.push_visibility(visibility.without_trashed(), "b");
    qb.push(") AS targets_count");
}

impl Repository {
    pub async fn list_tags(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<TagWithCount>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT t.id, t.name, ");
        push_targets_count(&mut qb, visibility);
        qb.push(" FROM tags t WHERE 1 = 1");
        qb.apply_filter(filter).apply_sort(filter);

        let tags = qb
            .build_query_as::<TagWithCount>()
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    pub async fn find_tag(&self, id: i64, visibility: Visibility) -> Result<TagWithCount> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT t.id, t.name, ");
        push_targets_count(&mut qb, visibility);
        qb.push(" FROM tags t WHERE t.id = ").push_bind(id);

        qb.build_query_as::<TagWithCount>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("Tag"))
    }

    pub async fn find_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    /// Tags of each target row, keyed by target ID.
    pub async fn tags_for(
        &self,
        kind: TaggableKind,
        target_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<Tag>>> {
        let mut by_target: HashMap<i64, Vec<Tag>> = HashMap::new();
        if target_ids.is_empty() {
            return Ok(by_target);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT tg.target_id, t.id, t.name FROM taggables tg \
             JOIN tags t ON t.id = tg.tag_id WHERE tg.target_type = ",
        );
        qb.push_bind(kind.target_type());
        qb.push(" AND tg.target_id IN (");
        let mut separated = qb.separated(", ");
        for id in target_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY tg.created_at, t.id");

        let rows: Vec<(i64, i64, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
        for (target_id, id, name) in rows {
            by_target
                .entry(target_id)
                .or_default()
                .push(Tag { id, name });
        }

        Ok(by_target)
    }

    /// Notes carrying the tag whose note and book both pass `visibility`.
    pub async fn tagged_notes(&self, tag_id: i64, visibility: Visibility) -> Result<Vec<Note>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {NOTE_COLUMNS} FROM notes n \
             JOIN taggables tg ON tg.target_id = n.id \
             JOIN books b ON b.id = n.book_id \
             WHERE tg.tag_id = "
        ));
        qb.push_bind(tag_id);
        qb.push(" AND tg.target_type = ")
            .push_bind(TaggableKind::Note.target_type());
        qb.push(TaggableKind::Note.partition_sql("n"));
        qb.push_visibility(visibility, "n");
        qb.push_visibility(visibility, "b");
        qb.push(" ORDER BY n.created_at DESC, n.id DESC");

        let records = qb
            .build_query_as::<NoteRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(Note::from_record).collect())
    }

    pub async fn tagged_posts(&self, tag_id: i64, visibility: Visibility) -> Result<Vec<Post>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {NOTE_COLUMNS} FROM notes n \
             JOIN taggables tg ON tg.target_id = n.id \
             WHERE tg.tag_id = "
        ));
        qb.push_bind(tag_id);
        qb.push(" AND tg.target_type = ")
            .push_bind(TaggableKind::Post.target_type());
        qb.push(TaggableKind::Post.partition_sql("n"));
        qb.push_visibility(visibility, "n");
        qb.push(" ORDER BY n.created_at DESC, n.id DESC");

        let records = qb
            .build_query_as::<NoteRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok(records.into_iter().map(Post::from_record).collect())
    }

    pub async fn rename_tag(&self, id: i64, name: &str) -> Result<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = ?, updated_at = ? WHERE id = ? RETURNING id, name",
        )
        .bind(name)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Tag"))?;

        tracing::debug!("Renamed tag {} to {}", id, tag.name);
        Ok(tag)
    }

    /// Delete a tag and every association to it
    pub async fn delete_tag(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let links = sqlx::query("DELETE FROM taggables WHERE tag_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let rows = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound("Tag"));
        }

        tx.commit().await?;

        tracing::debug!("Deleted tag {} ({} links)", id, links);
        Ok(())
    }
}

/// Make `names` the exact tag set of a target row, creating tags on first
/// use. Runs on the caller's transaction.
pub(super) async fn sync_tags(
    conn: &mut SqliteConnection,
    kind: TaggableKind,
    target_id: i64,
    names: &[String],
) -> Result<()> {
    let now = Utc::now();
    let mut tag_ids = Vec::with_capacity(names.len());

    for name in names {
        sqlx::query("INSERT OR IGNORE INTO tags (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM tags WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *conn)
            .await?;
        tag_ids.push(id);
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("DELETE FROM taggables WHERE target_type = ");
    qb.push_bind(kind.target_type());
    qb.push(" AND target_id = ").push_bind(target_id);
    if !tag_ids.is_empty() {
        qb.push(" AND tag_id NOT IN (");
        let mut separated = qb.separated(", ");
        for id in &tag_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
    }
    qb.build().execute(&mut *conn).await?;

    for tag_id in tag_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO taggables (tag_id, target_id, target_type, created_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(tag_id)
        .bind(target_id)
        .bind(kind.target_type())
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::database::filter::{QueryFilter, TAG_FILTER};
    use crate::database::models::{BookChanges, NoteChanges};
    use crate::database::scope::Visibility;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_counts_exclude_trashed_notes_and_posts() {
        let repo = create_test_repo().await;
        let book = repo.create_book(new_book("Counts", 100, 0)).await.unwrap();

        repo.create_note(book.id, new_note(1, &["rust"])).await.unwrap();
        repo.create_note(book.id, new_note(2, &["rust"])).await.unwrap();
        let trashed = repo
            .create_note(book.id, new_note(3, &["rust"]))
            .await
            .unwrap();
        let hidden = repo
            .create_note(book.id, new_note(4, &["rust"]))
            .await
            .unwrap();
        repo.create_post(new_note(0, &["rust"])).await.unwrap();

        repo.soft_delete_note(trashed.id, Visibility::public())
            .await
            .unwrap();
        repo.update_note(
            hidden.id,
            NoteChanges {
                hidden: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let filter = QueryFilter::defaults(&TAG_FILTER);
        let public = repo.list_tags(Visibility::public(), &filter).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].tag.name, "rust");
        assert_eq!(public[0].targets_count, 2);

        let edit = repo
            .list_tags(Visibility::everything(), &filter)
            .await
            .unwrap();
        assert_eq!(edit[0].targets_count, 3);
    }

    #[tokio::test]
    async fn test_counts_follow_book_visibility() {
        let repo = create_test_repo().await;
        let trashed = repo.create_book(new_book("Trashed", 100, 0)).await.unwrap();
        let hidden = repo.create_book(new_book("Hidden", 100, 0)).await.unwrap();
        repo.create_note(trashed.id, new_note(1, &["rust"])).await.unwrap();
        repo.create_note(hidden.id, new_note(1, &["rust"])).await.unwrap();

        repo.soft_delete_book(trashed.id, Visibility::public())
            .await
            .unwrap();
        repo.update_book(
            hidden.id,
            BookChanges {
                hidden: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let tag = repo.find_tag_by_name("rust").await.unwrap().unwrap();

        let public = repo.find_tag(tag.id, Visibility::public()).await.unwrap();
        let notes = repo.tagged_notes(tag.id, Visibility::public()).await.unwrap();
        assert_eq!(public.targets_count, 0);
        assert!(notes.is_empty());

        let edit = repo.find_tag(tag.id, Visibility::everything()).await.unwrap();
        assert_eq!(edit.targets_count, 1);
    }

    #[tokio::test]
    async fn test_tags_ordered_by_count() {
        let repo = create_test_repo().await;
        let book = repo.create_book(new_book("Order", 100, 0)).await.unwrap();
        repo.create_note(book.id, new_note(1, &["a", "b"])).await.unwrap();
        repo.create_note(book.id, new_note(2, &["b"])).await.unwrap();

        let tags = repo
            .list_tags(Visibility::public(), &QueryFilter::defaults(&TAG_FILTER))
            .await
            .unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.tag.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_tagged_rows_by_partition() {
        let repo = create_test_repo().await;
        let book = repo.create_book(new_book("Split", 100, 0)).await.unwrap();
        let note = repo
            .create_note(book.id, new_note(1, &["shared"]))
            .await
            .unwrap();
        let post = repo.create_post(new_note(0, &["shared"])).await.unwrap();
        let tag = repo.find_tag_by_name("shared").await.unwrap().unwrap();

        let notes = repo.tagged_notes(tag.id, Visibility::public()).await.unwrap();
        let posts = repo.tagged_posts(tag.id, Visibility::public()).await.unwrap();
        assert_eq!(notes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![note.id]);
        assert_eq!(posts.iter().map(|p| p.id).collect::<Vec<_>>(), vec![post.id]);
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let repo = create_test_repo().await;
        let book = repo.create_book(new_book("Rename", 100, 0)).await.unwrap();
        let note = repo
            .create_note(book.id, new_note(1, &["old"]))
            .await
            .unwrap();
        let tag = repo.find_tag_by_name("old").await.unwrap().unwrap();

        let renamed = repo.rename_tag(tag.id, "new").await.unwrap();
        assert_eq!(renamed.name, "new");

        repo.delete_tag(tag.id).await.unwrap();
        let tags = repo
            .tags_for(crate::database::TaggableKind::Note, &[note.id])
            .await
            .unwrap();
        assert!(tags.is_empty());

        let again = repo.delete_tag(tag.id).await;
        assert!(matches!(again, Err(AppError::NotFound("Tag"))));
    }
}
