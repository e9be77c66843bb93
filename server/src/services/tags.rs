//! Tags service

use super::notes::NoteDetail;
use super::posts::PostWithTags;
use crate::database::{QueryFilter, Repository, TagWithCount, TaggableKind, Visibility};
use crate::error::Result;
use crate::validation::{Locale, RawInput, UpdateTag, ValidationErrors};
use serde::Serialize;

/// A tag with everything it is attached to
#[derive(Debug, Clone, Serialize)]
pub struct TagDetail {
    #[serde(flatten)]
    pub tag: TagWithCount,
    pub notes: Vec<NoteDetail>,
    pub posts: Vec<PostWithTags>,
}

#[derive(Clone)]
pub struct TagsService {
    repo: Repository,
    locale: Locale,
}

impl TagsService {
    pub fn new(repo: Repository, locale: Locale) -> Self {
        Self { repo, locale }
    }

    pub async fn list_tags(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<TagWithCount>> {
        self.repo.list_tags(visibility, filter).await
    }

    /// The tag with its notes (tags and book included) and posts.
    pub async fn get_tag(&self, id: i64, visibility: Visibility) -> Result<TagDetail> {
        let tag = self.repo.find_tag(id, visibility).await?;

        let notes = self.repo.tagged_notes(id, visibility).await?;
        let note_ids: Vec<i64> = notes.iter().map(|n| n.id).collect();
        let book_ids: Vec<i64> = notes.iter().map(|n| n.book_id).collect();
        let mut note_tags = self.repo.tags_for(TaggableKind::Note, &note_ids).await?;
        let books = self.repo.books_by_ids(&book_ids).await?;

        let notes = notes
            .into_iter()
            .filter_map(|note| {
                let book = books.get(&note.book_id).cloned()?;
                let tags = note_tags.remove(&note.id).unwrap_or_default();
                Some(NoteDetail { note, tags, book })
            })
            .collect();

        let posts = self.repo.tagged_posts(id, visibility).await?;
        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut post_tags = self.repo.tags_for(TaggableKind::Post, &post_ids).await?;
        let posts = posts
            .into_iter()
            .map(|post| {
                let tags = post_tags.remove(&post.id).unwrap_or_default();
                PostWithTags { post, tags }
            })
            .collect();

        Ok(TagDetail { tag, notes, posts })
    }

    /// Rename a tag; names stay unique.
    pub async fn rename_tag(&self, id: i64, input: &RawInput) -> Result<()> {
        self.repo.find_tag(id, Visibility::everything()).await?;
        let UpdateTag { name } = UpdateTag::parse(input, self.locale)?;

        if let Some(existing) = self.repo.find_tag_by_name(&name).await? {
            if existing.id != id {
                return Err(ValidationErrors::single("name", self.locale.tag_taken()).into());
            }
        }

        let tag = self.repo.rename_tag(id, &name).await?;
        tracing::info!("Tag {} renamed to {}", tag.id, tag.name);
        Ok(())
    }

    pub async fn delete_tag(&self, id: i64) -> Result<()> {
        self.repo.delete_tag(id).await?;
        tracing::info!("Tag deleted: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_memory_pool, NewBook, NewNote};
    use crate::error::AppError;
    use serde_json::json;

    fn note(page: i64, tags: &[&str]) -> NewNote {
        NewNote {
            title: None,
            desc: None,
            content: "c".to_string(),
            html_content: "c".to_string(),
            page,
            hidden: false,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    async fn setup() -> (TagsService, Repository) {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        (TagsService::new(repo.clone(), Locale::En), repo)
    }

    #[tokio::test]
    async fn test_tag_detail_loads_both_partitions() {
        let (service, repo) = setup().await;
        let book = repo
            .create_book(NewBook {
                title: "Host".to_string(),
                total: 10,
                read: 0,
                started_at: None,
                cover: String::new(),
                hidden: false,
            })
            .await
            .unwrap();
        repo.create_note(book.id, note(1, &["x", "y"])).await.unwrap();
        repo.create_post(note(0, &["x"])).await.unwrap();

        let tag = repo.find_tag_by_name("x").await.unwrap().unwrap();
        let detail = service.get_tag(tag.id, Visibility::public()).await.unwrap();

        assert_eq!(detail.tag.targets_count, 1);
        assert_eq!(detail.notes.len(), 1);
        assert_eq!(detail.notes[0].book.id, book.id);
        assert_eq!(detail.notes[0].tags.len(), 2);
        assert_eq!(detail.posts.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_rejects_taken_name() {
        let (service, repo) = setup().await;
        repo.create_post(note(0, &["a", "b"])).await.unwrap();
        let a = repo.find_tag_by_name("a").await.unwrap().unwrap();

        let input = RawInput::from_json(json!({ "name": "b" })).unwrap();
        match service.rename_tag(a.id, &input).await {
            Err(AppError::Validation(errors)) => assert!(errors.contains("name")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let input = RawInput::from_json(json!({ "name": "a" })).unwrap();
        service.rename_tag(a.id, &input).await.unwrap();
    }
}
