//! Posts service
//!
//! Free-standing entries that share the notes table but belong to no book.

use crate::database::{Post, QueryFilter, Repository, Tag, TaggableKind, Visibility};
use crate::error::{AppError, Result};
use crate::validation::{CreateNote, Locale, RawInput, UpdateNote};
use serde::Serialize;

/// A post with its tags
#[derive(Debug, Clone, Serialize)]
pub struct PostWithTags {
    #[serde(flatten)]
    pub post: Post,
    pub tags: Vec<Tag>,
}

#[derive(Clone)]
pub struct PostsService {
    repo: Repository,
    locale: Locale,
}

impl PostsService {
    pub fn new(repo: Repository, locale: Locale) -> Self {
        Self { repo, locale }
    }

    pub async fn list_posts(
        &self,
        visibility: Visibility,
        filter: &QueryFilter,
    ) -> Result<Vec<PostWithTags>> {
        let posts = self.repo.list_posts(visibility, filter).await?;
        self.attach_tags(posts).await
    }

    pub async fn get_post(&self, id: i64, visibility: Visibility) -> Result<PostWithTags> {
        let post = self.repo.find_post(id, visibility).await?;
        self.attach_tags(vec![post])
            .await?
            .pop()
            .ok_or(AppError::NotFound("Post"))
    }

    pub async fn create_post(&self, input: &RawInput) -> Result<Post> {
        let CreateNote { note } = CreateNote::parse(input, self.locale, None)?;
        let post = self.repo.create_post(note).await?;

        tracing::info!("Post created successfully: {}", post.id);
        Ok(post)
    }

    pub async fn update_post(&self, id: i64, input: &RawInput) -> Result<Post> {
        self.repo.find_post(id, Visibility::everything()).await?;
        let UpdateNote { changes } = UpdateNote::parse(input, self.locale, None)?;

        tracing::debug!("Updating post: {}", id);
        self.repo.update_post(id, changes).await
    }

    pub async fn delete_post(&self, id: i64, visibility: Visibility) -> Result<()> {
        tracing::info!("Deleting post: {}", id);
        self.repo.soft_delete_post(id, visibility).await
    }

    pub async fn force_delete_post(&self, id: i64) -> Result<()> {
        let post = self.repo.force_delete_post(id).await?;
        tracing::info!("Post permanently deleted: {}", post.id);
        Ok(())
    }

    pub(crate) async fn attach_tags(&self, posts: Vec<Post>) -> Result<Vec<PostWithTags>> {
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let mut tags = self.repo.tags_for(TaggableKind::Post, &ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let tags = tags.remove(&post.id).unwrap_or_default();
                PostWithTags { post, tags }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;
    use crate::database::filter::POST_FILTER;
    use serde_json::json;

    async fn create_test_service() -> PostsService {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        PostsService::new(repo, Locale::En)
    }

    fn body(value: serde_json::Value) -> RawInput {
        RawInput::from_json(value).unwrap()
    }

    #[tokio::test]
    async fn test_post_lifecycle() {
        let service = create_test_service().await;

        let post = service
            .create_post(&body(json!({
                "title": "Hello",
                "content": "hi",
                "html_content": "<p>hi</p>",
                "tags": ["misc"]
            })))
            .await
            .unwrap();
        assert_eq!(post.book_id, 0);

        let listed = service
            .list_posts(Visibility::public(), &QueryFilter::defaults(&POST_FILTER))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].tags[0].name, "misc");

        service
            .update_post(post.id, &body(json!({ "hidden": true })))
            .await
            .unwrap();
        let hidden = service.get_post(post.id, Visibility::public()).await;
        assert!(matches!(hidden, Err(AppError::NotFound("Post"))));

        service
            .delete_post(post.id, Visibility::everything())
            .await
            .unwrap();
        service.force_delete_post(post.id).await.unwrap();
        assert!(service
            .get_post(post.id, Visibility::everything())
            .await
            .is_err());
    }
}
