use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{self, Media, Post, User};
use crate::posts::{PostDraft, PostLifecycle, PostPatch};
use crate::store::{StoreError, Stores};

/// Runs post operations on behalf of an authenticated caller.
///
/// Posts owned by someone else look exactly like missing ones unless the
/// caller is an admin.
pub struct PostService<'a> {
    stores: &'a Stores,
}

impl<'a> PostService<'a> {
    pub fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Create a post and attach the referenced media to it.
    ///
    /// The post is stored first, then each media item is updated one at a
    /// time. A failure part way leaves the earlier attachments in place.
    pub async fn create(&self, caller: &User, draft: PostDraft) -> AppResult<Post> {
        let media = self.load_media(&draft.media_ids).await?;
        let post = PostLifecycle::create(&caller.id, draft, &media, models::now())?;
        let post = self.stores.posts.create(post).await?;

        for mut item in media {
            item.post_id = Some(post.id.clone());
            self.stores.media.update(item).await?;
        }

        tracing::info!(post_id = %post.id, user_id = %caller.id, status = %post.status, "Post created");
        Ok(post)
    }

    pub async fn list(&self, caller: &User) -> AppResult<Vec<Post>> {
        Ok(self.stores.posts.list_by_owner(&caller.id).await?)
    }

    pub async fn get(&self, caller: &User, id: &str) -> AppResult<Post> {
        let post = self.stores.posts.get_by_id(id).await?;
        if post.user_id != caller.id && !caller.is_admin() {
            return Err(AppError::NotFound);
        }
        Ok(post)
    }

    pub async fn update(&self, caller: &User, id: &str, patch: PostPatch) -> AppResult<Post> {
        let post = self.get(caller, id).await?;
        let post = post.apply(patch, models::now())?;
        self.save(post).await
    }

    pub async fn schedule(&self, caller: &User, id: &str, at: DateTime<Utc>) -> AppResult<Post> {
        let post = self.get(caller, id).await?;
        let post = post.schedule(at, models::now())?;
        self.save(post).await
    }

    pub async fn publish(&self, caller: &User, id: &str) -> AppResult<Post> {
        let post = self.get(caller, id).await?;
        let post = post.publish(models::now())?;
        self.save(post).await
    }

    /// Delete a post and release its media so they can be deleted in turn.
    pub async fn delete(&self, caller: &User, id: &str) -> AppResult<()> {
        let post = self.get(caller, id).await?;
        self.stores.posts.delete(id).await?;
        self.release_media(&post).await?;
        tracing::info!(post_id = %id, user_id = %caller.id, "Post deleted");
        Ok(())
    }

    async fn save(&self, post: Post) -> AppResult<Post> {
        let post = self.stores.posts.update(post).await?;
        tracing::debug!(post_id = %post.id, status = %post.status, "Post updated");
        Ok(post)
    }

    async fn release_media(&self, post: &Post) -> AppResult<()> {
        for media_id in &post.media_ids {
            match self.stores.media.get_by_id(media_id).await {
                Ok(mut media) if media.post_id.as_deref() == Some(post.id.as_str()) => {
                    media.post_id = None;
                    self.stores.media.update(media).await?;
                }
                Ok(_) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    // Missing ids are left out so the lifecycle can name them.
    async fn load_media(&self, ids: &[String]) -> AppResult<Vec<Media>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match self.stores.media.get_by_id(id).await {
                Ok(media) => found.push(media),
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(found)
    }
}
