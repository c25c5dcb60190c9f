// Post lifecycle - pure transitions, no storage access
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::mapper::ValidationError;
use crate::models::{Media, Post, PostStatus};

/// Validated input for a new post.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDraft {
    pub title: Option<String>,
    pub content: String,
    pub platforms: Vec<String>,
    pub links: Vec<String>,
    pub media_ids: Vec<String>,
    pub status: PostStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Validated changes to an existing post. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub title: Option<Option<String>>,
    pub content: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    InvalidReference(String),

    #[error("{0}")]
    Validation(ValidationError),
}

pub struct PostLifecycle;

impl PostLifecycle {
    /// Build a new post owned by `owner_id`.
    ///
    /// `media` must hold every entity named in `draft.media_ids` that could be
    /// found; anything missing, foreign or already attached is rejected.
    pub fn create(
        owner_id: &str,
        draft: PostDraft,
        media: &[Media],
        now: DateTime<Utc>,
    ) -> Result<Post, LifecycleError> {
        require_content(&draft.content)?;
        require_platforms(&draft.platforms)?;
        Self::check_media(owner_id, &draft.media_ids, media)?;

        let post = Post {
            id: String::new(),
            user_id: owner_id.to_string(),
            title: draft.title,
            content: draft.content,
            platforms: draft.platforms,
            media_ids: draft.media_ids,
            links: draft.links,
            status: PostStatus::Draft,
            scheduled_for: draft.scheduled_for,
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        match draft.status {
            PostStatus::Draft => Ok(post),
            target => post.transition(target, None, now),
        }
    }

    /// Every requested media must exist, belong to `owner_id`, be listed once,
    /// and not be attached to another post yet.
    pub fn check_media(
        owner_id: &str,
        requested: &[String],
        found: &[Media],
    ) -> Result<(), LifecycleError> {
        let mut seen = HashSet::new();
        for id in requested {
            if !seen.insert(id.as_str()) {
                return Err(LifecycleError::InvalidReference(format!(
                    "Media {} is listed more than once",
                    id
                )));
            }
            let media = found.iter().find(|m| &m.id == id).ok_or_else(|| {
                LifecycleError::InvalidReference(format!("Media {} does not exist", id))
            })?;
            if media.user_id != owner_id {
                return Err(LifecycleError::InvalidReference(format!(
                    "Media {} belongs to another user",
                    id
                )));
            }
            if media.is_attached() {
                return Err(LifecycleError::InvalidReference(format!(
                    "Media {} is already attached to a post",
                    id
                )));
            }
        }
        Ok(())
    }
}

fn require_content(content: &str) -> Result<(), LifecycleError> {
    if content.trim().is_empty() {
        return Err(LifecycleError::Validation(ValidationError::single(
            "content",
            "is required",
        )));
    }
    Ok(())
}

fn require_platforms(platforms: &[String]) -> Result<(), LifecycleError> {
    if platforms.is_empty() {
        return Err(LifecycleError::Validation(ValidationError::single(
            "platforms",
            "must contain at least one entry",
        )));
    }
    Ok(())
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Move to `target`.
    ///
    /// Scheduling uses `scheduled_for`, falling back to the post's current
    /// value, and needs it strictly after `now`. Publication is final.
    pub fn transition(
        mut self,
        target: PostStatus,
        scheduled_for: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, LifecycleError> {
        if self.is_published() {
            return Err(LifecycleError::InvalidTransition(format!(
                "Cannot move a published post to {}",
                target
            )));
        }

        match target {
            PostStatus::Draft => {
                // Only unscheduling drops the time; draft to draft keeps it
                if scheduled_for.is_some() || self.status == PostStatus::Scheduled {
                    self.scheduled_for = scheduled_for;
                }
                self.status = PostStatus::Draft;
                Ok(self)
            }
            PostStatus::Scheduled => {
                let at = scheduled_for.or(self.scheduled_for).ok_or_else(|| {
                    LifecycleError::InvalidTransition(
                        "Scheduling requires a scheduled_for timestamp".into(),
                    )
                })?;
                if at <= now {
                    return Err(LifecycleError::InvalidTransition(format!(
                        "Scheduled time {} is not in the future",
                        at.to_rfc3339()
                    )));
                }
                self.status = PostStatus::Scheduled;
                self.scheduled_for = Some(at);
                Ok(self)
            }
            PostStatus::Published => {
                if self.platforms.is_empty() {
                    return Err(LifecycleError::InvalidTransition(
                        "Publishing requires at least one platform".into(),
                    ));
                }
                self.status = PostStatus::Published;
                self.published_at = Some(now);
                Ok(self)
            }
        }
    }

    pub fn schedule(self, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
        self.transition(PostStatus::Scheduled, Some(at), now)
    }

    pub fn publish(self, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
        self.transition(PostStatus::Published, None, now)
    }

    /// Apply field edits, then any requested status change.
    ///
    /// Media attachments are fixed at creation and cannot be patched.
    pub fn apply(mut self, patch: PostPatch, now: DateTime<Utc>) -> Result<Self, LifecycleError> {
        if self.is_published() {
            return Err(LifecycleError::InvalidTransition(
                "Published posts cannot be modified".into(),
            ));
        }

        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            require_content(&content)?;
            self.content = content;
        }
        if let Some(platforms) = patch.platforms {
            require_platforms(&platforms)?;
            self.platforms = platforms;
        }
        if let Some(links) = patch.links {
            self.links = links;
        }

        match (patch.status, patch.scheduled_for) {
            (Some(target), at) => self.transition(target, at, now),
            // A new time on a scheduled post is a reschedule
            (None, Some(at)) if self.status == PostStatus::Scheduled => self.schedule(at, now),
            (None, Some(at)) => {
                self.scheduled_for = Some(at);
                Ok(self)
            }
            (None, None) => Ok(self),
        }
    }
}
