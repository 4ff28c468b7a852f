//! Posts, comments, categories and per-identity activity.

use std::sync::Arc;

use rf_core::clock::Clock;
use rf_core::error::{AppError, Result};
use rf_core::models::{
    ActingIdentity, Activity, Capability, Category, Comment, NewPost, NotificationKind, Post,
    PostSort, PostView, Target, VoteTally,
};
use rf_core::traits::{ContentRepo, VoteRepo};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::guard::permit;
use crate::notifications::{Interaction, Notifier};
use crate::validation::{
    check_length, CATEGORY_NAME_CHARS, COMMENT_CHARS, POST_CONTENT_CHARS, POST_TITLE_CHARS,
};

pub struct ContentService {
    content: Arc<dyn ContentRepo>,
    votes: Arc<dyn VoteRepo>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
}

fn check_post(title: &str, content: &str) -> Result<()> {
    check_length("title", title, POST_TITLE_CHARS)?;
    check_length("content", content, POST_CONTENT_CHARS)
}

impl ContentService {
    pub fn new(
        content: Arc<dyn ContentRepo>,
        votes: Arc<dyn VoteRepo>,
        notifier: Arc<Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            content,
            votes,
            notifier,
            clock,
        }
    }

    #[instrument(skip(self, actor, title, content), fields(actor = %actor.id))]
    pub async fn create_post(
        &self,
        actor: &ActingIdentity,
        title: &str,
        content: &str,
        category_ids: &[Uuid],
        image_path: Option<String>,
    ) -> Result<Post> {
        let (title, content) = (title.trim(), content.trim());
        check_post(title, content)?;
        if category_ids.is_empty() {
            return Err(AppError::ValidationError("select at least one category".into()));
        }

        let mut category_ids = category_ids.to_vec();
        category_ids.sort_unstable();
        category_ids.dedup();

        let post = Post {
            id: Uuid::now_v7(),
            author_id: actor.id,
            title: title.to_string(),
            content: content.to_string(),
            created_at: self.clock.now(),
        };
        self.content
            .insert_post(&NewPost {
                post: post.clone(),
                category_ids,
                image_path,
            })
            .await?;

        info!(post_id = %post.id, "post created");
        Ok(post)
    }

    #[instrument(skip(self, actor, title, content), fields(actor = %actor.id))]
    pub async fn edit_post(&self, actor: &ActingIdentity, post_id: Uuid, title: &str, content: &str) -> Result<()> {
        let post = self.post(post_id).await?;
        permit(actor, Capability::ModifyOwned { owner_id: post.author_id })?;

        let (title, content) = (title.trim(), content.trim());
        check_post(title, content)?;
        self.content.update_post(post_id, title, content).await
    }

    pub async fn post(&self, post_id: Uuid) -> Result<Post> {
        self.content
            .find_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))
    }

    pub async fn post_view(&self, post_id: Uuid) -> Result<PostView> {
        self.content
            .find_post_view(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))
    }

    /// An unknown category yields an empty feed.
    pub async fn feed(&self, category_id: Option<Uuid>, sort: PostSort) -> Result<Vec<PostView>> {
        self.content.list_posts(category_id, sort).await
    }

    /// Oldest first, as a thread reads.
    pub async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        self.post(post_id).await?;
        self.content.comments_for_post(post_id).await
    }

    pub async fn tally(&self, target: Target) -> Result<VoteTally> {
        self.votes.tally(target).await
    }

    /// Stores the comment, then tells the post's owner.
    #[instrument(skip(self, actor, content), fields(actor = %actor.id))]
    pub async fn create_comment(&self, actor: &ActingIdentity, post_id: Uuid, content: &str) -> Result<Comment> {
        let content = content.trim();
        check_length("comment", content, COMMENT_CHARS)?;
        let post = self.post(post_id).await?;

        let comment = Comment {
            id: Uuid::now_v7(),
            post_id,
            author_id: actor.id,
            content: content.to_string(),
            created_at: self.clock.now(),
        };
        self.content.insert_comment(&comment).await?;

        self.notifier
            .notify_on_interaction(Interaction {
                actor_id: actor.id,
                owner_id: post.author_id,
                kind: NotificationKind::Comment,
                post_id: Some(post_id),
                comment_id: Some(comment.id),
            })
            .await;
        Ok(comment)
    }

    #[instrument(skip(self, actor, content), fields(actor = %actor.id))]
    pub async fn edit_comment(&self, actor: &ActingIdentity, comment_id: Uuid, content: &str) -> Result<()> {
        let comment = self
            .content
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("comment", comment_id))?;
        permit(actor, Capability::ModifyOwned { owner_id: comment.author_id })?;

        let content = content.trim();
        check_length("comment", content, COMMENT_CHARS)?;
        self.content.update_comment(comment_id, content).await
    }

    pub async fn create_category(&self, actor: &ActingIdentity, name: &str) -> Result<Category> {
        permit(actor, Capability::Administer)?;
        let name = name.trim();
        check_length("category name", name, CATEGORY_NAME_CHARS)?;

        let category = Category {
            id: Uuid::now_v7(),
            name: name.to_string(),
        };
        self.content.insert_category(&category).await?;
        info!(category = %category.name, "category created");
        Ok(category)
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.content.list_categories().await
    }

    pub async fn activity(&self, actor: &ActingIdentity) -> Result<Activity> {
        Ok(Activity {
            posts: self.content.posts_by_author(actor.id).await?,
            comments: self.content.comments_by_author(actor.id).await?,
            votes: self.votes.votes_by_voter(actor.id).await?,
        })
    }
}
