//! # Cascade Deletion Engine
//!
//! Ownership is checked against the stored owner, then the repository removes
//! the entity and everything that references it in one transaction.

use std::sync::Arc;

use rf_core::error::{AppError, Result};
use rf_core::models::{ActingIdentity, Capability, CascadeSummary};
use rf_core::traits::ContentRepo;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::guard::permit;

pub struct CascadeEngine {
    repo: Arc<dyn ContentRepo>,
}

impl CascadeEngine {
    pub fn new(repo: Arc<dyn ContentRepo>) -> Self {
        Self { repo }
    }

    /// A post deleted concurrently by someone else surfaces as `NotFound`
    /// from either the lookup or the cascade itself.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_post(&self, actor: &ActingIdentity, post_id: Uuid) -> Result<CascadeSummary> {
        let post = self
            .repo
            .find_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))?;
        permit(actor, Capability::ModifyOwned { owner_id: post.author_id })?;

        let summary = self.repo.delete_post_cascade(post_id).await?;
        info!(
            %post_id,
            comments = summary.comments,
            votes = summary.votes,
            notifications = summary.notifications,
            reports = summary.reports,
            "post deleted"
        );
        Ok(summary)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_comment(&self, actor: &ActingIdentity, comment_id: Uuid) -> Result<()> {
        let comment = self
            .repo
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("comment", comment_id))?;
        permit(actor, Capability::ModifyOwned { owner_id: comment.author_id })?;

        self.repo.delete_comment_cascade(comment_id).await?;
        info!(%comment_id, "comment deleted");
        Ok(())
    }
}
