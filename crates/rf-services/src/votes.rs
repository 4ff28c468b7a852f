//! # Vote Toggle Engine
//!
//! One call moves a (voter, target) pair along a single edge of
//! NoVote <-> Liked / NoVote <-> Disliked. Any existing vote is withdrawn,
//! whatever its direction, so switching Liked to Disliked takes two calls.

use std::sync::Arc;

use rf_core::clock::Clock;
use rf_core::error::Result;
use rf_core::models::{ActingIdentity, Target, Vote, VoteKind, VoteOutcome, VoteTransition};
use rf_core::traits::VoteRepo;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::notifications::{Interaction, Notifier};

pub struct VoteEngine {
    repo: Arc<dyn VoteRepo>,
    notifier: Arc<Notifier>,
    clock: Arc<dyn Clock>,
}

impl VoteEngine {
    pub fn new(repo: Arc<dyn VoteRepo>, notifier: Arc<Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            notifier,
            clock,
        }
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn toggle(&self, actor: &ActingIdentity, target: Target, want_like: bool) -> Result<VoteOutcome> {
        let vote = Vote {
            id: Uuid::now_v7(),
            voter_id: actor.id,
            target,
            kind: VoteKind::from_like(want_like),
            created_at: self.clock.now(),
        };
        let outcome = self.repo.toggle_vote(&vote).await?;
        debug!(transition = ?outcome.transition, likes = outcome.tally.likes, dislikes = outcome.tally.dislikes, "vote toggled");

        // Withdrawing never notifies.
        if let VoteTransition::Cast(kind) = outcome.transition {
            self.notifier
                .notify_on_interaction(Interaction {
                    actor_id: actor.id,
                    owner_id: outcome.target_owner,
                    kind: kind.into(),
                    post_id: target.post_id(),
                    comment_id: target.comment_id(),
                })
                .await;
        }
        Ok(outcome)
    }

    /// Entry point for the raw pair of references a form submits. Neither set
    /// is a no-op returning `None`; both set is a `ValidationError`.
    pub async fn toggle_refs(
        &self,
        actor: &ActingIdentity,
        post_id: Option<Uuid>,
        comment_id: Option<Uuid>,
        want_like: bool,
    ) -> Result<Option<VoteOutcome>> {
        match Target::from_refs(post_id, comment_id)? {
            Some(target) => self.toggle(actor, target, want_like).await.map(Some),
            None => Ok(None),
        }
    }
}
