//! # Notification Fan-out
//!
//! Derives a notification from a committed interaction. Delivery is
//! best-effort: failures are logged and never reach the triggering operation.

use std::sync::Arc;

use rf_core::clock::Clock;
use rf_core::error::{AppError, Result};
use rf_core::models::{ActingIdentity, Notification, NotificationKind};
use rf_core::traits::NotificationRepo;
use tracing::{debug, error};
use uuid::Uuid;

/// A committed comment or vote that may concern someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interaction {
    pub actor_id: Uuid,
    pub owner_id: Uuid,
    pub kind: NotificationKind,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

pub struct Notifier {
    repo: Arc<dyn NotificationRepo>,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(repo: Arc<dyn NotificationRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Returns whether a notification was stored.
    pub(crate) async fn notify_on_interaction(&self, interaction: Interaction) -> bool {
        if interaction.actor_id == interaction.owner_id {
            return false;
        }

        let notification = Notification {
            id: Uuid::now_v7(),
            recipient_id: interaction.owner_id,
            kind: interaction.kind,
            source_id: Some(interaction.actor_id),
            post_id: interaction.post_id,
            comment_id: interaction.comment_id,
            created_at: self.clock.now(),
            is_read: false,
        };

        match self.repo.insert_notification(&notification).await {
            Ok(()) => {
                debug!(recipient = %notification.recipient_id, kind = notification.kind.as_str(), "notification stored");
                true
            }
            Err(err) => {
                error!(
                    error = %err,
                    recipient = %notification.recipient_id,
                    kind = notification.kind.as_str(),
                    "notification fan-out failed"
                );
                false
            }
        }
    }

    pub async fn list(&self, actor: &ActingIdentity) -> Result<Vec<Notification>> {
        self.repo.notifications_for(actor.id).await
    }

    /// Only the recipient may mark a notification; anything else looks absent.
    pub async fn mark_read(&self, actor: &ActingIdentity, id: Uuid) -> Result<()> {
        if !self.repo.mark_read(id, actor.id).await? {
            return Err(AppError::not_found("notification", id));
        }
        Ok(())
    }
}
