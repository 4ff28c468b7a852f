//! # Session Manager
//!
//! Issues opaque tokens with an absolute expiry, enforces one live session per
//! identity and sweeps expired rows on a background timer.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use rf_core::clock::Clock;
use rf_core::error::{AppError, Result};
use rf_core::models::Session;
use rf_core::traits::{AuthProvider, SessionRepo};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct SessionManager {
    repo: Arc<dyn SessionRepo>,
    auth: Arc<dyn AuthProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(
        repo: Arc<dyn SessionRepo>,
        auth: Arc<dyn AuthProvider>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            repo,
            auth,
            clock,
            ttl,
        }
    }

    /// Issues a fresh session and drops every other session of the identity.
    #[instrument(skip(self))]
    pub async fn create(&self, identity_id: Uuid) -> Result<Session> {
        let session = Session {
            token: self.auth.generate_session_token()?,
            identity_id,
            expires_at: self.clock.now() + self.ttl,
        };
        let evicted = self.repo.insert_exclusive(&session).await?;

        info!(%identity_id, evicted, expires_at = %session.expires_at, "session issued");
        Ok(session)
    }

    /// Resolves a token to its identity. Unknown tokens are `NotFound`; rows
    /// past their expiry are `Expired` even before the sweeper removes them.
    pub async fn validate(&self, token: &str) -> Result<Uuid> {
        let session = self
            .repo
            .find_session(token)
            .await?
            .ok_or_else(|| AppError::not_found("session", "<redacted>"))?;

        if !session.is_valid_at(self.clock.now()) {
            return Err(AppError::Expired);
        }
        Ok(session.identity_id)
    }

    /// Idempotent.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.repo.delete_session(token).await?;
        debug!("session revoked");
        Ok(())
    }

    pub async fn sweep(&self) -> Result<u64> {
        let removed = self.repo.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "expired sessions swept");
        }
        Ok(removed)
    }

    /// Runs `sweep` every `every` until the handle is aborted. A failed cycle
    /// is logged and the next tick tries again.
    pub fn spawn_sweeper(self: Arc<Self>, every: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep().await {
                    warn!(error = %err, "session sweep failed; retrying next cycle");
                }
            }
        })
    }
}
