//! # Forum
//!
//! The surface the HTTP layer talks to. Composes the components over a single
//! storage backend and threads an explicit `ActingIdentity` through every
//! mutation.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rf_core::clock::Clock;
use rf_core::error::{AppError, Result};
use rf_core::models::{
    ActingIdentity, Activity, Capability, CascadeSummary, Category, Comment, Identity,
    Notification, Post, PostSort, PostView, Report, Role, Session, SessionCookie, Target,
    VoteOutcome, VoteTally,
};
use rf_core::traits::{AuthProvider, ForumRepo, IdentityRepo, SessionCarrier};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cascade::CascadeEngine;
use crate::content::ContentService;
use crate::credentials::CredentialStore;
use crate::guard::{permit, AuthorizationGuard};
use crate::notifications::Notifier;
use crate::reports::ReportDesk;
use crate::sessions::SessionManager;
use crate::throttle::{LoginThrottle, ThrottlePolicy};
use crate::validation::normalize_username;
use crate::votes::VoteEngine;

/// Knobs the binary derives from its configuration.
#[derive(Debug, Clone)]
pub struct ForumSettings {
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub cookie_path: String,
    pub throttle: ThrottlePolicy,
}

impl Default for ForumSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(24),
            cookie_name: "session_id".into(),
            cookie_path: "/".into(),
            throttle: ThrottlePolicy::default(),
        }
    }
}

pub struct Forum {
    identities: Arc<dyn IdentityRepo>,
    credentials: CredentialStore,
    sessions: Arc<SessionManager>,
    throttle: LoginThrottle,
    guard: AuthorizationGuard,
    votes: VoteEngine,
    cascade: CascadeEngine,
    content: ContentService,
    notifier: Arc<Notifier>,
    reports: ReportDesk,
    cookie_name: String,
    cookie_path: String,
}

impl Forum {
    pub fn new<R>(repo: Arc<R>, auth: Arc<dyn AuthProvider>, clock: Arc<dyn Clock>, settings: ForumSettings) -> Self
    where
        R: ForumRepo + 'static,
    {
        let sessions = Arc::new(SessionManager::new(
            repo.clone(),
            auth.clone(),
            clock.clone(),
            settings.session_ttl,
        ));
        let notifier = Arc::new(Notifier::new(repo.clone(), clock.clone()));

        Self {
            identities: repo.clone(),
            credentials: CredentialStore::new(repo.clone(), auth, clock.clone()),
            sessions: sessions.clone(),
            throttle: LoginThrottle::new(settings.throttle, clock.clone()),
            guard: AuthorizationGuard::new(sessions, repo.clone()),
            votes: VoteEngine::new(repo.clone(), notifier.clone(), clock.clone()),
            cascade: CascadeEngine::new(repo.clone()),
            content: ContentService::new(repo.clone(), repo.clone(), notifier.clone(), clock.clone()),
            notifier,
            reports: ReportDesk::new(repo.clone(), repo, clock),
            cookie_name: settings.cookie_name,
            cookie_path: settings.cookie_path,
        }
    }

    /// Background sweep of expired sessions. Abort the handle on shutdown.
    pub fn start_session_sweeper(&self, every: StdDuration) -> JoinHandle<()> {
        self.sessions.clone().spawn_sweeper(every)
    }

    /// One sweep cycle, outside the timer.
    pub async fn sweep_sessions(&self) -> Result<u64> {
        self.sessions.sweep().await
    }

    // ── Identity & sessions ─────────────────────────────────────────────────

    pub async fn register(&self, email: &str, username: &str, password: &str) -> Result<Identity> {
        self.credentials.register(email, username, password).await
    }

    /// Throttle first, then credentials. Each attempt takes a throttle slot
    /// before the password is checked. Unknown usernames and wrong passwords
    /// keep it and produce the same error. A storage failure hands it back.
    /// Only an issued session clears the failure history.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        let key = normalize_username(username);
        let admitted_at = self.throttle.begin_attempt(&key)?;

        let issued = match self.credentials.verify(&key, password).await {
            Ok(identity) => self.sessions.create(identity.id).await,
            Err(AppError::NotFound(..) | AppError::BadPassword) => {
                warn!(username = %key, "login failed");
                return Err(AppError::BadCredentials);
            }
            Err(err) => Err(err),
        };

        match issued {
            Ok(session) => {
                self.throttle.record_success(&key);
                Ok(session)
            }
            Err(err) => {
                self.throttle.release(&key, admitted_at);
                Err(err)
            }
        }
    }

    /// Authenticates and writes the session cookie onto the carrier.
    pub async fn login<C>(&self, carrier: &mut C, username: &str, password: &str) -> Result<Session>
    where
        C: SessionCarrier + Send,
    {
        let session = self.authenticate(username, password).await?;
        carrier.set_session_cookie(self.cookie(session.token.clone(), session.expires_at));
        Ok(session)
    }

    /// Revokes the inbound session, if any, and clears the cookie.
    pub async fn logout<C>(&self, carrier: &mut C) -> Result<()>
    where
        C: SessionCarrier + Send,
    {
        if let Some(token) = carrier.session_token().map(str::to_owned) {
            self.sessions.revoke(&token).await?;
        }
        carrier.set_session_cookie(self.cookie(String::new(), DateTime::<Utc>::UNIX_EPOCH));
        Ok(())
    }

    /// The signed-in identity for read-only views; `None` when anonymous.
    pub async fn current_identity<C>(&self, carrier: &C) -> Result<Option<ActingIdentity>>
    where
        C: SessionCarrier + Sync,
    {
        match self.guard.resolve(carrier.session_token()).await {
            Ok(actor) => Ok(Some(actor)),
            Err(AppError::Unauthenticated) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn authorize(&self, token: Option<&str>, required: Capability) -> Result<ActingIdentity> {
        self.guard.authorize(token, required).await
    }

    pub async fn set_role(&self, actor: &ActingIdentity, identity_id: Uuid, role: Role) -> Result<()> {
        permit(actor, Capability::Administer)?;
        self.identities.set_role(identity_id, role).await?;
        info!(%identity_id, %role, "role changed");
        Ok(())
    }

    /// Registers the account if needed and makes it an admin. Runs at startup
    /// with no acting identity.
    pub async fn bootstrap_admin(&self, email: &str, username: &str, password: &str) -> Result<Identity> {
        let existing = self
            .identities
            .find_identity_by_username(&normalize_username(username))
            .await?;
        let mut identity = match existing {
            Some(identity) => identity,
            None => self.register(email, username, password).await?,
        };

        if identity.role != Role::Admin {
            self.identities.set_role(identity.id, Role::Admin).await?;
            identity.role = Role::Admin;
            info!(identity_id = %identity.id, "bootstrap admin promoted");
        }
        Ok(identity)
    }

    fn cookie(&self, value: String, expires_at: DateTime<Utc>) -> SessionCookie {
        SessionCookie {
            name: self.cookie_name.clone(),
            value,
            path: self.cookie_path.clone(),
            expires_at,
        }
    }

    // ── Votes & deletion ────────────────────────────────────────────────────

    pub async fn toggle_vote(&self, actor: &ActingIdentity, target: Target, want_like: bool) -> Result<VoteOutcome> {
        self.votes.toggle(actor, target, want_like).await
    }

    pub async fn toggle_vote_refs(
        &self,
        actor: &ActingIdentity,
        post_id: Option<Uuid>,
        comment_id: Option<Uuid>,
        want_like: bool,
    ) -> Result<Option<VoteOutcome>> {
        self.votes.toggle_refs(actor, post_id, comment_id, want_like).await
    }

    pub async fn delete_post(&self, actor: &ActingIdentity, post_id: Uuid) -> Result<CascadeSummary> {
        self.cascade.delete_post(actor, post_id).await
    }

    pub async fn delete_comment(&self, actor: &ActingIdentity, comment_id: Uuid) -> Result<()> {
        self.cascade.delete_comment(actor, comment_id).await
    }

    // ── Content ─────────────────────────────────────────────────────────────

    pub async fn create_post(
        &self,
        actor: &ActingIdentity,
        title: &str,
        content: &str,
        category_ids: &[Uuid],
        image_path: Option<String>,
    ) -> Result<Post> {
        self.content
            .create_post(actor, title, content, category_ids, image_path)
            .await
    }

    pub async fn edit_post(&self, actor: &ActingIdentity, post_id: Uuid, title: &str, content: &str) -> Result<()> {
        self.content.edit_post(actor, post_id, title, content).await
    }

    pub async fn post(&self, post_id: Uuid) -> Result<Post> {
        self.content.post(post_id).await
    }

    /// Post page data: the post with its categories, image and tally.
    pub async fn post_view(&self, post_id: Uuid) -> Result<PostView> {
        self.content.post_view(post_id).await
    }

    /// The front-page feed.
    pub async fn posts(&self, category_id: Option<Uuid>, sort: PostSort) -> Result<Vec<PostView>> {
        self.content.feed(category_id, sort).await
    }

    pub async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        self.content.comments_for_post(post_id).await
    }

    pub async fn tally(&self, target: Target) -> Result<VoteTally> {
        self.content.tally(target).await
    }

    pub async fn create_comment(&self, actor: &ActingIdentity, post_id: Uuid, content: &str) -> Result<Comment> {
        self.content.create_comment(actor, post_id, content).await
    }

    pub async fn edit_comment(&self, actor: &ActingIdentity, comment_id: Uuid, content: &str) -> Result<()> {
        self.content.edit_comment(actor, comment_id, content).await
    }

    pub async fn create_category(&self, actor: &ActingIdentity, name: &str) -> Result<Category> {
        self.content.create_category(actor, name).await
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.content.categories().await
    }

    pub async fn activity(&self, actor: &ActingIdentity) -> Result<Activity> {
        self.content.activity(actor).await
    }

    // ── Notifications & reports ─────────────────────────────────────────────

    pub async fn notifications(&self, actor: &ActingIdentity) -> Result<Vec<Notification>> {
        self.notifier.list(actor).await
    }

    pub async fn mark_notification_read(&self, actor: &ActingIdentity, id: Uuid) -> Result<()> {
        self.notifier.mark_read(actor, id).await
    }

    pub async fn file_report(&self, actor: &ActingIdentity, target: Target, reason: &str) -> Result<Report> {
        self.reports.file(actor, target, reason).await
    }

    pub async fn reports(&self, actor: &ActingIdentity) -> Result<Vec<Report>> {
        self.reports.list(actor).await
    }

    pub async fn close_report(&self, actor: &ActingIdentity, id: Uuid) -> Result<()> {
        self.reports.close(actor, id).await
    }
}
