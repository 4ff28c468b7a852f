//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Every repository method returns `crate::error::Result`; adapters translate
//! their own failures into `AppError` before returning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CascadeSummary, Category, Comment, Identity, NewPost, Notification, Post, PostSort, PostView,
    Report, Role, Session, SessionCookie, Target, Vote, VoteOutcome, VoteTally,
};

/// Persistence contract for identities. Callers pass already-normalized
/// (lowercased) email and username values.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityRepo: Send + Sync {
    async fn is_taken(&self, email: &str, username: &str) -> Result<bool>;
    /// Fails with `AlreadyTaken` if a concurrent insert won the race.
    async fn insert_identity(&self, identity: &Identity) -> Result<()>;
    async fn find_identity_by_username(&self, username: &str) -> Result<Option<Identity>>;
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>>;
    async fn set_role(&self, id: Uuid, role: Role) -> Result<()>;
}

/// Persistence contract for sessions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Inserts the session and deletes every other session of the same
    /// identity in one transaction. Returns how many were deleted.
    async fn insert_exclusive(&self, session: &Session) -> Result<u64>;
    /// Returns the row even if expired; expiry is judged by the caller.
    async fn find_session(&self, token: &str) -> Result<Option<Session>>;
    async fn delete_session(&self, token: &str) -> Result<()>;
    /// Deletes every session with `expires_at <= now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Persistence contract for posts, comments and categories.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ContentRepo: Send + Sync {
    /// Post, category links and optional image in one transaction.
    async fn insert_post(&self, new_post: &NewPost) -> Result<()>;
    async fn find_post(&self, id: Uuid) -> Result<Option<Post>>;
    async fn update_post(&self, id: Uuid, title: &str, content: &str) -> Result<()>;
    /// Removes the post and every row that references it, or nothing at all.
    /// `NotFound` when the post is already gone.
    async fn delete_post_cascade(&self, id: Uuid) -> Result<CascadeSummary>;
    async fn posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>>;
    /// The feed, optionally limited to posts linked to `category_id`.
    async fn list_posts(&self, category_id: Option<Uuid>, sort: PostSort) -> Result<Vec<PostView>>;
    /// A post with its categories, image and tally.
    async fn find_post_view(&self, id: Uuid) -> Result<Option<PostView>>;

    async fn insert_comment(&self, comment: &Comment) -> Result<()>;
    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>>;
    async fn update_comment(&self, id: Uuid, content: &str) -> Result<()>;
    /// Removes the comment with its votes, notifications and reports.
    async fn delete_comment_cascade(&self, id: Uuid) -> Result<()>;
    async fn comments_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>>;
    async fn comments_by_author(&self, author_id: Uuid) -> Result<Vec<Comment>>;

    /// Owner of a post or comment, `None` when the target does not exist.
    async fn target_owner(&self, target: Target) -> Result<Option<Uuid>>;

    async fn insert_category(&self, category: &Category) -> Result<()>;
    async fn list_categories(&self) -> Result<Vec<Category>>;
}

/// Persistence contract for votes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Applies one toggle as a single transaction: an existing vote by
    /// `vote.voter_id` on `vote.target` is deleted, otherwise `vote` is
    /// inserted. The tally is recomputed inside the same transaction.
    async fn toggle_vote(&self, vote: &Vote) -> Result<VoteOutcome>;
    async fn tally(&self, target: Target) -> Result<VoteTally>;
    async fn votes_by_voter(&self, voter_id: Uuid) -> Result<Vec<Vote>>;
}

/// Persistence contract for notifications.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn insert_notification(&self, notification: &Notification) -> Result<()>;
    async fn notifications_for(&self, recipient_id: Uuid) -> Result<Vec<Notification>>;
    /// `false` when no notification with that id belongs to the recipient.
    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool>;
}

/// Persistence contract for moderation reports.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn insert_report(&self, report: &Report) -> Result<()>;
    async fn find_report(&self, id: Uuid) -> Result<Option<Report>>;
    async fn list_reports(&self) -> Result<Vec<Report>>;
    /// Flips `open` to `closed`. `false` when no open report matched.
    async fn close_report(&self, id: Uuid) -> Result<bool>;
}

/// Everything the forum needs from a single storage backend.
pub trait ForumRepo:
    IdentityRepo + SessionRepo + ContentRepo + VoteRepo + NotificationRepo + ReportRepo
{
}

impl<T> ForumRepo for T where
    T: IdentityRepo + SessionRepo + ContentRepo + VoteRepo + NotificationRepo + ReportRepo
{
}

/// Credential hashing and token generation contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// One-way, salted, deliberately expensive hash of a plaintext password.
    async fn hash_password(&self, plaintext: &str) -> Result<String>;

    /// Verifies a plaintext against a stored hash using the algorithm's own
    /// comparison. Malformed hashes never verify.
    async fn verify_password(&self, plaintext: &str, hash: &str) -> bool;

    /// Opaque, unguessable session token.
    fn generate_session_token(&self) -> Result<String>;
}

/// Request-scoped carrier supplied by the HTTP layer.
pub trait SessionCarrier {
    /// Token presented with the inbound request, if any.
    fn session_token(&self) -> Option<&str>;

    /// Queues an outbound session cookie.
    fn set_session_cookie(&mut self, cookie: SessionCookie);
}
