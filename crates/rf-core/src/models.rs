//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Forum.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// The three roles an identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Moderators and admins may act on content they do not own.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::ValidationError(format!("unknown role '{other}'"))),
        }
    }
}

/// A registered account. Email and username are stored lowercased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Server-issued proof of authentication, looked up directly by its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub identity_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// No grace period: a session is dead at the instant it expires.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Outbound cookie written through a `SessionCarrier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

/// The identity performing a mutation, produced by the authorization guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActingIdentity {
    pub id: Uuid,
    pub role: Role,
}

impl ActingIdentity {
    /// Owners may always act; staff may act on anything.
    pub fn may_modify(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.role.is_staff()
    }
}

/// What an operation requires of the acting identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Any valid session.
    Authenticated,
    /// Owner of the resource, or moderator/admin.
    ModifyOwned { owner_id: Uuid },
    /// Moderator or admin.
    Moderate,
    /// Admin only; moderator is insufficient.
    Administer,
}

/// The post or comment a vote, notification or report refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Target {
    Post(Uuid),
    Comment(Uuid),
}

impl Target {
    /// Builds a target from the pair of optional references a form submits.
    ///
    /// `Ok(None)` when neither is present; both present is rejected.
    pub fn from_refs(post_id: Option<Uuid>, comment_id: Option<Uuid>) -> Result<Option<Target>> {
        match (post_id, comment_id) {
            (Some(_), Some(_)) => Err(AppError::ValidationError(
                "a target is either a post or a comment, not both".into(),
            )),
            (Some(id), None) => Ok(Some(Target::Post(id))),
            (None, Some(id)) => Ok(Some(Target::Comment(id))),
            (None, None) => Ok(None),
        }
    }

    pub fn post_id(&self) -> Option<Uuid> {
        match self {
            Target::Post(id) => Some(*id),
            Target::Comment(_) => None,
        }
    }

    pub fn comment_id(&self) -> Option<Uuid> {
        match self {
            Target::Comment(id) => Some(*id),
            Target::Post(_) => None,
        }
    }

    pub fn entity(&self) -> &'static str {
        match self {
            Target::Post(_) => "post",
            Target::Comment(_) => "comment",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Target::Post(id) | Target::Comment(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Like,
    Dislike,
}

impl VoteKind {
    pub fn from_like(is_like: bool) -> Self {
        if is_like {
            VoteKind::Like
        } else {
            VoteKind::Dislike
        }
    }

    pub fn is_like(&self) -> bool {
        matches!(self, VoteKind::Like)
    }
}

/// A single vote row. At most one exists per (voter, target).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub voter_id: Uuid,
    pub target: Target,
    pub kind: VoteKind,
    pub created_at: DateTime<Utc>,
}

/// Per-pair state: NoVote, Liked or Disliked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    NoVote,
    Liked,
    Disliked,
}

/// The edge taken by one toggle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// NoVote -> Liked/Disliked. A fresh row was inserted.
    Cast(VoteKind),
    /// Liked/Disliked -> NoVote. The existing row (of this kind) was removed.
    Withdrawn(VoteKind),
}

impl VoteTransition {
    pub fn resulting_state(&self) -> VoteState {
        match self {
            VoteTransition::Cast(VoteKind::Like) => VoteState::Liked,
            VoteTransition::Cast(VoteKind::Dislike) => VoteState::Disliked,
            VoteTransition::Withdrawn(_) => VoteState::NoVote,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub likes: i64,
    pub dislikes: i64,
}

/// Result of a committed toggle, as reported by the vote repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub transition: VoteTransition,
    pub tally: VoteTally,
    /// Owner of the voted-on post or comment, for notification fan-out.
    pub target_owner: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Everything written when a post is created, in one transaction.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post: Post,
    pub category_ids: Vec<Uuid>,
    /// Path handed back by the external upload store, if any.
    pub image_path: Option<String>,
}

/// Feed ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    Newest,
    /// Most likes first; ties fall back to newest.
    MostLiked,
}

impl FromStr for PostSort {
    type Err = AppError;

    /// Accepts the query-string values `date` and `likes`; empty means newest.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "date" => Ok(PostSort::Newest),
            "likes" => Ok(PostSort::MostLiked),
            other => Err(AppError::ValidationError(format!("unknown sort '{other}'"))),
        }
    }
}

/// A post as the feed and the post page show it.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub post: Post,
    /// Alphabetical.
    pub categories: Vec<Category>,
    pub image_path: Option<String>,
    pub tally: VoteTally,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// Row counts removed by a post cascade, used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeSummary {
    pub comments: u64,
    pub votes: u64,
    pub category_links: u64,
    pub images: u64,
    pub notifications: u64,
    pub reports: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Comment,
    Like,
    Dislike,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Comment => "comment",
            NotificationKind::Like => "like",
            NotificationKind::Dislike => "dislike",
        }
    }
}

impl From<VoteKind> for NotificationKind {
    fn from(kind: VoteKind) -> Self {
        match kind {
            VoteKind::Like => NotificationKind::Like,
            VoteKind::Dislike => NotificationKind::Dislike,
        }
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "comment" => Ok(NotificationKind::Comment),
            "like" => Ok(NotificationKind::Like),
            "dislike" => Ok(NotificationKind::Dislike),
            other => Err(AppError::ValidationError(format!(
                "unknown notification type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub source_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Open => "open",
            ReportStatus::Closed => "closed",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(ReportStatus::Open),
            "closed" => Ok(ReportStatus::Closed),
            other => Err(AppError::ValidationError(format!(
                "unknown report status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target: Target,
    pub reason: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// The acting identity's own posts, comments and votes, newest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Activity {
    pub posts: Vec<Post>,
    pub comments: Vec<Comment>,
    pub votes: Vec<Vote>,
}
