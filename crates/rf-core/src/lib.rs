//! rusty-forum/crates/rf-core/src/lib.rs
//!
//! The central domain types and interface definitions for Rusty-Forum.

pub mod clock;
pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use clock::*;
pub use error::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use super::AppError;
    use uuid::Uuid;

    #[test]
    fn test_target_from_refs() {
        let id = Uuid::now_v7();
        assert_eq!(Target::from_refs(Some(id), None), Ok(Some(Target::Post(id))));
        assert_eq!(Target::from_refs(None, Some(id)), Ok(Some(Target::Comment(id))));
        assert_eq!(Target::from_refs(None, None), Ok(None));
        assert!(matches!(
            Target::from_refs(Some(id), Some(Uuid::now_v7())),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_target_accessors_are_exclusive() {
        let id = Uuid::now_v7();
        let post = Target::Post(id);
        assert_eq!(post.post_id(), Some(id));
        assert_eq!(post.comment_id(), None);
        let comment = Target::Comment(id);
        assert_eq!(comment.post_id(), None);
        assert_eq!(comment.comment_id(), Some(id));
        assert_eq!(comment.id(), id);
    }

    #[test]
    fn test_ownership_rule() {
        let owner = Uuid::now_v7();
        let stranger = ActingIdentity { id: Uuid::now_v7(), role: Role::User };
        let author = ActingIdentity { id: owner, role: Role::User };
        let moderator = ActingIdentity { id: Uuid::now_v7(), role: Role::Moderator };
        let admin = ActingIdentity { id: Uuid::now_v7(), role: Role::Admin };

        assert!(!stranger.may_modify(owner));
        assert!(author.may_modify(owner));
        assert!(moderator.may_modify(owner));
        assert!(admin.may_modify(owner));
    }

    #[test]
    fn test_role_round_trips_through_storage_text() {
        for role in [Role::User, Role::Moderator, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_session_has_no_grace_period() {
        let now = chrono::Utc::now();
        let session = Session {
            token: "t".into(),
            identity_id: Uuid::now_v7(),
            expires_at: now,
        };
        assert!(!session.is_valid_at(now));
        assert!(session.is_valid_at(now - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_transition_states() {
        assert_eq!(VoteTransition::Cast(VoteKind::Like).resulting_state(), VoteState::Liked);
        assert_eq!(VoteTransition::Cast(VoteKind::Dislike).resulting_state(), VoteState::Disliked);
        assert_eq!(VoteTransition::Withdrawn(VoteKind::Like).resulting_state(), VoteState::NoVote);
    }

    #[test]
    fn test_post_sort_from_query_value() {
        assert_eq!("".parse::<PostSort>(), Ok(PostSort::Newest));
        assert_eq!("date".parse::<PostSort>(), Ok(PostSort::Newest));
        assert_eq!("likes".parse::<PostSort>(), Ok(PostSort::MostLiked));
        assert!(matches!("votes".parse::<PostSort>(), Err(AppError::ValidationError(_))));
    }

    #[test]
    fn test_storage_error_hides_detail() {
        let err = AppError::storage("insert session");
        assert_eq!(err.to_string(), "internal service error");
    }
}
