//! # Authorization Guard
//!
//! Turns an inbound session token into an explicit `ActingIdentity` and
//! checks it against the capability an operation requires.

use std::sync::Arc;

use rf_core::error::{AppError, Result};
use rf_core::models::{ActingIdentity, Capability, Role};
use rf_core::traits::IdentityRepo;
use tracing::debug;

use crate::sessions::SessionManager;

pub struct AuthorizationGuard {
    sessions: Arc<SessionManager>,
    identities: Arc<dyn IdentityRepo>,
}

impl AuthorizationGuard {
    pub fn new(sessions: Arc<SessionManager>, identities: Arc<dyn IdentityRepo>) -> Self {
        Self {
            sessions,
            identities,
        }
    }

    /// Missing, unknown and expired tokens all collapse to `Unauthenticated`.
    /// Storage failures are passed through untouched.
    pub async fn resolve(&self, token: Option<&str>) -> Result<ActingIdentity> {
        let token = token.ok_or(AppError::Unauthenticated)?;

        let identity_id = match self.sessions.validate(token).await {
            Ok(id) => id,
            Err(AppError::NotFound(..) | AppError::Expired) => {
                return Err(AppError::Unauthenticated)
            }
            Err(err) => return Err(err),
        };

        let identity = self
            .identities
            .find_identity(identity_id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(ActingIdentity {
            id: identity.id,
            role: identity.role,
        })
    }

    pub async fn authorize(&self, token: Option<&str>, required: Capability) -> Result<ActingIdentity> {
        let actor = self.resolve(token).await?;
        permit(&actor, required)?;
        Ok(actor)
    }
}

/// Checks an already resolved actor against a capability.
pub fn permit(actor: &ActingIdentity, required: Capability) -> Result<()> {
    let allowed = match required {
        Capability::Authenticated => true,
        Capability::ModifyOwned { owner_id } => actor.may_modify(owner_id),
        Capability::Moderate => actor.role.is_staff(),
        Capability::Administer => actor.role == Role::Admin,
    };

    if !allowed {
        debug!(actor = %actor.id, role = %actor.role, ?required, "capability denied");
        return Err(AppError::Forbidden(match required {
            Capability::ModifyOwned { .. } => "only the owner or a moderator may do this".into(),
            Capability::Moderate => "moderator role required".into(),
            _ => "admin role required".into(),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rf_core::clock::ManualClock;
    use rf_core::models::{Identity, Role, Session};
    use rf_core::traits::{MockAuthProvider, MockIdentityRepo, MockSessionRepo};
    use uuid::Uuid;

    use super::*;

    fn actor(role: Role) -> ActingIdentity {
        ActingIdentity {
            id: Uuid::now_v7(),
            role,
        }
    }

    #[test]
    fn test_ownership_rule() {
        let user = actor(Role::User);
        let own = Capability::ModifyOwned { owner_id: user.id };
        let foreign = Capability::ModifyOwned {
            owner_id: Uuid::now_v7(),
        };

        assert!(permit(&user, own).is_ok());
        assert!(matches!(permit(&user, foreign), Err(AppError::Forbidden(_))));
        assert!(permit(&actor(Role::Moderator), foreign).is_ok());
        assert!(permit(&actor(Role::Admin), foreign).is_ok());
    }

    #[test]
    fn test_role_gates() {
        assert!(permit(&actor(Role::User), Capability::Authenticated).is_ok());
        assert!(permit(&actor(Role::User), Capability::Moderate).is_err());
        assert!(permit(&actor(Role::Moderator), Capability::Moderate).is_ok());
        assert!(permit(&actor(Role::Moderator), Capability::Administer).is_err());
        assert!(permit(&actor(Role::Admin), Capability::Administer).is_ok());
    }

    fn guard(sessions: MockSessionRepo, identities: MockIdentityRepo) -> AuthorizationGuard {
        let manager = SessionManager::new(
            Arc::new(sessions),
            Arc::new(MockAuthProvider::new()),
            Arc::new(ManualClock::default()),
            Duration::hours(24),
        );
        AuthorizationGuard::new(Arc::new(manager), Arc::new(identities))
    }

    #[tokio::test]
    async fn test_resolve() {
        let moderator = Identity {
            id: Uuid::now_v7(),
            email: "m@x.com".into(),
            username: "mod".into(),
            password_hash: "hash".into(),
            role: Role::Moderator,
            created_at: Utc::now(),
        };
        let moderator_id = moderator.id;

        let mut sessions = MockSessionRepo::new();
        sessions.expect_find_session().returning(move |token| {
            Ok(match token {
                "live" => Some(Session {
                    token: token.into(),
                    identity_id: moderator_id,
                    expires_at: Utc::now() + Duration::hours(1),
                }),
                "stale" => Some(Session {
                    token: token.into(),
                    identity_id: moderator_id,
                    expires_at: Utc::now() - Duration::hours(1),
                }),
                _ => None,
            })
        });
        let mut identities = MockIdentityRepo::new();
        identities
            .expect_find_identity()
            .returning(move |_| Ok(Some(moderator.clone())));
        let guard = guard(sessions, identities);

        let resolved = guard.resolve(Some("live")).await.unwrap();
        assert_eq!(resolved.role, Role::Moderator);

        for token in [None, Some("stale"), Some("unknown")] {
            assert_eq!(guard.resolve(token).await, Err(AppError::Unauthenticated));
        }
        assert!(matches!(
            guard.authorize(Some("live"), Capability::Administer).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_surfaces_storage_failure() {
        let mut sessions = MockSessionRepo::new();
        sessions
            .expect_find_session()
            .returning(|_| Err(AppError::storage("find session")));
        let guard = guard(sessions, MockIdentityRepo::new());

        assert!(matches!(
            guard.resolve(Some("live")).await,
            Err(AppError::Storage(_))
        ));
    }
}
