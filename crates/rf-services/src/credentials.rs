//! # Credential Store
//!
//! Registration and password verification. Email and username are normalized
//! here, before any lookup or uniqueness check, so storage only ever sees the
//! canonical lowercase form.

use std::sync::Arc;

use rf_core::clock::Clock;
use rf_core::error::{AppError, Result};
use rf_core::models::{Identity, Role};
use rf_core::traits::{AuthProvider, IdentityRepo};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::validation::{
    check_email, check_length, normalize_email, normalize_username, PASSWORD_CHARS, USERNAME_CHARS,
};

pub struct CredentialStore {
    repo: Arc<dyn IdentityRepo>,
    auth: Arc<dyn AuthProvider>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn IdentityRepo>, auth: Arc<dyn AuthProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, auth, clock }
    }

    #[instrument(skip(self, plaintext))]
    pub async fn register(&self, email: &str, username: &str, plaintext: &str) -> Result<Identity> {
        let email = normalize_email(email);
        let username = normalize_username(username);

        check_email(&email)?;
        check_length("username", &username, USERNAME_CHARS)?;
        check_length("password", plaintext, PASSWORD_CHARS)?;

        if self.repo.is_taken(&email, &username).await? {
            return Err(AppError::AlreadyTaken("email or username".into()));
        }

        let identity = Identity {
            id: Uuid::now_v7(),
            email,
            username,
            password_hash: self.auth.hash_password(plaintext).await?,
            role: Role::User,
            created_at: self.clock.now(),
        };
        // A concurrent registration can still win between the check and here;
        // the repository reports that as AlreadyTaken too.
        self.repo.insert_identity(&identity).await?;

        info!(identity_id = %identity.id, "identity registered");
        Ok(identity)
    }

    /// `NotFound` for an unknown username, `BadPassword` for a mismatch.
    #[instrument(skip(self, plaintext))]
    pub async fn verify(&self, username: &str, plaintext: &str) -> Result<Identity> {
        let username = normalize_username(username);
        let identity = self
            .repo
            .find_identity_by_username(&username)
            .await?
            .ok_or_else(|| AppError::not_found("identity", &username))?;

        if !self.auth.verify_password(plaintext, &identity.password_hash).await {
            return Err(AppError::BadPassword);
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use rf_core::clock::ManualClock;
    use rf_core::traits::{MockAuthProvider, MockIdentityRepo};

    use super::*;

    fn store(repo: MockIdentityRepo, auth: MockAuthProvider) -> CredentialStore {
        CredentialStore::new(Arc::new(repo), Arc::new(auth), Arc::new(ManualClock::default()))
    }

    fn stored(username: &str) -> Identity {
        Identity {
            id: Uuid::now_v7(),
            email: format!("{username}@x.com"),
            username: username.into(),
            password_hash: "hash".into(),
            role: Role::User,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_before_checking() {
        let mut repo = MockIdentityRepo::new();
        repo.expect_is_taken()
            .with(eq("a@x.com"), eq("alice"))
            .times(1)
            .returning(|_, _| Ok(false));
        repo.expect_insert_identity()
            .withf(|identity| identity.email == "a@x.com" && identity.password_hash == "hashed")
            .times(1)
            .returning(|_| Ok(()));
        let mut auth = MockAuthProvider::new();
        auth.expect_hash_password()
            .with(eq("secret1"))
            .returning(|_| Ok("hashed".into()));

        let identity = store(repo, auth)
            .register(" A@X.COM ", "ALICE", "secret1")
            .await
            .unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.role, Role::User);
    }

    #[tokio::test]
    async fn test_register_taken_skips_hashing() {
        let mut repo = MockIdentityRepo::new();
        repo.expect_is_taken().returning(|_, _| Ok(true));
        repo.expect_insert_identity().never();
        let mut auth = MockAuthProvider::new();
        auth.expect_hash_password().never();

        let result = store(repo, auth).register("a@x.com", "alice", "secret1").await;
        assert!(matches!(result, Err(AppError::AlreadyTaken(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let cases = [
            ("not-an-email", "alice", "secret1", "email"),
            ("a@x.com", "al", "secret1", "username"),
            ("a@x.com", "alice", "short", "password"),
        ];
        for (email, username, password, field) in cases {
            let mut repo = MockIdentityRepo::new();
            repo.expect_is_taken().never();
            let result = store(repo, MockAuthProvider::new())
                .register(email, username, password)
                .await;
            assert!(
                matches!(&result, Err(AppError::ValidationError(msg)) if msg.starts_with(field)),
                "{field}: {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_verify_outcomes() {
        let mut repo = MockIdentityRepo::new();
        repo.expect_find_identity_by_username()
            .with(eq("alice"))
            .returning(|name| Ok(Some(stored(name))));
        repo.expect_find_identity_by_username()
            .with(eq("ghost"))
            .returning(|_| Ok(None));
        let mut auth = MockAuthProvider::new();
        auth.expect_verify_password()
            .returning(|plaintext, _| plaintext == "secret1");
        let store = store(repo, auth);

        assert_eq!(store.verify("Alice", "secret1").await.unwrap().username, "alice");
        assert_eq!(store.verify("alice", "wrong1").await.unwrap_err(), AppError::BadPassword);
        assert!(matches!(
            store.verify("ghost", "secret1").await,
            Err(AppError::NotFound(..))
        ));
    }
}
