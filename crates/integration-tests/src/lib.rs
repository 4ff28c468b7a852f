//! Shared fixtures for the end-to-end scenarios: a forum over SQLite with
//! cheap Argon2 parameters and a clock the tests move by hand.

use std::sync::Arc;

use rf_auth_argon::Argon2AuthProvider;
use rf_core::clock::ManualClock;
use rf_core::models::{ActingIdentity, Capability, Role, Session, SessionCookie};
use rf_core::traits::SessionCarrier;
use rf_db_sqlite::SqliteForumRepo;
use rf_services::{Forum, ForumSettings};
use tempfile::TempDir;
use uuid::Uuid;

pub const PASSWORD: &str = "secret1";

/// Pool size for the on-disk harness.
pub const DISK_CONNECTIONS: u32 = 8;

pub struct Harness {
    pub forum: Arc<Forum>,
    pub repo: Arc<SqliteForumRepo>,
    pub clock: Arc<ManualClock>,
    // Keeps the database file alive for the on-disk harness.
    _dir: Option<TempDir>,
}

impl Harness {
    /// Private in-memory database on a single connection.
    pub async fn new() -> Self {
        let repo = SqliteForumRepo::in_memory().await.unwrap();
        Self::over(repo, None)
    }

    /// Database file in a fresh temp dir with a multi-connection pool, so
    /// concurrent requests really race inside SQLite.
    pub async fn on_disk() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("forum.db").display());
        let repo = SqliteForumRepo::new(&url, DISK_CONNECTIONS).await.unwrap();
        Self::over(repo, Some(dir))
    }

    fn over(repo: SqliteForumRepo, dir: Option<TempDir>) -> Self {
        let repo = Arc::new(repo);
        let auth = Arc::new(Argon2AuthProvider::with_cost(8, 1, 1).unwrap());
        let clock = Arc::new(ManualClock::default());
        let forum = Arc::new(Forum::new(repo.clone(), auth, clock.clone(), ForumSettings::default()));
        Self {
            forum,
            repo,
            clock,
            _dir: dir,
        }
    }

    /// Registers `name` with `PASSWORD` and signs in.
    pub async fn member(&self, name: &str) -> (ActingIdentity, Session) {
        self.forum
            .register(&format!("{name}@example.com"), name, PASSWORD)
            .await
            .unwrap();
        let session = self.forum.authenticate(name, PASSWORD).await.unwrap();
        let actor = self
            .forum
            .authorize(Some(&session.token), Capability::Authenticated)
            .await
            .unwrap();
        (actor, session)
    }

    /// A member promoted to `role` by the bootstrap path.
    pub async fn staff(&self, name: &str, role: Role) -> ActingIdentity {
        let admin = self
            .forum
            .bootstrap_admin(&format!("{name}@example.com"), name, PASSWORD)
            .await
            .unwrap();
        let admin = ActingIdentity {
            id: admin.id,
            role: admin.role,
        };
        if role != Role::Admin {
            self.forum.set_role(&admin, admin.id, role).await.unwrap();
        }
        ActingIdentity { id: admin.id, role }
    }

    pub async fn first_category(&self) -> Uuid {
        self.forum.categories().await.unwrap()[0].id
    }
}

/// Stand-in for the HTTP request/response pair.
#[derive(Debug, Default)]
pub struct TestCarrier {
    pub inbound: Option<String>,
    pub cookies: Vec<SessionCookie>,
}

impl SessionCarrier for TestCarrier {
    fn session_token(&self) -> Option<&str> {
        self.inbound.as_deref()
    }

    fn set_session_cookie(&mut self, cookie: SessionCookie) {
        self.cookies.push(cookie);
    }
}
