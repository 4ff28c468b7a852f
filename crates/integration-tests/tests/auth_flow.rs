use chrono::Duration;
use integration_tests::{Harness, TestCarrier, PASSWORD};
use rf_core::error::AppError;
use rf_core::models::{Capability, Role};
use rf_core::traits::SessionRepo;

#[tokio::test]
async fn test_registration_is_case_insensitive() {
    let h = Harness::new().await;

    let alice = h.forum.register("a@x.com", "alice", "secret1").await.unwrap();
    assert_eq!(alice.role, Role::User);

    let dup = h.forum.register("A@X.COM", "ALICE", "other1").await;
    assert!(matches!(dup, Err(AppError::AlreadyTaken(_))));

    // Either half colliding is enough.
    let dup_email = h.forum.register("A@x.com", "someoneelse", "other1").await;
    assert!(matches!(dup_email, Err(AppError::AlreadyTaken(_))));
}

#[tokio::test]
async fn test_registration_validation() {
    let h = Harness::new().await;
    for (email, username, password) in [
        ("broken", "alice", "secret1"),
        ("a@x.com", "al", "secret1"),
        ("a@x.com", "alice", "12345"),
    ] {
        assert!(matches!(
            h.forum.register(email, username, password).await,
            Err(AppError::ValidationError(_))
        ));
    }
}

#[tokio::test]
async fn test_login_is_case_insensitive_and_password_is_hashed() {
    let h = Harness::new().await;
    let identity = h.forum.register("a@x.com", "alice", PASSWORD).await.unwrap();

    assert!(identity.password_hash.starts_with("$argon2id$"));
    assert_ne!(identity.password_hash, PASSWORD);
    h.forum.authenticate("  ALICE ", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_throttle_blocks_correct_password_after_five_failures() {
    let h = Harness::new().await;
    h.forum.register("b@x.com", "bob", PASSWORD).await.unwrap();

    for _ in 0..5 {
        assert_eq!(
            h.forum.authenticate("bob", "wrong-password").await.unwrap_err(),
            AppError::BadCredentials
        );
        h.clock.advance(Duration::seconds(10));
    }

    assert_eq!(
        h.forum.authenticate("bob", PASSWORD).await.unwrap_err(),
        AppError::TooManyAttempts
    );

    // The first failure is 50s old; push it out of the 10 minute window.
    h.clock.advance(Duration::seconds(550));
    h.forum.authenticate("bob", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_unknown_user_fails_like_a_bad_password() {
    let h = Harness::new().await;

    for _ in 0..5 {
        assert_eq!(
            h.forum.authenticate("ghost", PASSWORD).await.unwrap_err(),
            AppError::BadCredentials
        );
    }
    assert_eq!(
        h.forum.authenticate("ghost", PASSWORD).await.unwrap_err(),
        AppError::TooManyAttempts
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_guesses_are_capped_by_the_throttle() {
    let h = Harness::new().await;
    h.forum.register("b@x.com", "bob", PASSWORD).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let forum = h.forum.clone();
            tokio::spawn(async move { forum.authenticate("bob", &format!("guess-{i}")).await })
        })
        .collect();

    let mut rejected = 0;
    let mut throttled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(AppError::BadCredentials) => rejected += 1,
            Err(AppError::TooManyAttempts) => throttled += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!((rejected, throttled), (5, 3));
}

#[tokio::test]
async fn test_failed_session_issue_keeps_failure_history() {
    let h = Harness::new().await;
    h.forum.register("b@x.com", "bob", PASSWORD).await.unwrap();
    for _ in 0..3 {
        h.forum.authenticate("bob", "wrong-password").await.unwrap_err();
    }

    sqlx::query("ALTER TABLE sessions RENAME TO sessions_offline")
        .execute(h.repo.pool())
        .await
        .unwrap();
    assert!(matches!(
        h.forum.authenticate("bob", PASSWORD).await,
        Err(AppError::Storage(_))
    ));

    // The three earlier failures still count; the storage failure does not.
    for _ in 0..2 {
        assert_eq!(
            h.forum.authenticate("bob", "wrong-password").await.unwrap_err(),
            AppError::BadCredentials
        );
    }
    assert_eq!(
        h.forum.authenticate("bob", PASSWORD).await.unwrap_err(),
        AppError::TooManyAttempts
    );
}

#[tokio::test]
async fn test_success_resets_the_failure_count() {
    let h = Harness::new().await;
    h.forum.register("b@x.com", "bob", PASSWORD).await.unwrap();

    for _ in 0..4 {
        h.forum.authenticate("bob", "wrong-password").await.unwrap_err();
    }
    h.forum.authenticate("bob", PASSWORD).await.unwrap();
    for _ in 0..4 {
        h.forum.authenticate("bob", "wrong-password").await.unwrap_err();
    }
    h.forum.authenticate("bob", PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_second_session_invalidates_the_first() {
    let h = Harness::new().await;
    let (_, first) = h.member("alice").await;

    let second = h.forum.authenticate("alice", PASSWORD).await.unwrap();
    assert_ne!(first.token, second.token);

    assert_eq!(
        h.forum
            .authorize(Some(&first.token), Capability::Authenticated)
            .await
            .unwrap_err(),
        AppError::Unauthenticated
    );
    h.forum
        .authorize(Some(&second.token), Capability::Authenticated)
        .await
        .unwrap();
    assert!(h.repo.find_session(&first.token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_expires_without_grace_and_is_swept() {
    let h = Harness::new().await;
    let (_, session) = h.member("alice").await;

    h.clock.advance(Duration::hours(24) - Duration::seconds(1));
    h.forum
        .authorize(Some(&session.token), Capability::Authenticated)
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(1));
    assert_eq!(
        h.forum
            .authorize(Some(&session.token), Capability::Authenticated)
            .await
            .unwrap_err(),
        AppError::Unauthenticated
    );

    assert_eq!(h.forum.sweep_sessions().await.unwrap(), 1);
    assert!(h.repo.find_session(&session.token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_and_logout_through_carrier() {
    let h = Harness::new().await;
    h.forum.register("a@x.com", "alice", PASSWORD).await.unwrap();

    let mut response = TestCarrier::default();
    let session = h.forum.login(&mut response, "alice", PASSWORD).await.unwrap();
    let cookie = &response.cookies[0];
    assert_eq!(cookie.name, "session_id");
    assert_eq!(cookie.path, "/");
    assert_eq!(cookie.value, session.token);
    assert_eq!(cookie.expires_at, session.expires_at);

    let mut request = TestCarrier {
        inbound: Some(session.token.clone()),
        ..Default::default()
    };
    let current = h.forum.current_identity(&request).await.unwrap().unwrap();
    assert_eq!(current.role, Role::User);

    h.forum.logout(&mut request).await.unwrap();
    assert_eq!(request.cookies.last().unwrap().value, "");
    assert!(h.forum.current_identity(&request).await.unwrap().is_none());

    // Logging out again, or with no cookie at all, is harmless.
    h.forum.logout(&mut request).await.unwrap();
    h.forum.logout(&mut TestCarrier::default()).await.unwrap();
}
