use integration_tests::Harness;
use rf_core::error::AppError;
use rf_core::models::{NotificationKind, Target, VoteKind, VoteState, VoteTally, VoteTransition};
use rf_core::traits::VoteRepo;

#[tokio::test]
async fn test_like_notifies_owner_and_undo_does_not() {
    let h = Harness::new().await;
    let (u1, _) = h.member("alice").await;
    let (u2, _) = h.member("bob").await;
    let category = h.first_category().await;
    let post = h
        .forum
        .create_post(&u2, "Bob's post", "Something worth liking", &[category], None)
        .await
        .unwrap();
    let target = Target::Post(post.id);

    let liked = h.forum.toggle_vote(&u1, target, true).await.unwrap();
    assert_eq!(liked.transition.resulting_state(), VoteState::Liked);
    assert_eq!(liked.tally, VoteTally { likes: 1, dislikes: 0 });

    let inbox = h.forum.notifications(&u2).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Like);
    assert_eq!(inbox[0].source_id, Some(u1.id));
    assert_eq!(inbox[0].post_id, Some(post.id));

    let undone = h.forum.toggle_vote(&u1, target, true).await.unwrap();
    assert_eq!(undone.transition, VoteTransition::Withdrawn(VoteKind::Like));
    assert_eq!(undone.tally, VoteTally::default());
    assert_eq!(h.forum.notifications(&u2).await.unwrap().len(), 1);
    assert!(h.repo.votes_by_voter(u1.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_direction_switch_takes_two_calls() {
    let h = Harness::new().await;
    let (alice, _) = h.member("alice").await;
    let category = h.first_category().await;
    let post = h
        .forum
        .create_post(&alice, "A post title", "Some post content", &[category], None)
        .await
        .unwrap();
    let target = Target::Post(post.id);

    h.forum.toggle_vote(&alice, target, true).await.unwrap();
    let first = h.forum.toggle_vote(&alice, target, false).await.unwrap();
    assert_eq!(first.transition.resulting_state(), VoteState::NoVote);

    let second = h.forum.toggle_vote(&alice, target, false).await.unwrap();
    assert_eq!(second.transition.resulting_state(), VoteState::Disliked);
    assert_eq!(second.tally, VoteTally { likes: 0, dislikes: 1 });

    // Own content never notifies.
    assert!(h.forum.notifications(&alice).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_repeat_clicks_net_out() {
    const CLICKS: usize = 20;

    let h = Harness::on_disk().await;
    let (alice, _) = h.member("alice").await;
    let (bob, _) = h.member("bob").await;
    let category = h.first_category().await;
    let post = h
        .forum
        .create_post(&alice, "A post title", "Some post content", &[category], None)
        .await
        .unwrap();
    let target = Target::Post(post.id);

    let handles: Vec<_> = (0..CLICKS)
        .map(|_| {
            let forum = h.forum.clone();
            tokio::spawn(async move { forum.toggle_vote(&bob, target, true).await })
        })
        .collect();

    let mut cast = 0;
    for handle in handles {
        if let VoteTransition::Cast(_) = handle.await.unwrap().unwrap().transition {
            cast += 1;
        }
    }

    // Toggles serialise, so casts and withdrawals alternate.
    assert_eq!(cast, CLICKS / 2);
    assert_eq!(h.forum.tally(target).await.unwrap(), VoteTally::default());
    assert!(h.repo.votes_by_voter(bob.id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_voters_are_each_counted_once() {
    const VOTERS: usize = 6;

    let h = Harness::on_disk().await;
    let (alice, _) = h.member("alice").await;
    let category = h.first_category().await;
    let post = h
        .forum
        .create_post(&alice, "A post title", "Some post content", &[category], None)
        .await
        .unwrap();
    let target = Target::Post(post.id);

    let mut voters = Vec::with_capacity(VOTERS);
    for i in 0..VOTERS {
        voters.push(h.member(&format!("voter{i}")).await.0);
    }

    let handles: Vec<_> = voters
        .into_iter()
        .map(|voter| {
            let forum = h.forum.clone();
            tokio::spawn(async move { forum.toggle_vote(&voter, target, true).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let tally = h.forum.tally(target).await.unwrap();
    assert_eq!(tally, VoteTally { likes: VOTERS as i64, dislikes: 0 });
    assert_eq!(h.forum.notifications(&alice).await.unwrap().len(), VOTERS);
}

#[tokio::test]
async fn test_comment_and_comment_vote_notifications() {
    let h = Harness::new().await;
    let (alice, _) = h.member("alice").await;
    let (bob, _) = h.member("bob").await;
    let category = h.first_category().await;
    let post = h
        .forum
        .create_post(&alice, "A post title", "Some post content", &[category], None)
        .await
        .unwrap();

    let comment = h.forum.create_comment(&bob, post.id, "First!").await.unwrap();
    h.forum
        .toggle_vote(&alice, Target::Comment(comment.id), false)
        .await
        .unwrap();

    let alice_inbox = h.forum.notifications(&alice).await.unwrap();
    assert_eq!(alice_inbox.len(), 1);
    assert_eq!(alice_inbox[0].kind, NotificationKind::Comment);
    assert_eq!(alice_inbox[0].comment_id, Some(comment.id));

    let bob_inbox = h.forum.notifications(&bob).await.unwrap();
    assert_eq!(bob_inbox.len(), 1);
    assert_eq!(bob_inbox[0].kind, NotificationKind::Dislike);

    // Only the recipient can mark it.
    assert!(matches!(
        h.forum.mark_notification_read(&alice, bob_inbox[0].id).await,
        Err(AppError::NotFound(..))
    ));
    h.forum.mark_notification_read(&bob, bob_inbox[0].id).await.unwrap();
    assert!(h.forum.notifications(&bob).await.unwrap()[0].is_read);
}

#[tokio::test]
async fn test_vote_reference_edge_cases() {
    let h = Harness::new().await;
    let (alice, _) = h.member("alice").await;
    let category = h.first_category().await;
    let post = h
        .forum
        .create_post(&alice, "A post title", "Some post content", &[category], None)
        .await
        .unwrap();

    assert_eq!(h.forum.toggle_vote_refs(&alice, None, None, true).await, Ok(None));
    assert!(matches!(
        h.forum
            .toggle_vote_refs(&alice, Some(post.id), Some(post.id), true)
            .await,
        Err(AppError::ValidationError(_))
    ));
    let outcome = h
        .forum
        .toggle_vote_refs(&alice, Some(post.id), None, true)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.tally.likes, 1);

    assert!(matches!(
        h.forum
            .toggle_vote(&alice, Target::Comment(uuid::Uuid::now_v7()), true)
            .await,
        Err(AppError::NotFound(..))
    ));
}
