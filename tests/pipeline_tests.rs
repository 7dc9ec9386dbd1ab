/// End-to-end pipeline scenarios driven through the library API
use classreel::{
    config::ServerConfig,
    db::{self, DatabaseOptions},
    engagement::ViewerKey,
    moderation::{Decision, SubmissionState},
    notifications::{Notification, NotificationKind},
    realtime::{ChangeEvent, Delivery, EngagementSession, EngagementView, LocalEngagement, Topic},
    videos::VideoDraft,
    Actor, AppContext, ReelError,
};
use sqlx::SqlitePool;
use std::{sync::Arc, time::Duration};
use tokio_test::{assert_err, assert_ok};

const SECRET: &str = "0123456789abcdef0123456789abcdef";

struct Harness {
    ctx: AppContext,
    moderator: Actor,
    creator: Actor,
    student: Actor,
    _dir: tempfile::TempDir,
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::open_in_memory().await.unwrap();
    harness(dir, pool).await
}

/// File-backed WAL database with a real pool, so concurrent calls run on
/// separate connections
async fn setup_shared() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::create_pool(&dir.path().join("classreel.sqlite"), DatabaseOptions::default())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    harness(dir, pool).await
}

async fn harness(dir: tempfile::TempDir, pool: SqlitePool) -> Harness {
    let config = ServerConfig::local(dir.path(), SECRET);
    let ctx = AppContext::with_pool(config, pool);

    let moderator = Actor::moderator("acct-m", "Ms. Rivera");
    let creator = Actor::new("acct-a", "Ana");
    let student = Actor::new("acct-c", "Caio");
    for actor in [&moderator, &creator, &student] {
        ctx.accounts.remember(actor).await.unwrap();
    }

    Harness {
        ctx,
        moderator,
        creator,
        student,
        _dir: dir,
    }
}

async fn inbox(ctx: &AppContext, account_id: &str) -> Vec<Notification> {
    ctx.fanout.flush().await;
    ctx.notifications.list(account_id, None, None).await.unwrap()
}

fn fractions() -> VideoDraft {
    VideoDraft::new("Intro to Fractions", "https://cdn.example/v/fractions.mp4")
}

#[tokio::test]
async fn test_intro_to_fractions_review_flow() {
    let h = setup().await;

    let receipt = h.ctx.moderation.submit(&h.creator, fractions()).await.unwrap();
    assert_eq!(receipt.state, SubmissionState::Pending);

    let pending = h.ctx.moderation.list_pending(&h.moderator).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].owner_name, "Ana");

    let review = inbox(&h.ctx, &h.moderator.account_id).await;
    assert_eq!(review.len(), 1);
    assert_eq!(review[0].kind, NotificationKind::UploadReview);

    // Not visible to the audience while pending
    assert!(h.ctx.videos.list_published(None, None).await.unwrap().is_empty());

    let outcome = assert_ok!(
        h.ctx
            .moderation
            .decide(&h.moderator, &receipt.id, Decision::Approve)
            .await
    );
    assert_eq!(outcome.state, SubmissionState::Published);

    assert_eq!(h.ctx.moderation.pending_count(&h.moderator).await.unwrap(), 0);
    let published = h.ctx.videos.list_published(None, None).await.unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].title, "Intro to Fractions");

    let owner_inbox = inbox(&h.ctx, &h.creator.account_id).await;
    assert_eq!(owner_inbox.len(), 1);
    assert_eq!(owner_inbox[0].kind, NotificationKind::Approval);
    assert_eq!(owner_inbox[0].video_id.as_deref(), Some(receipt.id.as_str()));
}

#[tokio::test]
async fn test_moderator_upload_bypasses_queue() {
    let h = setup().await;

    let receipt = h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();
    assert_eq!(receipt.state, SubmissionState::Published);

    assert_eq!(h.ctx.moderation.pending_count(&h.moderator).await.unwrap(), 0);
    let review = inbox(&h.ctx, &h.moderator.account_id).await;
    assert!(review
        .iter()
        .all(|n| n.kind != NotificationKind::UploadReview));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_publish_once() {
    let h = setup_shared().await;
    let second_moderator = Actor::moderator("acct-m2", "Mr. Okafor");
    h.ctx.accounts.remember(&second_moderator).await.unwrap();

    const ROUNDS: usize = 5;
    for round in 0..ROUNDS {
        let draft = VideoDraft::new(
            format!("Fractions part {}", round + 1),
            "https://cdn.example/v/fractions.mp4",
        );
        let receipt = h.ctx.moderation.submit(&h.creator, draft).await.unwrap();

        let racers: Vec<_> = [h.moderator.clone(), second_moderator.clone()]
            .into_iter()
            .map(|moderator| {
                let ctx = h.ctx.clone();
                let video_id = receipt.id.clone();
                tokio::spawn(async move {
                    ctx.moderation
                        .decide(&moderator, &video_id, Decision::Approve)
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for racer in racers {
            results.push(racer.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(ReelError::NotFound(_))))
                .count(),
            1
        );
        assert_eq!(
            h.ctx.moderation.state_of(&receipt.id).await.unwrap(),
            Some(SubmissionState::Published)
        );
    }

    assert_eq!(
        h.ctx.videos.list_published(None, None).await.unwrap().len(),
        ROUNDS
    );
    assert_eq!(h.ctx.moderation.pending_count(&h.moderator).await.unwrap(), 0);
    let approvals = inbox(&h.ctx, &h.creator.account_id).await;
    assert_eq!(
        approvals
            .iter()
            .filter(|n| n.kind == NotificationKind::Approval)
            .count(),
        ROUNDS
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_views_counted_once() {
    let h = setup_shared().await;
    let receipt = h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();
    let viewer = ViewerKey::resolve(None, Some("browser-token-0002")).unwrap();

    let racers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = h.ctx.clone();
            let video_id = receipt.id.clone();
            let viewer = viewer.clone();
            tokio::spawn(async move { ctx.engagement.record_view(&video_id, &viewer).await })
        })
        .collect();

    let mut recorded = 0;
    for racer in racers {
        let outcome = racer.await.unwrap().unwrap();
        if outcome.recorded {
            recorded += 1;
        }
    }
    assert_eq!(recorded, 1);

    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM view_event WHERE video_id = ?1")
        .bind(&receipt.id)
        .fetch_one(&h.ctx.db)
        .await
        .unwrap();
    assert_eq!(events, 1);
    assert_eq!(h.ctx.videos.get(&receipt.id, None).await.unwrap().views, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_likes_keep_one_edge() {
    let h = setup_shared().await;
    let receipt = h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();

    let racers: Vec<_> = (0..2)
        .map(|_| {
            let ctx = h.ctx.clone();
            let video_id = receipt.id.clone();
            let student = h.student.clone();
            tokio::spawn(async move { ctx.engagement.toggle_like(&video_id, &student).await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for racer in racers {
        outcomes.push(racer.await.unwrap().unwrap());
    }

    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM like_edge WHERE video_id = ?1")
        .bind(&receipt.id)
        .fetch_one(&h.ctx.db)
        .await
        .unwrap();
    let likes = h.ctx.engagement.like_count(&receipt.id).await.unwrap();
    assert!(edges <= 1);
    assert_eq!(likes, edges);

    if outcomes.iter().all(|o| o.active) {
        // Both saw no edge; the second insert was absorbed by the unique key
        assert_eq!(edges, 1);
        assert_eq!(outcomes.iter().filter(|o| o.conflict_ignored).count(), 1);
    } else {
        // Serialized: like then unlike
        assert_eq!(edges, 0);
    }

    let like_notices = inbox(&h.ctx, &h.moderator.account_id)
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Like)
        .count();
    assert_eq!(like_notices, 1);
}

#[tokio::test]
async fn test_declined_submission_is_gone() {
    let h = setup().await;

    let receipt = h.ctx.moderation.submit(&h.creator, fractions()).await.unwrap();
    h.ctx
        .moderation
        .decide(&h.moderator, &receipt.id, Decision::Decline)
        .await
        .unwrap();

    assert!(matches!(
        h.ctx.videos.get(&receipt.id, Some(&h.creator)).await,
        Err(ReelError::NotFound(_))
    ));
    let owner_inbox = inbox(&h.ctx, &h.creator.account_id).await;
    assert_eq!(owner_inbox[0].kind, NotificationKind::Decline);
    assert_eq!(owner_inbox[0].video_id, None);
}

#[tokio::test]
async fn test_anonymous_viewer_counted_once() {
    let h = setup().await;
    let receipt = h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();
    let viewer = ViewerKey::resolve(None, Some("browser-token-0001")).unwrap();

    let mut last = None;
    for _ in 0..3 {
        last = Some(h.ctx.engagement.record_view(&receipt.id, &viewer).await.unwrap());
    }

    let last = last.unwrap();
    assert!(!last.recorded);
    assert_eq!(last.views, 1);
    assert_eq!(h.ctx.videos.get(&receipt.id, None).await.unwrap().views, 1);
}

#[tokio::test]
async fn test_like_then_unlike_notifies_once() {
    let h = setup().await;
    let receipt = h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();

    let liked = h.ctx.engagement.toggle_like(&receipt.id, &h.student).await.unwrap();
    assert!(liked.active);
    let unliked = h.ctx.engagement.toggle_like(&receipt.id, &h.student).await.unwrap();
    assert!(!unliked.active);

    assert_eq!(h.ctx.engagement.like_count(&receipt.id).await.unwrap(), 0);
    let likes: Vec<_> = inbox(&h.ctx, &h.moderator.account_id)
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Like)
        .collect();
    assert_eq!(likes.len(), 1);
}

#[tokio::test]
async fn test_self_follow_rejected() {
    let h = setup().await;

    let result = h.ctx.engagement.toggle_follow(&h.creator, &h.creator.account_id).await;
    let err = assert_err!(result);
    assert!(matches!(err, ReelError::Validation(_)));
    assert_eq!(h.ctx.engagement.follower_count(&h.creator.account_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_no_notifications_for_own_content() {
    let h = setup().await;
    let receipt = h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();

    h.ctx.engagement.toggle_like(&receipt.id, &h.moderator).await.unwrap();
    h.ctx
        .comments
        .add(&h.moderator, &receipt.id, "Pause at 2:10 for the exercise", None)
        .await
        .unwrap();

    assert!(inbox(&h.ctx, &h.moderator.account_id).await.is_empty());
}

#[tokio::test]
async fn test_follow_shows_in_following_list() {
    let h = setup().await;
    h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();

    let outcome = h
        .ctx
        .engagement
        .toggle_follow(&h.student, &h.moderator.account_id)
        .await
        .unwrap();
    assert!(outcome.active);
    assert_eq!(outcome.count, 1);

    let following = h.ctx.engagement.following(&h.student).await.unwrap();
    assert_eq!(following.len(), 1);
    assert_eq!(following[0].account_id, "acct-m");
    assert_eq!(following[0].followers, 1);
    assert_eq!(following[0].videos, 1);

    let follows = inbox(&h.ctx, &h.moderator.account_id).await;
    assert_eq!(follows.len(), 1);
    assert_eq!(follows[0].kind, NotificationKind::Follow);
}

#[tokio::test]
async fn test_watched_video_receives_like_changes() {
    let h = setup().await;
    let receipt = h.ctx.moderation.submit(&h.moderator, fractions()).await.unwrap();
    let mut stream = h.ctx.hub.subscribe(vec![Topic::Video(receipt.id.clone())]);

    let backend = Arc::new(LocalEngagement::new(
        h.ctx.engagement.clone(),
        Some(h.student.clone()),
        ViewerKey::Account(h.student.account_id.clone()),
    ));
    let session = EngagementSession::new(
        backend,
        receipt.id.clone(),
        h.moderator.account_id.clone(),
        EngagementView::default(),
        Duration::from_secs(5),
    );

    let outcome = session.toggle_like().await.unwrap();
    assert!(outcome.active);
    assert!(session.view().await.liked);
    assert_eq!(session.view().await.likes, 1);

    let delivery = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        delivery,
        Delivery::Event(ChangeEvent::LikeChanged {
            video_id: receipt.id.clone(),
            likes: 1,
        })
    );
}
