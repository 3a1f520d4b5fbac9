mod common;

use common::{harness, post, staged_post, staged_stories};
use insta_watchbot::db;
use insta_watchbot::model::{ItemId, Subscription};
use insta_watchbot::sync::SweepScope;
use std::sync::atomic::Ordering;

const OWNER: i64 = 42;

async fn cursor_of(h: &common::Harness, target: &str) -> Option<ItemId> {
    db::find_subscription(&h.pool, OWNER, target)
        .await
        .unwrap()
        .unwrap()
        .cursor
}

/// Captions of delivered posts, in delivery order.
async fn delivered(h: &common::Harness) -> Vec<String> {
    h.messenger
        .texts()
        .await
        .into_iter()
        .filter_map(|t| t.lines().last().and_then(|l| l.strip_prefix("📄 ")).map(str::to_string))
        .collect()
}

#[tokio::test]
async fn new_posts_are_sent_oldest_first_and_cursor_advances() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    db::set_cursor(&h.pool, OWNER, "alice", &ItemId::from("100"))
        .await
        .unwrap();
    h.source
        .set_posts("alice", vec![post("102"), post("101"), post("100"), post("99")])
        .await;

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.checked, 1);
    assert_eq!(report.posts, 2);
    assert_eq!(report.failures, 0);
    assert_eq!(delivered(&h).await, vec!["post 101", "post 102"]);
    assert!(h
        .messenger
        .texts()
        .await
        .iter()
        .all(|t| t.starts_with("New post from alice:")));
    assert_eq!(cursor_of(&h, "alice").await, Some(ItemId::from("102")));
}

#[tokio::test]
async fn cursor_never_moves_backwards_across_sweeps() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();

    h.source.set_posts("alice", vec![post("102"), post("101")]).await;
    h.engine.sweep(SweepScope::All).await;
    assert_eq!(cursor_of(&h, "alice").await, Some(ItemId::from("102")));

    // Same and older items again: nothing is delivered twice.
    h.messenger.clear().await;
    h.source
        .set_posts("alice", vec![post("102"), post("101"), post("98")])
        .await;
    let report = h.engine.sweep(SweepScope::All).await;
    assert_eq!(report.posts, 0);
    assert!(h.messenger.sent().await.is_empty());
    assert_eq!(cursor_of(&h, "alice").await, Some(ItemId::from("102")));

    h.source
        .set_posts("alice", vec![post("1000"), post("103"), post("102")])
        .await;
    h.engine.sweep(SweepScope::All).await;
    assert_eq!(delivered(&h).await, vec!["post 103", "post 1000"]);
    assert_eq!(cursor_of(&h, "alice").await, Some(ItemId::from("1000")));
}

#[tokio::test]
async fn duplicates_in_one_batch_are_sent_once() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    h.source
        .set_posts("alice", vec![post("5"), post("4"), post("5")])
        .await;

    h.engine.sweep(SweepScope::All).await;

    assert_eq!(delivered(&h).await, vec!["post 4", "post 5"]);
}

#[tokio::test]
async fn nothing_new_leaves_cursor_alone() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.checked, 1);
    assert_eq!(report.posts, 0);
    assert_eq!(cursor_of(&h, "alice").await, None);
    assert!(h.messenger.sent().await.is_empty());
}

#[tokio::test]
async fn failing_subscription_does_not_stop_the_sweep() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    db::insert_subscription(&h.pool, OWNER, "bob").await.unwrap();
    db::insert_subscription(&h.pool, OWNER, "ghost").await.unwrap();
    h.source.set_broken("alice").await;
    h.source.set_missing("ghost").await;
    h.source.set_posts("bob", vec![post("7")]).await;

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.checked, 3);
    assert_eq!(report.failures, 1);
    assert_eq!(report.posts, 1);
    assert_eq!(cursor_of(&h, "alice").await, None);
    assert_eq!(cursor_of(&h, "bob").await, Some(ItemId::from("7")));
    assert_eq!(cursor_of(&h, "ghost").await, None);
}

#[tokio::test]
async fn expired_session_is_renewed_once() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    h.source.set_posts("alice", vec![post("1")]).await;
    h.source.expire_sessions(1);

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.failures, 0);
    assert_eq!(report.posts, 1);
    assert_eq!(h.source.logins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persistent_expiry_is_reported_not_retried_forever() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    h.source.set_posts("alice", vec![post("1")]).await;
    h.source.expire_sessions(usize::MAX);

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.failures, 1);
    assert_eq!(report.posts, 0);
    // One renewal for the post fetch and one for the story fetch.
    assert_eq!(h.source.logins.load(Ordering::SeqCst), 2);
    assert_eq!(cursor_of(&h, "alice").await, None);
}

#[tokio::test]
async fn artifacts_are_removed_after_delivery() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    db::set_cursor(&h.pool, OWNER, "alice", &ItemId::from("1"))
        .await
        .unwrap();
    h.source
        .set_posts(
            "alice",
            vec![staged_post(dir.path(), "3"), staged_post(dir.path(), "2"), staged_post(dir.path(), "1")],
        )
        .await;

    h.engine.sweep(SweepScope::All).await;

    assert_eq!(h.messenger.media().await.len(), 2);
    for id in ["1", "2", "3"] {
        assert!(!dir.path().join(format!("{id}.jpg")).exists(), "{id}.jpg left behind");
    }
}

#[tokio::test]
async fn artifacts_are_removed_when_delivery_fails() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    h.messenger.fail_media.store(true, Ordering::SeqCst);
    h.source
        .set_posts("alice", vec![staged_post(dir.path(), "2"), staged_post(dir.path(), "1")])
        .await;
    let (staging, stories) = staged_stories(dir.path(), "alice", &["s1"]);
    h.source.set_stories("alice", stories).await;

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.failures, 0);
    assert!(!dir.path().join("1.jpg").exists());
    assert!(!dir.path().join("2.jpg").exists());
    assert!(!staging.exists());
    // Delivery failures do not block the cursor.
    assert_eq!(cursor_of(&h, "alice").await, Some(ItemId::from("2")));
    // Captions still go out after failed media.
    assert_eq!(delivered(&h).await, vec!["post 1", "post 2"]);
}

#[tokio::test]
async fn stories_are_sent_with_a_header() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    let (_, stories) = staged_stories(dir.path(), "alice", &["s1", "s2"]);
    h.source.set_stories("alice", stories).await;

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.stories, 2);
    assert_eq!(h.messenger.texts().await, vec!["New stories from alice"]);
    assert_eq!(h.messenger.media().await.len(), 2);
}

#[tokio::test]
async fn full_sweeps_are_time_bounded() {
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    db::set_cursor(&h.pool, OWNER, "alice", &ItemId::from("5"))
        .await
        .unwrap();

    h.engine.sweep(SweepScope::All).await;
    let sub = db::find_subscription(&h.pool, OWNER, "alice")
        .await
        .unwrap()
        .unwrap();
    h.engine.sweep(SweepScope::Single(sub)).await;
    // On-demand checks are never bounded, even before the first sync.
    h.engine
        .sweep(SweepScope::Single(Subscription::new(OWNER, "alice")))
        .await;

    let seen = h.source.newer_than_seen().await;
    assert_eq!(seen.len(), 3);
    assert!(seen[0].is_some());
    assert!(seen[1].is_none());
    assert!(seen[2].is_none());
}

#[tokio::test]
async fn undelivered_posts_keep_the_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness().await;
    db::insert_subscription(&h.pool, OWNER, "alice").await.unwrap();
    db::set_cursor(&h.pool, OWNER, "alice", &ItemId::from("100"))
        .await
        .unwrap();
    h.messenger.fail_all.store(true, Ordering::SeqCst);
    h.source
        .set_posts(
            "alice",
            vec![staged_post(dir.path(), "102"), staged_post(dir.path(), "101")],
        )
        .await;

    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.posts, 0);
    assert_eq!(report.failures, 1);
    assert_eq!(cursor_of(&h, "alice").await, Some(ItemId::from("100")));
    assert!(!dir.path().join("101.jpg").exists());
    assert!(!dir.path().join("102.jpg").exists());

    // Once Telegram is back the same posts go out.
    h.messenger.fail_all.store(false, Ordering::SeqCst);
    h.source
        .set_posts("alice", vec![post("102"), post("101")])
        .await;
    let report = h.engine.sweep(SweepScope::All).await;

    assert_eq!(report.posts, 2);
    assert_eq!(report.failures, 0);
    assert_eq!(delivered(&h).await, vec!["post 101", "post 102"]);
    assert_eq!(cursor_of(&h, "alice").await, Some(ItemId::from("102")));
}
