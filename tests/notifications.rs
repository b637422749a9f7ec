mod common;

use common::setup;
use scintilla::common::models::NotificationKind;
use sqlx::Row;

#[tokio::test]
async fn repeat_views_notify_once_but_all_rows_persist() {
    let (engine, sink, db) = setup(&[1, 2]).await;

    engine.record_view(1, 2).await.unwrap();
    engine.record_view(1, 2).await.unwrap();

    // Views are append-only...
    let row = sqlx::query("SELECT COUNT(*) AS n FROM views")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("n"), 2);

    // ...but the notification is deduplicated per ordered pair.
    let notifications = engine.get_notifications(2).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::View);
    assert_eq!(sink.count(2, NotificationKind::View).await, 1);
}

#[tokio::test]
async fn concurrent_views_notify_once() {
    let (engine, sink, db) = setup(&[1, 2]).await;

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move { engine.record_view(1, 2).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Every view lands in the append-only log...
    let row = sqlx::query("SELECT COUNT(*) AS n FROM views")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("n"), 16);

    // ...but exactly one notification survives the race.
    let row = sqlx::query("SELECT COUNT(*) AS n FROM notifications WHERE kind = 'view'")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("n"), 1);
    assert_eq!(sink.count(2, NotificationKind::View).await, 1);
}

#[tokio::test]
async fn view_dedup_is_per_ordered_pair() {
    let (engine, sink, _db) = setup(&[1, 2]).await;

    engine.record_view(1, 2).await.unwrap();
    engine.record_view(2, 1).await.unwrap();

    // Opposite directions do not suppress each other.
    assert_eq!(sink.count(2, NotificationKind::View).await, 1);
    assert_eq!(sink.count(1, NotificationKind::View).await, 1);
}

#[tokio::test]
async fn likes_are_never_deduplicated() {
    let (engine, _sink, _db) = setup(&[1, 2]).await;

    engine.like(1, 2).await.unwrap();
    engine.unlike(1, 2).await.unwrap();
    engine.like(1, 2).await.unwrap();

    let likes = engine
        .get_notifications(2)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Like)
        .count();
    assert_eq!(likes, 2);
}

#[tokio::test]
async fn self_view_leaves_no_trace() {
    let (engine, sink, db) = setup(&[1]).await;

    engine.record_view(1, 1).await.unwrap();

    let row = sqlx::query("SELECT COUNT(*) AS n FROM views")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("n"), 0);
    assert!(sink.events_for(1).await.is_empty());
}

#[tokio::test]
async fn notifications_are_newest_first() {
    let (engine, _sink, _db) = setup(&[1, 2, 3]).await;

    engine.record_view(3, 2).await.unwrap();
    engine.like(1, 2).await.unwrap();

    let notifications = engine.get_notifications(2).await.unwrap();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].kind, NotificationKind::Like);
    assert_eq!(notifications[1].kind, NotificationKind::View);
    assert!(notifications[0].created_at >= notifications[1].created_at);
}

#[tokio::test]
async fn fame_rate_arithmetic() {
    let (engine, _sink, _db) = setup(&[1, 2, 3, 4]).await;

    // No viewers yet.
    assert_eq!(engine.fame_rate(1).await.unwrap(), 0);

    // 1 viewer, 1 liker.
    engine.record_view(2, 1).await.unwrap();
    engine.like(2, 1).await.unwrap();
    assert_eq!(engine.fame_rate(1).await.unwrap(), 1000);

    // 2 viewers, 1 liker.
    engine.record_view(3, 1).await.unwrap();
    assert_eq!(engine.fame_rate(1).await.unwrap(), 500);

    // 3 viewers, 2 likers: 2/3 rounds to 0.67.
    engine.record_view(4, 1).await.unwrap();
    engine.like(3, 1).await.unwrap();
    assert_eq!(engine.fame_rate(1).await.unwrap(), 670);
}

#[tokio::test]
async fn repeat_views_do_not_dilute_fame_rate() {
    let (engine, _sink, _db) = setup(&[1, 2]).await;

    engine.record_view(2, 1).await.unwrap();
    engine.record_view(2, 1).await.unwrap();
    engine.like(2, 1).await.unwrap();

    assert_eq!(engine.fame_rate(1).await.unwrap(), 1000);
}

#[tokio::test]
async fn fame_rate_for_unknown_user_is_not_found() {
    let (engine, _sink, _db) = setup(&[1]).await;
    assert!(engine.fame_rate(99).await.is_err());
}
