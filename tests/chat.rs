mod common;

use common::{matched_pair, setup};
use scintilla::common::models::{now_millis, NotificationKind};
use scintilla::server::error::EngineError;
use std::time::Duration;

#[tokio::test]
async fn message_reaches_the_other_member() {
    let (engine, sink, _db) = setup(&[1, 2]).await;
    let chat_id = matched_pair(&engine, 1, 2).await;

    let message = engine.send_message(1, chat_id, "hi").await.unwrap();

    let events = sink.events_for(2).await;
    let live = events
        .iter()
        .find(|e| e.kind == NotificationKind::Message)
        .expect("live message event");
    assert_eq!(live.data["content"], "hi");
    assert_eq!(live.data["chat_id"], chat_id);
    assert_eq!(live.data["target_id"], message.id);

    // The sender gets no message event of their own.
    assert_eq!(sink.count(1, NotificationKind::Message).await, 0);

    let ledger = engine.get_notifications(2).await.unwrap();
    assert!(ledger.iter().any(|n| n.kind == NotificationKind::Message && n.target_id == message.id));
}

#[tokio::test]
async fn non_member_cannot_send_or_read() {
    let (engine, _sink, _db) = setup(&[1, 2, 3]).await;
    let chat_id = matched_pair(&engine, 1, 2).await;

    assert!(matches!(
        engine.send_message(3, chat_id, "hello").await.unwrap_err(),
        EngineError::NotFound
    ));
    assert!(matches!(
        engine.get_messages(3, chat_id, 0, 10).await.unwrap_err(),
        EngineError::NotFound
    ));
}

#[tokio::test]
async fn message_window_is_newest_first_and_inclusive() {
    let (engine, _sink, _db) = setup(&[1, 2]).await;
    let chat_id = matched_pair(&engine, 1, 2).await;

    for i in 0..5 {
        engine.send_message(1, chat_id, &format!("msg-{}", i)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let window = engine.get_messages(2, chat_id, 0, 1).await.unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].content, "msg-4");
    assert_eq!(window[1].content, "msg-3");

    let rest = engine.get_messages(2, chat_id, 2, 10).await.unwrap();
    assert_eq!(rest.len(), 3);
    assert_eq!(rest[0].content, "msg-2");
}

#[tokio::test]
async fn invalid_message_window_is_bad_request() {
    let (engine, _sink, _db) = setup(&[1, 2]).await;
    let chat_id = matched_pair(&engine, 1, 2).await;

    assert!(matches!(
        engine.get_messages(1, chat_id, 5, 2).await.unwrap_err(),
        EngineError::BadRequest(_)
    ));
}

#[tokio::test]
async fn overlong_message_is_bad_request() {
    let (engine, _sink, _db) = setup(&[1, 2]).await;
    let chat_id = matched_pair(&engine, 1, 2).await;

    let huge = "x".repeat(3000);
    assert!(matches!(
        engine.send_message(1, chat_id, &huge).await.unwrap_err(),
        EngineError::BadRequest(_)
    ));
}

#[tokio::test]
async fn block_hides_only_messages_sent_after_it() {
    let (engine, _sink, _db) = setup(&[1, 2]).await;
    let chat_id = matched_pair(&engine, 1, 2).await;

    engine.send_message(2, chat_id, "before the block").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    engine.block(1, 2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    engine.send_message(2, chat_id, "after the block").await.unwrap();

    // Requester 1 blocked user 2: only the earlier message is visible.
    let for_blocker = engine.get_messages(1, chat_id, 0, 10).await.unwrap();
    assert_eq!(for_blocker.len(), 1);
    assert_eq!(for_blocker[0].content, "before the block");

    // User 2 still sees both sides of the conversation.
    let for_blocked = engine.get_messages(2, chat_id, 0, 10).await.unwrap();
    assert_eq!(for_blocked.len(), 2);
}

#[tokio::test]
async fn event_lifecycle() {
    let (engine, sink, _db) = setup(&[1, 2, 3]).await;
    let chat_id = matched_pair(&engine, 1, 2).await;
    let future = now_millis() + 86_400_000;

    // Non-member cannot create.
    assert!(matches!(
        engine.create_event(3, chat_id, "picnic", 45.0, 7.6, future).await.unwrap_err(),
        EngineError::NotFound
    ));

    // Past-dated event is rejected.
    assert!(matches!(
        engine.create_event(1, chat_id, "picnic", 45.0, 7.6, now_millis() - 1000).await.unwrap_err(),
        EngineError::BadRequest(_)
    ));

    let event = engine.create_event(1, chat_id, "picnic", 45.0, 7.6, future).await.unwrap();
    assert_eq!(event.chat_id, chat_id);

    // Every member is notified, the creator included.
    assert_eq!(sink.count(1, NotificationKind::ChatEvent).await, 1);
    assert_eq!(sink.count(2, NotificationKind::ChatEvent).await, 1);

    // Only one event per chat.
    assert!(matches!(
        engine.create_event(2, chat_id, "dinner", 45.0, 7.6, future).await.unwrap_err(),
        EngineError::Conflict(_)
    ));

    let chat = engine.get_chat(1, chat_id).await.unwrap();
    assert_eq!(chat.event.as_ref().map(|e| e.title.as_str()), Some("picnic"));

    engine.delete_event(2, chat_id).await.unwrap();
    assert!(engine.get_chat(1, chat_id).await.unwrap().event.is_none());

    // Deleting again is not-found, and a new event can now be attached.
    assert!(matches!(engine.delete_event(1, chat_id).await.unwrap_err(), EngineError::NotFound));
    engine.create_event(2, chat_id, "dinner", 45.0, 7.6, future).await.unwrap();
}

#[tokio::test]
async fn end_to_end_match_chat_unmatch() {
    let (engine, sink, _db) = setup(&[1, 2]).await;

    // A likes B: no chat yet, B is notified.
    let outcome = engine.like(1, 2).await.unwrap();
    assert!(!outcome.matched);
    assert_eq!(sink.count(2, NotificationKind::Like).await, 1);

    // B likes A: chat created, A receives like_back with the chat id.
    let outcome = engine.like(2, 1).await.unwrap();
    assert!(outcome.matched);
    let chat_id = outcome.chat_id.unwrap();
    let like_back = sink
        .events_for(1)
        .await
        .into_iter()
        .find(|e| e.kind == NotificationKind::LikeBack)
        .expect("like_back event");
    assert_eq!(like_back.data["chat_id"], chat_id);

    // A says hi; B sees it live.
    engine.send_message(1, chat_id, "hi").await.unwrap();
    let message = sink
        .events_for(2)
        .await
        .into_iter()
        .find(|e| e.kind == NotificationKind::Message)
        .expect("live message");
    assert_eq!(message.data["content"], "hi");

    // A unlikes B: the chat and its history are gone.
    engine.unlike(1, 2).await.unwrap();
    assert_eq!(sink.count(2, NotificationKind::Unlike).await, 1);
    assert!(matches!(
        engine.get_messages(2, chat_id, 0, 10).await.unwrap_err(),
        EngineError::NotFound
    ));
    assert!(engine.list_chats(2).await.unwrap().is_empty());
}
