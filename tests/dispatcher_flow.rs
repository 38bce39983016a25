mod common;

use chat_archiver::cache::{ProcessedMessages, ScopedStatsStore};
use chat_archiver::clock::ManualClock;
use chat_archiver::ingest::{
    AllowAll, AllowList, Collaborators, DispatchOutcome, EventDispatcher, EventSource,
    InboundEvent, MediaRef, MessageContent,
};
use chrono::TimeDelta;
use common::{RecordingReplies, RecordingUploads, StaticContent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    dispatcher: EventDispatcher,
    processed: Arc<ProcessedMessages>,
    stats: Arc<ScopedStatsStore>,
    uploads: Arc<RecordingUploads>,
    replies: Arc<RecordingReplies>,
}

fn harness(uploads: RecordingUploads) -> Harness {
    let clock = Arc::new(ManualClock::ticking(TimeDelta::seconds(1)));
    let processed = Arc::new(ProcessedMessages::with_clock(
        Duration::from_secs(24 * 60 * 60),
        clock.clone(),
    ));
    let stats = Arc::new(ScopedStatsStore::with_clock(clock.clone()));
    let uploads = Arc::new(uploads);
    let replies = Arc::new(RecordingReplies::default());
    let io = Collaborators {
        content: Arc::new(StaticContent(b"payload")),
        uploader: uploads.clone(),
        replies: replies.clone(),
    };
    let dispatcher = EventDispatcher::new(processed.clone(), stats.clone(), io, Arc::new(AllowAll))
        .with_upload_prefix("archive")
        .with_clock(clock);

    Harness {
        dispatcher,
        processed,
        stats,
        uploads,
        replies,
    }
}

fn document(message_id: &str, source: EventSource, name: &str) -> InboundEvent {
    let reply_to = source.group_id().unwrap_or_else(|| source.user_id());
    InboundEvent {
        message_id: message_id.to_string(),
        source,
        reply_to,
        content: MessageContent::File {
            media: MediaRef {
                file_id: format!("file-{message_id}"),
                size: 7,
            },
            file_name: name.to_string(),
        },
    }
}

fn text(message_id: &str, source: EventSource, body: &str) -> InboundEvent {
    let reply_to = source.group_id().unwrap_or_else(|| source.user_id());
    InboundEvent {
        message_id: message_id.to_string(),
        source,
        reply_to,
        content: MessageContent::Text(body.to_string()),
    }
}

const fn group(group_id: i64) -> EventSource {
    EventSource::Group {
        group_id,
        user_id: 7,
    }
}

const DIRECT: EventSource = EventSource::User { user_id: 7 };

#[tokio::test]
async fn test_failed_upload_is_retried_on_redelivery() {
    let h = harness(RecordingUploads::failing_once("x123.pdf"));
    let event = document("x123", group(-1), "x123.pdf");

    assert!(h.dispatcher.handle_event(&event).await.is_err());
    assert!(!h.processed.is_processed("x123").await);
    assert_eq!(h.stats.get_stats("-1").await.total_uploads, 0);

    let outcome = h.dispatcher.handle_event(&event).await.expect("retry succeeds");
    assert!(matches!(outcome, DispatchOutcome::Uploaded { .. }));
    assert!(h.processed.is_processed("x123").await);

    let outcome = h.dispatcher.handle_event(&event).await.expect("duplicate");
    assert_eq!(outcome, DispatchOutcome::Duplicate);

    assert_eq!(h.stats.get_stats("-1").await.total_uploads, 1);
    assert_eq!(
        h.uploads.uploaded(),
        vec![("archive/chat--1".to_string(), "x123.pdf".to_string())]
    );
}

#[tokio::test]
async fn test_aggregate_over_groups_and_direct_chats() {
    let h = harness(RecordingUploads::default());
    let batch = vec![
        document("g1-1", group(1), "a.pdf"),
        document("g1-2", group(1), "b.pdf"),
        document("g2-1", group(2), "c.pdf"),
        document("d-1", DIRECT, "d.pdf"),
        document("g2-2", group(2), "e.pdf"),
        document("g1-3", group(1), "f.pdf"),
    ];

    let results = h.dispatcher.handle_batch(&batch).await;
    assert!(results.iter().all(Result::is_ok));

    assert_eq!(h.stats.get_stats("1").await.total_uploads, 3);
    assert_eq!(h.stats.get_stats("2").await.total_uploads, 2);
    assert_eq!(h.stats.get_stats("direct").await.total_uploads, 1);

    let aggregate = h.stats.get_aggregate_stats().await;
    assert_eq!(aggregate.total_uploads, 6);
    let names: Vec<_> = aggregate.recent_files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["f.pdf", "e.pdf", "d.pdf", "c.pdf", "b.pdf"]);
    assert_eq!(
        aggregate.last_upload,
        Some(aggregate.recent_files[0].uploaded_at)
    );
}

#[tokio::test]
async fn test_batch_continues_after_failure() {
    let h = harness(RecordingUploads::failing_once("bad.pdf"));
    let batch = vec![
        document("m1", DIRECT, "bad.pdf"),
        document("m2", DIRECT, "good.pdf"),
    ];

    let results = h.dispatcher.handle_batch(&batch).await;

    assert!(results[0].is_err());
    assert!(results[1].is_ok());
    assert!(!h.processed.is_processed("m1").await);
    assert!(h.processed.is_processed("m2").await);
    assert_eq!(h.stats.get_stats("direct").await.total_uploads, 1);
}

#[tokio::test]
async fn test_stats_command_in_group_and_direct_chat() {
    let h = harness(RecordingUploads::default());
    h.dispatcher
        .handle_batch(&[
            document("g1", group(-5), "group.pdf"),
            document("d1", DIRECT, "mine.pdf"),
        ])
        .await;

    h.dispatcher
        .handle_event(&text("g2", group(-5), "/stats"))
        .await
        .expect("group stats");
    h.dispatcher
        .handle_event(&text("d2", DIRECT, "/stats@archive_bot"))
        .await
        .expect("aggregate stats");

    let sent = h.replies.sent();
    assert_eq!(sent.len(), 2);

    let (chat, group_reply) = &sent[0];
    assert_eq!(*chat, -5);
    assert!(group_reply.starts_with("📊 Group Statistics"));
    assert!(group_reply.contains("Total uploads: 1"));
    assert!(group_reply.contains("group.pdf"));
    assert!(!group_reply.contains("mine.pdf"));

    let (chat, direct_reply) = &sent[1];
    assert_eq!(*chat, 7);
    assert!(direct_reply.starts_with("📊 Upload Statistics"));
    assert!(direct_reply.contains("Total uploads: 2"));
}

#[tokio::test]
async fn test_stats_for_empty_group() {
    let h = harness(RecordingUploads::default());

    h.dispatcher
        .handle_event(&text("q", group(-9), "/stats"))
        .await
        .expect("stats");

    let sent = h.replies.sent();
    assert!(sent[0].1.contains("Total uploads: 0"));
    assert!(sent[0].1.contains("Last upload: never"));
    assert!(sent[0].1.contains("No recent uploads found."));
    assert_eq!(h.stats.scope_count().await, 0);
}

#[tokio::test]
async fn test_denied_user_is_not_archived() {
    let clock = Arc::new(ManualClock::default());
    let processed = Arc::new(ProcessedMessages::with_clock(
        Duration::from_secs(60),
        clock.clone(),
    ));
    let stats = Arc::new(ScopedStatsStore::with_clock(clock));
    let uploads = Arc::new(RecordingUploads::default());
    let io = Collaborators {
        content: Arc::new(StaticContent(b"payload")),
        uploader: uploads.clone(),
        replies: Arc::new(RecordingReplies::broken()),
    };
    let access = Arc::new(AllowList::new(HashSet::from([1])));
    let dispatcher = EventDispatcher::new(processed.clone(), stats.clone(), io, access);

    let outcome = dispatcher
        .handle_event(&document("m", DIRECT, "secret.pdf"))
        .await
        .expect("denial is not an error");

    assert_eq!(outcome, DispatchOutcome::Denied);
    assert!(uploads.uploaded().is_empty());
    assert!(processed.is_empty().await);
    assert_eq!(stats.scope_count().await, 0);
}

#[tokio::test]
async fn test_aggregate_of_five_uploads() {
    let stats = ScopedStatsStore::with_clock(Arc::new(ManualClock::ticking(TimeDelta::seconds(1))));
    stats.record_upload("group1", "1.jpg").await;
    stats.record_upload("direct", "2.jpg").await;
    stats.record_upload("group2", "3.jpg").await;
    stats.record_upload("group1", "4.jpg").await;
    stats.record_upload("direct", "5.jpg").await;

    let aggregate = stats.get_aggregate_stats().await;
    assert_eq!(aggregate.total_uploads, 5);
    let names: Vec<_> = aggregate.recent_files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["5.jpg", "4.jpg", "3.jpg", "2.jpg", "1.jpg"]);
}
