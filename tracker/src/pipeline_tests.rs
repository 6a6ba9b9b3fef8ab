//! End-to-end tracker pipeline tests: processor -> dispatcher -> transport,
//! driven through mock collaborators with call logs.

use std::sync::Arc;

use inu_types::{ChannelId, Mention, MessageId, RoleId, StatusStore};

use crate::destinations::Destination;
use crate::fanout::Dispatcher;
use crate::mocks::{ChatCall, MemoryStatusStore, MockChat};
use crate::processor::{NotableList, SnapshotProcessor};

fn pipeline() -> (
    SnapshotProcessor,
    Dispatcher<MockChat, MemoryStatusStore>,
    Arc<MockChat>,
    Arc<MemoryStatusStore>,
) {
    let chat = Arc::new(MockChat::default());
    let store = Arc::new(MemoryStatusStore::default());
    let dispatcher = Dispatcher::new(chat.clone(), store.clone());
    (
        SnapshotProcessor::new(NotableList::default()),
        dispatcher,
        chat,
        store,
    )
}

fn seeds(names: &[(&str, u64)], weather: &str) -> String {
    let items: Vec<String> = names
        .iter()
        .map(|(name, qty)| format!("{{\"name\":\"{name}\",\"quantity\":{qty}}}"))
        .collect();
    format!(
        "{{\"data\":{{\"seeds\":[{}],\"weather\":{{\"type\":\"{weather}\"}}}}}}",
        items.join(",")
    )
}

#[tokio::test]
async fn test_feed_scenario_baseline_duplicate_then_notable_addition() {
    let (mut processor, dispatcher, chat, _store) = pipeline();
    let destination = Destination::new(ChannelId(10));

    // Baseline: no update, nothing delivered.
    assert!(processor.ingest(&seeds(&[("Cacao", 2)], "Rain")).is_none());
    // Identical logical snapshot: still nothing.
    assert!(processor.ingest(&seeds(&[("Cacao", 2)], "Rain")).is_none());
    assert!(chat.calls().is_empty());

    // Beanstalk appears: exactly one update, alert names it but not Cacao.
    let update = processor
        .ingest(&seeds(&[("Cacao", 2), ("Beanstalk", 1)], "Rain"))
        .expect("new item must emit an update");
    let reports = dispatcher.dispatch(&update, &[destination]).await;
    assert!(reports.iter().all(|r| r.is_ok()));

    let calls = chat.calls();
    // Alert first, then the fresh status message.
    assert_eq!(calls.len(), 2);
    let ChatCall::Send { content, .. } = &calls[0] else {
        panic!("expected the alert send first, got {calls:?}");
    };
    assert!(content.contains("Beanstalk"));
    assert!(!content.contains("Cacao"));
    let ChatCall::Send { content, .. } = &calls[1] else {
        panic!("expected the status send second, got {calls:?}");
    };
    assert!(content.contains("Cacao"));
}

#[tokio::test]
async fn test_status_message_is_edited_in_place_on_later_changes() {
    let (mut processor, dispatcher, chat, store) = pipeline();
    let destination = Destination::new(ChannelId(10));

    processor.ingest(&seeds(&[("Carrot", 1)], "Rain"));
    let first = processor
        .ingest(&seeds(&[("Carrot", 1), ("Tomato", 1)], "Rain"))
        .unwrap();
    dispatcher.dispatch(&first, &[destination]).await;
    let status_id = store.status_message(ChannelId(10)).await.unwrap().unwrap();

    let second = processor
        .ingest(&seeds(&[("Carrot", 1), ("Tomato", 1), ("Corn", 1)], "Rain"))
        .unwrap();
    dispatcher.dispatch(&second, &[destination]).await;

    // Same tracked message, edited rather than resent.
    assert_eq!(
        store.status_message(ChannelId(10)).await.unwrap(),
        Some(status_id)
    );
    assert_eq!(chat.live_messages(ChannelId(10)), vec![status_id]);
    let content = chat.content_of(ChannelId(10), status_id).unwrap();
    assert!(content.contains("Corn"));
}

#[tokio::test]
async fn test_stale_status_pointer_falls_back_to_fresh_send() {
    let (mut processor, dispatcher, chat, store) = pipeline();
    let channel = ChannelId(10);
    store.preset_status(channel, MessageId(9999)); // points at nothing

    processor.ingest(&seeds(&[("Carrot", 1)], "Rain"));
    let update = processor
        .ingest(&seeds(&[("Carrot", 1), ("Tomato", 1)], "Rain"))
        .unwrap();
    let reports = dispatcher.dispatch(&update, &[Destination::new(channel)]).await;
    assert!(reports[0].is_ok());

    let new_id = store.status_message(channel).await.unwrap().unwrap();
    assert_ne!(new_id, MessageId(9999));
    assert_eq!(chat.live_messages(channel), vec![new_id]);
}

#[tokio::test]
async fn test_repeated_alerts_leave_exactly_one_live_message() {
    let (mut processor, dispatcher, chat, _store) = pipeline();
    let channel = ChannelId(10);
    let destination = Destination::new(channel);

    processor.ingest(&seeds(&[("Carrot", 1)], "Rain"));
    let notable_rotation = [
        vec![("Carrot", 1), ("Beanstalk", 1)],
        vec![("Carrot", 1), ("Cacao", 1)],
        vec![("Carrot", 1), ("Grape", 1)],
        vec![("Carrot", 1), ("Lotus", 1)],
    ];
    for rotation in &notable_rotation {
        let update = processor.ingest(&seeds(rotation, "Rain")).unwrap();
        assert!(!update.notable.is_empty());
        dispatcher.dispatch(&update, &[destination]).await;
    }

    // One status message plus exactly one alert, never an accumulation.
    assert_eq!(chat.live_messages(channel).len(), 2);

    // Every alert send after the first was preceded by the delete of the
    // previously tracked alert.
    let calls = chat.calls();
    let mut tracked_alert: Option<MessageId> = None;
    let mut alert_sends = 0;
    let mut index = 0;
    while index < calls.len() {
        match &calls[index] {
            ChatCall::Send { message, content, .. } if content.contains("Rare items") => {
                if let Some(previous) = tracked_alert {
                    assert!(
                        matches!(
                            &calls[index - 1],
                            ChatCall::Delete { message, .. } if *message == previous
                        ),
                        "alert send was not preceded by delete of {previous}: {calls:?}"
                    );
                }
                tracked_alert = Some(*message);
                alert_sends += 1;
            }
            _ => {}
        }
        index += 1;
    }
    assert_eq!(alert_sends, notable_rotation.len());
}

#[tokio::test]
async fn test_failing_destination_does_not_block_siblings() {
    let (mut processor, dispatcher, chat, _store) = pipeline();
    let destinations: Vec<Destination> =
        (1..=5).map(|n| Destination::new(ChannelId(n))).collect();
    chat.break_channel(ChannelId(3));

    processor.ingest(&seeds(&[("Carrot", 1)], "Rain"));
    let update = processor
        .ingest(&seeds(&[("Carrot", 1), ("Tomato", 1)], "Rain"))
        .unwrap();
    let reports = dispatcher.dispatch(&update, &destinations).await;

    assert_eq!(reports.len(), 5);
    for report in &reports {
        if report.destination == ChannelId(3) {
            assert!(!report.is_ok(), "broken destination must be reported");
        } else {
            assert!(report.is_ok(), "sibling destination failed: {report:?}");
            assert_eq!(chat.live_messages(report.destination).len(), 1);
        }
    }
}

#[tokio::test]
async fn test_alert_carries_the_destination_mention() {
    let (mut processor, dispatcher, chat, _store) = pipeline();
    let destination = Destination::with_ping_role(ChannelId(10), RoleId(77));

    processor.ingest(&seeds(&[("Carrot", 1)], "Rain"));
    let update = processor
        .ingest(&seeds(&[("Carrot", 1), ("Beanstalk", 1)], "Rain"))
        .unwrap();
    dispatcher.dispatch(&update, &[destination]).await;

    let calls = chat.calls();
    let ChatCall::Send { mention, .. } = &calls[0] else {
        panic!("expected alert send first");
    };
    assert_eq!(*mention, Mention::Role(RoleId(77)));
}
