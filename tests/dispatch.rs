//! Fan-out behavior of the dispatcher against a recording sender.

mod helpers;

use alertgram::dispatch::{Dispatcher, FanOutOrder};
use alertgram::formatting::{AlertFormatter, MessageTemplates};
use alertgram::store::InMemoryStore;
use alertgram::{AlertBatch, ChatId, ParseMode, RenderedMessage};
use helpers::mock_sender::RecordingSender;
use helpers::{alert, batch, DISK_FULL_PAYLOAD};
use std::sync::Arc;
use std::time::Duration;

fn message(text: &str) -> RenderedMessage {
    RenderedMessage {
        severity: "warning".to_string(),
        text: text.to_string(),
    }
}

fn ids(raw: &[&str]) -> Vec<ChatId> {
    raw.iter().copied().map(ChatId::from).collect()
}

fn dispatcher(sender: &RecordingSender, order: FanOutOrder) -> Dispatcher {
    Dispatcher::new(Arc::new(sender.clone()), order, Duration::from_secs(1))
}

fn render(batch: &AlertBatch) -> Vec<RenderedMessage> {
    let formatter = AlertFormatter::new(MessageTemplates::builtin().unwrap());
    formatter.render(batch).collect::<Result<_, _>>().unwrap()
}

#[tokio::test]
async fn test_message_major_order_sends_each_message_to_everyone_first() {
    let sender = RecordingSender::new();
    let report = dispatcher(&sender, FanOutOrder::MessageMajor)
        .dispatch(&[message("m1"), message("m2")], &ids(&["s1", "s2"]))
        .await;

    assert_eq!(report.attempted(), 4);
    assert_eq!(report.delivered(), 4);
    let sent: Vec<(String, String)> = sender
        .sent()
        .into_iter()
        .map(|m| (m.text, m.chat_id.to_string()))
        .collect();
    assert_eq!(
        sent,
        vec![
            ("m1".to_string(), "s1".to_string()),
            ("m1".to_string(), "s2".to_string()),
            ("m2".to_string(), "s1".to_string()),
            ("m2".to_string(), "s2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_subscriber_major_order_sends_everything_to_one_chat_first() {
    let sender = RecordingSender::new();
    dispatcher(&sender, FanOutOrder::SubscriberMajor)
        .dispatch(&[message("m1"), message("m2")], &ids(&["s1", "s2"]))
        .await;

    let sent: Vec<(String, String)> = sender
        .sent()
        .into_iter()
        .map(|m| (m.text, m.chat_id.to_string()))
        .collect();
    assert_eq!(
        sent,
        vec![
            ("m1".to_string(), "s1".to_string()),
            ("m2".to_string(), "s1".to_string()),
            ("m1".to_string(), "s2".to_string()),
            ("m2".to_string(), "s2".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_failed_subscriber_does_not_stop_the_others() {
    let sender = RecordingSender::new().failing_for("blocked");
    let report = dispatcher(&sender, FanOutOrder::MessageMajor)
        .dispatch(&[message("m1"), message("m2")], &ids(&["a", "blocked", "b"]))
        .await;

    assert_eq!(report.attempted(), 6);
    assert_eq!(report.delivered(), 4);
    assert_eq!(report.failed(), 2);
    assert!(report
        .failures()
        .all(|outcome| outcome.chat_id.as_str() == "blocked"));
    let failed_indexes: Vec<usize> = report.failures().map(|o| o.message_index).collect();
    assert_eq!(failed_indexes, vec![0, 1]);
    assert_eq!(sender.attempts().len(), 6);
}

#[tokio::test]
async fn test_no_subscribers_means_no_sends() {
    let sender = RecordingSender::new();
    let report = dispatcher(&sender, FanOutOrder::MessageMajor)
        .dispatch(&[message("m1")], &[])
        .await;

    assert_eq!(report.attempted(), 0);
    assert!(sender.attempts().is_empty());
}

#[tokio::test]
async fn test_disk_full_alert_reaches_every_subscriber() {
    let batch = AlertBatch::from_json(DISK_FULL_PAYLOAD.as_bytes()).unwrap();
    let messages = render(&batch);
    assert_eq!(messages.len(), 1);

    let store = InMemoryStore::with_subscribers(["111", "222"]);
    let sender = RecordingSender::new();
    let report = dispatcher(&sender, FanOutOrder::MessageMajor)
        .deliver(&store, &messages)
        .await
        .unwrap();

    assert_eq!(report.delivered(), 2);
    let sent = sender.sent();
    assert_eq!(sent[0].chat_id.as_str(), "111");
    assert_eq!(sent[1].chat_id.as_str(), "222");
    for msg in &sent {
        assert_eq!(msg.mode, ParseMode::Html);
        assert!(msg.text.contains("⛔"));
        assert!(msg.text.contains("Critical"));
        assert!(msg.text.contains("disk full"));
        assert!(msg.text.contains("95% used"));
        assert!(msg.text.contains("http://x"));
    }
    assert_eq!(sent[0].text, sent[1].text);
}

#[tokio::test]
async fn test_messages_follow_alert_order() {
    let messages = render(&batch(vec![
        alert("warning", "first"),
        alert("info", "second"),
        alert("critical", "third"),
    ]));

    let sender = RecordingSender::new();
    dispatcher(&sender, FanOutOrder::MessageMajor)
        .dispatch(&messages, &ids(&["only"]))
        .await;

    let texts: Vec<String> = sender.sent().into_iter().map(|m| m.text).collect();
    assert_eq!(texts.len(), 3);
    assert!(texts[0].contains("first"));
    assert!(texts[1].contains("second"));
    assert!(texts[2].contains("third"));
}
