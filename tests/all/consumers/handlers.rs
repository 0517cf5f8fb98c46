use crate::helpers::{
    envelope, order, raw_message, RecordingNotifier, ScriptedClient, Step, ENDPOINT,
};
use async_trait::async_trait;
use queue_poller::consumers::{
    Handler, HandlerError, Incoming, PollerConfig, QueuePoller, StopReason,
};
use queue_poller::decoding::{DecodedMessage, Format};
use queue_poller::queue::InMemoryQueue;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;

#[derive(Default)]
struct Context {
    handled: Mutex<Vec<Arc<DecodedMessage>>>,
}

async fn fail_on_id_2(incoming: Incoming<Context>) -> Result<(), anyhow::Error> {
    let record = incoming
        .message
        .as_record()
        .ok_or_else(|| anyhow::anyhow!("Expected a single order"))?;
    if record.get("id")?.as_u64() == Some(2) {
        anyhow::bail!("Order 2 is cursed");
    }
    incoming.context.handled.lock().unwrap().push(incoming.message.clone());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn a_failing_message_is_reported_and_kept_while_the_rest_of_the_batch_is_processed() {
    // Arrange
    let context = Arc::new(Context::default());
    let notifier = RecordingNotifier::default();
    let client = ScriptedClient::new([Step::Batch(vec![
        raw_message("1", envelope(&order(1))),
        raw_message("2", envelope(&order(2))),
        raw_message("3", envelope(&order(3))),
    ])]);
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), client.clone(), context.clone())
        .with_notifier(notifier.clone())
        .handler(fail_on_id_2)
        .unwrap();

    // Act
    let summary = poller.poll().await.unwrap();

    // Assert
    assert_eq!(client.deleted(), vec!["1".to_owned(), "3".to_owned()]);
    assert_eq!(context.handled.lock().unwrap().len(), 2);
    assert_eq!(summary.stats.received_message_count, 3);
    assert_eq!(summary.stats.handled_message_count, 2);
    assert_eq!(summary.stats.failed_message_count, 1);

    let reports = notifier.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].label.ends_with("failed to process message"));
    assert!(reports[0].payload.contains(r#""id":2"#));
    assert!(!reports[0].decode_failure);
    assert!(notifier.logged(Level::ERROR, "Exception: The message handler failed."));
    assert!(notifier.logged(Level::ERROR, "caused by: Order 2 is cursed"));
}

#[tokio::test(start_paused = true)]
async fn undecodable_messages_are_reported_with_their_raw_body() {
    // Arrange
    let context = Arc::new(Context::default());
    let notifier = RecordingNotifier::default();
    let client = ScriptedClient::new([Step::Batch(vec![
        raw_message("broken", "this is not an envelope"),
        raw_message("fine", envelope(&order(1))),
    ])]);
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), client.clone(), context.clone())
        .with_notifier(notifier.clone())
        .handler(fail_on_id_2)
        .unwrap();

    // Act
    let summary = poller.poll().await.unwrap();

    // Assert
    assert_eq!(client.deleted(), vec!["fine".to_owned()]);
    assert_eq!(summary.stats.failed_message_count, 1);
    let reports = notifier.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].decode_failure);
    assert_eq!(reports[0].payload, "this is not an envelope");
    assert_eq!(reports[0].error, "Failed to decode the message.");
}

#[tokio::test(start_paused = true)]
async fn an_unsupported_format_fails_every_message_without_stopping_the_poller() {
    // Arrange
    let context = Arc::new(Context::default());
    let notifier = RecordingNotifier::default();
    let client = ScriptedClient::new([Step::Batch(vec![
        raw_message("1", envelope("<order id='1'/>")),
        raw_message("2", envelope("<order id='2'/>")),
    ])]);
    let config = PollerConfig::new(ENDPOINT).with_format("xml");
    let poller = QueuePoller::builder(config, client.clone(), context.clone())
        .with_notifier(notifier.clone())
        .handler(fail_on_id_2)
        .unwrap();

    // Act
    let summary = poller.poll().await.unwrap();

    // Assert
    assert_eq!(summary.stop_reason, StopReason::IdleTimeout);
    assert!(client.deleted().is_empty());
    assert!(context.handled.lock().unwrap().is_empty());
    assert_eq!(notifier.reports().len(), 2);
    assert!(notifier.logged(Level::ERROR, "Unknown format `xml`"));
}

#[tokio::test(start_paused = true)]
async fn a_panicking_handler_is_isolated_like_any_other_failure() {
    // Arrange
    struct PanicOnFirst;

    #[async_trait]
    impl Handler<()> for PanicOnFirst {
        async fn handle(&self, incoming: Incoming<()>) -> Result<(), HandlerError> {
            if incoming.message_id == "1" {
                panic!("handler blew up");
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "PanicOnFirst"
        }
    }

    let notifier = RecordingNotifier::default();
    let client = ScriptedClient::new([Step::Batch(vec![
        raw_message("1", envelope(&order(1))),
        raw_message("2", envelope(&order(2))),
    ])]);
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), client.clone(), ())
        .with_notifier(notifier.clone())
        .raw_handler(PanicOnFirst)
        .unwrap();

    // Act
    let summary = poller.poll().await.unwrap();

    // Assert
    assert_eq!(client.deleted(), vec!["2".to_owned()]);
    assert_eq!(summary.stats.failed_message_count, 1);
    let reports = notifier.reports();
    assert_eq!(reports[0].label, "PanicOnFirst failed to process message");
    assert_eq!(reports[0].error, "The message handler panicked: handler blew up");
}

#[tokio::test(start_paused = true)]
async fn handlers_relying_on_the_default_implementation_never_delete_messages() {
    // Arrange
    struct Unfinished;
    impl Handler<()> for Unfinished {}

    let notifier = RecordingNotifier::default();
    let client = ScriptedClient::new([Step::Batch(vec![raw_message("1", envelope(&order(1)))])]);
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), client.clone(), ())
        .with_notifier(notifier.clone())
        .raw_handler(Unfinished)
        .unwrap();

    // Act
    poller.poll().await.unwrap();

    // Assert
    assert!(client.deleted().is_empty());
    assert!(notifier.logged(Level::ERROR, "does not implement `Handler::handle`"));
}

#[tokio::test(start_paused = true)]
async fn csv_payloads_reach_the_handler_as_a_sequence_of_records() {
    // Arrange
    async fn handler(incoming: Incoming<Context>) -> Result<(), HandlerError> {
        incoming.context.handled.lock().unwrap().push(incoming.message.clone());
        Ok(())
    }

    let context = Arc::new(Context::default());
    let client = ScriptedClient::new([Step::Batch(vec![raw_message(
        "1",
        envelope("id,customer\n1,Ann\n2,Bob\n"),
    )])]);
    let config = PollerConfig::new(ENDPOINT).with_format(Format::Csv);
    let poller = QueuePoller::builder(config, client.clone(), context.clone())
        .with_notifier(RecordingNotifier::default())
        .handler(handler)
        .unwrap();

    // Act
    poller.poll().await.unwrap();

    // Assert
    let handled = context.handled.lock().unwrap();
    let records = handled[0].records();
    assert!(matches!(*handled[0], DecodedMessage::Records(_)));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("id").unwrap().as_str(), Some("1"));
    assert_eq!(records[1].get("customer").unwrap().as_str(), Some("Bob"));
    assert_eq!(client.deleted(), vec!["1".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn failed_messages_are_redelivered_by_the_queue_on_a_later_receive() {
    // Arrange
    #[derive(Default)]
    struct Attempts {
        receive_counts: Mutex<Vec<u32>>,
    }

    async fn fail_first_attempt(incoming: Incoming<Attempts>) -> Result<(), anyhow::Error> {
        incoming
            .context
            .receive_counts
            .lock()
            .unwrap()
            .push(incoming.receive_count);
        if incoming.receive_count == 1 {
            anyhow::bail!("Try again later");
        }
        Ok(())
    }

    let queue = InMemoryQueue::with_visibility_timeout(Duration::from_secs(5));
    queue.send(ENDPOINT, envelope(&order(1)));
    let context = Arc::new(Attempts::default());
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), queue.clone(), context.clone())
        .with_notifier(RecordingNotifier::default())
        .handler(fail_first_attempt)
        .unwrap();

    // Act
    let summary = poller.poll().await.unwrap();

    // Assert
    assert_eq!(*context.receive_counts.lock().unwrap(), vec![1, 2]);
    assert_eq!(summary.stats.failed_message_count, 1);
    assert_eq!(summary.stats.handled_message_count, 1);
    assert!(queue.is_empty(ENDPOINT));
}

#[tokio::test(start_paused = true)]
async fn every_raw_body_is_logged_through_the_notifier_before_decoding() {
    // Arrange
    let notifier = RecordingNotifier::default();
    let valid = envelope(&order(1));
    let client = ScriptedClient::new([Step::Batch(vec![
        raw_message("1", valid.clone()),
        raw_message("2", "this is not an envelope"),
    ])]);
    let poller = QueuePoller::builder(PollerConfig::new(ENDPOINT), client, Context::default())
        .with_notifier(notifier.clone())
        .handler(fail_on_id_2)
        .unwrap();

    // Act
    poller.poll().await.unwrap();

    // Assert
    assert!(notifier.logged(Level::INFO, &format!("Received JSON payload: {valid}")));
    assert!(notifier.logged(
        Level::INFO,
        "Received JSON payload: this is not an envelope"
    ));
}

#[tokio::test(start_paused = true)]
async fn reported_payloads_keep_the_field_order_of_the_message() {
    // Arrange
    async fn reject(_incoming: Incoming<()>) -> Result<(), anyhow::Error> {
        anyhow::bail!("Not today")
    }

    let notifier = RecordingNotifier::default();
    let client = ScriptedClient::new([Step::Batch(vec![raw_message(
        "1",
        envelope("qty,id\n5,1\n"),
    )])]);
    let config = PollerConfig::new(ENDPOINT).with_format(Format::Csv);
    let poller = QueuePoller::builder(config, client, ())
        .with_notifier(notifier.clone())
        .handler(reject)
        .unwrap();

    // Act
    poller.poll().await.unwrap();

    // Assert
    assert_eq!(notifier.reports()[0].payload, r#"[{"qty":"5","id":"1"}]"#);
}
