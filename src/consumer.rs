use crate::broker::Broker;
use crate::config::Config;
use crate::error::ConsumerError;
use crate::handler::MessageHandler;
use futures::{Stream, StreamExt};
use lapin::options::BasicConsumeOptions;
use lapin::types::FieldTable;
use log::{debug, error, info, warn};
use std::fmt::Display;
use std::future::Future;

const PREVIEW_LEN: usize = 120;

/// Consumes the configured queue until `shutdown` resolves.
///
/// Deliveries are auto-acknowledged by the broker on send, so a message is
/// already gone by the time the handler sees it, whatever the outcome.
pub async fn run<H, F>(
    broker: &Broker,
    config: &Config,
    handler: &mut H,
    shutdown: F,
) -> Result<(), ConsumerError>
where
    H: MessageHandler,
    F: Future<Output = ()>,
{
    let consumer = broker
        .channel()
        .basic_consume(
            &config.queue,
            &config.consumer_tag,
            consume_options(),
            FieldTable::default(),
        )
        .await?;

    info!("Waiting for messages on '{}'", config.queue);

    let deliveries = consumer.map(|delivery| delivery.map(|d| d.data));
    consume_until(deliveries, handler, shutdown).await
}

fn consume_options() -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_ack: true,
        ..BasicConsumeOptions::default()
    }
}

/// Dispatches deliveries until `shutdown` resolves, which is the only clean exit.
///
/// The stream ending on its own means the broker cancelled the consumer and is
/// reported as an error.
pub async fn consume_until<S, E, H, F>(
    deliveries: S,
    handler: &mut H,
    shutdown: F,
) -> Result<(), ConsumerError>
where
    S: Stream<Item = Result<Vec<u8>, E>>,
    E: Display,
    H: MessageHandler,
    F: Future<Output = ()>,
{
    tokio::select! {
        result = dispatch(deliveries, handler) => {
            let received = result?;
            error!("Delivery stream terminated unexpectedly after {} messages", received);
            Err(ConsumerError::DeliveryError(format!(
                "delivery stream ended after {} messages",
                received
            )))
        }
        _ = shutdown => {
            info!("Shutdown requested, stopping consumer");
            Ok(())
        }
    }
}

/// Feeds each payload to the handler in arrival order.
///
/// A handler failure is logged and the loop moves on, except a closed
/// output pipe, which ends the loop. A stream error ends the loop too.
/// Returns the number of payloads received.
pub async fn dispatch<S, E, H>(deliveries: S, handler: &mut H) -> Result<u64, ConsumerError>
where
    S: Stream<Item = Result<Vec<u8>, E>>,
    E: Display,
    H: MessageHandler,
{
    futures::pin_mut!(deliveries);
    let mut received = 0u64;

    while let Some(delivery) = deliveries.next().await {
        let payload = delivery.map_err(|e| ConsumerError::DeliveryError(e.to_string()))?;
        received += 1;
        debug!("Delivery #{} ({} bytes)", received, payload.len());

        if let Err(e) = handler.on_message(&payload) {
            if is_broken_pipe(&e) {
                error!("Output closed while handling message #{}: {}", received, e);
                return Err(e);
            }
            error!("Failed to handle message #{}: {}", received, e);
            warn!("Dropped payload: {}", preview(&payload));
        }
    }

    info!("Delivery stream ended after {} messages", received);
    Ok(received)
}

fn is_broken_pipe(err: &ConsumerError) -> bool {
    matches!(err, ConsumerError::IoError(io) if io.kind() == std::io::ErrorKind::BrokenPipe)
}

fn preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.chars().count() > PREVIEW_LEN {
        let head: String = text.chars().take(PREVIEW_LEN).collect();
        format!("{}...", head)
    } else {
        text.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::PrintHandler;
    use futures::stream;
    use std::io;

    struct ClosedPipe;

    impl io::Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Recording {
        seen: Vec<Vec<u8>>,
        fail_on: Option<usize>,
    }

    impl MessageHandler for Recording {
        fn on_message(&mut self, payload: &[u8]) -> Result<(), ConsumerError> {
            self.seen.push(payload.to_vec());
            if self.fail_on == Some(self.seen.len()) {
                return Err(ConsumerError::NotAnObject("a string"));
            }
            Ok(())
        }
    }

    fn ok(payload: &str) -> Result<Vec<u8>, String> {
        Ok(payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn two_messages_print_two_blocks_in_order() {
        let deliveries = stream::iter(vec![ok(r#"{"User":"alice"}"#), ok(r#"{"User":"bob"}"#)]);
        let mut handler = PrintHandler::new(Vec::new());

        let received = dispatch(deliveries, &mut handler).await.unwrap();
        let out = String::from_utf8(handler.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(received, 2);
        assert_eq!(lines.len(), 14);
        assert_eq!(lines[0], "User Info: alice");
        assert_eq!(lines[6], "Wi-Fi Signal Strength: None");
        assert_eq!(lines[7], "User Info: bob");
    }

    #[tokio::test]
    async fn handler_failure_does_not_stop_consumption() {
        let deliveries = stream::iter(vec![ok("first"), ok("second"), ok("third")]);
        let mut handler = Recording {
            seen: Vec::new(),
            fail_on: Some(2),
        };

        let received = dispatch(deliveries, &mut handler).await.unwrap();

        assert_eq!(received, 3);
        assert_eq!(handler.seen, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[tokio::test]
    async fn malformed_json_is_skipped_between_valid_messages() {
        let deliveries = stream::iter(vec![
            ok(r#"{"OS":"iOS"}"#),
            ok("Geolocation not enabled."),
            ok(r#"{"OS":"Android"}"#),
        ]);
        let mut handler = PrintHandler::new(Vec::new());

        let received = dispatch(deliveries, &mut handler).await.unwrap();
        let out = String::from_utf8(handler.into_inner()).unwrap();

        assert_eq!(received, 3);
        assert_eq!(out.lines().count(), 14);
        assert!(out.contains("OS: iOS\n"));
        assert!(out.contains("OS: Android\n"));
    }

    #[tokio::test]
    async fn stream_error_ends_the_loop() {
        let deliveries = stream::iter(vec![
            ok("{}"),
            Err("channel closed".to_string()),
            ok("{}"),
        ]);
        let mut handler = Recording {
            seen: Vec::new(),
            fail_on: None,
        };

        let err = dispatch(deliveries, &mut handler).await.unwrap_err();

        assert!(matches!(err, ConsumerError::DeliveryError(ref msg) if msg == "channel closed"));
        assert_eq!(handler.seen.len(), 1);
    }

    #[tokio::test]
    async fn closed_output_stops_the_loop() {
        let deliveries = stream::iter(vec![ok("{}"), ok("{}")]);
        let mut handler = PrintHandler::new(ClosedPipe);

        let err = dispatch(deliveries, &mut handler).await.unwrap_err();

        assert!(matches!(err, ConsumerError::IoError(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn stream_end_is_reported_as_an_error() {
        let deliveries = stream::iter(vec![ok(r#"{"User":"alice"}"#)]);
        let mut handler = Recording {
            seen: Vec::new(),
            fail_on: None,
        };

        let err = consume_until(deliveries, &mut handler, std::future::pending::<()>())
            .await
            .unwrap_err();

        assert!(matches!(err, ConsumerError::DeliveryError(ref msg) if msg.contains("ended after 1 messages")));
        assert_eq!(handler.seen.len(), 1);
    }

    #[tokio::test]
    async fn stream_error_propagates_through_consume_until() {
        let deliveries = stream::iter(vec![Err::<Vec<u8>, String>("connection reset".to_string())]);
        let mut handler = Recording {
            seen: Vec::new(),
            fail_on: None,
        };

        let err = consume_until(deliveries, &mut handler, std::future::pending::<()>())
            .await
            .unwrap_err();

        assert!(matches!(err, ConsumerError::DeliveryError(ref msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn shutdown_stops_an_idle_consumer() {
        let deliveries = stream::pending::<Result<Vec<u8>, String>>();
        let mut handler = Recording {
            seen: Vec::new(),
            fail_on: None,
        };

        consume_until(deliveries, &mut handler, std::future::ready(()))
            .await
            .unwrap();

        assert!(handler.seen.is_empty());
    }

    #[test]
    fn deliveries_are_acknowledged_on_send() {
        let options = consume_options();

        assert!(options.no_ack);
        assert!(!options.exclusive);
    }

    #[test]
    fn preview_truncates_long_payloads() {
        let long = "x".repeat(PREVIEW_LEN + 10);
        let shown = preview(long.as_bytes());

        assert_eq!(shown.len(), PREVIEW_LEN + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview(b"short"), "short");
    }
}
