use crate::broker::Broker;
use crate::config::PublishArgs;
use crate::error::ConsumerError;
use crate::log_message::LogMessage;
use lapin::options::BasicPublishOptions;
use lapin::BasicProperties;
use log::info;

/// Builds a record holding only the fields given on the command line.
pub fn message_from_args(args: &PublishArgs) -> LogMessage {
    let mut message = LogMessage::default();
    let fields = [
        ("User", &args.user),
        ("OS", &args.os),
        ("Device Model", &args.device_model),
        ("Geolocation Data", &args.geolocation),
        ("Accelerometer Data", &args.accelerometer),
        ("Available Devices", &args.available_devices),
        ("Wi-Fi Signal Strength", &args.wifi_signal_strength),
    ];

    for (key, value) in fields {
        if let Some(value) = value {
            message.insert(key, value.as_str());
        }
    }

    message
}

/// Publishes to the default exchange, routed straight to `queue`.
pub async fn publish(broker: &Broker, queue: &str, message: &LogMessage) -> Result<(), ConsumerError> {
    let payload = message.to_payload()?;

    broker
        .channel()
        .basic_publish(
            "",
            queue,
            BasicPublishOptions::default(),
            &payload,
            BasicProperties::default().with_content_type("application/json".into()),
        )
        .await?
        .await?;

    info!("Published {} bytes to '{}'", payload.len(), queue);
    Ok(())
}
