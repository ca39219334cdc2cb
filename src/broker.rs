use crate::config::Config;
use crate::error::ConsumerError;
use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use log::{info, warn};

const REPLY_SUCCESS: u16 = 200;

/// Owned connection and channel to the broker, held for the process lifetime.
pub struct Broker {
    connection: Connection,
    channel: Channel,
}

impl Broker {
    /// Opens a connection and a single channel. No retry.
    pub async fn connect(config: &Config) -> Result<Self, ConsumerError> {
        info!("Connecting to broker: {}", config.amqp_url);

        let connection = Connection::connect(&config.amqp_url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        info!("Connected to broker: {}", config.amqp_url);

        Ok(Self { connection, channel })
    }

    /// Declares the queue if it does not exist yet. Declaring an existing
    /// queue with the same options is a no-op on the broker.
    pub async fn ensure_queue(&self, name: &str) -> Result<(), ConsumerError> {
        let queue = self
            .channel
            .queue_declare(name, QueueDeclareOptions::default(), FieldTable::default())
            .await?;

        info!(
            "Queue '{}' ready ({} messages waiting, {} consumers)",
            name,
            queue.message_count(),
            queue.consumer_count()
        );

        Ok(())
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Closes the channel, then the connection. Failures are logged, not returned.
    pub async fn close(self) {
        if let Err(e) = self.channel.close(REPLY_SUCCESS, "consumer shutting down").await {
            warn!("Failed to close channel cleanly: {}", e);
        }

        if let Err(e) = self.connection.close(REPLY_SUCCESS, "consumer shutting down").await {
            warn!("Failed to close connection cleanly: {}", e);
        }

        info!("Broker connection closed");
    }
}
