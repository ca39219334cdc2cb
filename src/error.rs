use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("AMQP broker error: {0}")]
    BrokerError(#[from] lapin::Error),

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Payload is not a JSON object (got {0})")]
    NotAnObject(&'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Delivery stream error: {0}")]
    DeliveryError(String),
}
