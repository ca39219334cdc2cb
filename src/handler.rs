use crate::error::ConsumerError;
use crate::log_message::LogMessage;
use std::io::Write;

/// Invoked once per delivered message, in arrival order.
pub trait MessageHandler {
    fn on_message(&mut self, payload: &[u8]) -> Result<(), ConsumerError>;
}

/// Prints each record as a block of labeled lines.
pub struct PrintHandler<W: Write> {
    out: W,
}

impl<W: Write> PrintHandler<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl PrintHandler<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> MessageHandler for PrintHandler<W> {
    fn on_message(&mut self, payload: &[u8]) -> Result<(), ConsumerError> {
        let message = LogMessage::from_payload(payload)?;

        // One write per block keeps blocks from interleaving
        self.out.write_all(message.render().as_bytes())?;
        self.out.flush()?;

        Ok(())
    }
}
