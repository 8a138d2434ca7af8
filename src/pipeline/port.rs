//! Message ports.

use tokio::sync::mpsc;

use crate::message::Message;

/// The receiving side of a port has been dropped.
#[derive(Debug, thiserror::Error)]
#[error("port closed, message of type {data_type_name} discarded")]
pub struct PortClosed {
    pub data_type_name: String,
}

/// Sending half of a port.
#[derive(Debug, Clone)]
pub struct OutputPort {
    tx: mpsc::UnboundedSender<Message>,
}

impl OutputPort {
    pub fn send_message(&self, message: Message) -> Result<(), PortClosed> {
        self.tx.send(message).map_err(|mpsc::error::SendError(message)| PortClosed {
            data_type_name: message.data_type_name().to_string(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a port.
#[derive(Debug)]
pub struct InputPort {
    rx: mpsc::UnboundedReceiver<Message>,
}

impl InputPort {
    /// Next message, or `None` once every [`OutputPort`] is dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected port pair.
pub fn channel() -> (OutputPort, InputPort) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutputPort { tx }, InputPort { rx })
}
