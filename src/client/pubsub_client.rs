use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type ClientId = String;

/// Represents a connected downstream client.
///
/// Each client is uniquely identified by an `id` and has a channel (`sender`)
/// drained by the transport's writer task. The broker only ever holds this
/// handle, never the socket itself.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for the client (`client-<uuid>`).
    pub id: ClientId,

    /// Channel to send WebSocket frames to the client.
    pub sender: UnboundedSender<WsMessage>,
}

impl Client {
    pub fn new(sender: UnboundedSender<WsMessage>) -> Self {
        Self {
            id: format!("client-{}", Uuid::new_v4()),
            sender,
        }
    }

    /// Whether the writer task is still draining this client's channel.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queues a frame for the client. Fire-and-forget: returns `false` when the
    /// connection is already gone, and never blocks.
    pub fn send(&self, msg: WsMessage) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sender.send(msg).is_ok()
    }

    pub fn send_text(&self, text: impl Into<String>) -> bool {
        let text: String = text.into();
        self.send(WsMessage::text(text))
    }
}
