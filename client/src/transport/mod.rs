use inkrelay_shared::{decode_frame, ClientMessage, ServerMessage, WireFrame};

use crate::error::TransportError;

mod memory;
mod ws;

pub use memory::{memory_pair, MemoryPeer, MemoryTransport};
pub use ws::WsTransport;

#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Open,
    Closed { reason: String },
    Message(ServerMessage),
}

/// A reliable, ordered message channel to the synchronization server.
pub trait Transport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError>;

    /// Drains everything received since the last poll, without blocking.
    fn poll_events(&mut self) -> Vec<TransportEvent>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        (**self).send(message)
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        (**self).poll_events()
    }
}

/// Decodes one inbound frame; garbage is logged and dropped.
pub(crate) fn decode_inbound(frame: &WireFrame) -> Option<ServerMessage> {
    match decode_frame::<ServerMessage>(frame) {
        Ok(message) => Some(message),
        Err(error) => {
            let snippet = match frame {
                WireFrame::Text(text) => text.chars().take(200).collect::<String>(),
                WireFrame::Binary(bytes) => format!("{} bytes", bytes.len()),
            };
            log::warn!("dropping undecodable frame ({error}): {snippet:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_inbound_drops_garbage() {
        assert!(decode_inbound(&WireFrame::Text("{not json".to_string())).is_none());
        assert!(decode_inbound(&WireFrame::Text(r#"{"type":"mystery"}"#.to_string())).is_none());
        assert_eq!(
            decode_inbound(&WireFrame::Text(r#"{"type":"clear"}"#.to_string())),
            Some(ServerMessage::CanvasCleared { background: None })
        );
    }
}
