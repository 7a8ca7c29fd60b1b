use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use inkrelay_shared::{
    decode_frame, encode_frame, ClientMessage, ServerMessage, WireFormat, WireFrame,
};

use super::{decode_inbound, Transport, TransportEvent};
use crate::error::TransportError;

enum Inbound {
    Open,
    Closed(String),
    Frame(WireFrame),
}

struct Shared {
    format: WireFormat,
    open: bool,
    outbound: VecDeque<WireFrame>,
    inbound: VecDeque<Inbound>,
}

/// Client half of an in-process connection. Every message crosses the wire codec.
pub struct MemoryTransport {
    shared: Rc<RefCell<Shared>>,
}

/// Server half: drives connection lifecycle and observes what the client sent.
#[derive(Clone)]
pub struct MemoryPeer {
    shared: Rc<RefCell<Shared>>,
}

pub fn memory_pair(format: WireFormat) -> (MemoryTransport, MemoryPeer) {
    let shared = Rc::new(RefCell::new(Shared {
        format,
        open: false,
        outbound: VecDeque::new(),
        inbound: VecDeque::new(),
    }));
    (
        MemoryTransport {
            shared: shared.clone(),
        },
        MemoryPeer { shared },
    )
}

impl Transport for MemoryTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        let mut shared = self.shared.borrow_mut();
        if !shared.open {
            return Err(TransportError::Closed);
        }
        let frame = encode_frame(message, shared.format)?;
        shared.outbound.push_back(frame);
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let drained: Vec<Inbound> = self.shared.borrow_mut().inbound.drain(..).collect();
        drained
            .into_iter()
            .filter_map(|inbound| match inbound {
                Inbound::Open => Some(TransportEvent::Open),
                Inbound::Closed(reason) => Some(TransportEvent::Closed { reason }),
                Inbound::Frame(frame) => decode_inbound(&frame).map(TransportEvent::Message),
            })
            .collect()
    }
}

impl MemoryPeer {
    pub fn is_open(&self) -> bool {
        self.shared.borrow().open
    }

    /// Accepts the connection and greets the client with its session id.
    pub fn open(&self, session_id: &str) {
        self.shared.borrow_mut().inbound.push_back(Inbound::Open);
        self.shared.borrow_mut().open = true;
        self.deliver(&ServerMessage::Welcome {
            session_id: session_id.to_string(),
        });
    }

    pub fn close(&self, reason: &str) {
        let mut shared = self.shared.borrow_mut();
        shared.open = false;
        shared.outbound.clear();
        shared.inbound.push_back(Inbound::Closed(reason.to_string()));
    }

    pub fn deliver(&self, message: &ServerMessage) {
        let format = self.shared.borrow().format;
        match encode_frame(message, format) {
            Ok(frame) => self.deliver_frame(frame),
            Err(error) => log::warn!("memory peer failed to encode {}: {error}", message.kind()),
        }
    }

    pub fn deliver_frame(&self, frame: WireFrame) {
        self.shared.borrow_mut().inbound.push_back(Inbound::Frame(frame));
    }

    pub fn take_sent(&self) -> Vec<ClientMessage> {
        let frames: Vec<WireFrame> = self.shared.borrow_mut().outbound.drain(..).collect();
        frames
            .iter()
            .filter_map(|frame| decode_frame::<ClientMessage>(frame).ok())
            .collect()
    }
}
