use std::collections::HashMap;
use std::time::{Duration, Instant};

use inkrelay_shared::{
    ClientMessage, Cursor, NameResult, Point, RequestId, Segment, ServerMessage, Stroke, User,
};

use crate::config::BoardConfig;
use crate::error::{ChannelError, RequestKind};
use crate::geometry::normalize_point;
use crate::transport::{Transport, TransportEvent};

const CLEAR_FAILED: &str = "Failed to clear canvas.";
const NAME_FAILED: &str = "Failed to update display name.";

/// Receives inbound channel events. Every method is optional.
pub trait EventSink {
    fn on_connect(&mut self, _session_id: &str) {}
    fn on_disconnect(&mut self, _reason: &str) {}
    fn on_segment(&mut self, _segment: &Segment) {}
    fn on_stroke(&mut self, _stroke: &Stroke) {}
    fn on_history(&mut self, _strokes: &[Stroke]) {}
    fn on_users(&mut self, _users: &[User]) {}
    fn on_cursors(&mut self, _cursors: &[Cursor]) {}
    fn on_canvas_cleared(&mut self, _background: Option<&str>) {}
    fn on_display_name_result(&mut self, _result: &NameResult) {}
    fn on_clear_resolved(&mut self, _request: RequestId, _outcome: &Result<(), ChannelError>) {}
    fn on_display_name_resolved(
        &mut self,
        _request: RequestId,
        _outcome: &Result<String, ChannelError>,
    ) {
    }
}

impl EventSink for () {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connected,
    Lost,
}

#[derive(Clone, Debug)]
struct PendingRequest {
    kind: RequestKind,
    deadline: Instant,
    name: Option<String>,
}

#[derive(Clone, Debug)]
enum Resolution {
    Clear(RequestId, Result<(), ChannelError>),
    DisplayName(RequestId, Result<String, ChannelError>),
}

pub struct SyncChannel<T> {
    transport: T,
    state: ConnectionState,
    session_id: Option<String>,
    next_request: u64,
    pending: HashMap<RequestId, PendingRequest>,
    name_request: Option<RequestId>,
    resolved: Vec<Resolution>,
    clear_timeout: Duration,
    name_timeout: Duration,
    cursor_interval: Duration,
    last_cursor_emit: Option<Instant>,
}

impl<T: Transport> SyncChannel<T> {
    pub fn new(transport: T, config: &BoardConfig) -> Self {
        Self {
            transport,
            state: ConnectionState::Idle,
            session_id: None,
            next_request: 1,
            pending: HashMap::new(),
            name_request: None,
            resolved: Vec::new(),
            clear_timeout: config.clear_timeout(),
            name_timeout: config.display_name_timeout(),
            cursor_interval: config.cursor_interval(),
            last_cursor_emit: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn send_segment(&mut self, segment: &Segment) {
        self.send_quiet(ClientMessage::Segment(segment.clone()));
    }

    pub fn send_stroke(&mut self, stroke: &Stroke) {
        self.send_quiet(ClientMessage::StrokeComplete(stroke.clone()));
    }

    pub fn request_undo(&mut self) {
        self.send_quiet(ClientMessage::Undo);
    }

    pub fn request_redo(&mut self) {
        self.send_quiet(ClientMessage::Redo);
    }

    fn send_quiet(&mut self, message: ClientMessage) {
        if let Err(error) = self.transport.send(&message) {
            log::debug!("dropping outbound message: {error}");
        }
    }

    fn ensure_connected(&self) -> Result<(), ChannelError> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Idle => Err(ChannelError::NotConnected),
            ConnectionState::Lost => Err(ChannelError::ConnectionLost),
        }
    }

    fn allocate_request(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }

    /// Sends a clear request; the outcome arrives later through
    /// [`EventSink::on_clear_resolved`].
    pub fn request_clear(&mut self, background: &str, now: Instant) -> Result<RequestId, ChannelError> {
        self.ensure_connected()?;
        let id = self.allocate_request();
        self.transport.send(&ClientMessage::Clear {
            request_id: id,
            background: background.to_string(),
        })?;
        self.pending.insert(
            id,
            PendingRequest {
                kind: RequestKind::Clear,
                deadline: now + self.clear_timeout,
                name: None,
            },
        );
        log::debug!("clear request {id} sent");
        Ok(id)
    }

    /// Sends a rename request, superseding any rename still outstanding.
    pub fn set_display_name(&mut self, name: &str, now: Instant) -> Result<RequestId, ChannelError> {
        self.ensure_connected()?;
        if let Some(previous) = self.name_request.take() {
            if self.pending.remove(&previous).is_some() {
                log::debug!("display name request {previous} superseded");
                self.resolved
                    .push(Resolution::DisplayName(previous, Err(ChannelError::Superseded)));
            }
        }
        let id = self.allocate_request();
        self.transport.send(&ClientMessage::SetDisplayName {
            request_id: id,
            name: name.to_string(),
        })?;
        self.pending.insert(
            id,
            PendingRequest {
                kind: RequestKind::DisplayName,
                deadline: now + self.name_timeout,
                name: Some(name.to_string()),
            },
        );
        self.name_request = Some(id);
        Ok(id)
    }

    /// Rate-limited cursor presence. `None` always goes out and reopens the window.
    pub fn emit_cursor(&mut self, position: Option<Point>, now: Instant) -> bool {
        let position = match position {
            None => {
                self.last_cursor_emit = None;
                return self
                    .transport
                    .send(&ClientMessage::CursorMove { position: None })
                    .is_ok();
            }
            Some(position) => match normalize_point(position) {
                Some(position) => position,
                None => return false,
            },
        };
        if let Some(last) = self.last_cursor_emit {
            if now.saturating_duration_since(last) < self.cursor_interval {
                return false;
            }
        }
        self.last_cursor_emit = Some(now);
        self.transport
            .send(&ClientMessage::CursorMove {
                position: Some(position.round()),
            })
            .is_ok()
    }

    /// Polls the transport, expires overdue requests, then dispatches
    /// inbound events and request outcomes to `sink`.
    pub fn pump<S: EventSink + ?Sized>(&mut self, now: Instant, sink: &mut S) {
        let events = self.transport.poll_events();
        self.expire(now);
        for event in events {
            self.dispatch(event, sink);
        }
        for resolution in std::mem::take(&mut self.resolved) {
            match resolution {
                Resolution::Clear(id, outcome) => sink.on_clear_resolved(id, &outcome),
                Resolution::DisplayName(id, outcome) => sink.on_display_name_resolved(id, &outcome),
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        let mut overdue: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        overdue.sort();
        for id in overdue {
            let Some(request) = self.pending.remove(&id) else {
                continue;
            };
            log::warn!("{} request {id} timed out", request.kind);
            let error = ChannelError::Timeout(request.kind);
            match request.kind {
                RequestKind::Clear => self.resolved.push(Resolution::Clear(id, Err(error))),
                RequestKind::DisplayName => {
                    if self.name_request == Some(id) {
                        self.name_request = None;
                    }
                    self.resolved.push(Resolution::DisplayName(id, Err(error)));
                }
            }
        }
    }

    fn dispatch<S: EventSink + ?Sized>(&mut self, event: TransportEvent, sink: &mut S) {
        match event {
            TransportEvent::Open => {
                log::info!("channel open");
                self.state = ConnectionState::Connected;
            }
            TransportEvent::Closed { reason } => {
                if self.state == ConnectionState::Connected {
                    log::info!("channel closed: {reason}");
                    self.state = ConnectionState::Lost;
                    self.last_cursor_emit = None;
                    sink.on_disconnect(&reason);
                } else {
                    log::debug!("channel still down: {reason}");
                }
            }
            TransportEvent::Message(message) => {
                log::debug!("inbound {}", message.kind());
                self.dispatch_message(message, sink);
            }
        }
    }

    fn dispatch_message<S: EventSink + ?Sized>(&mut self, message: ServerMessage, sink: &mut S) {
        match message {
            ServerMessage::Welcome { session_id } => {
                log::info!("joined as session {session_id}");
                sink.on_connect(&session_id);
                self.session_id = Some(session_id);
            }
            ServerMessage::Segment(segment) => sink.on_segment(&segment),
            ServerMessage::StrokeComplete(stroke) => sink.on_stroke(&stroke),
            ServerMessage::History { strokes } => sink.on_history(&strokes),
            ServerMessage::UserList { users } => sink.on_users(&users),
            ServerMessage::Cursors { cursors } => sink.on_cursors(&cursors),
            ServerMessage::DisplayNameResult(result) => {
                sink.on_display_name_result(&result);
                if let Some(id) = self.name_request.take() {
                    if let Some(request) = self.pending.remove(&id) {
                        let outcome = name_outcome(result.ok, result.label, result.error, request.name);
                        self.resolved.push(Resolution::DisplayName(id, outcome));
                    }
                }
            }
            ServerMessage::CanvasCleared { background } => {
                sink.on_canvas_cleared(background.as_deref());
            }
            ServerMessage::Ack {
                request_id,
                ok,
                label,
                error,
            } => {
                let Some(request) = self.pending.remove(&request_id) else {
                    log::debug!("ignoring ack for settled request {request_id}");
                    return;
                };
                match request.kind {
                    RequestKind::Clear => {
                        let outcome = if ok {
                            Ok(())
                        } else {
                            Err(ChannelError::Rejected(
                                error.unwrap_or_else(|| CLEAR_FAILED.to_string()),
                            ))
                        };
                        self.resolved.push(Resolution::Clear(request_id, outcome));
                    }
                    RequestKind::DisplayName => {
                        if self.name_request == Some(request_id) {
                            self.name_request = None;
                        }
                        let outcome = name_outcome(ok, label, error, request.name);
                        self.resolved.push(Resolution::DisplayName(request_id, outcome));
                    }
                }
            }
        }
    }
}

fn name_outcome(
    ok: bool,
    label: Option<String>,
    error: Option<String>,
    requested: Option<String>,
) -> Result<String, ChannelError> {
    if ok {
        Ok(label.or(requested).unwrap_or_default())
    } else {
        Err(ChannelError::Rejected(
            error.unwrap_or_else(|| NAME_FAILED.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{memory_pair, MemoryPeer, MemoryTransport};
    use inkrelay_shared::WireFormat;

    #[derive(Default)]
    struct Recorder {
        connects: Vec<String>,
        disconnects: Vec<String>,
        clears: Vec<(RequestId, Result<(), ChannelError>)>,
        names: Vec<(RequestId, Result<String, ChannelError>)>,
        name_results: usize,
    }

    impl EventSink for Recorder {
        fn on_connect(&mut self, session_id: &str) {
            self.connects.push(session_id.to_string());
        }

        fn on_disconnect(&mut self, reason: &str) {
            self.disconnects.push(reason.to_string());
        }

        fn on_clear_resolved(&mut self, request: RequestId, outcome: &Result<(), ChannelError>) {
            self.clears.push((request, outcome.clone()));
        }

        fn on_display_name_resolved(&mut self, request: RequestId, outcome: &Result<String, ChannelError>) {
            self.names.push((request, outcome.clone()));
        }

        fn on_display_name_result(&mut self, _result: &NameResult) {
            self.name_results += 1;
        }
    }

    fn connected() -> (SyncChannel<MemoryTransport>, MemoryPeer, Recorder, Instant) {
        let (transport, peer) = memory_pair(WireFormat::Json);
        let mut channel = SyncChannel::new(transport, &BoardConfig::default());
        let mut recorder = Recorder::default();
        let start = Instant::now();
        peer.open("s1");
        channel.pump(start, &mut recorder);
        (channel, peer, recorder, start)
    }

    #[test]
    fn test_requests_fail_before_connect() {
        let (transport, _peer) = memory_pair(WireFormat::Json);
        let mut channel = SyncChannel::new(transport, &BoardConfig::default());
        let now = Instant::now();
        assert_eq!(channel.request_clear("#fff", now), Err(ChannelError::NotConnected));
        assert_eq!(channel.set_display_name("Ada", now), Err(ChannelError::NotConnected));
        assert_eq!(channel.pending_requests(), 0);
    }

    #[test]
    fn test_requests_fail_after_disconnect() {
        let (mut channel, peer, mut recorder, start) = connected();
        assert_eq!(recorder.connects, vec!["s1".to_string()]);
        peer.close("server restart");
        channel.pump(start, &mut recorder);
        assert_eq!(recorder.disconnects, vec!["server restart".to_string()]);
        assert_eq!(channel.request_clear("#fff", start), Err(ChannelError::ConnectionLost));
    }

    #[test]
    fn test_clear_ack_resolves_once() {
        let (mut channel, peer, mut recorder, start) = connected();
        let id = channel.request_clear("#fff", start).unwrap();
        assert_eq!(
            peer.take_sent(),
            vec![ClientMessage::Clear {
                request_id: id,
                background: "#fff".to_string()
            }]
        );
        let ack = ServerMessage::Ack {
            request_id: id,
            ok: true,
            label: None,
            error: None,
        };
        peer.deliver(&ack);
        peer.deliver(&ack);
        channel.pump(start + Duration::from_millis(10), &mut recorder);
        assert_eq!(recorder.clears, vec![(id, Ok(()))]);
        assert_eq!(channel.pending_requests(), 0);
    }

    #[test]
    fn test_clear_error_ack_rejects_with_default_message() {
        let (mut channel, peer, mut recorder, start) = connected();
        let id = channel.request_clear("#fff", start).unwrap();
        peer.deliver(&ServerMessage::Ack {
            request_id: id,
            ok: false,
            label: None,
            error: None,
        });
        channel.pump(start, &mut recorder);
        assert_eq!(
            recorder.clears,
            vec![(id, Err(ChannelError::Rejected("Failed to clear canvas.".to_string())))]
        );
    }

    #[test]
    fn test_clear_times_out_and_late_ack_ignored() {
        let (mut channel, peer, mut recorder, start) = connected();
        let id = channel.request_clear("#fff", start).unwrap();
        channel.pump(start + Duration::from_millis(4_999), &mut recorder);
        assert!(recorder.clears.is_empty());
        channel.pump(start + Duration::from_secs(5), &mut recorder);
        assert_eq!(recorder.clears, vec![(id, Err(ChannelError::Timeout(RequestKind::Clear)))]);
        peer.deliver(&ServerMessage::Ack {
            request_id: id,
            ok: true,
            label: None,
            error: None,
        });
        channel.pump(start + Duration::from_secs(6), &mut recorder);
        assert_eq!(recorder.clears.len(), 1);
    }

    #[test]
    fn test_display_name_superseded() {
        let (mut channel, peer, mut recorder, start) = connected();
        let first = channel.set_display_name("Ada", start).unwrap();
        let second = channel.set_display_name("Grace", start).unwrap();
        peer.deliver(&ServerMessage::Ack {
            request_id: second,
            ok: true,
            label: Some("Grace H".to_string()),
            error: None,
        });
        channel.pump(start, &mut recorder);
        assert_eq!(
            recorder.names,
            vec![
                (first, Err(ChannelError::Superseded)),
                (second, Ok("Grace H".to_string())),
            ]
        );
        assert_eq!(ChannelError::Superseded.to_string(), "Another update is in progress.");
    }

    #[test]
    fn test_name_result_broadcast_settles_pending() {
        let (mut channel, peer, mut recorder, start) = connected();
        let id = channel.set_display_name("Ada", start).unwrap();
        peer.deliver(&ServerMessage::DisplayNameResult(NameResult {
            ok: true,
            label: None,
            error: None,
        }));
        peer.deliver(&ServerMessage::Ack {
            request_id: id,
            ok: false,
            label: None,
            error: Some("late".to_string()),
        });
        channel.pump(start, &mut recorder);
        assert_eq!(recorder.name_results, 1);
        assert_eq!(recorder.names, vec![(id, Ok("Ada".to_string()))]);
    }

    #[test]
    fn test_display_name_timeout() {
        let (mut channel, _peer, mut recorder, start) = connected();
        let id = channel.set_display_name("Ada", start).unwrap();
        channel.pump(start + Duration::from_secs(7), &mut recorder);
        assert_eq!(
            recorder.names,
            vec![(id, Err(ChannelError::Timeout(RequestKind::DisplayName)))]
        );
        assert_eq!(
            ChannelError::Timeout(RequestKind::DisplayName).to_string(),
            "Request timed out."
        );
    }

    #[test]
    fn test_cursor_rate_limit() {
        let (mut channel, peer, _recorder, start) = connected();
        let emitted: Vec<u64> = [0u64, 10, 20, 60, 110]
            .into_iter()
            .filter(|ms| {
                channel.emit_cursor(
                    Some(Point::new(1.4, 2.6)),
                    start + Duration::from_millis(*ms),
                )
            })
            .collect();
        assert_eq!(emitted, vec![0, 60, 110]);
        assert!(channel.emit_cursor(None, start + Duration::from_millis(111)));
        assert!(channel.emit_cursor(Some(Point::new(0.0, 0.0)), start + Duration::from_millis(112)));
        let sent = peer.take_sent();
        assert_eq!(sent.len(), 5);
        assert_eq!(
            sent[0],
            ClientMessage::CursorMove {
                position: Some(Point::new(1.0, 3.0))
            }
        );
        assert_eq!(sent[3], ClientMessage::CursorMove { position: None });
    }
}
