use std::net::TcpStream;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};
use url::Url;

use inkrelay_shared::{encode_frame, ClientMessage, WireFormat, WireFrame};

use super::{decode_inbound, Transport, TransportEvent};
use crate::error::TransportError;

const READ_TIMEOUT: Duration = Duration::from_millis(50);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

enum WsCommand {
    Send(WireFrame),
    Close,
}

enum WsSignal {
    Open,
    Closed(String),
    Frame(WireFrame),
}

enum SessionEnd {
    Shutdown,
    Dropped(String),
}

/// WebSocket client running on a background thread, reconnecting after a
/// fixed delay until it is closed or dropped.
pub struct WsTransport {
    format: WireFormat,
    open: bool,
    cmd_tx: Sender<WsCommand>,
    event_rx: Receiver<WsSignal>,
    _thread: Option<JoinHandle<()>>,
}

impl WsTransport {
    pub fn connect(
        url: &str,
        format: WireFormat,
        reconnect_delay: Duration,
    ) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }

        if parsed.scheme() == "wss"
            && rustls::crypto::aws_lc_rs::default_provider()
                .install_default()
                .is_err()
        {
            log::debug!("tls crypto provider already installed");
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (event_tx, event_rx) = channel::<WsSignal>();
        let url = parsed.to_string();
        let handle = thread::spawn(move || run(url, cmd_rx, event_tx, reconnect_delay));

        Ok(Self {
            format,
            open: false,
            cmd_tx,
            event_rx,
            _thread: Some(handle),
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
        self.open = false;
    }
}

impl Transport for WsTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let frame = encode_frame(message, self.format)?;
        self.cmd_tx
            .send(WsCommand::Send(frame))
            .map_err(|_| TransportError::Closed)
    }

    fn poll_events(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(signal) = self.event_rx.try_recv() {
            match signal {
                WsSignal::Open => {
                    self.open = true;
                    events.push(TransportEvent::Open);
                }
                WsSignal::Closed(reason) => {
                    self.open = false;
                    events.push(TransportEvent::Closed { reason });
                }
                WsSignal::Frame(frame) => {
                    if let Some(message) = decode_inbound(&frame) {
                        events.push(TransportEvent::Message(message));
                    }
                }
            }
        }
        events
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn run(url: String, commands: Receiver<WsCommand>, events: Sender<WsSignal>, reconnect_delay: Duration) {
    loop {
        log::info!("websocket connecting to {url}");
        match connect(url.as_str()) {
            Ok((mut socket, response)) => {
                log::info!("websocket connected, status: {}", response.status());
                configure_stream(&mut socket);
                if events.send(WsSignal::Open).is_err() {
                    return;
                }
                match pump(&mut socket, &commands, &events) {
                    SessionEnd::Shutdown => {
                        log::info!("websocket thread exiting");
                        return;
                    }
                    SessionEnd::Dropped(reason) => {
                        log::warn!("websocket dropped: {reason}");
                        if events.send(WsSignal::Closed(reason)).is_err() {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("websocket connection failed: {e}");
                if events
                    .send(WsSignal::Closed(format!("connection failed: {e}")))
                    .is_err()
                {
                    return;
                }
            }
        }

        loop {
            match commands.recv_timeout(reconnect_delay) {
                Ok(WsCommand::Close) | Err(RecvTimeoutError::Disconnected) => return,
                Ok(WsCommand::Send(_)) => log::debug!("dropping frame queued while disconnected"),
                Err(RecvTimeoutError::Timeout) => break,
            }
        }
    }
}

fn configure_stream(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) {
    let tcp = match socket.get_mut() {
        MaybeTlsStream::Plain(tcp) => tcp,
        MaybeTlsStream::Rustls(tls) => &mut tls.sock,
        _ => {
            log::warn!("unrecognised stream, reads may block outbound frames");
            return;
        }
    };
    if let Err(e) = tcp.set_read_timeout(Some(READ_TIMEOUT)) {
        log::warn!("failed to set websocket read timeout: {e}");
    }
    if let Err(e) = tcp.set_write_timeout(Some(WRITE_TIMEOUT)) {
        log::warn!("failed to set websocket write timeout: {e}");
    }
}

fn pump(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    commands: &Receiver<WsCommand>,
    events: &Sender<WsSignal>,
) -> SessionEnd {
    loop {
        loop {
            match commands.try_recv() {
                Ok(WsCommand::Send(frame)) => {
                    let message = match frame {
                        WireFrame::Text(text) => Message::Text(text),
                        WireFrame::Binary(bytes) => Message::Binary(bytes),
                    };
                    if let Err(e) = socket.send(message) {
                        return SessionEnd::Dropped(format!("send failed: {e}"));
                    }
                }
                Ok(WsCommand::Close) | Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return SessionEnd::Shutdown;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        let frame = match socket.read() {
            Ok(Message::Text(text)) => WireFrame::Text(text),
            Ok(Message::Binary(bytes)) => WireFrame::Binary(bytes),
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
                continue;
            }
            Ok(Message::Close(_)) => return SessionEnd::Dropped("closed by server".to_string()),
            Ok(_) => continue,
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => return SessionEnd::Dropped(format!("read failed: {e}")),
        };
        if events.send(WsSignal::Frame(frame)).is_err() {
            let _ = socket.close(None);
            return SessionEnd::Shutdown;
        }
    }
}
