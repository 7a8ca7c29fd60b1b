use std::time::Instant;

use inkrelay_shared::{Cursor, NameResult, Point, RequestId, Segment, Stroke, Tool, User};

use crate::capture::{Capture, RepaintScheduler};
use crate::channel::{ConnectionState, EventSink, SyncChannel};
use crate::config::{BoardConfig, MIN_DISPLAY_NAME_LEN};
use crate::error::{ChannelError, ClearError, ExportError, NameError};
use crate::export::{export_raster, export_vector, ExportedImage, RasterFormat};
use crate::presence::Presence;
use crate::reconcile::{sanitize_segment, History, Upsert};
use crate::render::Surfaces;
use crate::state::DrawingSession;
use crate::transport::Transport;
use crate::util::{make_client_token, make_stroke_id};

#[derive(Debug)]
struct PendingClear {
    request: RequestId,
    previous: Vec<Stroke>,
}

/// Everything the channel's inbound events are applied to.
struct CanvasState {
    config: BoardConfig,
    session: DrawingSession,
    capture: Capture,
    surfaces: Surfaces,
    history: History,
    presence: Presence,
    client_token: String,
    display_name: String,
    pending_clear: Option<PendingClear>,
    observer: Option<Box<dyn EventSink>>,
}

impl CanvasState {
    fn new(config: BoardConfig, repaint: RepaintScheduler) -> Self {
        let client_token = make_client_token();
        let mut history = History::new();
        history.add_origin(&client_token);
        Self {
            config,
            session: DrawingSession::default(),
            capture: Capture::new(repaint),
            surfaces: Surfaces::new(),
            history,
            presence: Presence::new(),
            client_token,
            display_name: String::new(),
            pending_clear: None,
            observer: None,
        }
    }

    fn origin(&self) -> &str {
        self.presence.local_id().unwrap_or(&self.client_token)
    }

    fn redraw(&mut self) {
        self.surfaces
            .redraw_all(self.history.strokes(), self.session.background());
    }

    fn observer(&mut self) -> Option<&mut (dyn EventSink + 'static)> {
        self.observer.as_deref_mut()
    }
}

impl EventSink for CanvasState {
    fn on_connect(&mut self, session_id: &str) {
        self.presence.set_local_id(session_id);
        self.history.add_origin(session_id);
        if self.display_name.is_empty() {
            self.display_name = crate::presence::fallback_label(session_id);
        }
        if let Some(observer) = self.observer() {
            observer.on_connect(session_id);
        }
    }

    fn on_disconnect(&mut self, reason: &str) {
        log::warn!("disconnected: {reason}");
        self.presence.clear();
        if let Some(observer) = self.observer() {
            observer.on_disconnect(reason);
        }
    }

    fn on_segment(&mut self, segment: &Segment) {
        if let Some(segment) = sanitize_segment(segment.clone()) {
            if !self.history.is_self_echo(&segment.stroke_id) {
                self.surfaces
                    .draw_segment(&segment, self.session.background());
            }
        }
        if let Some(observer) = self.observer() {
            observer.on_segment(segment);
        }
    }

    fn on_stroke(&mut self, stroke: &Stroke) {
        let echo = self.history.is_self_echo(&stroke.stroke_id);
        if self.history.upsert(stroke.clone()) == Upsert::Appended && !echo {
            if let Some(stored) = self.history.strokes().last() {
                self.surfaces.commit(stored, self.session.background());
            }
        }
        if let Some(observer) = self.observer() {
            observer.on_stroke(stroke);
        }
    }

    fn on_history(&mut self, strokes: &[Stroke]) {
        log::debug!("history snapshot with {} strokes", strokes.len());
        self.history.replace_all(strokes.to_vec());
        self.redraw();
        if let Some(observer) = self.observer() {
            observer.on_history(strokes);
        }
    }

    fn on_users(&mut self, users: &[User]) {
        if let Some(label) = self.presence.apply_users(users.to_vec()) {
            self.display_name = label;
        }
        if let Some(observer) = self.observer() {
            observer.on_users(users);
        }
    }

    fn on_cursors(&mut self, cursors: &[Cursor]) {
        self.presence.apply_cursors(cursors.to_vec());
        if let Some(observer) = self.observer() {
            observer.on_cursors(cursors);
        }
    }

    fn on_canvas_cleared(&mut self, background: Option<&str>) {
        if let Some(background) = background {
            self.session.set_background(background);
        }
        self.history.clear();
        self.surfaces.clear(self.session.background());
        if let Some(observer) = self.observer() {
            observer.on_canvas_cleared(background);
        }
    }

    fn on_display_name_result(&mut self, result: &NameResult) {
        if let Some(observer) = self.observer() {
            observer.on_display_name_result(result);
        }
    }

    fn on_clear_resolved(&mut self, request: RequestId, outcome: &Result<(), ChannelError>) {
        match self.pending_clear.take() {
            Some(pending) if pending.request == request => match outcome {
                Ok(()) => log::info!("clear {request} confirmed"),
                Err(error) => {
                    log::warn!("clear {request} failed: {error}");
                    if !self.history.is_empty() {
                        log::warn!(
                            "discarding {} strokes received while clear {request} was pending",
                            self.history.len()
                        );
                    }
                    self.history.restore(pending.previous);
                    self.redraw();
                }
            },
            other => self.pending_clear = other,
        }
        if let Some(observer) = self.observer() {
            observer.on_clear_resolved(request, outcome);
        }
    }

    fn on_display_name_resolved(
        &mut self,
        request: RequestId,
        outcome: &Result<String, ChannelError>,
    ) {
        match outcome {
            Ok(label) if !label.is_empty() => self.display_name = label.clone(),
            Ok(_) => {}
            Err(error) => log::info!("display name {request} not applied: {error}"),
        }
        if let Some(observer) = self.observer() {
            observer.on_display_name_resolved(request, outcome);
        }
    }
}

/// One collaborative board: local drawing, the sync channel and its presence.
pub struct Whiteboard<T> {
    channel: SyncChannel<T>,
    state: CanvasState,
}

impl<T: Transport> Whiteboard<T> {
    pub fn new(transport: T, config: BoardConfig) -> Self {
        Self::with_repaint(transport, config, RepaintScheduler::default())
    }

    pub fn with_repaint(transport: T, config: BoardConfig, repaint: RepaintScheduler) -> Self {
        Self {
            channel: SyncChannel::new(transport, &config),
            state: CanvasState::new(config, repaint),
        }
    }

    pub fn with_observer(mut self, observer: impl EventSink + 'static) -> Self {
        self.state.observer = Some(Box::new(observer));
        self
    }

    pub fn resize(&mut self, width: f64, height: f64, pixel_ratio: f64) -> bool {
        if !self.state.surfaces.configure(width, height, pixel_ratio) {
            return false;
        }
        self.state.redraw();
        true
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.state.session.set_tool(tool);
    }

    pub fn set_tool_name(&mut self, name: &str) {
        self.state.session.set_tool_name(name);
    }

    pub fn set_color(&mut self, color: &str) {
        self.state.session.set_color(color);
    }

    pub fn set_width(&mut self, width: f64) {
        self.state.session.set_width(width);
    }

    /// Applies a sanitized background. Already committed pixels keep their
    /// colors until the next [`Whiteboard::redraw`].
    pub fn set_background(&mut self, raw: &str) -> String {
        self.state.session.set_background(raw).to_string()
    }

    pub fn redraw(&mut self) {
        self.state.redraw();
    }

    pub fn pointer_down(&mut self, position: Point, now: Instant) -> bool {
        let id = make_stroke_id(self.state.origin());
        let style = self.state.session.style();
        if !self.state.capture.pointer_down(position, style, id) {
            return false;
        }
        self.channel.emit_cursor(Some(position), now);
        true
    }

    pub fn pointer_move(&mut self, position: Point, now: Instant) {
        if let Some(segment) = self.state.capture.pointer_move(position) {
            self.channel.send_segment(&segment);
        }
        self.channel.emit_cursor(Some(position), now);
    }

    pub fn pointer_up(&mut self) -> Option<Stroke> {
        let state = &mut self.state;
        let stroke = state
            .capture
            .pointer_up(&mut state.surfaces, state.session.background())?;
        state.history.upsert(stroke.clone());
        self.channel.send_stroke(&stroke);
        Some(stroke)
    }

    pub fn pointer_cancel(&mut self) -> Option<Stroke> {
        self.pointer_up()
    }

    pub fn pointer_leave(&mut self, now: Instant) -> Option<Stroke> {
        let stroke = self.pointer_up();
        self.channel.emit_cursor(None, now);
        stroke
    }

    /// Per-frame callback; returns whether the preview was repainted.
    pub fn animation_frame(&mut self) -> bool {
        let state = &mut self.state;
        state
            .capture
            .on_frame(&mut state.surfaces, state.session.background())
    }

    pub fn tick(&mut self, now: Instant) {
        self.channel.pump(now, &mut self.state);
    }

    pub fn undo(&mut self) {
        self.channel.request_undo();
    }

    pub fn redo(&mut self) {
        self.channel.request_redo();
    }

    /// Clears locally right away; the previous history comes back if the
    /// server rejects the request or never answers.
    pub fn request_clear(&mut self, now: Instant) -> Result<RequestId, ClearError> {
        if self.state.pending_clear.is_some() {
            return Err(ClearError::InProgress);
        }
        let background = self.state.session.background().to_string();
        let previous = self.state.history.take();
        self.state.surfaces.clear(&background);
        match self.channel.request_clear(&background, now) {
            Ok(request) => {
                self.state.pending_clear = Some(PendingClear { request, previous });
                Ok(request)
            }
            Err(error) => {
                log::warn!("clear not sent: {error}");
                self.state.history.restore(previous);
                self.state.redraw();
                Err(error.into())
            }
        }
    }

    pub fn set_display_name(&mut self, name: &str, now: Instant) -> Result<RequestId, NameError> {
        let name = name.trim();
        if name.chars().count() < MIN_DISPLAY_NAME_LEN {
            return Err(NameError::TooShort(MIN_DISPLAY_NAME_LEN));
        }
        if name == self.state.display_name {
            return Err(NameError::Unchanged);
        }
        Ok(self.channel.set_display_name(name, now)?)
    }

    pub fn export_raster(
        &self,
        format: RasterFormat,
        quality: Option<f32>,
    ) -> Result<ExportedImage, ExportError> {
        let viewport = self
            .state
            .surfaces
            .viewport()
            .ok_or(ExportError::NotConfigured)?;
        let quality = quality.unwrap_or(self.state.config.jpeg_quality);
        let replay = Surfaces::replay(
            viewport,
            self.state.history.strokes(),
            self.state.session.background(),
        );
        export_raster(replay.base_layer(), viewport, format, quality)
    }

    pub fn export_vector(&self) -> Result<String, ExportError> {
        let viewport = self
            .state
            .surfaces
            .viewport()
            .ok_or(ExportError::NotConfigured)?;
        Ok(export_vector(
            self.state.history.strokes(),
            viewport,
            self.state.session.background(),
        ))
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.channel.session_id()
    }

    pub fn pending_requests(&self) -> usize {
        self.channel.pending_requests()
    }

    pub fn is_clear_pending(&self) -> bool {
        self.state.pending_clear.is_some()
    }

    pub fn session(&self) -> &DrawingSession {
        &self.state.session
    }

    pub fn history(&self) -> &[Stroke] {
        self.state.history.strokes()
    }

    pub fn surfaces(&self) -> &Surfaces {
        &self.state.surfaces
    }

    pub fn capture(&self) -> &Capture {
        &self.state.capture
    }

    pub fn presence(&self) -> &Presence {
        &self.state.presence
    }

    pub fn display_name(&self) -> &str {
        &self.state.display_name
    }

    pub fn transport(&self) -> &T {
        self.channel.transport()
    }
}
