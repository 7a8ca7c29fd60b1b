use std::fmt;

use inkrelay_shared::{Point, Segment, Stroke, StrokeId};

use crate::geometry::normalize_point;
use crate::render::Surfaces;
use crate::state::StrokeStyle;

/// Coalesces repaint requests: at most one repaint is outstanding at a time.
///
/// The optional waker is called once per newly scheduled repaint so a host can
/// arm its frame callback, timer or render tick.
#[derive(Default)]
pub struct RepaintScheduler {
    pending: bool,
    waker: Option<Box<dyn FnMut()>>,
}

impl fmt::Debug for RepaintScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepaintScheduler")
            .field("pending", &self.pending)
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

impl RepaintScheduler {
    pub fn with_waker(waker: impl FnMut() + 'static) -> Self {
        Self {
            pending: false,
            waker: Some(Box::new(waker)),
        }
    }

    /// Returns `false` when a repaint was already pending.
    pub fn schedule(&mut self) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        if let Some(waker) = self.waker.as_mut() {
            waker();
        }
        true
    }

    pub fn take(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

#[derive(Clone, Debug)]
pub struct ActiveStroke {
    pub id: StrokeId,
    pub style: StrokeStyle,
    pub points: Vec<Point>,
    pub rendered_index: usize,
}

impl ActiveStroke {
    fn into_stroke(self) -> Stroke {
        Stroke {
            stroke_id: self.id,
            tool: self.style.tool,
            color: self.style.color,
            width: self.style.width,
            points: self.points,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub enum CaptureMode {
    #[default]
    Idle,
    Drawing(ActiveStroke),
}

#[derive(Debug, Default)]
pub struct Capture {
    mode: CaptureMode,
    repaint: RepaintScheduler,
}

impl Capture {
    pub fn new(repaint: RepaintScheduler) -> Self {
        Self {
            mode: CaptureMode::Idle,
            repaint,
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.mode, CaptureMode::Drawing(_))
    }

    pub fn active(&self) -> Option<&ActiveStroke> {
        match &self.mode {
            CaptureMode::Drawing(active) => Some(active),
            CaptureMode::Idle => None,
        }
    }

    pub fn repaint_pending(&self) -> bool {
        self.repaint.is_pending()
    }

    pub fn pointer_down(&mut self, position: Point, style: StrokeStyle, id: StrokeId) -> bool {
        let Some(position) = normalize_point(position) else {
            return false;
        };
        if let CaptureMode::Drawing(previous) = &self.mode {
            log::debug!("abandoning unfinished stroke {}", previous.id);
        }
        self.mode = CaptureMode::Drawing(ActiveStroke {
            id,
            style,
            points: vec![position],
            rendered_index: 0,
        });
        true
    }

    /// Appends a point and returns the segment to relay. The local repaint is
    /// only scheduled, never performed here.
    pub fn pointer_move(&mut self, position: Point) -> Option<Segment> {
        let CaptureMode::Drawing(active) = &mut self.mode else {
            return None;
        };
        let position = normalize_point(position)?;
        let previous = active.points.last().copied();
        active.points.push(position);
        let segment = previous.map(|from| Segment {
            stroke_id: active.id.clone(),
            tool: active.style.tool,
            color: active.style.color.clone(),
            width: active.style.width,
            from,
            to: position,
        });
        self.repaint.schedule();
        segment
    }

    /// Per-frame callback: repaints the preview only if a repaint is pending.
    pub fn on_frame(&mut self, surfaces: &mut Surfaces, background: &str) -> bool {
        if !self.repaint.take() {
            return false;
        }
        self.repaint_preview(surfaces, background);
        true
    }

    pub fn flush_repaint(&mut self, surfaces: &mut Surfaces, background: &str) {
        self.repaint.take();
        self.repaint_preview(surfaces, background);
    }

    fn repaint_preview(&mut self, surfaces: &mut Surfaces, background: &str) {
        let CaptureMode::Drawing(active) = &mut self.mode else {
            return;
        };
        if active.points.len() < 2 {
            return;
        }
        surfaces.preview(&active.points, &active.style, background);
        active.rendered_index = active.points.len() - 1;
    }

    /// Ends the stroke. A stroke with at least two points is committed to the
    /// base layer and returned for history and relay.
    pub fn pointer_up(&mut self, surfaces: &mut Surfaces, background: &str) -> Option<Stroke> {
        if !self.is_drawing() {
            return None;
        }
        self.flush_repaint(surfaces, background);
        let CaptureMode::Drawing(active) = std::mem::take(&mut self.mode) else {
            return None;
        };
        surfaces.clear_preview();
        if active.points.len() < 2 {
            log::debug!("discarding single-point stroke {}", active.id);
            return None;
        }
        let stroke = active.into_stroke();
        surfaces.commit(&stroke, background);
        Some(stroke)
    }
}
