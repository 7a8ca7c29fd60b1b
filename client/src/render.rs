use kurbo::BezPath;

use inkrelay_shared::{Point, Segment, Stroke};

use crate::geometry::{clamp_width, segment_path, smooth_path};
use crate::state::StrokeStyle;

/// One retained drawing operation, in logical coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Fill { color: String },
    Stroke { path: BezPath, color: String, width: f64 },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layer {
    ops: Vec<DrawOp>,
}

impl Layer {
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn is_blank(&self) -> bool {
        self.ops.is_empty()
    }

    fn clear(&mut self) {
        self.ops.clear();
    }

    fn push(&mut self, op: DrawOp) {
        self.ops.push(op);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, pixel_ratio: f64) -> Self {
        let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        Self {
            width: finite_extent(width),
            height: finite_extent(height),
            pixel_ratio: ratio,
        }
    }

    pub fn pixel_width(&self) -> u32 {
        (self.width * self.pixel_ratio) as u32
    }

    pub fn pixel_height(&self) -> u32 {
        (self.height * self.pixel_ratio) as u32
    }
}

fn finite_extent(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// The committed base layer plus the in-progress preview layer.
#[derive(Debug, Default)]
pub struct Surfaces {
    viewport: Option<Viewport>,
    base: Layer,
    preview: Layer,
    preview_repaints: u64,
}

impl Surfaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the viewport changed and the caller has to redraw.
    pub fn configure(&mut self, width: f64, height: f64, pixel_ratio: f64) -> bool {
        let next = Viewport::new(width, height, pixel_ratio);
        if self.viewport == Some(next) {
            return false;
        }
        log::debug!(
            "surfaces configured to {}x{} @{} ({}x{} px)",
            next.width,
            next.height,
            next.pixel_ratio,
            next.pixel_width(),
            next.pixel_height()
        );
        self.viewport = Some(next);
        self.base.clear();
        self.preview.clear();
        true
    }

    /// Fresh surfaces holding exactly what `redraw_all(history)` paints.
    pub fn replay(viewport: Viewport, history: &[Stroke], background: &str) -> Self {
        let mut surfaces = Self::new();
        surfaces.viewport = Some(viewport);
        surfaces.redraw_all(history, background);
        surfaces
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn is_configured(&self) -> bool {
        self.viewport.is_some()
    }

    pub fn base_layer(&self) -> &Layer {
        &self.base
    }

    pub fn preview_layer(&self) -> &Layer {
        &self.preview
    }

    pub fn preview_repaints(&self) -> u64 {
        self.preview_repaints
    }

    pub fn clear(&mut self, background: &str) {
        if !self.is_configured() {
            return;
        }
        self.base.clear();
        self.base.push(DrawOp::Fill {
            color: background.to_string(),
        });
        self.preview.clear();
    }

    pub fn commit(&mut self, stroke: &Stroke, background: &str) {
        if !self.is_configured() {
            return;
        }
        let Some(path) = smooth_path(&stroke.points) else {
            return;
        };
        let style = StrokeStyle::of_stroke(stroke);
        self.base.push(DrawOp::Stroke {
            path,
            color: style.paint_color(background).to_string(),
            width: clamp_width(style.width),
        });
    }

    pub fn redraw_all(&mut self, history: &[Stroke], background: &str) {
        if !self.is_configured() {
            return;
        }
        self.clear(background);
        for stroke in history {
            self.commit(stroke, background);
        }
    }

    pub fn preview(&mut self, points: &[Point], style: &StrokeStyle, background: &str) {
        if !self.is_configured() {
            return;
        }
        self.preview.clear();
        if let Some(path) = smooth_path(points) {
            self.preview.push(DrawOp::Stroke {
                path,
                color: style.paint_color(background).to_string(),
                width: clamp_width(style.width),
            });
        }
        self.preview_repaints += 1;
    }

    pub fn clear_preview(&mut self) {
        self.preview.clear();
    }

    /// Remote in-progress movement goes straight onto the base layer.
    pub fn draw_segment(&mut self, segment: &Segment, background: &str) {
        if !self.is_configured() {
            return;
        }
        let style = StrokeStyle::of_segment(segment);
        self.base.push(DrawOp::Stroke {
            path: segment_path(segment.from, segment.to),
            color: style.paint_color(background).to_string(),
            width: clamp_width(style.width),
        });
    }
}
