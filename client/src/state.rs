use inkrelay_shared::{Segment, Stroke, Tool};

use crate::config::{DEFAULT_BACKGROUND, DEFAULT_COLOR, DEFAULT_WIDTH, MAX_BACKGROUND_LEN};
use crate::geometry::clamp_width;

#[derive(Clone, Debug, PartialEq)]
pub struct StrokeStyle {
    pub tool: Tool,
    pub color: String,
    pub width: f64,
}

impl StrokeStyle {
    pub fn of_stroke(stroke: &Stroke) -> Self {
        Self {
            tool: stroke.tool,
            color: stroke.color.clone(),
            width: stroke.width,
        }
    }

    pub fn of_segment(segment: &Segment) -> Self {
        Self {
            tool: segment.tool,
            color: segment.color.clone(),
            width: segment.width,
        }
    }

    /// Eraser marks always take the background in force when they are painted.
    pub fn paint_color<'a>(&'a self, background: &'a str) -> &'a str {
        match self.tool {
            Tool::Eraser => background,
            Tool::Brush if self.color.is_empty() => DEFAULT_COLOR,
            Tool::Brush => &self.color,
        }
    }
}

/// Drawing settings for one attached canvas.
#[derive(Clone, Debug)]
pub struct DrawingSession {
    tool: Tool,
    color: String,
    width: f64,
    background: String,
}

impl Default for DrawingSession {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            color: DEFAULT_COLOR.to_string(),
            width: DEFAULT_WIDTH,
            background: DEFAULT_BACKGROUND.to_string(),
        }
    }
}

impl DrawingSession {
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn background(&self) -> &str {
        &self.background
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn set_tool_name(&mut self, name: &str) {
        self.tool = Tool::from_name(name);
    }

    pub fn set_color(&mut self, color: &str) {
        let color = color.trim();
        if !color.is_empty() {
            self.color = color.to_string();
        }
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = clamp_width(width);
    }

    /// Returns the background now in force, which is the previous one if `raw`
    /// sanitizes to nothing.
    pub fn set_background(&mut self, raw: &str) -> &str {
        if let Some(background) = sanitize_background(raw) {
            self.background = background;
        }
        &self.background
    }

    pub fn effective_color(&self) -> &str {
        match self.tool {
            Tool::Eraser => &self.background,
            Tool::Brush => &self.color,
        }
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            tool: self.tool,
            color: self.effective_color().to_string(),
            width: self.width,
        }
    }
}

fn is_background_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || "#(),.%/-".contains(c)
}

pub fn sanitize_background(raw: &str) -> Option<String> {
    let stripped: String = raw.trim().chars().filter(|c| is_background_char(*c)).collect();
    let capped: String = stripped.trim().chars().take(MAX_BACKGROUND_LEN).collect();
    if capped.is_empty() {
        None
    } else {
        Some(capped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_strips_script_characters() {
        let mut session = DrawingSession::default();
        let applied = session.set_background("<script>alert('x')</script>#123abc");
        assert_eq!(applied, "scriptalert(x)/script#123abc");
        assert!(applied.chars().all(is_background_char));
    }

    #[test]
    fn test_background_capped_at_64() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_background(&long).unwrap().len(), MAX_BACKGROUND_LEN);
    }

    #[test]
    fn test_background_empty_keeps_previous() {
        let mut session = DrawingSession::default();
        session.set_background("#123abc");
        assert_eq!(session.set_background("<>;'\""), "#123abc");
        assert_eq!(session.set_background("   "), "#123abc");
    }

    #[test]
    fn test_eraser_uses_background() {
        let mut session = DrawingSession::default();
        session.set_color("#ff0000");
        session.set_background("rgb(1, 2, 3)");
        session.set_tool_name("eraser");
        assert_eq!(session.effective_color(), "rgb(1, 2, 3)");
        session.set_tool_name("anything");
        assert_eq!(session.style().color, "#ff0000");
    }

    #[test]
    fn test_width_is_clamped() {
        let mut session = DrawingSession::default();
        session.set_width(500.0);
        assert_eq!(session.width(), 50.0);
        session.set_width(f64::NAN);
        assert_eq!(session.width(), 1.0);
    }
}
