use std::collections::HashMap;

use inkrelay_shared::{Segment, Stroke, StrokeId};

use crate::geometry::{clamp_width, normalize_point};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Replaced,
    Appended,
}

/// Ordered strokes keyed by id, plus every origin this client has drawn under.
#[derive(Clone, Debug, Default)]
pub struct History {
    strokes: Vec<Stroke>,
    index: HashMap<StrokeId, usize>,
    origins: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn add_origin(&mut self, origin: &str) {
        if !origin.is_empty() && !self.origins.iter().any(|known| known == origin) {
            self.origins.push(origin.to_string());
        }
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    pub fn is_self_echo(&self, id: &StrokeId) -> bool {
        self.origins.iter().any(|origin| id.has_origin(origin))
    }

    pub fn replace_all(&mut self, strokes: Vec<Stroke>) {
        self.clear();
        for stroke in strokes {
            self.upsert(stroke);
        }
    }

    pub fn upsert(&mut self, stroke: Stroke) -> Upsert {
        let stroke = sanitize_stroke(stroke);
        match self.index.get(&stroke.stroke_id) {
            Some(&position) => {
                self.strokes[position] = stroke;
                Upsert::Replaced
            }
            None => {
                self.index.insert(stroke.stroke_id.clone(), self.strokes.len());
                self.strokes.push(stroke);
                Upsert::Appended
            }
        }
    }

    pub fn take(&mut self) -> Vec<Stroke> {
        self.index.clear();
        std::mem::take(&mut self.strokes)
    }

    /// Puts back strokes obtained from [`History::take`].
    pub fn restore(&mut self, strokes: Vec<Stroke>) {
        self.replace_all(strokes);
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.index.clear();
    }
}

pub fn sanitize_stroke(mut stroke: Stroke) -> Stroke {
    stroke.points = stroke
        .points
        .into_iter()
        .filter_map(normalize_point)
        .collect();
    stroke.width = clamp_width(stroke.width);
    stroke
}

pub fn sanitize_segment(mut segment: Segment) -> Option<Segment> {
    segment.from = normalize_point(segment.from)?;
    segment.to = normalize_point(segment.to)?;
    segment.width = clamp_width(segment.width);
    Some(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkrelay_shared::{Point, Tool};

    fn stroke(id: &str, points: &[(f64, f64)]) -> Stroke {
        Stroke {
            stroke_id: StrokeId::from_raw(id),
            tool: Tool::Brush,
            color: "#000".to_string(),
            width: 2.0,
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut history = History::new();
        assert_eq!(history.upsert(stroke("a:1", &[(0.0, 0.0)])), Upsert::Appended);
        assert_eq!(history.upsert(stroke("b:1", &[(0.0, 0.0)])), Upsert::Appended);
        assert_eq!(
            history.upsert(stroke("a:1", &[(0.0, 0.0), (1.0, 1.0)])),
            Upsert::Replaced
        );
        assert_eq!(history.len(), 2);
        assert_eq!(history.strokes()[0].points.len(), 2);
    }

    #[test]
    fn test_snapshot_dedupes_and_sanitizes() {
        let mut history = History::new();
        history.upsert(stroke("old:1", &[(0.0, 0.0), (1.0, 1.0)]));
        let mut wide = stroke("a:1", &[(0.0, 0.0), (f64::NAN, 1.0), (2.0, 2.0)]);
        wide.width = 90.0;
        history.replace_all(vec![wide, stroke("b:1", &[]), stroke("a:1", &[(5.0, 5.0), (6.0, 6.0)])]);
        assert_eq!(history.len(), 2);
        assert_eq!(history.strokes()[0].stroke_id.as_str(), "a:1");
        assert_eq!(history.strokes()[0].points[0], Point::new(5.0, 5.0));
        assert_eq!(history.strokes()[0].width, 2.0);
    }

    #[test]
    fn test_sanitize_clamps_width() {
        let mut wide = stroke("a:1", &[(0.0, 0.0), (f64::NAN, 1.0), (2.0, 2.0)]);
        wide.width = 90.0;
        let clean = sanitize_stroke(wide);
        assert_eq!(clean.points.len(), 2);
        assert_eq!(clean.width, 50.0);
    }

    #[test]
    fn test_self_echo_checks_every_origin() {
        let mut history = History::new();
        history.add_origin("local-1");
        history.add_origin("s2");
        history.add_origin("s2");
        assert_eq!(history.origins().len(), 2);
        assert!(history.is_self_echo(&StrokeId::new("local-1", "x")));
        assert!(history.is_self_echo(&StrokeId::new("s2", "x")));
        assert!(!history.is_self_echo(&StrokeId::new("s22", "x")));
    }

    #[test]
    fn test_index_follows_snapshots_and_restore() {
        let mut history = History::new();
        let snapshot: Vec<_> = (0..2_000)
            .map(|i| stroke(&format!("a:{i}"), &[(0.0, 0.0), (1.0, 1.0)]))
            .collect();
        history.replace_all(snapshot);
        assert_eq!(history.upsert(stroke("a:1999", &[(3.0, 3.0), (4.0, 4.0)])), Upsert::Replaced);
        assert_eq!(history.strokes()[1999].points[0], Point::new(3.0, 3.0));

        let previous = history.take();
        assert_eq!(history.upsert(stroke("a:5", &[(0.0, 0.0), (1.0, 1.0)])), Upsert::Appended);
        history.restore(previous);
        assert_eq!(history.len(), 2_000);
        assert_eq!(history.upsert(stroke("a:5", &[(7.0, 7.0), (8.0, 8.0)])), Upsert::Replaced);
        assert_eq!(history.strokes()[5].points[0], Point::new(7.0, 7.0));
        history.clear();
        assert_eq!(history.upsert(stroke("a:5", &[(0.0, 0.0), (1.0, 1.0)])), Upsert::Appended);
    }

    #[test]
    fn test_take_and_restore() {
        let mut history = History::new();
        history.upsert(stroke("a:1", &[(0.0, 0.0), (1.0, 1.0)]));
        let previous = history.take();
        assert!(history.is_empty());
        history.restore(previous);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_segment_without_finite_endpoints_dropped() {
        let segment = Segment {
            stroke_id: StrokeId::from_raw("a:1"),
            tool: Tool::Brush,
            color: "#000".to_string(),
            width: 0.0,
            from: Point::new(0.0, 0.0),
            to: Point::new(f64::NAN, 0.0),
        };
        assert!(sanitize_segment(segment.clone()).is_none());
        let fixed = sanitize_segment(Segment {
            to: Point::new(1.0, 1.0),
            ..segment
        })
        .unwrap();
        assert_eq!(fixed.width, 1.0);
    }
}
