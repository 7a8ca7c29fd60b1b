use kurbo::BezPath;

use inkrelay_shared::Point;

use crate::config::{MAX_WIDTH, MIN_WIDTH};

pub fn normalize_point(point: Point) -> Option<Point> {
    if !point.is_finite() {
        return None;
    }
    Some(point)
}

pub fn to_kurbo(point: Point) -> kurbo::Point {
    kurbo::Point::new(point.x, point.y)
}

/// Builds the stroke outline shared by preview, replay and vector export.
///
/// Each recorded point is the control point of a quadratic curve ending at the
/// midpoint between it and the next point; the path closes with a straight line
/// into the final point. Fewer than two points yield `None`.
pub fn smooth_path(points: &[Point]) -> Option<BezPath> {
    let (first, rest) = points.split_first()?;
    let last = rest.last()?;
    let mut path = BezPath::new();
    path.move_to(to_kurbo(*first));
    for pair in points.windows(2) {
        let previous = pair[0];
        let current = pair[1];
        path.quad_to(to_kurbo(previous), to_kurbo(previous.midpoint(current)));
    }
    path.line_to(to_kurbo(*last));
    Some(path)
}

pub fn segment_path(from: Point, to: Point) -> BezPath {
    let mut path = BezPath::new();
    path.move_to(to_kurbo(from));
    path.line_to(to_kurbo(to));
    path
}

pub fn clamp_width(width: f64) -> f64 {
    let width = if width.is_finite() && width != 0.0 {
        width
    } else {
        MIN_WIDTH
    };
    width.clamp(MIN_WIDTH, MAX_WIDTH)
}

pub fn width_from_str(raw: &str) -> f64 {
    clamp_width(raw.trim().parse::<f64>().unwrap_or(MIN_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::PathEl;

    fn pts(raw: &[(f64, f64)]) -> Vec<Point> {
        raw.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn test_smooth_path_needs_two_points() {
        assert!(smooth_path(&[]).is_none());
        assert!(smooth_path(&pts(&[(1.0, 1.0)])).is_none());
    }

    #[test]
    fn test_smooth_path_anchor_midpoint_rule() {
        let path = smooth_path(&pts(&[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0)])).unwrap();
        let elements: Vec<PathEl> = path.elements().to_vec();
        assert_eq!(
            elements,
            vec![
                PathEl::MoveTo(kurbo::Point::new(10.0, 10.0)),
                PathEl::QuadTo(kurbo::Point::new(10.0, 10.0), kurbo::Point::new(15.0, 10.0)),
                PathEl::QuadTo(kurbo::Point::new(20.0, 10.0), kurbo::Point::new(20.0, 15.0)),
                PathEl::LineTo(kurbo::Point::new(20.0, 20.0)),
            ]
        );
    }

    #[test]
    fn test_clamp_width() {
        assert_eq!(clamp_width(0.0), 1.0);
        assert_eq!(clamp_width(f64::NAN), 1.0);
        assert_eq!(clamp_width(-3.0), 1.0);
        assert_eq!(clamp_width(75.0), 50.0);
        assert_eq!(clamp_width(12.5), 12.5);
        assert_eq!(width_from_str("abc"), 1.0);
        assert_eq!(width_from_str(" 8 "), 8.0);
    }

    #[test]
    fn test_normalize_point_rejects_non_finite() {
        assert!(normalize_point(Point::new(f64::INFINITY, 0.0)).is_none());
        assert_eq!(normalize_point(Point::new(1.0, 2.0)), Some(Point::new(1.0, 2.0)));
    }
}
